//! Command-line and environment configuration for the `feeder` binary.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::bot::DEFAULT_API_URL;
use crate::service::config::{ConfigError, DispatchConfig};
use crate::telemetry::LogFormat;

/// Telegram bot that answers commands through a per-user ordered pipeline.
#[derive(Parser, Debug, Clone)]
#[command(name = "feeder", version)]
pub struct Cli {
    /// Telegram bot token.
    #[arg(long, env = "FEEDER_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the Telegram Bot API.
    #[arg(long, env = "FEEDER_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Maximum number of messages handled at once.
    #[arg(long, env = "FEEDER_MAX_CONCURRENCY", default_value_t = 30)]
    pub max_concurrency: usize,

    /// Deadline for handling a single message, in milliseconds.
    #[arg(long, env = "FEEDER_REQUEST_TIMEOUT_MS", default_value_t = 3000)]
    pub request_timeout_ms: u64,

    /// Grace period for in-flight messages at shutdown, in milliseconds.
    #[arg(long, env = "FEEDER_DRAIN_TIMEOUT_MS", default_value_t = 3000)]
    pub drain_timeout_ms: u64,

    /// Log level: error, warn, info, debug or trace. `RUST_LOG` overrides it.
    #[arg(long, env = "FEEDER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "FEEDER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "FEEDER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// # Errors
    ///
    /// Returns `ConfigError` if any dispatch setting is zero.
    pub fn dispatch_config(&self) -> Result<DispatchConfig, ConfigError> {
        let config = DispatchConfig {
            max_concurrency: self.max_concurrency,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingToken` if no token was given.
    pub fn token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)
    }
}
