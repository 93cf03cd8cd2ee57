//! Structured logging initialisation.

use std::io::{self, IsTerminal};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Subscriber;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

static INSTALLED: Mutex<bool> = Mutex::new(false);

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line records.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level {0:?}")]
    Level(String),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Parses `error`, `warn`, `info`, `debug`, `trace` or `off`.
///
/// # Errors
///
/// Returns `TelemetryError::Level` for anything else.
pub fn parse_level(level: &str) -> Result<LevelFilter, TelemetryError> {
    LevelFilter::from_str(level.trim()).map_err(|_| TelemetryError::Level(level.to_string()))
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Only the first call
/// installs anything; later calls return `Ok` without touching global state.
///
/// # Errors
///
/// Returns `TelemetryError` if `level` is invalid or another subscriber was
/// installed by someone else.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let level = parse_level(level)?;

    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
    if *installed {
        return Ok(());
    }
    install_subscriber(level, format)?;
    *installed = true;
    Ok(())
}

fn install_subscriber(level: LevelFilter, format: LogFormat) -> Result<(), TelemetryError> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true)
                .finish(),
        ),
        LogFormat::Text => Box::new(builder.finish()),
    };

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
