use std::time::Duration;

/// Default cap on requests inside the handler at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 30;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Default grace period for in-flight requests at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Invalid configuration values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max concurrency must be greater than zero")]
    ZeroConcurrency,
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
    #[error("bot token is required")]
    MissingToken,
    #[error("invalid api url {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

/// Dispatch-level configuration: concurrency and the request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum number of requests inside the business handler at once.
    pub max_concurrency: usize,
    /// Deadline given to every request context.
    pub request_timeout: Duration,
    /// How long shutdown waits for in-flight requests before cancelling them.
    pub drain_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl DispatchConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if the concurrency limit or either timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "request timeout",
            });
        }
        if self.drain_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "drain timeout",
            });
        }
        Ok(())
    }
}
