//! Structured logging setup.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is left to the embedding application. [`init_logging`] is a convenience
//! for applications that want the stock `fmt` output.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{NetError, Result};

/// Install a global `fmt` subscriber.
///
/// The filter starts from `RUST_LOG` when set, otherwise from the
/// configured level. Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)
            .map_err(|e| NetError::ConfigError(format!("Invalid log filter: {e}")))?,
        _ => EnvFilter::new(config.log_level.as_str().to_lowercase()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_thread_names(config.thread_names)
        .try_init()
        .map_err(|e| NetError::ConfigError(format!("Failed to install subscriber: {e}")))
}
