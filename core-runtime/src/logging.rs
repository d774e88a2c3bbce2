//! # Logging & Tracing Infrastructure
//!
//! Configures the `tracing-subscriber` stack for the backend: an
//! `EnvFilter` (honoring `RUST_LOG`, falling back to the configured
//! default) plus one fmt layer in the selected output format.
//!
//! Secrets never reach this layer by construction (token-bearing types
//! redact themselves in `Debug`), so no scrubbing happens here.

use crate::error::{Error, Result};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact format for production
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup, before any request handling.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| Error::LoggingInit(format!("Invalid filter directive: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    };

    result.map_err(|e| Error::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_filter, "info");
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_default_filter("debug,sqlx=warn");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.default_filter, "debug,sqlx=warn");
    }

    #[test]
    fn test_init_logging_accepts_valid_filter() {
        // May fail with "already initialized" when tests share a process;
        // both outcomes exercise the path without panicking.
        let _ = init_logging(LoggingConfig::default().with_format(LogFormat::Compact));
    }
}
