//! # Runtime Bootstrap
//!
//! Configuration and logging for the PocketCanvas backend. Configuration
//! is env-driven with fail-fast validation: missing provider credentials
//! abort startup, they are never discovered per-request.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AppConfig, AppConfigBuilder};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
