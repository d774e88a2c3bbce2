use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required configuration: {0}")]
    MissingConfiguration(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
