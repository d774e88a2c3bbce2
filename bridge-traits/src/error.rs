use thiserror::Error;

/// Failure of a durable store operation.
///
/// Store implementations map their backend's errors into these variants;
/// callers treat every variant as infrastructure failure and never surface
/// the detail to clients.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    QueryFailed(String),

    #[error("stored record is corrupted: {0}")]
    Corrupted(String),
}

/// Failure of an outbound HTTP call.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),
}
