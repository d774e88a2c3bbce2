use bridge_traits::error::StoreError;
use thiserror::Error;

/// Failure modes of the file-listing operations.
///
/// `NoCredential` and `ReauthRequired` are distinct from the generic
/// `NotAuthenticated` on purpose: they tell the client to skip straight
/// to the provider-login screen instead of showing a generic failure.
#[derive(Error, Debug)]
pub enum FilesError {
    /// Missing or invalid session handle.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The user has a session but no stored provider credential; the
    /// authorization flow must be restarted.
    #[error("No provider credential stored")]
    NoCredential,

    /// The stored credential is unrecoverable (refresh rejected); the
    /// authorization flow must be restarted.
    #[error("Credential expired and refresh was rejected")]
    ReauthRequired,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl FilesError {
    /// Stable wire code for the client.
    pub fn code(&self) -> &'static str {
        match self {
            FilesError::NotAuthenticated => "unauthenticated",
            FilesError::NoCredential => "no_credential",
            FilesError::ReauthRequired => "reauth_required",
            FilesError::Provider(_) => "provider_error",
            FilesError::Store(_) => "store_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, FilesError>;
