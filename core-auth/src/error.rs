use bridge_traits::error::StoreError;
use thiserror::Error;

/// Failure of one transition in the authorization lifecycle.
///
/// Each callback-resolver step maps to exactly one variant, so every
/// failure mode is enumerable and testable in isolation. `code()` is the
/// stable wire identifier; the display text stays server-side.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Echoed state did not match the client-persisted state. The flow
    /// must not proceed to token exchange.
    #[error("State parameter mismatch")]
    InvalidState,

    /// Redirect URI was relative, unparsable, or outside the allow-list.
    #[error("Redirect URI rejected: {0}")]
    InvalidRedirectUri(String),

    /// The provider refused or failed the code exchange. Non-retryable:
    /// the code has likely been consumed or expired.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The provider identity could not be fetched or mapped onto a local
    /// user.
    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable wire code for the client.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidState => "invalid_state",
            AuthError::InvalidRedirectUri(_) => "invalid_redirect_uri",
            AuthError::TokenExchangeFailed(_) => "token_exchange_failed",
            AuthError::IdentityResolution(_) => "identity_resolution_failed",
            AuthError::Store(_) => "store_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
