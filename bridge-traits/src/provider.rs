//! Design-File Host Contract
//!
//! The outbound surface the core depends on: OAuth token exchange and
//! refresh plus the two resource reads (current identity, file metadata).
//! `provider-figma` is the production implementation; tests mock this
//! trait to drive the resolver and lister without a network.

use async_trait::async_trait;
use std::fmt;

/// Provider-call failure, already triaged by the implementation.
///
/// `Api` carries the provider's status so callers can distinguish a
/// rejected grant from transport trouble; the body is for server-side
/// diagnostics only.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("provider response could not be parsed: {0}")]
    Parse(String),

    #[error("provider unreachable: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Token pair returned by the provider's token endpoints.
///
/// `refresh_token` is optional because refresh responses may omit it when
/// the provider does not rotate refresh tokens; callers fall back to the
/// previously stored value. `Debug` redacts both secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// The provider's view of the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Metadata for one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFile {
    pub key: String,
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub last_modified: String,
    pub editor_type: String,
}

/// Stateless client for the design-file host's OAuth and resource APIs.
///
/// Every method performs bounded-timeout network I/O and holds no locks.
/// Token-endpoint calls are single-shot: the authorization code is
/// single-use by provider contract, and a failed refresh must surface to
/// the caller rather than being retried.
#[async_trait]
pub trait DesignHost: Send + Sync {
    /// Exchange an authorization code for a token pair. Called exactly
    /// once per code.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<ProviderTokens>;

    /// Trade a refresh token for a fresh access token (and possibly a
    /// rotated refresh token).
    async fn refresh_token(&self, refresh_token: &str) -> Result<ProviderTokens>;

    /// Fetch the identity behind an access token.
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile>;

    /// Fetch current metadata for one file.
    async fn fetch_file(&self, access_token: &str, file_key: &str) -> Result<ProviderFile>;
}
