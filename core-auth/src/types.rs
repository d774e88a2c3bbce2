use bridge_traits::provider::ProviderTokens;
use bridge_traits::stores::TokenRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// OAuth 2.0 token set with a resolved absolute expiry.
///
/// # Security
///
/// Tokens are secrets: the `Debug` implementation redacts them and the
/// type deliberately does not implement `Serialize`, so it can never end
/// up in a client-facing response by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    /// The access token used for provider API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    pub refresh_token: String,
    /// When the access token expires (UTC)
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl OAuthTokens {
    /// Create a token set expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Build a token set from a provider grant.
    ///
    /// Providers may omit the refresh token on refresh responses when they
    /// do not rotate it; `prior_refresh` fills the gap. A grant with no
    /// refresh token and no prior value is a provider-contract violation.
    ///
    /// # Arguments
    ///
    /// * `grant` - tokens as returned by the provider
    /// * `prior_refresh` - the previously stored refresh token, if any
    pub fn from_grant(grant: ProviderTokens, prior_refresh: Option<&str>) -> Result<Self> {
        let refresh_token = match grant.refresh_token {
            Some(token) => token,
            None => prior_refresh
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    AuthError::TokenExchangeFailed(
                        "Provider grant carried no refresh token".to_string(),
                    )
                })?,
        };

        Ok(Self::new(
            grant.access_token,
            refresh_token,
            grant.expires_in,
        ))
    }

    /// Check if the access token is expired.
    ///
    /// The lifecycle refreshes at-or-after the recorded expiry, not ahead
    /// of it; use [`Self::is_expired_with_buffer`] for early refresh.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(0)
    }

    /// Check expiry with a buffer: `true` if the token expires within
    /// `buffer_seconds` from now.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        let now = chrono::Utc::now();
        let buffer = chrono::Duration::seconds(buffer_seconds);
        now >= self.expires_at - buffer
    }

    /// Attach a user id, producing the storable record.
    pub fn into_record(self, user_id: Uuid) -> TokenRecord {
        TokenRecord {
            user_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The local user as presented to the client after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}
