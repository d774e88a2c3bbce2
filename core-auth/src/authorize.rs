//! Authorization Initiator
//!
//! Builds the provider-facing authorization URL and the anti-forgery
//! state value for one login attempt. The initiator is stateless: the
//! state value is returned to the caller, parked in client storage across
//! the navigation to the provider and back, and checked by pure equality
//! in the callback resolver. Nothing is written server-side here.

use crate::error::{AuthError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use tracing::{debug, instrument};
use url::Url;

/// Anti-forgery state value bound to one login attempt.
///
/// # Security
///
/// Treated as a security-critical secret, not a correlation id: 16 bytes
/// of OS randomness, URL-safe base64 without padding (22 characters), so
/// it cannot be guessed by an attacker trying to inject a foreign
/// authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState(String);

impl LoginState {
    /// Generate a fresh state value.
    pub fn generate() -> Self {
        let mut state_bytes = [0u8; 16];
        rand::thread_rng().fill(&mut state_bytes);
        Self(URL_SAFE_NO_PAD.encode(state_bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Configuration for the authorization flow.
///
/// `auth_url` and `scopes` come from the provider crate; the allow-list
/// comes from deployment configuration.
#[derive(Debug, Clone)]
pub struct AuthorizeConfig {
    /// OAuth client id
    pub client_id: String,
    /// Provider authorization endpoint
    pub auth_url: String,
    /// Scopes to request, joined with commas the way the provider expects
    pub scopes: Vec<String>,
    /// Origins redirect URIs must match; empty accepts any absolute URL
    pub allowed_redirect_origins: Vec<String>,
}

/// A prepared authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Provider URL the client navigates to
    pub url: String,
    /// State value the client must persist until the callback returns
    pub state: String,
}

/// Validate a caller-supplied redirect URI.
///
/// The URI must be absolute; when `allowed_origins` is non-empty its
/// origin (scheme + host + port) must be listed. Shared by the initiator
/// and the callback resolver so both ends of the flow enforce the same
/// policy.
pub fn check_redirect_uri(redirect_uri: &str, allowed_origins: &[String]) -> Result<Url> {
    let url = Url::parse(redirect_uri)
        .map_err(|e| AuthError::InvalidRedirectUri(format!("not an absolute URL: {}", e)))?;

    if url.cannot_be_a_base() {
        return Err(AuthError::InvalidRedirectUri(
            "URL has no host".to_string(),
        ));
    }

    if !allowed_origins.is_empty() {
        let origin = url.origin().ascii_serialization();
        if !allowed_origins.iter().any(|allowed| allowed == &origin) {
            return Err(AuthError::InvalidRedirectUri(format!(
                "origin {} is not in the allow-list",
                origin
            )));
        }
    }

    Ok(url)
}

/// Authorization Initiator.
///
/// # Example
///
/// ```
/// use core_auth::{AuthCodeFlow, AuthorizeConfig};
///
/// let flow = AuthCodeFlow::new(AuthorizeConfig {
///     client_id: "client-id".to_string(),
///     auth_url: "https://www.figma.com/oauth".to_string(),
///     scopes: vec!["file_metadata:read".to_string()],
///     allowed_redirect_origins: vec![],
/// });
///
/// let request = flow.begin("https://app.example.com/auth", None).unwrap();
/// assert!(request.url.contains("state="));
/// assert!(request.state.len() >= 16);
/// ```
pub struct AuthCodeFlow {
    config: AuthorizeConfig,
}

impl AuthCodeFlow {
    pub fn new(config: AuthorizeConfig) -> Self {
        Self { config }
    }

    /// Build the authorization URL and the state value for one login
    /// attempt.
    ///
    /// A caller-supplied state is used verbatim when present (the mobile
    /// client mints its own before navigating away); otherwise a fresh
    /// [`LoginState`] is generated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRedirectUri`] when the redirect target
    /// is relative or outside the configured allow-list.
    #[instrument(skip(self, state))]
    pub fn begin(&self, redirect_uri: &str, state: Option<String>) -> Result<AuthorizationRequest> {
        check_redirect_uri(redirect_uri, &self.config.allowed_redirect_origins)?;

        let state = match state.filter(|s| !s.is_empty()) {
            Some(provided) => provided,
            None => LoginState::generate().into_string(),
        };

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::InvalidRedirectUri(format!("invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("scope", &self.config.scopes.join(","));
            query.append_pair("state", &state);
            query.append_pair("response_type", "code");
        }

        debug!("Built authorization URL");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }
}
