//! Figma API client
//!
//! Implements the `DesignHost` trait over the abstract `HttpClient`.
//!
//! Token endpoints are called exactly once per operation: authorization
//! codes are single-use, and a failed refresh must surface to the caller
//! instead of being retried. Metadata reads are idempotent and go through
//! the retrying path (429/5xx with exponential backoff).

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::provider::{
    DesignHost, ProviderError, ProviderFile, ProviderProfile, ProviderTokens, Result,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::types::{FileResponse, MeResponse, TokenResponse};

/// Figma OAuth authorization endpoint (user-facing redirect target)
pub const AUTHORIZE_URL: &str = "https://www.figma.com/oauth";

/// Figma REST API base URL
const API_BASE: &str = "https://api.figma.com/v1";

/// Scopes the file browser needs
pub const DEFAULT_SCOPES: &[&str] = &[
    "file_content:read",
    "file_metadata:read",
    "file_versions:read",
];

/// Figma connector configuration.
///
/// Endpoint overrides exist for tests and staging proxies; production
/// uses the defaults.
#[derive(Clone)]
pub struct FigmaConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub refresh_url: String,
    pub api_base: String,
    /// Bound on every outbound call
    pub timeout: Duration,
}

impl FigmaConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: format!("{}/oauth/token", API_BASE),
            refresh_url: format!("{}/oauth/refresh", API_BASE),
            api_base: API_BASE.to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl std::fmt::Debug for FigmaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FigmaConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .field("refresh_url", &self.refresh_url)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Figma API connector implementing [`DesignHost`].
pub struct FigmaClient {
    config: FigmaConfig,
    http_client: Arc<dyn HttpClient>,
}

impl FigmaClient {
    pub fn new(config: FigmaConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    fn form_body(params: &HashMap<&str, &str>) -> Result<Bytes> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| ProviderError::Parse(format!("Failed to encode form body: {}", e)))?;
        Ok(Bytes::from(encoded))
    }

    fn transport_err(e: bridge_traits::error::HttpError) -> ProviderError {
        ProviderError::Transport(e.to_string())
    }

    /// Single-shot POST to a token endpoint; non-2xx is final.
    async fn token_request(&self, url: &str, params: HashMap<&str, &str>) -> Result<ProviderTokens> {
        let request = HttpRequest::new(HttpMethod::Post, url)
            .form(Self::form_body(&params)?)
            .timeout(self.config.timeout);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(Self::transport_err)?;

        if !response.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(
                status = response.status,
                "Token endpoint rejected the request"
            );
            return Err(ProviderError::Api {
                status: response.status,
                message,
            });
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(format!("Failed to parse token response: {}", e)))?;

        info!(
            expires_in = token_response.expires_in,
            "Token endpoint call succeeded"
        );

        Ok(ProviderTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_in: token_response.expires_in,
        })
    }

    /// Authenticated GET against the resource API, with backoff on
    /// 429/5xx.
    async fn api_get(&self, url: String, access_token: &str) -> Result<bridge_traits::http::HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(access_token)
            .header("Accept", "application/json")
            .timeout(self.config.timeout);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await
            .map_err(Self::transport_err)?;

        if !response.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ProviderError::Api {
                status: response.status,
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl DesignHost for FigmaClient {
    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<ProviderTokens> {
        debug!("Exchanging authorization code for tokens");

        let mut params = HashMap::new();
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("client_secret", self.config.client_secret.as_str());
        params.insert("redirect_uri", redirect_uri);
        params.insert("code", code);
        params.insert("grant_type", "authorization_code");

        self.token_request(&self.config.token_url, params).await
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_token(&self, refresh_token: &str) -> Result<ProviderTokens> {
        debug!("Refreshing access token");

        let mut params = HashMap::new();
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("client_secret", self.config.client_secret.as_str());
        params.insert("refresh_token", refresh_token);

        self.token_request(&self.config.refresh_url, params).await
    }

    #[instrument(skip(self, access_token))]
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile> {
        let url = format!("{}/me", self.config.api_base);
        let response = self.api_get(url, access_token).await?;

        let me: MeResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(format!("Failed to parse identity: {}", e)))?;

        Ok(ProviderProfile {
            external_id: me.id,
            email: me.email,
            name: me.handle,
            avatar_url: me.img_url,
        })
    }

    #[instrument(skip(self, access_token), fields(file_key = %file_key))]
    async fn fetch_file(&self, access_token: &str, file_key: &str) -> Result<ProviderFile> {
        // depth=1 keeps the response to the metadata envelope.
        let url = format!("{}/files/{}?depth=1", self.config.api_base, file_key);
        let response = self.api_get(url, access_token).await?;

        let file: FileResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(format!("Failed to parse file metadata: {}", e)))?;

        Ok(ProviderFile {
            key: file_key.to_string(),
            name: file.name,
            thumbnail_url: file.thumbnail_url,
            last_modified: file.last_modified,
            editor_type: file.editor_type.unwrap_or_else(|| "figma".to_string()),
        })
    }
}
