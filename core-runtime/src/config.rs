//! # Application Configuration
//!
//! Builder-based configuration with fail-fast validation. The binary
//! constructs an [`AppConfig`] once at startup, either from the
//! environment via [`AppConfig::from_env`] or explicitly through the
//! builder, and missing provider credentials abort right there with an
//! actionable message instead of surfacing as per-request failures.
//!
//! ## Environment variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `FIGMA_CLIENT_ID` | OAuth client id (required) | (none) |
//! | `FIGMA_CLIENT_SECRET` | OAuth client secret (required) | (none) |
//! | `DATABASE_URL` | SQLite URL | `sqlite:pocketcanvas.db` |
//! | `BIND_ADDR` | HTTP listen address | `127.0.0.1:8080` |
//! | `ALLOWED_REDIRECT_ORIGINS` | Comma-separated origin allow-list | empty (any) |
//! | `SESSION_TTL_HOURS` | Session lifetime | `168` (7 days) |

use crate::error::{Error, Result};
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite:pocketcanvas.db";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_TTL_HOURS: i64 = 168;

/// Application configuration.
///
/// Use [`AppConfig::builder`] to construct instances; `build()` validates
/// required fields and normalizes the allow-list.
#[derive(Clone)]
pub struct AppConfig {
    /// OAuth client id issued by the design-file host
    pub client_id: String,

    /// OAuth client secret. Never logged.
    pub client_secret: String,

    /// SQLite database URL
    pub database_url: String,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Origins (scheme + host + port) redirect URIs must match.
    ///
    /// Empty means any absolute URL is accepted; the server logs a
    /// warning at startup in that mode.
    pub allowed_redirect_origins: Vec<String>,

    /// Session handle lifetime in hours
    pub session_ttl_hours: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("bind_addr", &self.bind_addr)
            .field("allowed_redirect_origins", &self.allowed_redirect_origins)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish()
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Build the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfiguration`] when the provider
    /// credentials are absent; the process should not start without them.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(client_id) = std::env::var("FIGMA_CLIENT_ID") {
            builder = builder.client_id(client_id);
        }
        if let Ok(client_secret) = std::env::var("FIGMA_CLIENT_SECRET") {
            builder = builder.client_secret(client_secret);
        }
        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            builder = builder.database_url(database_url);
        }
        if let Ok(bind_addr) = std::env::var("BIND_ADDR") {
            builder = builder.bind_addr(bind_addr);
        }
        if let Ok(origins) = std::env::var("ALLOWED_REDIRECT_ORIGINS") {
            builder = builder.allowed_redirect_origins(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        if let Ok(ttl) = std::env::var("SESSION_TTL_HOURS") {
            let ttl = ttl
                .parse::<i64>()
                .map_err(|e| Error::InvalidConfiguration {
                    field: "SESSION_TTL_HOURS".to_string(),
                    reason: e.to_string(),
                })?;
            builder = builder.session_ttl_hours(ttl);
        }

        builder.build()
    }
}

/// Builder for [`AppConfig`].
#[derive(Default)]
pub struct AppConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    database_url: Option<String>,
    bind_addr: Option<String>,
    allowed_redirect_origins: Vec<String>,
    session_ttl_hours: Option<i64>,
}

impl AppConfigBuilder {
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = Some(database_url.into());
        self
    }

    pub fn bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
        self.bind_addr = Some(bind_addr.into());
        self
    }

    pub fn allowed_redirect_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_redirect_origins = origins;
        self
    }

    pub fn session_ttl_hours(mut self, hours: i64) -> Self {
        self.session_ttl_hours = Some(hours);
        self
    }

    /// Validate and produce the final configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingConfiguration`] if client id or secret is unset
    /// - [`Error::InvalidConfiguration`] if an allow-list entry is not an
    ///   absolute URL or the TTL is not positive
    pub fn build(self) -> Result<AppConfig> {
        let client_id = self.client_id.filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::MissingConfiguration(
                "FIGMA_CLIENT_ID is required; set it to the OAuth client id \
                 registered with the design-file host"
                    .to_string(),
            )
        })?;

        let client_secret = self
            .client_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::MissingConfiguration(
                    "FIGMA_CLIENT_SECRET is required; set it to the OAuth client \
                     secret registered with the design-file host"
                        .to_string(),
                )
            })?;

        let mut allowed_redirect_origins = Vec::with_capacity(self.allowed_redirect_origins.len());
        for origin in &self.allowed_redirect_origins {
            let url = Url::parse(origin).map_err(|e| Error::InvalidConfiguration {
                field: "ALLOWED_REDIRECT_ORIGINS".to_string(),
                reason: format!("'{}' is not a valid URL: {}", origin, e),
            })?;
            allowed_redirect_origins.push(url.origin().ascii_serialization());
        }

        let session_ttl_hours = self.session_ttl_hours.unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        if session_ttl_hours <= 0 {
            return Err(Error::InvalidConfiguration {
                field: "SESSION_TTL_HOURS".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(AppConfig {
            client_id,
            client_secret,
            database_url: self
                .database_url
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: self
                .bind_addr
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            allowed_redirect_origins,
            session_ttl_hours,
        })
    }
}
