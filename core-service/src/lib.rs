//! # Service Façade
//!
//! Wires the authorization flow, the callback resolver, and the file
//! lister into the three inbound operations the mobile client consumes
//! (plus the file-open, bookmark, and sign-out supplements), and owns the
//! request/response DTOs for them.
//!
//! The HTTP layer on top of this crate is deliberately thin: every
//! behavior worth testing lives here or below, so the integration tests
//! in `tests/` exercise the full flows without a socket.

pub mod error;

pub use error::ServiceError;

use bridge_traits::provider::DesignHost;
use bridge_traits::stores::{FileCacheStore, IdentityStore, SessionStore, TokenStore};
use core_auth::{
    AuthCodeFlow, AuthorizeConfig, CallbackRequest, CallbackResolver, SessionIssuer, UserProfile,
};
use core_files::{FileLister, FileListing, FileSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// `POST /auth/start` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAuthorizationRequest {
    pub redirect_uri: String,
    /// Client-minted state; one is generated when absent.
    #[serde(default)]
    pub state: Option<String>,
}

/// `POST /auth/start` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAuthorizationResponse {
    pub url: String,
    pub state: String,
}

/// `POST /auth/callback` request body: the provider's echo plus the
/// values the client persisted before navigating away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAuthorizationRequest {
    pub code: String,
    pub redirect_uri: String,
    pub state: String,
    pub expected_state: String,
}

/// `POST /auth/callback` response body. Carries the opaque session
/// handle and the user profile, never provider tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAuthorizationResponse {
    pub session: String,
    pub user: UserProfile,
}

/// `POST /files/open` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenFileRequest {
    pub key: String,
}

/// `POST /files/bookmark` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRequest {
    pub key: String,
    pub bookmarked: bool,
}

/// Everything the façade needs from the outside world.
pub struct ServiceDependencies {
    pub provider: Arc<dyn DesignHost>,
    pub identities: Arc<dyn IdentityStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub file_cache: Arc<dyn FileCacheStore>,
}

/// Flow-level settings, decoupled from deployment config so tests can
/// construct them directly.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub client_id: String,
    pub auth_url: String,
    pub scopes: Vec<String>,
    pub allowed_redirect_origins: Vec<String>,
    pub session_ttl_hours: i64,
}

/// Primary façade exposed to the handler layer.
pub struct AppService {
    flow: AuthCodeFlow,
    resolver: CallbackResolver,
    lister: FileLister,
}

impl AppService {
    /// Assemble the façade from its dependencies.
    pub fn new(deps: ServiceDependencies, options: ServiceOptions) -> Self {
        let sessions = SessionIssuer::new(deps.sessions, options.session_ttl_hours);

        let flow = AuthCodeFlow::new(AuthorizeConfig {
            client_id: options.client_id,
            auth_url: options.auth_url,
            scopes: options.scopes,
            allowed_redirect_origins: options.allowed_redirect_origins.clone(),
        });

        let resolver = CallbackResolver::new(
            deps.provider.clone(),
            deps.identities,
            deps.tokens.clone(),
            sessions.clone(),
            options.allowed_redirect_origins,
        );

        let lister = FileLister::new(deps.provider, deps.tokens, deps.file_cache, sessions);

        Self {
            flow,
            resolver,
            lister,
        }
    }

    /// Build the provider authorization URL and the state value for one
    /// login attempt.
    pub fn start_authorization(
        &self,
        request: StartAuthorizationRequest,
    ) -> Result<StartAuthorizationResponse> {
        let prepared = self.flow.begin(&request.redirect_uri, request.state)?;
        Ok(StartAuthorizationResponse {
            url: prepared.url,
            state: prepared.state,
        })
    }

    /// Run the callback state machine and issue a session.
    pub async fn complete_authorization(
        &self,
        request: CompleteAuthorizationRequest,
    ) -> Result<CompleteAuthorizationResponse> {
        let outcome = self
            .resolver
            .resolve(CallbackRequest {
                code: request.code,
                redirect_uri: request.redirect_uri,
                state: request.state,
                expected_state: request.expected_state,
            })
            .await?;

        Ok(CompleteAuthorizationResponse {
            session: outcome.session.into_string(),
            user: outcome.user,
        })
    }

    /// Serve the caller's file list.
    pub async fn list_files(&self, session_token: &str) -> Result<FileListing> {
        Ok(self.lister.list_files(session_token).await?)
    }

    /// Record a file open, creating or refreshing its cache entry.
    pub async fn open_file(
        &self,
        session_token: &str,
        request: OpenFileRequest,
    ) -> Result<FileSummary> {
        Ok(self.lister.record_access(session_token, &request.key).await?)
    }

    /// Toggle a bookmark.
    pub async fn set_bookmark(&self, session_token: &str, request: BookmarkRequest) -> Result<()> {
        Ok(self
            .lister
            .set_bookmark(session_token, &request.key, request.bookmarked)
            .await?)
    }

    /// Drop the caller's session.
    pub async fn sign_out(&self, session_token: &str) -> Result<()> {
        Ok(self.lister.sign_out(session_token).await?)
    }
}
