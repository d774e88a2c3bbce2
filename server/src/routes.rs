//! HTTP Handlers
//!
//! Thin axum layer over the [`core_service::AppService`] façade: JSON in,
//! JSON out, `{"error": <code>}` with the mapped status on failure.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use core_service::{
    AppService, BookmarkRequest, CompleteAuthorizationRequest, OpenFileRequest, ServiceError,
    StartAuthorizationRequest,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// CORS is permissive: sessions travel in the Authorization header, not
/// in cookies, and the mobile web client is served from its own origin.
pub fn router(service: Arc<AppService>) -> Router {
    Router::new()
        .route("/auth/start", post(start_authorization))
        .route("/auth/callback", post(complete_authorization))
        .route("/auth/signout", post(sign_out))
        .route("/files", get(list_files))
        .route("/files/open", post(open_file))
        .route("/files/bookmark", post(set_bookmark))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Wire-facing error: only the stable code leaves the process.
#[derive(Debug)]
struct ApiError {
    status: u16,
    code: String,
}

impl ApiError {
    fn unauthenticated() -> Self {
        Self {
            status: 401,
            code: "unauthenticated".to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        tracing::warn!(code = err.code(), error = %err, "Request failed");
        Self {
            status: err.status(),
            code: err.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.code }))).into_response()
    }
}

/// Pull the session token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(ApiError::unauthenticated)
}

async fn start_authorization(
    State(service): State<Arc<AppService>>,
    Json(request): Json<StartAuthorizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = service.start_authorization(request)?;
    Ok(Json(response))
}

async fn complete_authorization(
    State(service): State<Arc<AppService>>,
    Json(request): Json<CompleteAuthorizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = service.complete_authorization(request).await?;
    Ok(Json(response))
}

async fn list_files(
    State(service): State<Arc<AppService>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = bearer_token(&headers)?;
    let listing = service.list_files(session).await?;
    Ok(Json(listing))
}

async fn open_file(
    State(service): State<Arc<AppService>>,
    headers: HeaderMap,
    Json(request): Json<OpenFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = bearer_token(&headers)?;
    let summary = service.open_file(session, request).await?;
    Ok(Json(summary))
}

async fn set_bookmark(
    State(service): State<Arc<AppService>>,
    headers: HeaderMap,
    Json(request): Json<BookmarkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = bearer_token(&headers)?;
    service.set_bookmark(session, request).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn sign_out(
    State(service): State<Arc<AppService>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let session = bearer_token(&headers)?;
    service.sign_out(session).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
