//! Wire types for the Figma REST API

use serde::Deserialize;

/// Response from the token and refresh endpoints.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent when the provider does not rotate refresh tokens.
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

pub(crate) fn default_expires_in() -> i64 {
    3600 // Default to 1 hour if not specified
}

/// Response from `GET /v1/me`.
#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    /// Figma calls the display name a handle.
    pub handle: String,
    pub img_url: Option<String>,
}

/// Response from `GET /v1/files/{key}?depth=1`.
///
/// Only the metadata envelope is read; the document tree is left
/// untouched on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub name: String,
    pub thumbnail_url: Option<String>,
    pub last_modified: String,
    pub editor_type: Option<String>,
}
