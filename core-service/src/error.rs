use core_auth::AuthError;
use core_files::FilesError;
use thiserror::Error;

/// Handler-level error: a stable wire code, an HTTP status, and a
/// server-side message.
///
/// Only the code crosses the wire; the message is for diagnostics. This
/// is the single place where the per-crate error taxonomies flatten into
/// the inbound interface.
#[derive(Error, Debug)]
#[error("{code}: {message}")]
pub struct ServiceError {
    code: &'static str,
    status: u16,
    message: String,
}

impl ServiceError {
    /// Stable wire identifier, e.g. `invalid_state`.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// HTTP status the handler layer responds with.
    pub fn status(&self) -> u16 {
        self.status
    }

    fn status_for(code: &str) -> u16 {
        match code {
            "invalid_state" | "invalid_redirect_uri" => 400,
            "unauthenticated" | "no_credential" | "reauth_required" => 401,
            "token_exchange_failed" | "identity_resolution_failed" | "provider_error" => 502,
            _ => 500,
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        let code = err.code();
        Self {
            code,
            status: Self::status_for(code),
            message: err.to_string(),
        }
    }
}

impl From<FilesError> for ServiceError {
    fn from(err: FilesError) -> Self {
        let code = err.code();
        Self {
            code,
            status: Self::status_for(code),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err: ServiceError = AuthError::InvalidState.into();
        assert_eq!(err.code(), "invalid_state");
        assert_eq!(err.status(), 400);

        let err: ServiceError = FilesError::ReauthRequired.into();
        assert_eq!(err.code(), "reauth_required");
        assert_eq!(err.status(), 401);

        let err: ServiceError = FilesError::NotAuthenticated.into();
        assert_eq!(err.status(), 401);

        let err: ServiceError = AuthError::TokenExchangeFailed("x".to_string()).into();
        assert_eq!(err.status(), 502);
    }
}
