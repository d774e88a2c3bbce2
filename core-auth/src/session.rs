//! Session Handles
//!
//! After a successful callback the client holds an opaque session token,
//! never the provider's credentials. Tokens are 32 bytes of OS randomness;
//! only their SHA-256 digest is persisted, so the session store contains
//! nothing replayable.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::error::StoreError;
use bridge_traits::stores::{SessionRecord, SessionStore};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Session operations fail only on store trouble; callers wrap the error
/// into their own taxonomy.
type Result<T> = std::result::Result<T, StoreError>;

/// Opaque session handle issued to the client.
///
/// `Debug` redacts the value; use [`SessionToken::into_string`] at the
/// single point where the token is written into the response.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh token from 32 bytes of OS randomness.
    pub fn generate() -> Self {
        let mut token_bytes = [0u8; 32];
        rand::thread_rng().fill(&mut token_bytes);
        Self(URL_SAFE_NO_PAD.encode(token_bytes))
    }

    /// Digest used as the storage key: BASE64URL(SHA256(token)).
    pub fn digest(&self) -> String {
        digest_of(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}

fn digest_of(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Mints, resolves, and revokes session handles.
#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionIssuer {
    /// # Arguments
    ///
    /// * `store` - durable session store
    /// * `ttl_hours` - lifetime of minted sessions
    pub fn new(store: Arc<dyn SessionStore>, ttl_hours: i64) -> Self {
        Self {
            store,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Mint and persist a session for a user.
    pub async fn issue(&self, user_id: Uuid) -> Result<SessionToken> {
        let token = SessionToken::generate();
        let now = Utc::now();

        let record = SessionRecord {
            token_digest: token.digest(),
            user_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.store.insert(&record).await?;

        info!(user_id = %user_id, "Session issued");
        Ok(token)
    }

    /// Resolve a presented token to its user id.
    ///
    /// Returns `None` for unknown tokens and for expired sessions;
    /// expired records are deleted on sight.
    pub async fn resolve(&self, token: &str) -> Result<Option<Uuid>> {
        let digest = digest_of(token);

        let Some(record) = self.store.find(&digest).await? else {
            return Ok(None);
        };

        if record.expires_at <= Utc::now() {
            debug!(user_id = %record.user_id, "Session expired");
            self.store.delete(&digest).await?;
            return Ok(None);
        }

        Ok(Some(record.user_id))
    }

    /// Drop a session. Idempotent; unknown tokens are a no-op.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.store.delete(&digest_of(token)).await?;
        Ok(())
    }
}
