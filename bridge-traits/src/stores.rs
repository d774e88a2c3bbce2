//! Durable Store Contracts
//!
//! The identity, token, session, and file-cache stores are the only shared
//! mutable state in the system. Every mutation is an upsert-style
//! single-row write keyed by a unique column; implementations must make
//! those writes atomic (insert-or-update in one statement, last writer
//! wins), never read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

/// A local user linked to exactly one external provider account.
///
/// `external_id` is unique across all identities; the mutable profile
/// fields (email, name, avatar) are refreshed from the provider on every
/// successful callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// Outcome of attempting to create a local user for an email address.
///
/// Creation and identity-linking are not atomic against a concurrently
/// existing account, so `EmailTaken` is a normal outcome the caller must
/// reconcile, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(Uuid),
    EmailTaken,
}

/// Durable mapping from external-provider identity to local user record.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the identity linked to an external provider account id.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>>;

    /// Create a new local user bound to this email.
    ///
    /// The email column is unique; a concurrent or pre-existing user with
    /// the same email yields `EmailTaken` rather than an error.
    async fn create_user(&self, email: &str) -> Result<CreateUserOutcome>;

    /// Locate an existing local user by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>>;

    /// Insert or replace the identity record keyed by `external_id`.
    ///
    /// Must be a single atomic write; on conflict the mutable fields and
    /// the user link are replaced wholesale.
    async fn upsert_identity(&self, identity: &Identity) -> Result<()>;
}

/// Current OAuth credential pair for one local user.
///
/// Exactly one live record exists per user id; replacement is always
/// wholesale. Token values are secrets: `Debug` redacts them and the
/// record must never be serialized into a client-facing response.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Durable mapping from local user to the provider's credential pair.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or replace the token record keyed by `user_id`.
    ///
    /// Single atomic write; the prior record (if any) is replaced in full,
    /// never partially updated.
    async fn upsert(&self, record: &TokenRecord) -> Result<()>;

    /// Load the live token record for a user.
    async fn find(&self, user_id: Uuid) -> Result<Option<TokenRecord>>;

    /// Drop the credential for a user. Idempotent.
    async fn delete(&self, user_id: Uuid) -> Result<()>;
}

/// A minted session handle, stored by digest.
///
/// The opaque token handed to the client is never persisted; only its
/// SHA-256 digest is, so a leaked store cannot be replayed as sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_digest: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Durable session-handle store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a freshly minted session.
    async fn insert(&self, record: &SessionRecord) -> Result<()>;

    /// Resolve a session by token digest.
    async fn find(&self, token_digest: &str) -> Result<Option<SessionRecord>>;

    /// Remove a session. Idempotent.
    async fn delete(&self, token_digest: &str) -> Result<()>;
}

/// Last known metadata for a remote file the user has opened.
///
/// Pure acceleration structure: the provider remains the source of truth,
/// entries are refreshed on access and never evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFileEntry {
    pub user_id: Uuid,
    pub file_key: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub file_type: String,
    pub last_accessed_at: DateTime<Utc>,
    pub is_bookmarked: bool,
}

/// Durable per-user file metadata cache.
#[async_trait]
pub trait FileCacheStore: Send + Sync {
    /// Insert or replace the entry keyed by `(user_id, file_key)`.
    async fn upsert(&self, entry: &CachedFileEntry) -> Result<()>;

    /// Entries for a user, most recently accessed first.
    async fn list_recent(&self, user_id: Uuid, limit: u32) -> Result<Vec<CachedFileEntry>>;

    /// Look up a single entry.
    async fn find(&self, user_id: Uuid, file_key: &str) -> Result<Option<CachedFileEntry>>;

    /// Flip the bookmark flag on an existing entry.
    ///
    /// Unknown keys are a no-op; the flag only exists for files the user
    /// has already opened.
    async fn set_bookmarked(&self, user_id: Uuid, file_key: &str, bookmarked: bool) -> Result<()>;
}
