//! In-Memory Store Implementations
//!
//! `HashMap`-backed versions of every store trait, for unit tests and
//! ephemeral local runs. Semantics match the SQLite stores: upserts
//! replace whole records, emails and external ids are unique, bookmark
//! flips on unknown keys are no-ops.

use async_trait::async_trait;
use bridge_traits::error::StoreError;
use bridge_traits::stores::{
    CachedFileEntry, CreateUserOutcome, FileCacheStore, Identity, IdentityStore, SessionRecord,
    SessionStore, TokenRecord, TokenStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Default)]
struct State {
    /// user id -> email
    users: HashMap<Uuid, String>,
    /// email -> user id
    emails: HashMap<String, Uuid>,
    /// external id -> identity
    identities: HashMap<String, Identity>,
    /// user id -> token record
    tokens: HashMap<Uuid, TokenRecord>,
    /// token digest -> session
    sessions: HashMap<String, SessionRecord>,
    /// (user id, file key) -> cache entry
    files: HashMap<(Uuid, String), CachedFileEntry>,
}

/// In-memory implementation of every store trait.
#[derive(Clone, Default)]
pub struct MemoryStores {
    state: Arc<Mutex<State>>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of token records currently held. Test helper.
    pub async fn token_count(&self) -> usize {
        self.state.lock().await.tokens.len()
    }

    /// Number of identity records currently held. Test helper.
    pub async fn identity_count(&self) -> usize {
        self.state.lock().await.identities.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryStores {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>> {
        let state = self.state.lock().await;
        Ok(state.identities.get(external_id).cloned())
    }

    async fn create_user(&self, email: &str) -> Result<CreateUserOutcome> {
        let mut state = self.state.lock().await;
        if state.emails.contains_key(email) {
            return Ok(CreateUserOutcome::EmailTaken);
        }
        let user_id = Uuid::new_v4();
        state.users.insert(user_id, email.to_string());
        state.emails.insert(email.to_string(), user_id);
        Ok(CreateUserOutcome::Created(user_id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let state = self.state.lock().await;
        Ok(state.emails.get(email).copied())
    }

    async fn upsert_identity(&self, identity: &Identity) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .identities
            .insert(identity.external_id.clone(), identity.clone());
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStores {
    async fn upsert(&self, record: &TokenRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tokens.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<TokenRecord>> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(&user_id).cloned())
    }

    async fn delete(&self, user_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tokens.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStores {
    async fn insert(&self, record: &SessionRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .sessions
            .insert(record.token_digest.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, token_digest: &str) -> Result<Option<SessionRecord>> {
        let state = self.state.lock().await;
        Ok(state.sessions.get(token_digest).cloned())
    }

    async fn delete(&self, token_digest: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sessions.remove(token_digest);
        Ok(())
    }
}

#[async_trait]
impl FileCacheStore for MemoryStores {
    async fn upsert(&self, entry: &CachedFileEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .files
            .insert((entry.user_id, entry.file_key.clone()), entry.clone());
        Ok(())
    }

    async fn list_recent(&self, user_id: Uuid, limit: u32) -> Result<Vec<CachedFileEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<CachedFileEntry> = state
            .files
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn find(&self, user_id: Uuid, file_key: &str) -> Result<Option<CachedFileEntry>> {
        let state = self.state.lock().await;
        Ok(state.files.get(&(user_id, file_key.to_string())).cloned())
    }

    async fn set_bookmarked(&self, user_id: Uuid, file_key: &str, bookmarked: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.files.get_mut(&(user_id, file_key.to_string())) {
            entry.is_bookmarked = bookmarked;
        }
        Ok(())
    }
}
