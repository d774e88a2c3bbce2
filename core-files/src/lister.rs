//! File Lister with Refresh Guard
//!
//! Listing walks the user's cached file keys (most recent first) and asks
//! the provider for current metadata per key, falling back to the cached
//! values when a lookup fails. The cache is also where entries are born:
//! `record_access` runs when the UI opens a file link.
//!
//! The Refresh Guard sits in front of every provider call: an expired
//! stored credential is refreshed exactly once, with the replacement
//! written back as one atomic upsert. Two concurrent requests may both
//! refresh; each replacement is wholesale, so the store ends up holding
//! one of the two results, never a mix.

use bridge_traits::provider::DesignHost;
use bridge_traits::stores::{CachedFileEntry, FileCacheStore, TokenStore};
use chrono::Utc;
use core_auth::{OAuthTokens, SessionIssuer};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{FilesError, Result};
use crate::types::{FileListing, FileSummary};

/// How many cached entries one listing covers
const RECENT_LIMIT: u32 = 20;

const EMPTY_MESSAGE: &str = "No files yet. Open a Figma file link to add it to your library.";

/// Serves the caller's file list and maintains the per-user file cache.
pub struct FileLister {
    provider: Arc<dyn DesignHost>,
    tokens: Arc<dyn TokenStore>,
    cache: Arc<dyn FileCacheStore>,
    sessions: SessionIssuer,
}

impl FileLister {
    pub fn new(
        provider: Arc<dyn DesignHost>,
        tokens: Arc<dyn TokenStore>,
        cache: Arc<dyn FileCacheStore>,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            provider,
            tokens,
            cache,
            sessions,
        }
    }

    /// List the caller's files.
    ///
    /// Aside from the implicit token refresh this is a pure read: the
    /// cache is not touched, so re-invoking with no intervening state
    /// change returns the same listing.
    #[instrument(skip(self, session_token))]
    pub async fn list_files(&self, session_token: &str) -> Result<FileListing> {
        let user_id = self.resolve_session(session_token).await?;
        let access_token = self.fresh_access_token(user_id).await?;

        let entries = self.cache.list_recent(user_id, RECENT_LIMIT).await?;
        if entries.is_empty() {
            return Ok(FileListing {
                files: Vec::new(),
                message: Some(EMPTY_MESSAGE.to_string()),
            });
        }

        let mut files = Vec::with_capacity(entries.len());
        for entry in &entries {
            match self.provider.fetch_file(&access_token, &entry.file_key).await {
                Ok(file) => files.push(FileSummary::from_provider(file, entry.is_bookmarked)),
                Err(e) => {
                    // Degrade-not-fail: a stale row beats a hole in the
                    // list.
                    debug!(
                        file_key = %entry.file_key,
                        error = %e,
                        "Per-file fetch failed, serving cached metadata"
                    );
                    files.push(FileSummary::from_cache(entry));
                }
            }
        }

        info!(user_id = %user_id, count = files.len(), "File listing served");
        Ok(FileListing {
            files,
            message: None,
        })
    }

    /// Record that the user opened a file, fetching its metadata once and
    /// upserting the cache entry. This is how files enter the listing.
    #[instrument(skip(self, session_token), fields(file_key = %file_key))]
    pub async fn record_access(&self, session_token: &str, file_key: &str) -> Result<FileSummary> {
        let user_id = self.resolve_session(session_token).await?;
        let access_token = self.fresh_access_token(user_id).await?;

        let file = self
            .provider
            .fetch_file(&access_token, file_key)
            .await
            .map_err(|e| FilesError::Provider(e.to_string()))?;

        // The bookmark flag is locally owned; keep it across refreshes.
        let is_bookmarked = self
            .cache
            .find(user_id, file_key)
            .await?
            .map(|existing| existing.is_bookmarked)
            .unwrap_or(false);

        let entry = CachedFileEntry {
            user_id,
            file_key: file.key.clone(),
            title: file.name.clone(),
            thumbnail_url: file.thumbnail_url.clone(),
            file_type: file.editor_type.clone(),
            last_accessed_at: Utc::now(),
            is_bookmarked,
        };
        self.cache.upsert(&entry).await?;

        Ok(FileSummary::from_provider(file, is_bookmarked))
    }

    /// Toggle the bookmark flag on a previously opened file.
    #[instrument(skip(self, session_token), fields(file_key = %file_key))]
    pub async fn set_bookmark(
        &self,
        session_token: &str,
        file_key: &str,
        bookmarked: bool,
    ) -> Result<()> {
        let user_id = self.resolve_session(session_token).await?;
        self.cache.set_bookmarked(user_id, file_key, bookmarked).await?;
        Ok(())
    }

    /// Drop the caller's session. Provider tokens stay stored, so the
    /// next sign-in completes without a fresh consent screen.
    #[instrument(skip(self, session_token))]
    pub async fn sign_out(&self, session_token: &str) -> Result<()> {
        self.sessions.revoke(session_token).await?;
        Ok(())
    }

    async fn resolve_session(&self, session_token: &str) -> Result<Uuid> {
        self.sessions
            .resolve(session_token)
            .await?
            .ok_or(FilesError::NotAuthenticated)
    }

    /// The Refresh Guard: return a usable access token, refreshing the
    /// stored record first when it has expired.
    async fn fresh_access_token(&self, user_id: Uuid) -> Result<String> {
        let record = self
            .tokens
            .find(user_id)
            .await?
            .ok_or(FilesError::NoCredential)?;

        if record.expires_at > Utc::now() {
            return Ok(record.access_token);
        }

        debug!(user_id = %user_id, "Stored access token expired, refreshing");

        let grant = match self.provider.refresh_token(&record.refresh_token).await {
            Ok(grant) => grant,
            Err(e) => {
                // Unrecoverable credential. The stored record is left
                // untouched; only a fresh authorization flow replaces it.
                warn!(user_id = %user_id, error = %e, "Token refresh rejected");
                return Err(FilesError::ReauthRequired);
            }
        };

        // Providers may omit the refresh token when they do not rotate
        // it; fall back to the one already stored.
        let tokens = OAuthTokens::from_grant(grant, Some(&record.refresh_token))
            .map_err(|e| FilesError::Provider(e.to_string()))?;
        let access_token = tokens.access_token.clone();

        self.tokens.upsert(&tokens.into_record(user_id)).await?;
        info!(user_id = %user_id, "Token record refreshed");

        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_server::MemoryStores;
    use bridge_traits::provider::{
        ProviderError, ProviderFile, ProviderProfile, ProviderTokens,
    };
    use bridge_traits::stores::TokenRecord;
    use chrono::Duration;
    use mockall::mock;

    mock! {
        Provider {}

        #[async_trait::async_trait]
        impl DesignHost for Provider {
            async fn exchange_code(
                &self,
                code: &str,
                redirect_uri: &str,
            ) -> bridge_traits::provider::Result<ProviderTokens>;
            async fn refresh_token(
                &self,
                refresh_token: &str,
            ) -> bridge_traits::provider::Result<ProviderTokens>;
            async fn fetch_profile(
                &self,
                access_token: &str,
            ) -> bridge_traits::provider::Result<ProviderProfile>;
            async fn fetch_file(
                &self,
                access_token: &str,
                file_key: &str,
            ) -> bridge_traits::provider::Result<ProviderFile>;
        }
    }

    struct Fixture {
        stores: MemoryStores,
        user_id: Uuid,
        session: String,
    }

    async fn fixture() -> Fixture {
        let stores = MemoryStores::new();
        let user_id = Uuid::new_v4();
        let session = SessionIssuer::new(Arc::new(stores.clone()), 24)
            .issue(user_id)
            .await
            .unwrap()
            .into_string();
        Fixture {
            stores,
            user_id,
            session,
        }
    }

    fn lister(provider: MockProvider, stores: &MemoryStores) -> FileLister {
        let stores_arc = Arc::new(stores.clone());
        FileLister::new(
            Arc::new(provider),
            stores_arc.clone(),
            stores_arc.clone(),
            SessionIssuer::new(stores_arc, 24),
        )
    }

    async fn seed_token(fx: &Fixture, expires_in_secs: i64) {
        let record = TokenRecord {
            user_id: fx.user_id,
            access_token: "figd_old".to_string(),
            refresh_token: "figr_old".to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        };
        TokenStore::upsert(&fx.stores, &record).await.unwrap();
    }

    async fn seed_cache(fx: &Fixture, key: &str, age_secs: i64) {
        let entry = CachedFileEntry {
            user_id: fx.user_id,
            file_key: key.to_string(),
            title: format!("cached {}", key),
            thumbnail_url: Some(format!("https://cdn.example/{}.png", key)),
            file_type: "figma".to_string(),
            last_accessed_at: Utc::now() - Duration::seconds(age_secs),
            is_bookmarked: false,
        };
        FileCacheStore::upsert(&fx.stores, &entry).await.unwrap();
    }

    fn provider_file(key: &str) -> ProviderFile {
        ProviderFile {
            key: key.to_string(),
            name: format!("live {}", key),
            thumbnail_url: None,
            last_modified: "2024-05-01T12:00:00Z".to_string(),
            editor_type: "figma".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthenticated() {
        let fx = fixture().await;
        let lister = lister(MockProvider::new(), &fx.stores);

        let result = lister.list_files("never-issued").await;
        assert!(matches!(result, Err(FilesError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_missing_credential_is_distinct_signal() {
        let fx = fixture().await;
        let lister = lister(MockProvider::new(), &fx.stores);

        let result = lister.list_files(&fx.session).await;
        assert!(matches!(result, Err(FilesError::NoCredential)));
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh() {
        let fx = fixture().await;
        seed_token(&fx, 3600).await;

        let mut provider = MockProvider::new();
        provider.expect_refresh_token().times(0);

        let listing = lister(provider, &fx.stores)
            .list_files(&fx.session)
            .await
            .unwrap();

        assert!(listing.files.is_empty());
        assert_eq!(listing.message.as_deref(), Some(EMPTY_MESSAGE));
    }

    #[tokio::test]
    async fn test_expired_token_triggers_exactly_one_refresh() {
        let fx = fixture().await;
        seed_token(&fx, -1).await;

        let mut provider = MockProvider::new();
        provider
            .expect_refresh_token()
            .withf(|refresh| refresh == "figr_old")
            .times(1)
            .returning(|_| {
                Ok(ProviderTokens {
                    access_token: "figd_new".to_string(),
                    refresh_token: Some("figr_new".to_string()),
                    expires_in: 3600,
                })
            });

        let before = Utc::now();
        lister(provider, &fx.stores)
            .list_files(&fx.session)
            .await
            .unwrap();

        let record = TokenStore::find(&fx.stores, fx.user_id)
            .await
            .unwrap()
            .expect("token record missing");
        assert_eq!(record.access_token, "figd_new");
        assert_eq!(record.refresh_token, "figr_new");

        // New expiry is now + expires_in from the refresh response.
        let expected = before + Duration::seconds(3600);
        let drift = (record.expires_at - expected).num_seconds().abs();
        assert!(drift <= 5, "expires_at drifted {}s", drift);
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_keeps_old_refresh_token() {
        let fx = fixture().await;
        seed_token(&fx, -1).await;

        let mut provider = MockProvider::new();
        provider.expect_refresh_token().times(1).returning(|_| {
            Ok(ProviderTokens {
                access_token: "figd_new".to_string(),
                refresh_token: None,
                expires_in: 3600,
            })
        });

        lister(provider, &fx.stores)
            .list_files(&fx.session)
            .await
            .unwrap();

        let record = TokenStore::find(&fx.stores, fx.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.access_token, "figd_new");
        assert_eq!(record.refresh_token, "figr_old");
    }

    #[tokio::test]
    async fn test_rejected_refresh_leaves_record_untouched() {
        let fx = fixture().await;
        seed_token(&fx, -1).await;

        let mut provider = MockProvider::new();
        provider.expect_refresh_token().times(1).returning(|_| {
            Err(ProviderError::Api {
                status: 400,
                message: "invalid refresh token".to_string(),
            })
        });
        provider.expect_fetch_file().times(0);

        let result = lister(provider, &fx.stores).list_files(&fx.session).await;
        assert!(matches!(result, Err(FilesError::ReauthRequired)));

        // Not deleted, not corrupted.
        let record = TokenStore::find(&fx.stores, fx.user_id)
            .await
            .unwrap()
            .expect("token record must survive");
        assert_eq!(record.access_token, "figd_old");
        assert_eq!(record.refresh_token, "figr_old");
    }

    #[tokio::test]
    async fn test_listing_serves_live_metadata_in_recency_order() {
        let fx = fixture().await;
        seed_token(&fx, 3600).await;
        seed_cache(&fx, "newer", 10).await;
        seed_cache(&fx, "older", 100).await;

        let mut provider = MockProvider::new();
        provider
            .expect_fetch_file()
            .times(2)
            .returning(|_, key| Ok(provider_file(key)));

        let listing = lister(provider, &fx.stores)
            .list_files(&fx.session)
            .await
            .unwrap();

        assert_eq!(listing.files.len(), 2);
        assert_eq!(listing.files[0].key, "newer");
        assert_eq!(listing.files[0].name, "live newer");
        assert_eq!(listing.files[1].key, "older");
        assert!(listing.message.is_none());
    }

    #[tokio::test]
    async fn test_per_file_failure_degrades_to_cache() {
        let fx = fixture().await;
        seed_token(&fx, 3600).await;
        seed_cache(&fx, "healthy", 10).await;
        seed_cache(&fx, "flaky", 100).await;

        let mut provider = MockProvider::new();
        provider.expect_fetch_file().times(2).returning(|_, key| {
            if key == "flaky" {
                Err(ProviderError::Transport("connection reset".to_string()))
            } else {
                Ok(provider_file(key))
            }
        });

        let listing = lister(provider, &fx.stores)
            .list_files(&fx.session)
            .await
            .unwrap();

        // No error raised; the flaky key is served from cache.
        assert_eq!(listing.files.len(), 2);
        let flaky = listing
            .files
            .iter()
            .find(|f| f.key == "flaky")
            .expect("flaky entry missing");
        assert_eq!(flaky.name, "cached flaky");
        assert_eq!(
            flaky.thumbnail_url,
            Some("https://cdn.example/flaky.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_record_access_creates_cache_entry() {
        let fx = fixture().await;
        seed_token(&fx, 3600).await;

        let mut provider = MockProvider::new();
        provider
            .expect_fetch_file()
            .times(1)
            .returning(|_, key| Ok(provider_file(key)));

        let lister = lister(provider, &fx.stores);
        let summary = lister.record_access(&fx.session, "abc123").await.unwrap();
        assert_eq!(summary.key, "abc123");

        let entry = FileCacheStore::find(&fx.stores, fx.user_id, "abc123")
            .await
            .unwrap()
            .expect("cache entry missing");
        assert_eq!(entry.title, "live abc123");
        assert!(!entry.is_bookmarked);
    }

    #[tokio::test]
    async fn test_record_access_preserves_bookmark() {
        let fx = fixture().await;
        seed_token(&fx, 3600).await;
        seed_cache(&fx, "abc123", 100).await;
        fx.stores
            .set_bookmarked(fx.user_id, "abc123", true)
            .await
            .unwrap();

        let mut provider = MockProvider::new();
        provider
            .expect_fetch_file()
            .times(1)
            .returning(|_, key| Ok(provider_file(key)));

        let lister = lister(provider, &fx.stores);
        let summary = lister.record_access(&fx.session, "abc123").await.unwrap();
        assert!(summary.is_bookmarked);

        let entry = FileCacheStore::find(&fx.stores, fx.user_id, "abc123")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.is_bookmarked);
        assert_eq!(entry.title, "live abc123");
    }

    #[tokio::test]
    async fn test_sign_out_revokes_session_only() {
        let fx = fixture().await;
        seed_token(&fx, 3600).await;

        let lister = lister(MockProvider::new(), &fx.stores);
        lister.sign_out(&fx.session).await.unwrap();

        let result = lister.list_files(&fx.session).await;
        assert!(matches!(result, Err(FilesError::NotAuthenticated)));

        // Provider tokens survive sign-out.
        assert!(TokenStore::find(&fx.stores, fx.user_id)
            .await
            .unwrap()
            .is_some());
    }
}
