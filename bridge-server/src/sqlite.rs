//! SQLite Store Implementations
//!
//! All four durable stores over a single `sqlx` connection pool. Every
//! mutation the contracts require to be atomic is a single
//! `INSERT ... ON CONFLICT ... DO UPDATE` statement; the stores never
//! read-then-write, so concurrent writers degrade to last-writer-wins
//! instead of interleaved partial records.
//!
//! Timestamps are stored as Unix seconds, ids as UUID text.

use async_trait::async_trait;
use bridge_traits::error::StoreError;
use bridge_traits::stores::{
    CachedFileEntry, CreateUserOutcome, FileCacheStore, Identity, IdentityStore, SessionRecord,
    SessionStore, TokenRecord, TokenStore,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS identities (
    external_id TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id),
    email       TEXT NOT NULL,
    name        TEXT NOT NULL,
    avatar_url  TEXT,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS provider_tokens (
    user_id       TEXT PRIMARY KEY REFERENCES users(id),
    access_token  TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expires_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL REFERENCES users(id),
    issued_at    INTEGER NOT NULL,
    expires_at   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cached_files (
    user_id          TEXT NOT NULL REFERENCES users(id),
    file_key         TEXT NOT NULL,
    title            TEXT NOT NULL,
    thumbnail_url    TEXT,
    file_type        TEXT NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    is_bookmarked    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, file_key)
);

CREATE INDEX IF NOT EXISTS idx_cached_files_recent
    ON cached_files(user_id, last_accessed_at DESC);
"#;

/// SQLite-backed implementation of every store trait.
///
/// One pool serves all stores; clone the `Arc` and coerce to the trait
/// object each consumer needs.
pub struct SqliteStores {
    pool: Pool<Sqlite>,
}

impl SqliteStores {
    /// Open (or create) the database, configure SQLite, and apply the
    /// schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - e.g. `sqlite:/var/lib/pocketcanvas/app.db` or
    ///   `sqlite::memory:` for tests
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!(database_url = %database_url, "Opening SQLite store");

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid database URL: {}", e)))?
            // WAL mode for concurrent readers during writes
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        // An in-memory database exists per connection; a wider pool would
        // hand each query its own empty schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 8 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                StoreError::Unavailable(e.to_string())
            })?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Schema bootstrap failed: {}", e)))?;

        debug!("SQLite schema ready");

        Ok(Self { pool })
    }

    fn parse_uuid(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value).map_err(|e| StoreError::Corrupted(format!("Invalid UUID: {}", e)))
    }

    fn parse_timestamp(secs: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| StoreError::Corrupted(format!("Invalid timestamp: {}", secs)))
    }

    fn query_err(e: sqlx::Error) -> StoreError {
        StoreError::QueryFailed(e.to_string())
    }
}

#[async_trait]
impl IdentityStore for SqliteStores {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(
            "SELECT external_id, user_id, email, name, avatar_url \
             FROM identities WHERE external_id = ?",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id: String = row.try_get("user_id").map_err(Self::query_err)?;
        Ok(Some(Identity {
            user_id: Self::parse_uuid(&user_id)?,
            external_id: row.try_get("external_id").map_err(Self::query_err)?,
            email: row.try_get("email").map_err(Self::query_err)?,
            name: row.try_get("name").map_err(Self::query_err)?,
            avatar_url: row.try_get("avatar_url").map_err(Self::query_err)?,
        }))
    }

    async fn create_user(&self, email: &str) -> Result<CreateUserOutcome> {
        let user_id = Uuid::new_v4();

        // The unique email column closes the create-vs-existing race: the
        // conflict clause makes a lost race visible as zero affected rows.
        let result = sqlx::query(
            "INSERT INTO users (id, email, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(user_id.to_string())
        .bind(email)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(Self::query_err)?;

        if result.rows_affected() == 0 {
            debug!("User creation lost to existing email");
            return Ok(CreateUserOutcome::EmailTaken);
        }

        info!(user_id = %user_id, "Created local user");
        Ok(CreateUserOutcome::Created(user_id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::query_err)?;

        match row {
            Some(row) => {
                let id: String = row.try_get("id").map_err(Self::query_err)?;
                Ok(Some(Self::parse_uuid(&id)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_identity(&self, identity: &Identity) -> Result<()> {
        sqlx::query(
            "INSERT INTO identities (external_id, user_id, email, name, avatar_url, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(external_id) DO UPDATE SET \
                 user_id = excluded.user_id, \
                 email = excluded.email, \
                 name = excluded.name, \
                 avatar_url = excluded.avatar_url, \
                 updated_at = excluded.updated_at",
        )
        .bind(&identity.external_id)
        .bind(identity.user_id.to_string())
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(&identity.avatar_url)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(Self::query_err)?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteStores {
    async fn upsert(&self, record: &TokenRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO provider_tokens (user_id, access_token, refresh_token, expires_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
                 access_token = excluded.access_token, \
                 refresh_token = excluded.refresh_token, \
                 expires_at = excluded.expires_at",
        )
        .bind(record.user_id.to_string())
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(Self::query_err)?;

        debug!(user_id = %record.user_id, "Token record replaced");
        Ok(())
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<TokenRecord>> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, expires_at \
             FROM provider_tokens WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: i64 = row.try_get("expires_at").map_err(Self::query_err)?;
        Ok(Some(TokenRecord {
            user_id,
            access_token: row.try_get("access_token").map_err(Self::query_err)?,
            refresh_token: row.try_get("refresh_token").map_err(Self::query_err)?,
            expires_at: Self::parse_timestamp(expires_at)?,
        }))
    }

    async fn delete(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM provider_tokens WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Self::query_err)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStores {
    async fn insert(&self, record: &SessionRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token_digest, user_id, issued_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.token_digest)
        .bind(record.user_id.to_string())
        .bind(record.issued_at.timestamp())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(Self::query_err)?;

        Ok(())
    }

    async fn find(&self, token_digest: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT user_id, issued_at, expires_at FROM sessions WHERE token_digest = ?",
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_id: String = row.try_get("user_id").map_err(Self::query_err)?;
        let issued_at: i64 = row.try_get("issued_at").map_err(Self::query_err)?;
        let expires_at: i64 = row.try_get("expires_at").map_err(Self::query_err)?;

        Ok(Some(SessionRecord {
            token_digest: token_digest.to_string(),
            user_id: Self::parse_uuid(&user_id)?,
            issued_at: Self::parse_timestamp(issued_at)?,
            expires_at: Self::parse_timestamp(expires_at)?,
        }))
    }

    async fn delete(&self, token_digest: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_digest = ?")
            .bind(token_digest)
            .execute(&self.pool)
            .await
            .map_err(Self::query_err)?;
        Ok(())
    }
}

#[async_trait]
impl FileCacheStore for SqliteStores {
    async fn upsert(&self, entry: &CachedFileEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO cached_files \
                 (user_id, file_key, title, thumbnail_url, file_type, last_accessed_at, is_bookmarked) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id, file_key) DO UPDATE SET \
                 title = excluded.title, \
                 thumbnail_url = excluded.thumbnail_url, \
                 file_type = excluded.file_type, \
                 last_accessed_at = excluded.last_accessed_at, \
                 is_bookmarked = excluded.is_bookmarked",
        )
        .bind(entry.user_id.to_string())
        .bind(&entry.file_key)
        .bind(&entry.title)
        .bind(&entry.thumbnail_url)
        .bind(&entry.file_type)
        .bind(entry.last_accessed_at.timestamp())
        .bind(entry.is_bookmarked as i64)
        .execute(&self.pool)
        .await
        .map_err(Self::query_err)?;

        Ok(())
    }

    async fn list_recent(&self, user_id: Uuid, limit: u32) -> Result<Vec<CachedFileEntry>> {
        let rows = sqlx::query(
            "SELECT file_key, title, thumbnail_url, file_type, last_accessed_at, is_bookmarked \
             FROM cached_files WHERE user_id = ? \
             ORDER BY last_accessed_at DESC LIMIT ?",
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::query_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let last_accessed_at: i64 = row.try_get("last_accessed_at").map_err(Self::query_err)?;
            let is_bookmarked: i64 = row.try_get("is_bookmarked").map_err(Self::query_err)?;
            entries.push(CachedFileEntry {
                user_id,
                file_key: row.try_get("file_key").map_err(Self::query_err)?,
                title: row.try_get("title").map_err(Self::query_err)?,
                thumbnail_url: row.try_get("thumbnail_url").map_err(Self::query_err)?,
                file_type: row.try_get("file_type").map_err(Self::query_err)?,
                last_accessed_at: Self::parse_timestamp(last_accessed_at)?,
                is_bookmarked: is_bookmarked != 0,
            });
        }

        Ok(entries)
    }

    async fn find(&self, user_id: Uuid, file_key: &str) -> Result<Option<CachedFileEntry>> {
        let row = sqlx::query(
            "SELECT title, thumbnail_url, file_type, last_accessed_at, is_bookmarked \
             FROM cached_files WHERE user_id = ? AND file_key = ?",
        )
        .bind(user_id.to_string())
        .bind(file_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let last_accessed_at: i64 = row.try_get("last_accessed_at").map_err(Self::query_err)?;
        let is_bookmarked: i64 = row.try_get("is_bookmarked").map_err(Self::query_err)?;
        Ok(Some(CachedFileEntry {
            user_id,
            file_key: file_key.to_string(),
            title: row.try_get("title").map_err(Self::query_err)?,
            thumbnail_url: row.try_get("thumbnail_url").map_err(Self::query_err)?,
            file_type: row.try_get("file_type").map_err(Self::query_err)?,
            last_accessed_at: Self::parse_timestamp(last_accessed_at)?,
            is_bookmarked: is_bookmarked != 0,
        }))
    }

    async fn set_bookmarked(&self, user_id: Uuid, file_key: &str, bookmarked: bool) -> Result<()> {
        sqlx::query(
            "UPDATE cached_files SET is_bookmarked = ? WHERE user_id = ? AND file_key = ?",
        )
        .bind(bookmarked as i64)
        .bind(user_id.to_string())
        .bind(file_key)
        .execute(&self.pool)
        .await
        .map_err(Self::query_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    async fn open() -> SqliteStores {
        SqliteStores::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory store")
    }

    async fn seed_user(stores: &SqliteStores, email: &str) -> Uuid {
        match stores.create_user(email).await.expect("create_user failed") {
            CreateUserOutcome::Created(id) => id,
            CreateUserOutcome::EmailTaken => panic!("email unexpectedly taken"),
        }
    }

    #[tokio::test]
    async fn test_create_user_unique_email() {
        let stores = open().await;

        let first = stores.create_user("ada@example.com").await.unwrap();
        assert!(matches!(first, CreateUserOutcome::Created(_)));

        let second = stores.create_user("ada@example.com").await.unwrap();
        assert_eq!(second, CreateUserOutcome::EmailTaken);

        let CreateUserOutcome::Created(id) = first else {
            unreachable!()
        };
        let found = stores.find_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(found, Some(id));
    }

    #[tokio::test]
    async fn test_identity_upsert_replaces_by_external_id() {
        let stores = open().await;
        let user_id = seed_user(&stores, "ada@example.com").await;

        let identity = Identity {
            user_id,
            external_id: "fig-123".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            avatar_url: None,
        };
        stores.upsert_identity(&identity).await.unwrap();

        // Second upsert with changed mutable fields keeps a single row.
        let updated = Identity {
            name: "Ada L.".to_string(),
            avatar_url: Some("https://img.example/a.png".to_string()),
            ..identity.clone()
        };
        stores.upsert_identity(&updated).await.unwrap();

        let found = stores
            .find_by_external_id("fig-123")
            .await
            .unwrap()
            .expect("identity missing");
        assert_eq!(found.name, "Ada L.");
        assert_eq!(
            found.avatar_url,
            Some("https://img.example/a.png".to_string())
        );
        assert_eq!(found.user_id, user_id);
    }

    #[tokio::test]
    async fn test_token_upsert_is_wholesale_replace() {
        let stores = open().await;
        let user_id = seed_user(&stores, "ada@example.com").await;

        let now = Utc::now();
        let first = TokenRecord {
            user_id,
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: now + ChronoDuration::seconds(3600),
        };
        TokenStore::upsert(&stores, &first).await.unwrap();

        let second = TokenRecord {
            user_id,
            access_token: "access-2".to_string(),
            refresh_token: "refresh-2".to_string(),
            expires_at: now + ChronoDuration::seconds(7200),
        };
        TokenStore::upsert(&stores, &second).await.unwrap();

        let found = TokenStore::find(&stores, user_id)
            .await
            .unwrap()
            .expect("token record missing");
        assert_eq!(found.access_token, "access-2");
        assert_eq!(found.refresh_token, "refresh-2");
        // Seconds precision is what the store keeps.
        assert_eq!(found.expires_at.timestamp(), second.expires_at.timestamp());
    }

    #[tokio::test]
    async fn test_token_find_missing() {
        let stores = open().await;
        let found = TokenStore::find(&stores, Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_delete() {
        let stores = open().await;
        let user_id = seed_user(&stores, "ada@example.com").await;

        let record = SessionRecord {
            token_digest: "digest-abc".to_string(),
            user_id,
            issued_at: Utc::now(),
            expires_at: Utc::now() + ChronoDuration::days(7),
        };
        SessionStore::insert(&stores, &record).await.unwrap();

        let found = SessionStore::find(&stores, "digest-abc")
            .await
            .unwrap()
            .expect("session missing");
        assert_eq!(found.user_id, user_id);

        SessionStore::delete(&stores, "digest-abc").await.unwrap();
        assert!(SessionStore::find(&stores, "digest-abc")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cached_files_recency_order() {
        let stores = open().await;
        let user_id = seed_user(&stores, "ada@example.com").await;
        let base = Utc::now();

        for (key, offset) in [("older", 0i64), ("newer", 60)] {
            let entry = CachedFileEntry {
                user_id,
                file_key: key.to_string(),
                title: key.to_string(),
                thumbnail_url: None,
                file_type: "figma".to_string(),
                last_accessed_at: base + ChronoDuration::seconds(offset),
                is_bookmarked: false,
            };
            FileCacheStore::upsert(&stores, &entry).await.unwrap();
        }

        let entries = stores.list_recent(user_id, 20).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_key, "newer");
        assert_eq!(entries[1].file_key, "older");
    }

    #[tokio::test]
    async fn test_set_bookmarked() {
        let stores = open().await;
        let user_id = seed_user(&stores, "ada@example.com").await;

        let entry = CachedFileEntry {
            user_id,
            file_key: "file-1".to_string(),
            title: "Mockups".to_string(),
            thumbnail_url: None,
            file_type: "figma".to_string(),
            last_accessed_at: Utc::now(),
            is_bookmarked: false,
        };
        FileCacheStore::upsert(&stores, &entry).await.unwrap();

        stores.set_bookmarked(user_id, "file-1", true).await.unwrap();

        let found = FileCacheStore::find(&stores, user_id, "file-1")
            .await
            .unwrap()
            .expect("entry missing");
        assert!(found.is_bookmarked);

        // Unknown key is a no-op, not an error.
        stores
            .set_bookmarked(user_id, "missing", true)
            .await
            .unwrap();
    }
}
