//! # Capability Seams
//!
//! Trait definitions for everything the PocketCanvas core reaches outside
//! its own process for: outbound HTTP, the design-file host's API, and the
//! durable stores (identities, provider tokens, sessions, cached file
//! metadata).
//!
//! The core crates only ever see these traits behind `Arc<dyn …>`; the
//! `bridge-server` crate supplies the production implementations (reqwest,
//! SQLite) and an in-memory set for tests.

pub mod error;
pub mod http;
pub mod provider;
pub mod stores;

pub use error::{HttpError, StoreError};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use provider::{DesignHost, ProviderError, ProviderFile, ProviderProfile, ProviderTokens};
pub use stores::{
    CachedFileEntry, CreateUserOutcome, FileCacheStore, Identity, IdentityStore, SessionRecord,
    SessionStore, TokenRecord, TokenStore,
};
