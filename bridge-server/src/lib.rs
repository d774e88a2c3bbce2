//! Server-side implementations of the capability seams.
//!
//! - [`ReqwestHttpClient`]: pooled outbound HTTP with per-request
//!   timeouts.
//! - [`SqliteStores`]: all four durable stores over one `sqlx` SQLite
//!   pool, with single-statement upserts.
//! - [`MemoryStores`]: `HashMap`-backed stores for tests and ephemeral
//!   local runs.

pub mod http;
pub mod memory;
pub mod sqlite;

pub use http::ReqwestHttpClient;
pub use memory::MemoryStores;
pub use sqlite::SqliteStores;
