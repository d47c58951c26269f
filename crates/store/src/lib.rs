//! Expiring cache and credential persistence.
//!
//! [`TokenCache`] layers TTL semantics over a raw [`CacheBackend`]; an
//! in-memory backend serves tests and a SQLite-backed one serves the CLI.
//! [`CachedCredentialStore`] exposes the cache as a
//! [`CredentialStore`](copilink_types::CredentialStore).

pub mod cache;
pub mod credentials;
pub mod memory;
pub mod sqlite;

pub use cache::{CacheBackend, CacheEntry, TokenCache};
pub use credentials::CachedCredentialStore;
pub use memory::{InMemoryCredentialStore, MemoryCacheBackend};
pub use sqlite::SqliteCacheBackend;
