//! In-memory backends backed by a `HashMap` behind a `Mutex`.

use crate::cache::{CacheBackend, CacheEntry};
use async_trait::async_trait;
use copilink_types::{CopilotError, CredentialStore, ProviderCredential, traits::Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| CopilotError::Storage("in-memory store lock poisoned".into()))
}

/// An in-memory [`CacheBackend`] for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        lock(&self.entries)?.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }
}

/// An in-memory [`CredentialStore`] without expiry.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    /// Provider-keyed credential map.
    data: Mutex<HashMap<String, ProviderCredential>>,
}

impl InMemoryCredentialStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_tokens(&self, provider: &str) -> Result<Option<ProviderCredential>> {
        Ok(lock(&self.data)?.get(provider).cloned())
    }

    async fn set_tokens(&self, provider: &str, credential: &ProviderCredential) -> Result<()> {
        lock(&self.data)?.insert(provider.to_string(), credential.clone());
        Ok(())
    }

    async fn remove_config(&self, provider: &str) -> Result<()> {
        lock(&self.data)?.remove(provider);
        Ok(())
    }
}
