//! [`CredentialStore`] persisted through a [`TokenCache`].

use crate::cache::TokenCache;
use async_trait::async_trait;
use copilink_types::{CopilotError, CredentialStore, ProviderCredential, traits::Result};

/// Stores each provider's credential under `auth_tokens.<provider>`.
///
/// Records expire with the cache TTL, after which the provider reads as
/// unauthenticated.
pub struct CachedCredentialStore {
    cache: TokenCache<ProviderCredential>,
}

impl CachedCredentialStore {
    #[must_use]
    pub fn new(cache: TokenCache<ProviderCredential>) -> Self {
        Self { cache }
    }

    fn key(provider: &str) -> String {
        format!("auth_tokens.{provider}")
    }
}

#[async_trait]
impl CredentialStore for CachedCredentialStore {
    async fn get_tokens(&self, provider: &str) -> Result<Option<ProviderCredential>> {
        Ok(self.cache.get(&Self::key(provider)).await)
    }

    async fn set_tokens(&self, provider: &str, credential: &ProviderCredential) -> Result<()> {
        self.cache.set(&Self::key(provider), credential).await
    }

    async fn remove_config(&self, provider: &str) -> Result<()> {
        self.cache
            .remove(&Self::key(provider))
            .await
            .map_err(|e| CopilotError::Storage(format!("failed to remove {provider}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheBackend, MemoryCacheBackend, cache::tests::ManualClock};
    use std::sync::Arc;

    fn store(clock: Arc<ManualClock>) -> (Arc<MemoryCacheBackend>, CachedCredentialStore) {
        let backend = Arc::new(MemoryCacheBackend::new());
        let cache = TokenCache::new(backend.clone(), clock, 90);
        (backend, CachedCredentialStore::new(cache))
    }

    #[tokio::test]
    async fn test_round_trip_under_prefixed_key() {
        let (backend, store) = store(ManualClock::at(0));
        let cred = ProviderCredential::oauth("g").with_api_token("tid=1", 99);
        store.set_tokens("copilot", &cred).await.unwrap();

        assert_eq!(store.get_tokens("copilot").await.unwrap(), Some(cred));
        let raw = backend.load("auth_tokens.copilot").await.unwrap().unwrap();
        assert_eq!(raw.value["type"], "oauth");
        assert_eq!(raw.value["access"], "tid=1");
    }

    #[tokio::test]
    async fn test_record_expires_with_cache_ttl() {
        let clock = ManualClock::at(0);
        let (_, store) = store(clock.clone());
        store
            .set_tokens("copilot", &ProviderCredential::oauth("g"))
            .await
            .unwrap();
        clock.advance(90 * 86_400 * 1_000);
        assert!(store.get_tokens("copilot").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_absent_is_ok() {
        let (_, store) = store(ManualClock::at(0));
        store.remove_config("copilot").await.unwrap();
        store.remove_config("copilot").await.unwrap();
    }
}
