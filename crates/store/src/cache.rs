//! Generic expiring key-value cache.
//!
//! Writes delete any prior entry before storing the new one. Reads are total:
//! backend faults, undecodable payloads and expired entries all read as a miss.

use async_trait::async_trait;
use copilink_types::{Clock, CopilotError, traits::Result};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{marker::PhantomData, sync::Arc};

const MILLIS_PER_DAY: u64 = 86_400 * 1_000;

/// A raw cache record as held by a [`CacheBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    /// Expiry in epoch milliseconds.
    pub expires_at_millis: u64,
}

impl CacheEntry {
    #[must_use]
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at_millis <= now_millis
    }
}

/// Storage of raw [`CacheEntry`] records. Expiry is the cache's concern.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn store(&self, entry: CacheEntry) -> Result<()>;
    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Typed, expiring view over a [`CacheBackend`].
pub struct TokenCache<V> {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    ttl_millis: u64,
    _value: PhantomData<fn() -> V>,
}

impl<V> TokenCache<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Creates a cache whose entries live for `entry_ttl_days`.
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        clock: Arc<dyn Clock>,
        entry_ttl_days: u32,
    ) -> Self {
        Self {
            backend,
            clock,
            ttl_millis: u64::from(entry_ttl_days).saturating_mul(MILLIS_PER_DAY),
            _value: PhantomData,
        }
    }

    /// Replaces the entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::Storage`] if the value cannot be encoded or the
    /// backend rejects the write.
    pub async fn set(&self, key: &str, value: &V) -> Result<()> {
        self.backend.delete(key).await?;
        let value = serde_json::to_value(value).map_err(|e| CopilotError::Storage(e.to_string()))?;
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            expires_at_millis: self.clock.now_millis().saturating_add(self.ttl_millis),
        };
        self.backend.store(entry).await
    }

    /// Returns the live value for `key`, or `None`.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entry = match self.backend.load(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(key, error = %e, "cache read failed; treating as miss");
                return None;
            }
        };
        if entry.is_expired(self.clock.now_millis()) {
            return None;
        }
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "cache entry undecodable; treating as miss");
                None
            }
        }
    }

    /// Deletes the entry for `key`, if any.
    ///
    /// # Errors
    ///
    /// Propagates backend delete failures.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }
}
