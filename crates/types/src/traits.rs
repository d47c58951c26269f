//! Collaborator traits shared across all copilink crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `copilink-types`, not on each other.

use crate::{CopilotError, HttpRequest, HttpResponse, ProviderCredential, StreamingResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::{
    pin::Pin,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CopilotError>;

/// A pinned, sendable stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Durable key-value persistence of [`ProviderCredential`]s, keyed by
/// provider name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the credential for `provider`, if any.
    async fn get_tokens(&self, provider: &str) -> Result<Option<ProviderCredential>>;
    /// Persist (replace) the credential for `provider`.
    async fn set_tokens(&self, provider: &str, credential: &ProviderCredential) -> Result<()>;
    /// Remove everything stored for `provider`. Removing an absent provider
    /// is not an error.
    async fn remove_config(&self, provider: &str) -> Result<()>;
}

/// Performs HTTP round-trips.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and buffer the full response body.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
    /// Send a request and hand back the body as a byte stream.
    async fn send_streaming(&self, request: HttpRequest) -> Result<StreamingResponse>;
}

/// Wall-clock source used for expiry comparisons.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
