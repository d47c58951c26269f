//! Device authorization controller.
//!
//! Each method performs at most one HTTP round-trip; retrying and pacing are
//! left to the caller (see [`crate::flow::login`]).

use crate::copilot::{self, PollPayload};
use copilink_config::Config;
use copilink_types::{
    COPILOT_PROVIDER, Clock, CopilotError, CredentialStore, DeviceAuthorization, HttpRequest,
    HttpTransport, PollOutcome, ProviderCredential, traits::Result,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Drives the GitHub device flow and keeps the Copilot API token fresh.
pub struct DeviceAuthController {
    provider: String,
    config: Arc<Config>,
    http: Arc<dyn HttpTransport>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    /// Serialises API-token refreshes.
    refresh_lock: Mutex<()>,
}

impl DeviceAuthController {
    pub fn new(
        config: Arc<Config>,
        http: Arc<dyn HttpTransport>,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider: COPILOT_PROVIDER.to_string(),
            config,
            http,
            store,
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Store credentials under a provider name other than `copilot`.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Requests a device code and user code.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::DeviceCode`] on transport failure, a non-2xx
    /// status, or an incomplete payload.
    pub async fn authorize(&self) -> Result<DeviceAuthorization> {
        let request = HttpRequest::post(&self.config.device_code_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.config.user_agent)
            .json(copilot::device_code_body(&self.config.client_id));

        let result = async {
            let resp = self.http.send(request).await?;
            if !resp.is_success() {
                return Err(CopilotError::DeviceCode(format!(
                    "device code endpoint returned status {}",
                    resp.status
                )));
            }
            copilot::parse_device_authorization(&resp.json_body()?)
        }
        .await;

        result.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "device code request failed");
            match e {
                CopilotError::DeviceCode(_) => e,
                other => CopilotError::DeviceCode(other.to_string()),
            }
        })
    }

    /// Polls the access-token endpoint once.
    ///
    /// On success the long-lived grant is persisted with an empty API token.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::TokenExchange`] when the round-trip cannot be
    /// completed, the body is not JSON, or the grant cannot be persisted.
    pub async fn poll(&self, device_code: &str) -> Result<PollOutcome> {
        let request = HttpRequest::post(&self.config.access_token_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.config.user_agent)
            .json(copilot::poll_body(&self.config.client_id, device_code));

        let resp = self.http.send(request).await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "device flow poll failed");
            CopilotError::TokenExchange(e.to_string())
        })?;

        if resp.status != 200 {
            tracing::warn!(provider = %self.provider, status = resp.status, "device flow poll rejected");
            return Ok(PollOutcome::Failed);
        }

        let json = resp
            .json_body()
            .map_err(|e| CopilotError::TokenExchange(e.to_string()))?;

        match copilot::classify_poll_payload(&json) {
            PollPayload::Granted(grant) => {
                self.store
                    .set_tokens(&self.provider, &ProviderCredential::oauth(grant))
                    .await
                    .map_err(|e| CopilotError::TokenExchange(e.to_string()))?;
                tracing::info!(provider = %self.provider, "device authorization complete");
                Ok(PollOutcome::Complete)
            }
            PollPayload::Pending => Ok(PollOutcome::Pending),
            PollPayload::SlowDown => Ok(PollOutcome::SlowDown),
            PollPayload::Rejected(code) => {
                tracing::warn!(provider = %self.provider, error = %code, "device authorization failed");
                Ok(PollOutcome::Failed)
            }
            PollPayload::Unrecognised => {
                let keys: Vec<&str> = json
                    .as_object()
                    .map(|o| o.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                tracing::warn!(provider = %self.provider, ?keys, "unrecognised poll response; treating as pending");
                Ok(PollOutcome::Pending)
            }
        }
    }

    /// Returns a valid Copilot API token, exchanging the grant if needed.
    ///
    /// `Ok(None)` means no credential is stored. Concurrent callers share a
    /// single exchange.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::Authentication`] if the exchange endpoint
    /// refuses the grant, and [`CopilotError::Token`] for any other failure.
    pub async fn get_access_token(&self) -> Result<Option<String>> {
        let Some(credential) = self.load_credential().await? else {
            return Ok(None);
        };
        if let Some(token) = credential.cached_api_token(self.clock.now_millis()) {
            return Ok(Some(token.to_string()));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let Some(credential) = self.load_credential().await? else {
            return Ok(None);
        };
        if let Some(token) = credential.cached_api_token(self.clock.now_millis()) {
            return Ok(Some(token.to_string()));
        }

        self.refresh(credential).await.map(Some).inspect_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "API token refresh failed");
        })
    }

    async fn load_credential(&self) -> Result<Option<ProviderCredential>> {
        self.store
            .get_tokens(&self.provider)
            .await
            .map_err(|e| CopilotError::Token(e.to_string()))
    }

    async fn refresh(&self, credential: ProviderCredential) -> Result<String> {
        let request = HttpRequest::get(&self.config.api_key_url)
            .header(
                "Authorization",
                format!("Bearer {}", credential.long_lived_grant()),
            )
            .header("Accept", "application/json")
            .header("User-Agent", &self.config.user_agent)
            .header("Editor-Version", &self.config.editor_version)
            .header("Editor-Plugin-Version", &self.config.editor_plugin_version);

        let resp = self
            .http
            .send(request)
            .await
            .map_err(|e| CopilotError::Token(e.to_string()))?;
        if !resp.is_success() {
            return Err(CopilotError::Authentication(format!(
                "Copilot token exchange returned status {}",
                resp.status
            )));
        }

        let json = resp
            .json_body()
            .map_err(|e| CopilotError::Token(e.to_string()))?;
        let api_token = copilot::parse_api_token(&json)?;
        let updated = credential.with_api_token(api_token.token.clone(), api_token.expiry_millis());
        self.store
            .set_tokens(&self.provider, &updated)
            .await
            .map_err(|e| CopilotError::Token(e.to_string()))?;
        tracing::debug!(provider = %self.provider, expires_at = api_token.expires_at_secs, "API token refreshed");
        Ok(api_token.token)
    }

    /// Deletes the stored credential. Removing an absent credential succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::Provider`] if the store fails.
    pub async fn remove_tokens(&self) -> Result<()> {
        self.store.remove_config(&self.provider).await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "failed to remove credentials");
            CopilotError::Provider(e.to_string())
        })
    }

    /// Whether a grant is stored. Does not touch the network.
    pub async fn is_authenticated(&self) -> bool {
        match self.store.get_tokens(&self.provider).await {
            Ok(credential) => credential.is_some(),
            Err(e) => {
                tracing::warn!(provider = %self.provider, error = %e, "credential lookup failed");
                false
            }
        }
    }
}
