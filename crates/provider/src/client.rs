//! Authenticated chat-completion requests against GitHub Copilot.

use crate::classify::{ClassifiedResponse, classify_complete, classify_stream};
use crate::stream::ChatStream;
use copilink_auth::DeviceAuthController;
use copilink_config::Config;
use copilink_types::{
    ChatRequest, ChatResult, CopilotError, HttpRequest, HttpTransport, traits::Result,
};
use std::sync::Arc;

const NOT_AUTHENTICATED: &str = "GitHub Copilot is not authenticated. Run authentication first.";

/// Models only served by the responses endpoint.
pub const RESPONSES_ONLY_MODELS: &[&str] = &["gpt-5-codex"];

/// Sends chat completions with a fresh Copilot API token attached.
pub struct ChatClient {
    config: Arc<Config>,
    auth: Arc<DeviceAuthController>,
    http: Arc<dyn HttpTransport>,
}

impl ChatClient {
    pub fn new(
        config: Arc<Config>,
        auth: Arc<DeviceAuthController>,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        Self { config, auth, http }
    }

    /// URL the request for `model` is sent to.
    #[must_use]
    pub fn endpoint_for(&self, model: &str) -> &str {
        if RESPONSES_ONLY_MODELS.contains(&model) {
            &self.config.model_responses_endpoint
        } else {
            &self.config.chat_completions_endpoint
        }
    }

    /// Sends `request`, streaming when `request.stream` is set.
    ///
    /// # Errors
    ///
    /// See [`complete`](Self::complete) and [`stream`](Self::stream).
    pub async fn send(&self, request: ChatRequest) -> Result<ClassifiedResponse> {
        if request.stream {
            self.stream(request).await.map(ClassifiedResponse::Stream)
        } else {
            self.complete(request).await.map(ClassifiedResponse::Complete)
        }
    }

    /// Sends a non-streaming request and classifies the answer.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::Authentication`] when no credential is stored
    /// or the token is rejected, plus any classification or transport error.
    pub async fn complete(&self, request: ChatRequest) -> Result<ChatResult> {
        let http_request = self.build_request(request.streaming(false)).await?;
        let resp = self.http.send(http_request).await?;
        classify_complete(resp.status, &resp.body)
    }

    /// Sends a streaming request and decodes the event stream.
    ///
    /// # Errors
    ///
    /// Same as [`complete`](Self::complete); errors inside the stream are
    /// yielded as items.
    pub async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let http_request = self.build_request(request.streaming(true)).await?;
        let resp = self.http.send_streaming(http_request).await?;
        classify_stream(resp.status, resp.body).await
    }

    async fn build_request(&self, mut request: ChatRequest) -> Result<HttpRequest> {
        let token = self
            .auth
            .get_access_token()
            .await?
            .ok_or_else(|| CopilotError::Authentication(NOT_AUTHENTICATED.into()))?;

        if request.model.is_empty() {
            request.model.clone_from(&self.config.default_model);
        }
        let url = self.endpoint_for(&request.model).to_string();
        let accept = if request.stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        tracing::debug!(model = %request.model, stream = request.stream, %url, "sending chat request");

        Ok(HttpRequest::post(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .header("Accept", accept)
            .header("User-Agent", &self.config.user_agent)
            .header("Editor-Version", &self.config.editor_version)
            .header("Editor-Plugin-Version", &self.config.editor_plugin_version)
            .timeout(self.config.request_timeout())
            .json(request.into_body()))
    }
}
