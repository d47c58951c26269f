//! Chat-completion request and result types.
//!
//! The request keeps common fields typed and captures everything else in a
//! catch-all map. Results are provider-neutral: text, a batch of tool calls,
//! or several choices, each carrying optional response metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An OpenAI-compatible chat completion request body.
///
/// Fields other than `model`, `stream` and `messages` (e.g. `temperature`,
/// `tools`) are captured in [`extra`](Self::extra).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(default)]
    pub stream: bool,
    pub messages: Vec<Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatRequest {
    /// A request carrying a single user message.
    pub fn user(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            stream: false,
            messages: vec![serde_json::json!({"role": "user", "content": prompt.into()})],
            extra: HashMap::new(),
        }
    }

    #[must_use]
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Reconstructs the full request body as a `serde_json::Value`.
    #[must_use]
    pub fn into_body(self) -> Value {
        let mut map = Map::with_capacity(self.extra.len() + 3);
        for (k, v) in self.extra {
            map.insert(k, v);
        }
        map.insert("model".into(), Value::String(self.model));
        map.insert("stream".into(), Value::Bool(self.stream));
        map.insert("messages".into(), Value::Array(self.messages));
        Value::Object(map)
    }
}

/// A structured function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Decoded JSON argument object.
    pub arguments: Map<String, Value>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub thinking_tokens: Option<u64>,
    pub tool_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub remaining_tokens: Option<u64>,
    pub remaining_tokens_minute: Option<u64>,
    pub remaining_tokens_month: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// `true` when no counter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            self.prompt_tokens,
            self.completion_tokens,
            self.thinking_tokens,
            self.tool_tokens,
            self.cached_tokens,
            self.remaining_tokens,
            self.remaining_tokens_minute,
            self.remaining_tokens_month,
            self.total_tokens,
        ]
        .iter()
        .all(Option::is_none)
    }
}

/// Optional metadata attached to a [`ChatResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The payload of a completed (non-streamed) response.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutput {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    /// Several choices, in response order.
    Choices(Vec<ChatOutput>),
}

/// A classified chat-completion response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResult {
    pub output: ChatOutput,
    pub metadata: ResultMetadata,
}

impl ChatResult {
    #[must_use]
    pub fn new(output: ChatOutput) -> Self {
        Self {
            output,
            metadata: ResultMetadata::default(),
        }
    }

    /// The text content, if this is a single text result.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.output {
            ChatOutput::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One item of a decoded response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A content fragment, in arrival order.
    Text(String),
    /// The assembled tool calls; always the last item of a stream.
    ToolCalls(Vec<ToolCall>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal() {
        let v = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}]
        });
        let req: ChatRequest = serde_json::from_value(v).unwrap();
        assert_eq!(req.model, "gpt-4o");
        assert!(!req.stream);
        assert!(req.extra.is_empty());
    }

    #[test]
    fn test_extra_fields_preserved_in_body() {
        let v = json!({
            "model": "m",
            "messages": [],
            "temperature": 1.0,
            "tools": [{"type": "function"}]
        });
        let req: ChatRequest = serde_json::from_value(v).unwrap();
        let body = req.streaming(true).into_body();
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn test_user_request() {
        let body = ChatRequest::user("gpt-5-mini", "hello").into_body();
        assert_eq!(body["model"], "gpt-5-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_token_usage_is_empty() {
        assert!(TokenUsage::default().is_empty());
        let u = TokenUsage {
            total_tokens: Some(3),
            ..TokenUsage::default()
        };
        assert!(!u.is_empty());
    }

    #[test]
    fn test_as_text() {
        assert_eq!(ChatResult::new(ChatOutput::Text("a".into())).as_text(), Some("a"));
        assert!(
            ChatResult::new(ChatOutput::ToolCalls(Vec::new()))
                .as_text()
                .is_none()
        );
    }
}
