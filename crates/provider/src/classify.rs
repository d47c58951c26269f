//! Maps an HTTP status and payload to a typed chat result or error.

use crate::stream::{ChatStream, decode_arguments, decode_byte_stream, normalize_content};
use copilink_types::{
    ByteStream, ChatOutput, ChatResult, CopilotError, ResultMetadata, TokenUsage, ToolCall,
    traits::Result,
};
use futures_util::StreamExt as _;
use serde_json::{Map, Value};

const REJECTED_TOKEN: &str = "GitHub Copilot rejected the provided access token.";
const UNEXPECTED_PAYLOAD: &str = "GitHub Copilot returned an unexpected response payload.";
const EMPTY_RESPONSE: &str = "GitHub Copilot returned an empty response.";

/// A classified successful response.
pub enum ClassifiedResponse {
    Complete(ChatResult),
    Stream(ChatStream),
}

impl std::fmt::Debug for ClassifiedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(result) => f.debug_tuple("Complete").field(result).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The error for a non-2xx `status`, with the message taken from `body`
/// when it carries one.
#[must_use]
pub fn status_error(status: u16, body: &[u8]) -> CopilotError {
    let message = extract_error_message(body);
    match status {
        401 => CopilotError::Authentication(message.unwrap_or_else(|| REJECTED_TOKEN.to_string())),
        429 => CopilotError::RateLimitExceeded,
        _ => CopilotError::Runtime(message.unwrap_or_else(|| {
            format!("Unexpected response status {status} from GitHub Copilot.")
        })),
    }
}

/// Error message from `error.message`, `message`, or a string `error`.
#[must_use]
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;
    [
        json.pointer("/error/message"),
        json.get("message"),
        json.get("error"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .map(str::trim)
    .find(|m| !m.is_empty())
    .map(str::to_string)
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Classify a buffered response.
///
/// # Errors
///
/// - [`CopilotError::Authentication`] on 401
/// - [`CopilotError::RateLimitExceeded`] on 429
/// - [`CopilotError::Runtime`] on any other failure status, a malformed
///   payload, or an empty answer
pub fn classify_complete(status: u16, body: &[u8]) -> Result<ChatResult> {
    if !is_success(status) {
        return Err(status_error(status, body));
    }
    let json: Value =
        serde_json::from_slice(body).map_err(|_| CopilotError::Runtime(UNEXPECTED_PAYLOAD.into()))?;
    classify_payload(&json)
}

/// Classify a decoded completion payload.
///
/// # Errors
///
/// Returns [`CopilotError::Runtime`] when `choices` is missing, empty, or a
/// choice has neither tool calls nor content.
pub fn classify_payload(json: &Value) -> Result<ChatResult> {
    let choices = json
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| CopilotError::Runtime(UNEXPECTED_PAYLOAD.into()))?;
    if choices.is_empty() {
        return Err(CopilotError::Runtime(EMPTY_RESPONSE.into()));
    }

    let mut outputs = choices
        .iter()
        .map(convert_choice)
        .collect::<Result<Vec<_>>>()?;
    let output = if outputs.len() == 1 {
        outputs.remove(0)
    } else {
        ChatOutput::Choices(outputs)
    };

    Ok(ChatResult {
        output,
        metadata: metadata(json),
    })
}

/// Classify a streaming response. Error bodies are read in full for their
/// message.
///
/// # Errors
///
/// Same status mapping as [`classify_complete`].
pub async fn classify_stream(status: u16, mut body: ByteStream) -> Result<ChatStream> {
    if is_success(status) {
        return Ok(decode_byte_stream(body));
    }
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => buf.extend_from_slice(&bytes),
            Err(e) => {
                tracing::debug!(error = %e, "error body truncated");
                break;
            }
        }
    }
    Err(status_error(status, &buf))
}

fn convert_choice(choice: &Value) -> Result<ChatOutput> {
    let message = choice.get("message");
    if let Some(calls) = message
        .and_then(|m| m.get("tool_calls"))
        .and_then(Value::as_array)
        .filter(|calls| !calls.is_empty())
    {
        return calls
            .iter()
            .map(convert_tool_call)
            .collect::<Result<Vec<_>>>()
            .map(ChatOutput::ToolCalls);
    }

    let text = message
        .and_then(|m| m.get("content"))
        .and_then(normalize_content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(CopilotError::Runtime(EMPTY_RESPONSE.into()));
    }
    Ok(ChatOutput::Text(text))
}

fn convert_tool_call(call: &Value) -> Result<ToolCall> {
    let function = call.get("function");
    let arguments = match function.and_then(|f| f.get("arguments")) {
        Some(Value::String(raw)) => decode_arguments(raw)?,
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    Ok(ToolCall {
        id: call
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: function
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        arguments,
    })
}

fn metadata(json: &Value) -> ResultMetadata {
    let string = |key: &str| json.get(key).and_then(Value::as_str).map(str::to_string);
    ResultMetadata {
        token_usage: json.get("usage").and_then(token_usage),
        response_id: string("id"),
        model: string("model"),
    }
}

/// Extract token counters from a `usage` object, accepting alternative key
/// spellings. `None` when no counter is present.
#[must_use]
pub fn token_usage(usage: &Value) -> Option<TokenUsage> {
    let counter = |keys: &[&str]| keys.iter().find_map(|k| counter_value(usage.get(*k)?));
    let parsed = TokenUsage {
        prompt_tokens: counter(&["prompt_tokens", "input_tokens", "promptTokens"]),
        completion_tokens: counter(&["completion_tokens", "output_tokens", "completionTokens"]),
        thinking_tokens: counter(&["reasoning_tokens", "thinking_tokens"]),
        tool_tokens: counter(&["tool_tokens", "tool_calls_tokens"]),
        cached_tokens: counter(&["cached_tokens", "cache_tokens"]),
        remaining_tokens: counter(&["remaining_tokens"]),
        remaining_tokens_minute: counter(&["remaining_tokens_minute"]),
        remaining_tokens_month: counter(&["remaining_tokens_month"]),
        total_tokens: counter(&["total_tokens", "totalTokens"]),
    };
    (!parsed.is_empty()).then_some(parsed)
}

/// A numeric counter or numeric string, truncated toward zero. Negative
/// values clamp to 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn counter_value(value: &Value) -> Option<u64> {
    let (exact, float) = match value {
        Value::Number(n) => (n.as_u64(), n.as_f64()),
        Value::String(s) => {
            let s = s.trim();
            (s.parse().ok(), s.parse::<f64>().ok())
        }
        _ => return None,
    };
    exact.or_else(|| {
        let f = float.filter(|f| f.is_finite())?;
        Some(f.trunc().max(0.0) as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use copilink_types::StreamItem;
    use futures_util::{TryStreamExt as _, stream};
    use serde_json::json;

    fn body(v: &Value) -> Vec<u8> {
        v.to_string().into_bytes()
    }

    #[test]
    fn test_401_with_and_without_message() {
        let err = classify_complete(401, &body(&json!({"error": {"message": "token expired"}})))
            .unwrap_err();
        assert!(matches!(&err, CopilotError::Authentication(m) if m == "token expired"));

        let err = classify_complete(401, b"").unwrap_err();
        assert!(matches!(&err, CopilotError::Authentication(m) if m == REJECTED_TOKEN));
    }

    #[test]
    fn test_429_is_rate_limit() {
        let err = classify_complete(429, &body(&json!({"message": "slow down"}))).unwrap_err();
        assert!(matches!(err, CopilotError::RateLimitExceeded));
    }

    #[test]
    fn test_other_error_statuses() {
        let err = classify_complete(500, b"oops").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected response status 500 from GitHub Copilot."
        );
        let err = classify_complete(400, &body(&json!({"message": "bad model"}))).unwrap_err();
        assert_eq!(err.to_string(), "bad model");
        let err = classify_complete(403, &body(&json!({"error": "forbidden"}))).unwrap_err();
        assert_eq!(err.to_string(), "forbidden");
    }

    #[test]
    fn test_non_2xx_below_400_is_not_parsed() {
        let payload = body(&json!({"choices": [{"message": {"content": "hi"}}]}));
        let err = classify_complete(304, &payload).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected response status 304 from GitHub Copilot."
        );
        assert!(classify_complete(204, &payload).is_ok());
    }

    #[test]
    fn test_empty_choices() {
        let err = classify_complete(200, &body(&json!({"choices": []}))).unwrap_err();
        assert_eq!(err.to_string(), EMPTY_RESPONSE);
    }

    #[test]
    fn test_missing_choices_or_invalid_json() {
        let err = classify_complete(200, &body(&json!({"object": "x"}))).unwrap_err();
        assert_eq!(err.to_string(), UNEXPECTED_PAYLOAD);
        let err = classify_complete(200, b"<html>").unwrap_err();
        assert_eq!(err.to_string(), UNEXPECTED_PAYLOAD);
    }

    #[test]
    fn test_text_result_trimmed() {
        let r = classify_complete(
            200,
            &body(&json!({"choices": [{"message": {"role": "assistant", "content": "  hi there \n"}}]})),
        )
        .unwrap();
        assert_eq!(r.as_text(), Some("hi there"));
        assert_eq!(r.metadata, ResultMetadata::default());
    }

    #[test]
    fn test_blank_content_is_empty_response() {
        let err = classify_complete(200, &body(&json!({"choices": [{"message": {"content": "   "}}]})))
            .unwrap_err();
        assert_eq!(err.to_string(), EMPTY_RESPONSE);
    }

    #[test]
    fn test_content_parts() {
        let r = classify_complete(
            200,
            &body(&json!({"choices": [{"message": {"content": [
                {"type": "text", "text": "one"},
                {"type": "image_url"},
                {"type": "text", "text": "two"}
            ]}}]})),
        )
        .unwrap();
        assert_eq!(r.as_text(), Some("one\ntwo"));
    }

    #[test]
    fn test_tool_calls_result() {
        let r = classify_complete(
            200,
            &body(&json!({"choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}},
                {"id": "call_2", "type": "function", "function": {"name": "noop", "arguments": ""}}
            ]}}]})),
        )
        .unwrap();
        let ChatOutput::ToolCalls(calls) = r.output else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments["city"], "Paris");
        assert!(calls[1].arguments.is_empty());
    }

    #[test]
    fn test_malformed_tool_arguments() {
        let err = classify_complete(
            200,
            &body(&json!({"choices": [{"message": {"tool_calls": [
                {"id": "c", "function": {"name": "f", "arguments": "{"}}
            ]}}]})),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Failed to decode GitHub Copilot tool call arguments.");
    }

    #[test]
    fn test_multiple_choices_preserve_order() {
        let r = classify_complete(
            200,
            &body(&json!({"choices": [
                {"message": {"content": "first"}},
                {"message": {"tool_calls": [{"id": "c", "function": {"name": "f", "arguments": {"x": 1}}}]}},
                {"message": {"content": "third"}}
            ]})),
        )
        .unwrap();
        let ChatOutput::Choices(choices) = r.output else {
            panic!("expected several choices");
        };
        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0], ChatOutput::Text("first".into()));
        assert!(matches!(&choices[1], ChatOutput::ToolCalls(c) if c[0].arguments["x"] == 1));
        assert_eq!(choices[2], ChatOutput::Text("third".into()));
    }

    #[test]
    fn test_metadata() {
        let r = classify_complete(
            200,
            &body(&json!({
                "id": "chatcmpl-1",
                "model": "gpt-5-mini",
                "choices": [{"message": {"content": "ok"}}],
                "usage": {"input_tokens": 12, "completionTokens": "7", "totalTokens": 19, "reasoning_tokens": 2}
            })),
        )
        .unwrap();
        assert_eq!(r.metadata.response_id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(r.metadata.model.as_deref(), Some("gpt-5-mini"));
        let usage = r.metadata.token_usage.unwrap();
        assert_eq!(usage.prompt_tokens, Some(12));
        assert_eq!(usage.completion_tokens, Some(7));
        assert_eq!(usage.thinking_tokens, Some(2));
        assert_eq!(usage.total_tokens, Some(19));
        assert_eq!(usage.cached_tokens, None);
    }

    #[test]
    fn test_usage_without_counters_is_dropped() {
        assert!(token_usage(&json!({"foo": 1, "prompt_tokens": "many"})).is_none());
        assert!(token_usage(&json!({"cache_tokens": 4})).is_some());
    }

    #[test]
    fn test_usage_float_and_negative_counters() {
        let usage = token_usage(&json!({
            "prompt_tokens": 12.0,
            "completion_tokens": "12.5",
            "total_tokens": 24.9,
            "remaining_tokens": -3,
            "cached_tokens": "NaN"
        }))
        .unwrap();
        assert_eq!(usage.prompt_tokens, Some(12));
        assert_eq!(usage.completion_tokens, Some(12));
        assert_eq!(usage.total_tokens, Some(24));
        assert_eq!(usage.remaining_tokens, Some(0));
        assert_eq!(usage.cached_tokens, None);
    }

    #[tokio::test]
    async fn test_stream_error_status_reads_body() {
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(
            br#"{"error":{"message":"quota exceeded for model"}}"#,
        ))];
        let err = classify_stream(402, Box::pin(stream::iter(chunks)))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "quota exceeded for model");

        let err = classify_stream(401, Box::pin(stream::iter(Vec::<Result<Bytes>>::new())))
            .await
            .err()
            .unwrap();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_stream_success_is_decoded() {
        let chunks: Vec<Result<Bytes>> = vec![Ok(Bytes::from(
            "data: {\"choices\":[{\"delta\":{\"content\":\"yo\"}}]}\n\ndata: [DONE]\n\n",
        ))];
        let s = classify_stream(200, Box::pin(stream::iter(chunks))).await.unwrap();
        let items: Vec<StreamItem> = s.try_collect().await.unwrap();
        assert_eq!(items, vec![StreamItem::Text("yo".into())]);
    }
}
