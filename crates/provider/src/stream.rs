//! Server-sent event decoding for streamed chat completions.
//!
//! Text deltas are emitted as they arrive. Tool-call deltas are merged per
//! index and released as one [`StreamItem::ToolCalls`] batch when the stream
//! ends, either at `[DONE]` or when the transport closes.

use copilink_types::{ByteStream, CopilotError, StreamItem, ToolCall, traits::Result};
use eventsource_stream::{EventStreamError, Eventsource as _};
use futures_core::Stream;
use futures_util::{StreamExt as _, stream::try_unfold};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, pin::Pin};

/// Sentinel data payload that terminates a stream.
pub const STREAM_FINISH_MESSAGE: &str = "[DONE]";

pub(crate) const TOOL_ARGUMENTS_ERROR: &str = "Failed to decode GitHub Copilot tool call arguments.";

/// A decoded chat-completion stream.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamItem>> + Send>>;

type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent>> + Send>>;

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: "message".to_string(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles streamed tool-call fragments, ordered by index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PendingToolCall>,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Merge one `delta.tool_calls` array.
    ///
    /// An entry with an `id` starts (or restarts) the call at its index; an
    /// entry without one appends to the arguments of an existing call.
    pub fn merge(&mut self, deltas: &[Value]) {
        for (position, delta) in deltas.iter().enumerate() {
            let index = delta
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|i| u32::try_from(i).ok())
                .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
            let function = delta.get("function");
            let arguments = function
                .and_then(|f| f.get("arguments"))
                .and_then(Value::as_str)
                .unwrap_or("");

            if let Some(id) = delta.get("id").and_then(Value::as_str) {
                let name = function
                    .and_then(|f| f.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                self.calls.insert(
                    index,
                    PendingToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments: arguments.to_string(),
                    },
                );
            } else if let Some(call) = self.calls.get_mut(&index) {
                call.arguments.push_str(arguments);
            } else {
                tracing::debug!(index, "dropping tool call fragment for unknown index");
            }
        }
    }

    /// Parse the accumulated arguments, in index order.
    ///
    /// # Errors
    ///
    /// Returns [`CopilotError::Runtime`] if any argument buffer is malformed JSON.
    pub fn finish(self) -> Result<Vec<ToolCall>> {
        self.calls
            .into_values()
            .map(|call| {
                Ok(ToolCall {
                    arguments: decode_arguments(&call.arguments)?,
                    id: call.id,
                    name: call.name,
                })
            })
            .collect()
    }
}

/// Decode a tool-call argument string. Blank or non-object JSON yields an
/// empty object.
pub(crate) fn decode_arguments(raw: &str) -> Result<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => {
            tracing::debug!(error = %e, "malformed tool call arguments");
            Err(CopilotError::Runtime(TOOL_ARGUMENTS_ERROR.into()))
        }
    }
}

/// Message content as text: a string, or the `text` of each part joined by
/// newlines and trimmed.
pub(crate) fn normalize_content(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            Some(texts.join("\n").trim().to_string())
        }
        _ => None,
    }
}

/// Decode a stream of SSE events into [`StreamItem`]s.
pub fn decode_stream<S>(events: S) -> ChatStream
where
    S: Stream<Item = Result<SseEvent>> + Send + 'static,
{
    struct State {
        events: EventStream,
        tool_calls: ToolCallAccumulator,
        done: bool,
    }

    fn flush(mut s: State) -> Result<Option<(StreamItem, State)>> {
        s.done = true;
        if s.tool_calls.is_empty() {
            return Ok(None);
        }
        let calls = std::mem::take(&mut s.tool_calls).finish()?;
        Ok(Some((StreamItem::ToolCalls(calls), s)))
    }

    Box::pin(try_unfold(
        State {
            events: Box::pin(events),
            tool_calls: ToolCallAccumulator::new(),
            done: false,
        },
        |mut s| async move {
            if s.done {
                return Ok(None);
            }
            loop {
                let Some(event) = s.events.next().await.transpose()? else {
                    return flush(s);
                };
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == STREAM_FINISH_MESSAGE {
                    return flush(s);
                }

                let chunk: Value = serde_json::from_str(data).map_err(|e| {
                    CopilotError::Runtime(format!("Malformed stream chunk from GitHub Copilot: {e}"))
                })?;
                let Some(delta) = chunk.pointer("/choices/0/delta") else {
                    continue;
                };
                if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
                    s.tool_calls.merge(calls);
                }
                if let Some(text) = delta.get("content").and_then(normalize_content)
                    && !text.is_empty()
                {
                    return Ok(Some((StreamItem::Text(text), s)));
                }
            }
        },
    ))
}

/// Decode a raw SSE response body.
pub fn decode_byte_stream(body: ByteStream) -> ChatStream {
    let events = body.eventsource().map(|r| match r {
        Ok(ev) => Ok(SseEvent {
            event: ev.event,
            data: ev.data,
        }),
        Err(EventStreamError::Transport(e)) => Err(e),
        Err(e) => Err(CopilotError::Runtime(format!("malformed event stream: {e}"))),
    });
    decode_stream(events)
}
