//! Chat-completion client for GitHub Copilot.
//!
//! [`classify`] turns an HTTP status and body into a typed result or error,
//! [`stream`] decodes server-sent events into text fragments and a final
//! batch of tool calls, and [`ChatClient`] ties both to an authenticated
//! request.

pub mod classify;
pub mod client;
pub mod stream;

pub use classify::{ClassifiedResponse, classify_complete, classify_stream};
pub use client::ChatClient;
pub use stream::{ChatStream, SseEvent, ToolCallAccumulator, decode_byte_stream, decode_stream};
