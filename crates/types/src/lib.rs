//! Core types and traits for the copilink workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! Copilot client, including the error taxonomy, the persisted credential
//! shape, device-flow outcomes, chat results, and the collaborator traits
//! (credential persistence, HTTP transport, clock) that higher layers inject.

pub mod chat;
pub mod credential;
pub mod error;
pub mod http;
pub mod traits;

pub use chat::{ChatOutput, ChatRequest, ChatResult, ResultMetadata, StreamItem, TokenUsage, ToolCall};
pub use credential::{
    AuthState, COPILOT_PROVIDER, CredentialState, DeviceAuthorization, PollOutcome,
    ProviderCredential,
};
pub use error::CopilotError;
pub use http::{HttpRequest, HttpResponse, Method, StreamingResponse};
pub use traits::{ByteStream, Clock, CredentialStore, HttpTransport, SystemClock};
