//! Unified error type for the copilink workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across copilink crates.
///
/// Soft device-flow outcomes (`pending`, `failed`) are not errors; they are
/// reported through [`crate::PollOutcome`].
#[derive(Debug, Error)]
pub enum CopilotError {
    /// Device-code issuance failed.
    #[error("device code error: {0}")]
    DeviceCode(String),

    /// A device-flow poll round-trip could not be completed.
    #[error("token exchange error: {0}")]
    TokenExchange(String),

    /// The server rejected the presented credentials.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Unexpected failure while retrieving or refreshing the API token.
    #[error("token error: {0}")]
    Token(String),

    /// The upstream API answered with HTTP 429.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Malformed or unexpected payload, or an unsupported status.
    #[error("{0}")]
    Runtime(String),

    /// Generic provider failure (e.g. credential removal).
    #[error("provider error: {0}")]
    Provider(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(String),

    /// Persistent storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "rquest")]
impl From<rquest::Error> for CopilotError {
    fn from(e: rquest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for CopilotError {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl CopilotError {
    /// Returns `true` for failures where the server answered but refused the
    /// credentials, as opposed to infrastructure or protocol failures.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_authentication() {
        let err = CopilotError::Authentication("bad credentials".to_string());
        assert_eq!(err.to_string(), "authentication error: bad credentials");
    }

    #[test]
    fn test_error_display_runtime_is_bare_message() {
        let err = CopilotError::Runtime("GitHub Copilot returned an empty response.".into());
        assert_eq!(err.to_string(), "GitHub Copilot returned an empty response.");
    }

    #[test]
    fn test_error_display_rate_limit() {
        assert_eq!(
            CopilotError::RateLimitExceeded.to_string(),
            "rate limit exceeded"
        );
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid {{{").unwrap_err();
        let err: CopilotError = json_err.into();
        assert!(matches!(err, CopilotError::Serialization(_)));
    }

    #[test]
    fn test_is_authentication() {
        assert!(CopilotError::Authentication("x".into()).is_authentication());
        assert!(!CopilotError::Token("x".into()).is_authentication());
        assert!(!CopilotError::RateLimitExceeded.is_authentication());
    }
}
