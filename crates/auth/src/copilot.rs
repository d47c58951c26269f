//! GitHub Copilot device code authorization flow.
//!
//! Implements the OAuth 2.0 Device Authorization Grant used by GitHub Copilot,
//! followed by the exchange of the resulting grant for a short-lived Copilot
//! API token. No local callback port is needed.

use copilink_types::{CopilotError, DeviceAuthorization, traits::Result};
use serde_json::{Value, json};

/// OAuth scopes requested during authorization.
pub const SCOPES: &[&str] = &["read:user"];

/// Grant type sent when polling the access-token endpoint.
pub const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Used when the device-code response omits `verification_uri`.
pub const DEFAULT_VERIFICATION_URI: &str = "https://github.com/login/device";

const DEFAULT_INTERVAL_SECS: u64 = 5;
const DEFAULT_EXPIRES_IN_SECS: u64 = 900;

/// Body of the device-code request.
#[must_use]
pub fn device_code_body(client_id: &str) -> Value {
    json!({
        "client_id": client_id,
        "scope": SCOPES.join(" "),
    })
}

/// Body of one access-token poll.
#[must_use]
pub fn poll_body(client_id: &str, device_code: &str) -> Value {
    json!({
        "client_id": client_id,
        "device_code": device_code,
        "grant_type": DEVICE_GRANT_TYPE,
    })
}

/// Parse the device code endpoint JSON response.
///
/// # Errors
///
/// Returns [`CopilotError::DeviceCode`] if `device_code` or `user_code` is missing.
pub fn parse_device_authorization(json: &Value) -> Result<DeviceAuthorization> {
    let required = |field: &str| {
        json.get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CopilotError::DeviceCode(format!("missing {field}")))
    };
    Ok(DeviceAuthorization {
        device_code: required("device_code")?,
        user_code: required("user_code")?,
        verification_uri: json
            .get("verification_uri")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_VERIFICATION_URI)
            .to_string(),
        poll_interval_secs: json
            .get("interval")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_INTERVAL_SECS),
        expires_in_secs: json
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS),
    })
}

/// Meaning of a `200 OK` access-token poll body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPayload {
    /// The user approved; carries the long-lived grant.
    Granted(String),
    Pending,
    SlowDown,
    /// Any other `error` code (`expired_token`, `access_denied`, ...).
    Rejected(String),
    /// Neither `access_token` nor `error`.
    Unrecognised,
}

#[must_use]
pub fn classify_poll_payload(json: &Value) -> PollPayload {
    if let Some(grant) = json.get("access_token").and_then(Value::as_str) {
        return PollPayload::Granted(grant.to_string());
    }
    match json.get("error").and_then(Value::as_str) {
        Some("authorization_pending") => PollPayload::Pending,
        Some("slow_down") => PollPayload::SlowDown,
        Some(code) => PollPayload::Rejected(code.to_string()),
        None => PollPayload::Unrecognised,
    }
}

/// A Copilot API token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    pub token: String,
    /// Expiry in epoch seconds; `0` when the response carries none.
    pub expires_at_secs: u64,
}

impl ApiToken {
    #[must_use]
    pub fn expiry_millis(&self) -> u64 {
        self.expires_at_secs.saturating_mul(1_000)
    }
}

/// Parse the `copilot_internal/v2/token` response.
///
/// # Errors
///
/// Returns [`CopilotError::Token`] if `token` is missing.
pub fn parse_api_token(json: &Value) -> Result<ApiToken> {
    let token = json
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| CopilotError::Token("missing token in Copilot response".into()))?
        .to_string();
    let expires_at_secs = json.get("expires_at").and_then(Value::as_u64).unwrap_or(0);
    Ok(ApiToken {
        token,
        expires_at_secs,
    })
}
