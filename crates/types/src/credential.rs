//! Persisted provider credentials and device-flow state.

use serde::{Deserialize, Serialize};

/// Storage key of the GitHub Copilot provider.
pub const COPILOT_PROVIDER: &str = "copilot";

/// Durable per-provider credential record.
///
/// The wire form keeps the `type` discriminant so that records written by
/// other clients of the same configuration store stay readable:
/// `{"type":"oauth","refresh":"…","access":"…","expires":0}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderCredential {
    #[serde(rename = "oauth")]
    OAuth {
        /// Long-lived grant obtained by the device flow.
        #[serde(rename = "refresh")]
        long_lived_grant: String,
        /// Short-lived API token; empty until the first exchange.
        #[serde(rename = "access", default)]
        api_token: String,
        /// API token expiry in epoch milliseconds; `0` when unset.
        #[serde(rename = "expires", default)]
        api_token_expiry_millis: u64,
    },
}

impl ProviderCredential {
    /// A freshly authorized grant with no API token yet.
    pub fn oauth(long_lived_grant: impl Into<String>) -> Self {
        Self::OAuth {
            long_lived_grant: long_lived_grant.into(),
            api_token: String::new(),
            api_token_expiry_millis: 0,
        }
    }

    /// Replace the API token, preserving the grant.
    #[must_use]
    pub fn with_api_token(self, api_token: impl Into<String>, expiry_millis: u64) -> Self {
        match self {
            Self::OAuth {
                long_lived_grant, ..
            } => Self::OAuth {
                long_lived_grant,
                api_token: api_token.into(),
                api_token_expiry_millis: expiry_millis,
            },
        }
    }

    #[must_use]
    pub fn long_lived_grant(&self) -> &str {
        match self {
            Self::OAuth {
                long_lived_grant, ..
            } => long_lived_grant,
        }
    }

    /// Returns the cached API token if it is set and still valid at `now_millis`.
    #[must_use]
    pub fn cached_api_token(&self, now_millis: u64) -> Option<&str> {
        match self.state(now_millis) {
            CredentialState::Refreshed => match self {
                Self::OAuth { api_token, .. } => Some(api_token),
            },
            CredentialState::GrantOnly | CredentialState::Expired => None,
        }
    }

    /// Classify the record at `now_millis`.
    #[must_use]
    pub fn state(&self, now_millis: u64) -> CredentialState {
        match self {
            Self::OAuth {
                api_token,
                api_token_expiry_millis,
                ..
            } => {
                if api_token.is_empty() {
                    CredentialState::GrantOnly
                } else if *api_token_expiry_millis > now_millis {
                    CredentialState::Refreshed
                } else {
                    CredentialState::Expired
                }
            }
        }
    }
}

/// Usability of a stored [`ProviderCredential`]. "No credential" is the
/// `None` returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Authorized, but no API token has been exchanged yet.
    GrantOnly,
    /// Holds an unexpired API token.
    Refreshed,
    /// Holds an API token past its expiry.
    Expired,
}

/// Codes issued by the device-authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuthorization {
    pub device_code: String,
    /// Short code the user enters at the verification URI.
    pub user_code: String,
    pub verification_uri: String,
    /// Minimum polling interval in seconds.
    pub poll_interval_secs: u64,
    /// Seconds until the device code expires.
    pub expires_in_secs: u64,
}

/// Result of one device-flow poll round-trip.
///
/// Transport failures are not represented here; they surface as the `Err`
/// arm of the poll call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The user has not completed authorization yet.
    Pending,
    /// Still pending, and the server asked for a longer interval.
    SlowDown,
    /// A grant was issued and persisted.
    Complete,
    /// The server rejected the request.
    Failed,
}

impl PollOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending | Self::SlowDown => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// Device authorization state machine.
///
/// `Idle → DeviceRequested → Polling → {Authorized | Failed | TimedOut}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    DeviceRequested,
    Polling,
    Authorized,
    Failed,
    TimedOut,
}

impl AuthState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authorized | Self::Failed | Self::TimedOut)
    }

    /// State after a poll round-trip produced `outcome`. Terminal states absorb.
    #[must_use]
    pub fn after_poll(self, outcome: PollOutcome) -> Self {
        if self.is_terminal() {
            return self;
        }
        match outcome {
            PollOutcome::Pending | PollOutcome::SlowDown => Self::Polling,
            PollOutcome::Complete => Self::Authorized,
            PollOutcome::Failed => Self::Failed,
        }
    }
}
