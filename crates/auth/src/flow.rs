//! Interactive device-flow login loop.

use crate::DeviceAuthController;
use copilink_types::{AuthState, CopilotError, DeviceAuthorization, PollOutcome, traits::Result};
use std::time::Duration;
use tokio::time::Instant;

/// Seconds added to the polling interval on `slow_down`.
pub const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

/// How an interactive login ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Carries the first Copilot API token.
    Authorized(String),
    Failed,
    TimedOut,
}

/// Run the full device flow: request codes, hand them to `prompt`, then poll
/// until the user approves, the server refuses, or `timeout` elapses.
///
/// The loop also stops when the device code itself expires.
///
/// # Errors
///
/// Propagates transport and persistence errors from the controller.
pub async fn login<F>(
    controller: &DeviceAuthController,
    timeout: Duration,
    prompt: F,
) -> Result<LoginOutcome>
where
    F: FnOnce(&DeviceAuthorization),
{
    let device = controller.authorize().await?;
    let mut state = AuthState::DeviceRequested;
    tracing::debug!(?state, user_code = %device.user_code, "device code issued");
    prompt(&device);

    let budget = timeout.min(Duration::from_secs(device.expires_in_secs));
    let deadline = Instant::now() + budget;
    let mut interval = Duration::from_secs(device.poll_interval_secs);
    state = AuthState::Polling;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(interval.min(remaining)).await;

        if Instant::now() >= deadline {
            tracing::warn!(?state, "device authorization timed out");
            return Ok(LoginOutcome::TimedOut);
        }

        let outcome = controller.poll(&device.device_code).await?;
        state = state.after_poll(outcome);
        tracing::debug!(?state, outcome = outcome.as_str(), "polled");

        if outcome == PollOutcome::SlowDown {
            interval += Duration::from_secs(SLOW_DOWN_INCREMENT_SECS);
        }

        match state {
            AuthState::Authorized => {
                let token = controller.get_access_token().await?.ok_or_else(|| {
                    CopilotError::Token("credential missing after authorization".into())
                })?;
                return Ok(LoginOutcome::Authorized(token));
            }
            AuthState::Failed => return Ok(LoginOutcome::Failed),
            _ => {}
        }
    }
}
