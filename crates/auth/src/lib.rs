//! GitHub Copilot device authorization.
//!
//! [`copilot`] holds the wire-level request bodies and response parsing,
//! [`DeviceAuthController`] performs the individual round-trips and owns the
//! API-token cache, and [`flow::login`] drives the polling loop for callers
//! that want the whole interactive flow.

pub mod controller;
pub mod copilot;
pub mod flow;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::DeviceAuthController;
pub use flow::{LoginOutcome, login};
pub use transport::RquestTransport;
