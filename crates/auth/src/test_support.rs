//! Scripted collaborators for controller and flow tests.

use async_trait::async_trait;
use copilink_types::{
    Clock, CopilotError, HttpRequest, HttpResponse, HttpTransport, StreamingResponse,
    traits::Result,
};
use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each `send` sleeps for `delay` before answering.
    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub(crate) fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(Ok(HttpResponse::json(status, &body)));
    }

    pub(crate) fn push(&self, response: Result<HttpResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CopilotError::Http("no scripted response left".into())))
    }

    async fn send_streaming(&self, _request: HttpRequest) -> Result<StreamingResponse> {
        Err(CopilotError::Http("streaming not scripted".into()))
    }
}

/// A clock fixed at one instant.
pub(crate) struct ManualClock(AtomicU64);

impl ManualClock {
    pub(crate) fn at(millis: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(millis)))
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}
