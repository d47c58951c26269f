//! [`HttpTransport`] backed by an `rquest` client.

use async_trait::async_trait;
use copilink_types::{
    CopilotError, HttpRequest, HttpResponse, HttpTransport, Method, StreamingResponse,
    traits::Result,
};
use futures_util::StreamExt as _;
use rquest::{Client, RequestBuilder};

/// Sends [`HttpRequest`]s through a shared `rquest` client.
#[derive(Clone)]
pub struct RquestTransport {
    http: Client,
}

impl RquestTransport {
    /// Creates a new transport wrapping the given HTTP client.
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    fn build(&self, request: HttpRequest) -> RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

impl Default for RquestTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl HttpTransport for RquestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let resp = self.build(request).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(HttpResponse::new(status, body))
    }

    async fn send_streaming(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let resp = self.build(request).send().await?;
        let status = resp.status().as_u16();
        Ok(StreamingResponse {
            status,
            body: Box::pin(resp.bytes_stream().map(|r| r.map_err(CopilotError::from))),
        })
    }
}
