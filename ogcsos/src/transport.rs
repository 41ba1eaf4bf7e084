//! HTTP exchange with the SOS endpoint.

use tracing::debug;
use ureq::Agent;

use crate::errors::Result;

pub const XML_CONTENT_TYPE: &str = r#"application/xml; charset="utf-8""#;

/// Capabilities of large deployments easily exceed ureq's 10 MB default.
const MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

/// An outbound POST, with the token already placed by the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Status and full body, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking request/response round trip.
pub trait Transport {
    fn post(&self, request: &HttpRequest) -> Result<HttpReply>;
}

/// `ureq` transport keeping the agent defaults (no adapter-level timeout).
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        // 4xx/5xx must not become ureq errors: the body carries the
        // server's explanation and is surfaced with the status.
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpReply> {
        debug!(url = %request.url, bytes = request.body.len(), "POST SOS request");

        let mut builder = self.agent.post(&request.url);
        for (key, value) in &request.query {
            builder = builder.query(key, value);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let mut response = builder.send(request.body.as_str())?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_string()?;

        debug!(status, bytes = body.len(), "SOS response received");
        Ok(HttpReply { status, body })
    }
}
