use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tracklet_config::DEFAULT_LOOKUP_TIMEOUT_MS;

use crate::error::{status_reason, LookupError};

/// Body of `GET /v1/id/{writeKey}` on a peer
#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Asks one peer domain for the visitor's cross-domain id.
///
/// `Ok(None)` is a clean "no id here"; errors count against the race.
#[async_trait]
pub trait PeerLookup: Send + Sync {
    async fn lookup(&self, domain: &str, write_key: &str) -> Result<Option<String>, LookupError>;
}

/// Lookup over HTTP against `{scheme}://{domain}/v1/id/{writeKey}`
pub struct HttpPeerLookup {
    http: Client,
    scheme: String,
    timeout: Duration,
}

impl HttpPeerLookup {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            scheme: "https".to_string(),
            timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the scheme (plain `http` for local peers)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn endpoint(&self, domain: &str, write_key: &str) -> String {
        format!("{}://{}/v1/id/{}", self.scheme, domain, write_key)
    }
}

#[async_trait]
impl PeerLookup for HttpPeerLookup {
    async fn lookup(&self, domain: &str, write_key: &str) -> Result<Option<String>, LookupError> {
        let url = self.endpoint(domain, write_key);
        debug!(url = %url, "GET cross-domain id");

        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    LookupError::Connection(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
                reason: status_reason(status),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| LookupError::Connection(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let parsed: IdResponse =
            serde_json::from_str(&body).map_err(|e| LookupError::Decode(e.to_string()))?;
        Ok(parsed.id.filter(|id| !id.is_empty()))
    }
}

impl std::fmt::Debug for HttpPeerLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPeerLookup")
            .field("scheme", &self.scheme)
            .field("timeout", &self.timeout)
            .finish()
    }
}
