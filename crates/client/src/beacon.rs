//! Best-effort beacon delivery
//!
//! A beacon is queued for transmission and forgotten: the caller only learns
//! whether it was accepted, never how the request went.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};

/// Largest payload a beacon will accept
pub const MAX_BEACON_BYTES: usize = 64 * 1024;

pub trait BeaconTransport: Send + Sync {
    /// Queue `body` for transmission; `false` means rejected and nothing was sent
    fn send_beacon(&self, url: &str, body: String, content_type: &str) -> bool;
}

/// Beacon over a detached POST on the current tokio runtime
#[derive(Debug, Clone)]
pub struct HttpBeacon {
    http: Client,
    max_bytes: usize,
}

impl HttpBeacon {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            max_bytes: MAX_BEACON_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl BeaconTransport for HttpBeacon {
    fn send_beacon(&self, url: &str, body: String, content_type: &str) -> bool {
        if body.len() > self.max_bytes {
            debug!(bytes = body.len(), limit = self.max_bytes, "beacon payload too large");
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime available for beacon");
            return false;
        };

        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type.to_string())
            .body(body);
        let url = url.to_string();
        runtime.spawn(async move {
            match request.send().await {
                Ok(resp) => debug!(url = %url, status = resp.status().as_u16(), "beacon delivered"),
                Err(e) => debug!(url = %url, error = %e, "beacon lost"),
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_beacon_posts_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/t"))
            .and(header("content-type", "text/plain"))
            .and(body_string("{\"event\":\"Login\"}"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let beacon = HttpBeacon::new(Client::new());
        let url = format!("{}/t", server.uri());
        assert!(beacon.send_beacon(&url, "{\"event\":\"Login\"}".to_string(), "text/plain"));

        for _ in 0..50 {
            if !server.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_oversized_beacon_rejected() {
        let beacon = HttpBeacon::new(Client::new()).with_max_bytes(8);
        assert!(!beacon.send_beacon("http://127.0.0.1:9/t", "x".repeat(9), "text/plain"));
    }

    #[test]
    fn test_beacon_rejected_outside_runtime() {
        let beacon = HttpBeacon::new(Client::new());
        assert!(!beacon.send_beacon("http://127.0.0.1:9/t", "{}".to_string(), "text/plain"));
    }
}
