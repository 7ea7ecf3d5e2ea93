use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{status_reason, DispatchError};

/// Content type of every collection request
pub const TEXT_PLAIN: &str = "text/plain";

/// What came back from the collection endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

pub fn text_plain_headers() -> HashMap<String, String> {
    HashMap::from([("Content-Type".to_string(), TEXT_PLAIN.to_string())])
}

/// POST `body` to `url`. Non-2xx answers are errors; the response reports
/// `url` as requested, even after redirects.
pub async fn post(
    http: &Client,
    url: &str,
    headers: &HashMap<String, String>,
    body: String,
    timeout: Duration,
) -> Result<HttpResponse, DispatchError> {
    debug!(url = %url, bytes = body.len(), "POST request");

    let mut request = http.post(url).timeout(timeout).body(body);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let resp = request.send().await.map_err(|e| {
        if e.is_timeout() {
            DispatchError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            DispatchError::Connection(e.to_string())
        }
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DispatchError::Status {
            status: status.as_u16(),
            reason: status_reason(status),
        });
    }

    let body = resp
        .text()
        .await
        .map_err(|e| DispatchError::Connection(e.to_string()))?;
    debug!(url = %url, status = status.as_u16(), "POST response");
    Ok(HttpResponse {
        status: status.as_u16(),
        url: url.to_string(),
        body,
    })
}
