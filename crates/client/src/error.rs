use thiserror::Error;

/// Errors from a single peer id lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("lookup connection error: {0}")]
    Connection(String),

    #[error("lookup timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-2xx answer, keyed by the status text
    #[error("{reason}")]
    Status { status: u16, reason: String },

    #[error("lookup returned undecodable body: {0}")]
    Decode(String),
}

/// Errors surfaced by cross-domain id resolution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("cross-domain id resolution is not enabled")]
    NotEnabled,

    #[error("cross-domain id resolution already in progress")]
    InProgress,

    /// Every peer finished without an id and at least one failed; carries the last failure
    #[error("lookup against {domain} failed: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: LookupError,
    },
}

/// Errors from the retry queue collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,

    /// Delivery kept failing until the attempt budget ran out
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Errors from delivering a message to the collection endpoint
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("collection connection error: {0}")]
    Connection(String),

    #[error("collection timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("collection endpoint returned HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("retry queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Status text for a non-2xx response, falling back to the code itself
pub(crate) fn status_reason(status: reqwest::StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| "Unknown Error".to_string())
}
