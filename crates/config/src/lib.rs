//! tracklet-config: Settings shared by the client library and the CLI

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    LibraryInfo, QueueSettings, Settings, DEFAULT_API_HOST, DEFAULT_LOOKUP_TIMEOUT_MS,
    DEFAULT_QUEUE_BACKOFF_MS, DEFAULT_QUEUE_MAX_ATTEMPTS, DEFAULT_QUEUE_NAMESPACE,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
