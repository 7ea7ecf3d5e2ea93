use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Default collection host (scheme is chosen per page at send time)
pub const DEFAULT_API_HOST: &str = "api.segment.io/v1";
/// Default bound on a single cross-domain id lookup
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 10_000;
/// Default bound on a direct collection request
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default retry queue namespace
pub const DEFAULT_QUEUE_NAMESPACE: &str = "segmentio";
/// Default delivery attempts per queued item
pub const DEFAULT_QUEUE_MAX_ATTEMPTS: u32 = 10;
/// Default base delay between queued delivery attempts
pub const DEFAULT_QUEUE_BACKOFF_MS: u64 = 1000;

const DEFAULT_LIBRARY_NAME: &str = "analytics.js";

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_lookup_timeout_ms() -> u64 {
    DEFAULT_LOOKUP_TIMEOUT_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_queue_namespace() -> String {
    DEFAULT_QUEUE_NAMESPACE.to_string()
}

fn default_queue_max_attempts() -> u32 {
    DEFAULT_QUEUE_MAX_ATTEMPTS
}

fn default_queue_backoff_ms() -> u64 {
    DEFAULT_QUEUE_BACKOFF_MS
}

/// Name and version stamped into `context.library` when the caller supplies none
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
}

impl Default for LibraryInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_LIBRARY_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    #[serde(default = "default_queue_namespace")]
    pub namespace: String,
    #[serde(default = "default_queue_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_queue_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            namespace: default_queue_namespace(),
            max_attempts: default_queue_max_attempts(),
            backoff_ms: default_queue_backoff_ms(),
        }
    }
}

impl QueueSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Integration settings.
///
/// YAML keys are camelCase so existing integration settings blobs load as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Write key, stamped into every message as `writeKey`
    pub api_key: String,
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Peer domains queried for a shared identifier; empty disables the resolver
    #[serde(default)]
    pub cross_domain_id_servers: Vec<String>,
    #[serde(default)]
    pub beacon: bool,
    #[serde(default)]
    pub retry_queue: bool,
    #[serde(default)]
    pub add_bundled_metadata: bool,
    #[serde(default)]
    pub unbundled_integrations: Vec<String>,
    /// Integrations loaded alongside this one, reported in `_metadata.bundled`
    #[serde(default)]
    pub bundled_integrations: Vec<String>,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub library: LibraryInfo,
}

impl Settings {
    /// Settings with every option at its default
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_host: default_api_host(),
            cross_domain_id_servers: Vec::new(),
            beacon: false,
            retry_queue: false,
            add_bundled_metadata: false,
            unbundled_integrations: Vec::new(),
            bundled_integrations: Vec::new(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            queue: QueueSettings::default(),
            library: LibraryInfo::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Validation("apiKey must not be empty".to_string()));
        }
        if self.api_host.trim().is_empty() {
            return Err(ConfigError::Validation("apiHost must not be empty".to_string()));
        }
        if self.api_host.contains("://") {
            return Err(ConfigError::Validation(format!(
                "apiHost must not carry a scheme: {}",
                self.api_host
            )));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "lookupTimeoutMs must be positive".to_string(),
            ));
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "queue.maxAttempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Cross-domain resolution is on when at least one peer is configured
    pub fn cross_domain_enabled(&self) -> bool {
        !self.cross_domain_id_servers.is_empty()
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
