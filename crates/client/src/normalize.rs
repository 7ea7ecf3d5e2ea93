//! Raw call → canonical wire message

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use tracklet_config::Settings;
use tracklet_storage::Storage;
use uuid::Uuid;

use crate::identity::Identity;
use crate::page::Page;
use crate::query::QueryParser;

/// Last referrer seen in a query string, JSON-encoded
pub const REFERRER_KEY: &str = "s:context.referrer";
/// AMP client id dropped by the AMP runtime
pub const AMP_ID_KEY: &str = "segment_amp_id";

const MESSAGE_ID_PREFIX: &str = "ajs-";

/// `context` of a wire message. Caller-supplied sub-objects pass through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amp: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Context {
    /// Split a caller-supplied context object into known and pass-through fields.
    /// Nulls count as absent; a non-object context is dropped.
    pub fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            Value::Null => return Self::default(),
            other => {
                warn!(context = %other, "ignoring non-object context");
                return Self::default();
            }
        };

        let mut take = |key: &str| map.remove(key).filter(|v| !v.is_null());
        let user_agent = take("userAgent").and_then(|v| v.as_str().map(str::to_string));
        let library = take("library");
        let campaign = take("campaign");
        let referrer = take("referrer");
        let amp = take("amp");

        Self {
            user_agent,
            library,
            campaign,
            referrer,
            amp,
            extra: map,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundledMetadata {
    pub bundled: Vec<String>,
    pub unbundled: Vec<String>,
}

/// A message ready for the collection endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    pub write_key: String,
    pub anonymous_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub context: Context,
    pub sent_at: DateTime<Utc>,
    pub message_id: String,
    #[serde(rename = "_metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BundledMetadata>,
    /// Everything else the caller sent (event, properties, traits, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NormalizedMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Fields the normalizer owns; stale copies in the input are discarded
const OWNED_FIELDS: &[&str] = &[
    "writeKey",
    "anonymousId",
    "sentAt",
    "messageId",
    "_metadata",
];

fn string_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct Normalizer {
    settings: Arc<Settings>,
    page: Page,
    storage: Arc<Storage>,
    query: Arc<dyn QueryParser>,
}

impl Normalizer {
    pub fn new(
        settings: Arc<Settings>,
        page: Page,
        storage: Arc<Storage>,
        query: Arc<dyn QueryParser>,
    ) -> Self {
        Self {
            settings,
            page,
            storage,
            query,
        }
    }

    pub fn normalize(&self, mut raw: Map<String, Value>, identity: &Identity) -> NormalizedMessage {
        debug!(message = ?raw, "normalize");

        let options = raw.remove("options");
        let mut context = match raw.remove("context").filter(|v| !v.is_null()) {
            Some(ctx) => Context::from_value(ctx),
            None => options.map(Context::from_value).unwrap_or_default(),
        };
        for field in OWNED_FIELDS {
            raw.remove(*field);
        }

        context.user_agent = Some(self.page.user_agent.clone());
        if context.library.is_none() {
            context.library = Some(json!({
                "name": self.settings.library.name,
                "version": self.settings.library.version,
            }));
        }

        let query = self.page.query();
        if context.campaign.is_none() {
            if let Some(campaign) = query.and_then(|q| self.query.campaign(q)) {
                context.campaign = Some(Value::Object(campaign));
            }
        }
        self.resolve_referrer(query, &mut context);

        let user_id = raw
            .remove("userId")
            .and_then(string_value)
            .or_else(|| identity.user_id.clone());

        let metadata = self.settings.add_bundled_metadata.then(|| BundledMetadata {
            bundled: self.settings.bundled_integrations.clone(),
            unbundled: self.settings.unbundled_integrations.clone(),
        });

        let mut message = NormalizedMessage {
            write_key: self.settings.api_key.clone(),
            anonymous_id: identity.anonymous_id.clone(),
            user_id,
            context,
            sent_at: Utc::now(),
            message_id: String::new(),
            metadata,
            fields: raw,
        };
        message.message_id = message_id(&message);
        debug!(message_id = %message.message_id, "normalized");

        if let Some(amp_id) = self.storage.read(AMP_ID_KEY).filter(|id| !id.is_empty()) {
            message.context.amp = Some(json!({ "id": amp_id }));
        }
        message
    }

    /// Ad referrer from the query, else the cached one; caller fields win on merge
    fn resolve_referrer(&self, query: Option<&str>, context: &mut Context) {
        let from_query = query.and_then(|q| self.query.referrer(q));
        let ad = match from_query {
            Some(ad) => ad,
            None => match self.storage.read_json::<Map<String, Value>>(REFERRER_KEY) {
                Some(stored) => stored,
                None => return,
            },
        };

        context.referrer = match context.referrer.take() {
            None => Some(Value::Object(ad.clone())),
            Some(Value::Object(caller)) => {
                let mut merged = ad.clone();
                merged.extend(caller);
                Some(Value::Object(merged))
            }
            Some(other) => Some(other),
        };

        match serde_json::to_string(&ad) {
            Ok(encoded) => {
                self.storage.write(REFERRER_KEY, &encoded);
            }
            Err(e) => warn!(error = %e, "failed to encode referrer"),
        }
    }
}

/// Content digest mixed with a fresh v4 UUID, so identical payloads never share an id
fn message_id(message: &NormalizedMessage) -> String {
    let body = serde_json::to_string(message).unwrap_or_default();
    let salt = Uuid::new_v4();
    let digest = md5::compute(format!("{}{}", body, salt));
    format!("{}{:x}", MESSAGE_ID_PREFIX, digest)
}
