use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use tracklet_storage::Storage;
use uuid::Uuid;

pub const USER_ID_KEY: &str = "ajs_user_id";
pub const ANONYMOUS_ID_KEY: &str = "ajs_anonymous_id";

/// Who the visitor is, as far as this page knows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Option<String>,
    pub anonymous_id: String,
    pub cross_domain_id: Option<String>,
    pub from_domain: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub traits: Map<String, Value>,
}

impl Identity {
    pub fn new(anonymous_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            anonymous_id: anonymous_id.into(),
            cross_domain_id: None,
            from_domain: None,
            resolved_at: None,
            traits: Map::new(),
        }
    }

    /// Restore the stored identity, minting and persisting an anonymous id if none exists
    pub fn load(storage: &Storage) -> Self {
        let anonymous_id = match storage.read(ANONYMOUS_ID_KEY).filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                debug!(anonymous_id = %id, "minted anonymous id");
                storage.write(ANONYMOUS_ID_KEY, &id);
                id
            }
        };
        let mut identity = Self::new(anonymous_id);
        identity.user_id = storage.read(USER_ID_KEY).filter(|id| !id.is_empty());
        identity
    }

    pub fn persist(&self, storage: &Storage) {
        storage.write(ANONYMOUS_ID_KEY, &self.anonymous_id);
        match &self.user_id {
            Some(user_id) => {
                storage.write(USER_ID_KEY, user_id);
            }
            None => storage.remove(USER_ID_KEY),
        }
    }

    /// The most specific id known: user id, else anonymous id
    pub fn id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.anonymous_id)
    }
}
