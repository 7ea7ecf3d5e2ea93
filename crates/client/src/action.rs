use serde_json::{Map, Value};

use crate::identity::Identity;

/// A host call to deliver, carrying its raw JSON payload
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Page(Map<String, Value>),
    Identify(Map<String, Value>),
    Group(Map<String, Value>),
    Track(Map<String, Value>),
    Alias(Map<String, Value>),
}

impl Action {
    /// Build from a call name (`page`, `identify`, ...); `None` for unknown names
    pub fn from_kind(kind: &str, payload: Map<String, Value>) -> Option<Self> {
        let action = match kind {
            "page" => Action::Page(payload),
            "identify" => Action::Identify(payload),
            "group" => Action::Group(payload),
            "track" => Action::Track(payload),
            "alias" => Action::Alias(payload),
            _ => return None,
        };
        Some(action)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Page(_) => "page",
            Action::Identify(_) => "identify",
            Action::Group(_) => "group",
            Action::Track(_) => "track",
            Action::Alias(_) => "alias",
        }
    }

    /// Collection endpoint path
    pub fn path(&self) -> &'static str {
        match self {
            Action::Page(_) => "/p",
            Action::Identify(_) => "/i",
            Action::Group(_) => "/g",
            Action::Track(_) => "/t",
            Action::Alias(_) => "/a",
        }
    }

    /// Endpoint path plus the payload as sent, with per-kind adjustments applied
    pub fn into_message(self, identity: &Identity) -> (&'static str, Map<String, Value>) {
        let path = self.path();
        let message = match self {
            Action::Track(mut msg) => {
                msg.remove("traits");
                msg
            }
            Action::Alias(msg) => alias_message(msg, identity),
            Action::Page(msg) | Action::Identify(msg) | Action::Group(msg) => msg,
        };
        (path, message)
    }
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

/// `previousId` falls back to `from`, then the current user id, then the anonymous id;
/// `userId` falls back to `to`
fn alias_message(mut msg: Map<String, Value>, identity: &Identity) -> Map<String, Value> {
    let from = present(msg.remove("from"));
    let to = present(msg.remove("to"));

    let previous_id = present(msg.remove("previousId"))
        .or(from)
        .or_else(|| identity.user_id.clone().map(Value::String))
        .unwrap_or_else(|| Value::String(identity.anonymous_id.clone()));
    msg.insert("previousId".to_string(), previous_id);

    if let Some(user_id) = present(msg.remove("userId")).or(to) {
        msg.insert("userId".to_string(), user_id);
    }
    msg
}
