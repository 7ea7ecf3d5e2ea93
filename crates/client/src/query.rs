//! Campaign and ad-click parameters carried in the page query string

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Ad-network click-id parameters and the referrer type each one implies
const AD_CLICK_IDS: &[(&str, &str)] = &[("btid", "dataxu"), ("urid", "millennial-media")];

/// Extracts campaign and referrer data from a raw query string
pub trait QueryParser: Send + Sync {
    /// `utm_*` parameters with the prefix stripped; `None` if there are none
    fn campaign(&self, query: &str) -> Option<Map<String, Value>>;

    /// `{id, type}` for the first recognized ad click id
    fn referrer(&self, query: &str) -> Option<Map<String, Value>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StandardQueryParser;

fn pairs(query: &str) -> Vec<(String, String)> {
    let query = query.trim_start_matches('?').replace('?', "&");
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

impl QueryParser for StandardQueryParser {
    fn campaign(&self, query: &str) -> Option<Map<String, Value>> {
        let mut campaign = Map::new();
        for (key, value) in pairs(query) {
            if let Some(param) = key.strip_prefix("utm_") {
                let param = if param == "campaign" { "name" } else { param };
                campaign.insert(param.to_string(), Value::String(value));
            }
        }
        (!campaign.is_empty()).then_some(campaign)
    }

    fn referrer(&self, query: &str) -> Option<Map<String, Value>> {
        pairs(query).into_iter().find_map(|(key, value)| {
            AD_CLICK_IDS
                .iter()
                .find(|(param, _)| *param == key)
                .map(|(_, kind)| {
                    let mut referrer = Map::new();
                    referrer.insert("id".to_string(), Value::String(value));
                    referrer.insert("type".to_string(), Value::String(kind.to_string()));
                    referrer
                })
        })
    }
}
