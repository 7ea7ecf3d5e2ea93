//! Normalize a raw call and pick a transport for it
//!
//! Transports are tried in a fixed order: the retry queue when one is
//! configured, then a beacon, then a plain request. A rejected beacon falls
//! through to the request within the same call.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use tracklet_config::Settings;

use crate::beacon::BeaconTransport;
use crate::error::DispatchError;
use crate::identity::Identity;
use crate::normalize::Normalizer;
use crate::page::Page;
use crate::queue::{DeliveryQueue, QueueItem};
use crate::transport::{self, text_plain_headers, HttpResponse, TEXT_PLAIN};

/// How a message left the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Handed to the retry queue; the outcome arrives as a `Processed` event
    Queued,
    /// Accepted for beacon transmission; no response is observable
    Beacon,
    Sent(HttpResponse),
}

pub struct Dispatcher {
    settings: Arc<Settings>,
    page: Page,
    normalizer: Normalizer,
    http: Client,
    beacon: Option<Arc<dyn BeaconTransport>>,
    queue: Option<Arc<dyn DeliveryQueue>>,
}

impl Dispatcher {
    pub fn new(settings: Arc<Settings>, page: Page, normalizer: Normalizer, http: Client) -> Self {
        Self {
            settings,
            page,
            normalizer,
            http,
            beacon: None,
            queue: None,
        }
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Absolute collection URL for `path` (`/t`, `/i`, ...)
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}//{}{}",
            self.page.collection_scheme(),
            self.settings.api_host.trim_end_matches('/'),
            path
        )
    }

    pub async fn dispatch(
        &self,
        path: &str,
        raw: Map<String, Value>,
        identity: &Identity,
    ) -> Result<Delivery, DispatchError> {
        let message = self.normalizer.normalize(raw, identity);
        let url = self.endpoint(path);

        if self.settings.retry_queue {
            match &self.queue {
                Some(queue) => {
                    queue.add_item(QueueItem {
                        url,
                        headers: text_plain_headers(),
                        payload: serde_json::to_value(&message)?,
                    })?;
                    return Ok(Delivery::Queued);
                }
                None => warn!("retry queue enabled but none attached, sending directly"),
            }
        }

        let body = message.to_json()?;

        if self.settings.beacon {
            if let Some(beacon) = &self.beacon {
                if beacon.send_beacon(&url, body.clone(), TEXT_PLAIN) {
                    debug!(url = %url, message_id = %message.message_id, "sent by beacon");
                    return Ok(Delivery::Beacon);
                }
                debug!(url = %url, "beacon rejected, falling back to request");
            }
        }

        let resp = transport::post(
            &self.http,
            &url,
            &text_plain_headers(),
            body,
            self.settings.request_timeout(),
        )
        .await?;
        Ok(Delivery::Sent(resp))
    }
}
