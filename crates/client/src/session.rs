//! Per-page client state
//!
//! A `Session` owns the visitor's [`Identity`] and wires storage, the
//! normalizer, the dispatcher and the cross-domain resolver together.

use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde_json::{json, Map, Value};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracklet_config::Settings;
use tracklet_storage::{CookieJar, LocalStore, Storage};

use crate::action::Action;
use crate::beacon::{BeaconTransport, HttpBeacon};
use crate::dispatcher::{Delivery, Dispatcher};
use crate::error::{DispatchError, ResolveError, SessionError};
use crate::identity::Identity;
use crate::lookup::{HttpPeerLookup, PeerLookup};
use crate::normalize::Normalizer;
use crate::page::Page;
use crate::query::{QueryParser, StandardQueryParser};
use crate::queue::{DeliveryQueue, MemoryQueue, Processed, QueueProcessor};
use crate::resolver::{self, CrossDomainResolver, Resolution};

pub const CROSS_DOMAIN_TRAIT: &str = "crossDomainId";

/// Called once when cross-domain resolution settles, either way
pub type ResolvedCallback = Box<dyn FnOnce(&Result<Resolution, ResolveError>) + Send>;

pub struct SessionBuilder {
    settings: Settings,
    page: Page,
    cookies: Arc<dyn CookieJar>,
    local: Arc<dyn LocalStore>,
    http: Option<Client>,
    lookup: Option<Arc<dyn PeerLookup>>,
    beacon: Option<Arc<dyn BeaconTransport>>,
    queue: Option<Arc<dyn DeliveryQueue>>,
    query: Arc<dyn QueryParser>,
}

impl SessionBuilder {
    pub fn http(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn lookup(mut self, lookup: Arc<dyn PeerLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn beacon(mut self, beacon: Arc<dyn BeaconTransport>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn query_parser(mut self, query: Arc<dyn QueryParser>) -> Self {
        self.query = query;
        self
    }

    /// Collaborators not supplied are built from the settings
    pub fn build(self) -> Result<Session, SessionError> {
        let settings = Arc::new(self.settings);
        // The shared client keeps cookies for the peer lookups
        let http = match self.http {
            Some(http) => http,
            None => Client::builder()
                .timeout(settings.request_timeout())
                .cookie_store(true)
                .build()?,
        };

        let storage = Arc::new(Storage::for_page(&self.page.url, self.cookies, self.local));
        let identity = Identity::load(&storage);
        debug!(
            anonymous_id = %identity.anonymous_id,
            storage = ?storage.kind(),
            "session identity loaded"
        );

        let lookup = self.lookup.unwrap_or_else(|| {
            Arc::new(HttpPeerLookup::new(http.clone()).with_timeout(settings.lookup_timeout()))
        });
        let beacon = match self.beacon {
            Some(beacon) => Some(beacon),
            None if settings.beacon => Some(Arc::new(HttpBeacon::new(http.clone())) as Arc<dyn BeaconTransport>),
            None => None,
        };
        let queue = match self.queue {
            Some(queue) => Some(queue),
            None if settings.retry_queue => Some(Arc::new(MemoryQueue::new(
                settings.queue.namespace.clone(),
                QueueProcessor::new(http.clone(), settings.request_timeout()),
                settings.queue.max_attempts,
                settings.queue.backoff(),
            )) as Arc<dyn DeliveryQueue>),
            None => None,
        };

        let normalizer = Normalizer::new(
            settings.clone(),
            self.page.clone(),
            storage.clone(),
            self.query,
        );
        let mut dispatcher = Dispatcher::new(settings.clone(), self.page.clone(), normalizer, http);
        if let Some(beacon) = beacon {
            dispatcher = dispatcher.with_beacon(beacon);
        }
        if let Some(queue) = &queue {
            dispatcher = dispatcher.with_queue(queue.clone());
        }
        let resolver =
            CrossDomainResolver::new(settings.clone(), self.page, storage.clone(), lookup);

        Ok(Session {
            settings,
            storage,
            identity: RwLock::new(identity),
            dispatcher,
            resolver,
            queue,
            on_resolved: Mutex::new(None),
        })
    }
}

pub struct Session {
    settings: Arc<Settings>,
    storage: Arc<Storage>,
    identity: RwLock<Identity>,
    dispatcher: Dispatcher,
    resolver: CrossDomainResolver,
    queue: Option<Arc<dyn DeliveryQueue>>,
    on_resolved: Mutex<Option<ResolvedCallback>>,
}

impl Session {
    pub fn builder(
        settings: Settings,
        page: Page,
        cookies: Arc<dyn CookieJar>,
        local: Arc<dyn LocalStore>,
    ) -> SessionBuilder {
        SessionBuilder {
            settings,
            page,
            cookies,
            local,
            http: None,
            lookup: None,
            beacon: None,
            queue: None,
            query: Arc::new(StandardQueryParser),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn resolver(&self) -> &CrossDomainResolver {
        &self.resolver
    }

    /// Start the retry queue and bring the cross-domain id up to date.
    ///
    /// A cached id is loaded into the identity directly. Otherwise, when peers
    /// are configured, resolution runs in the background and its handle is returned.
    pub async fn initialize(
        self: &Arc<Self>,
    ) -> Option<JoinHandle<Result<Resolution, ResolveError>>> {
        if let Some(queue) = &self.queue {
            queue.start();
        }

        resolver::migrate_legacy(&self.storage);
        if let Some(cached) = resolver::cached(&self.storage) {
            debug!(cross_domain_id = %cached.cross_domain_id, "cross-domain id loaded from storage");
            self.apply_resolution(&cached).await;
            self.resolver.adopt(cached);
            return None;
        }
        if !self.settings.cross_domain_enabled() {
            return None;
        }

        let session = Arc::clone(self);
        Some(tokio::spawn(async move { session.retrieve_cross_domain_id().await }))
    }

    /// Register the callback fired when resolution settles. Only the first settlement fires it.
    pub fn on_cross_domain_resolved<F>(&self, callback: F)
    where
        F: FnOnce(&Result<Resolution, ResolveError>) + Send + 'static,
    {
        *self.on_resolved.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(callback));
    }

    /// Run cross-domain resolution now. A newly resolved id is sent once as an identify trait.
    pub async fn retrieve_cross_domain_id(&self) -> Result<Resolution, ResolveError> {
        let outcome = self.resolver.resolve().await;
        if matches!(
            outcome,
            Err(ResolveError::NotEnabled) | Err(ResolveError::InProgress)
        ) {
            return outcome;
        }
        if let Ok(resolution) = &outcome {
            if self.apply_resolution(resolution).await {
                let mut traits = Map::new();
                traits.insert(
                    CROSS_DOMAIN_TRAIT.to_string(),
                    Value::String(resolution.cross_domain_id.clone()),
                );
                if let Err(e) = self.identify(None, traits).await {
                    warn!(error = %e, "failed to send cross-domain identify");
                }
            }
        }

        let callback = self.on_resolved.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(callback) = callback {
            callback(&outcome);
        }
        outcome
    }

    /// Copy a resolution into the identity. Returns false if it was already there.
    async fn apply_resolution(&self, resolution: &Resolution) -> bool {
        let mut identity = self.identity.write().await;
        if identity.cross_domain_id.as_deref() == Some(resolution.cross_domain_id.as_str()) {
            return false;
        }
        identity.cross_domain_id = Some(resolution.cross_domain_id.clone());
        identity.from_domain = Some(resolution.from_domain.clone());
        identity.resolved_at = Some(resolution.resolved_at);
        identity.traits.insert(
            CROSS_DOMAIN_TRAIT.to_string(),
            Value::String(resolution.cross_domain_id.clone()),
        );
        true
    }

    pub async fn identity(&self) -> Identity {
        self.identity.read().await.clone()
    }

    /// Deliver a host call with the current identity
    pub async fn handle(&self, action: Action) -> Result<Delivery, DispatchError> {
        let identity = self.identity.read().await.clone();
        debug!(kind = action.kind(), "handle");
        let (path, message) = action.into_message(&identity);
        self.dispatcher.dispatch(path, message, &identity).await
    }

    /// Record a user id and traits, then send an identify carrying the full trait set
    pub async fn identify(
        &self,
        user_id: Option<String>,
        traits: Map<String, Value>,
    ) -> Result<Delivery, DispatchError> {
        let payload = {
            let mut identity = self.identity.write().await;
            if let Some(user_id) = user_id.filter(|id| !id.is_empty()) {
                identity.user_id = Some(user_id);
            }
            identity.traits.extend(traits);
            identity.persist(&self.storage);

            let mut payload = Map::new();
            if let Some(user_id) = &identity.user_id {
                payload.insert("userId".to_string(), json!(user_id));
            }
            payload.insert("traits".to_string(), Value::Object(identity.traits.clone()));
            payload
        };
        self.handle(Action::Identify(payload)).await
    }

    pub async fn set_anonymous_id(&self, anonymous_id: impl Into<String>) {
        let mut identity = self.identity.write().await;
        identity.anonymous_id = anonymous_id.into();
        identity.persist(&self.storage);
        info!(anonymous_id = %identity.anonymous_id, "anonymous id set");
    }

    /// Outcomes of queued deliveries, if a retry queue is attached
    pub fn subscribe_processed(&self) -> Option<broadcast::Receiver<Processed>> {
        self.queue.as_ref().map(|queue| queue.subscribe())
    }

    pub async fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.stop().await;
        }
    }
}
