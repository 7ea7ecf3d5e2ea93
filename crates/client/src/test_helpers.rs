//! Test helpers: scripted collaborators and in-memory storage.
//!
//! `MockLookup` answers peer lookups from a per-domain script, `RecordingBeacon`
//! and `RecordingQueue` capture what the dispatcher hands them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracklet_config::Settings;
use tracklet_storage::{InMemoryCookieJar, InMemoryLocalStore, Storage};
use url::Url;

use crate::beacon::BeaconTransport;
use crate::error::{LookupError, QueueError};
use crate::lookup::PeerLookup;
use crate::queue::{DeliveryQueue, Processed, QueueItem};

/// Settings pointing at a test collection host
pub fn test_settings(api_key: &str) -> Settings {
    let mut settings = Settings::new(api_key);
    settings.api_host = "api.seg.test".to_string();
    settings
}

/// Storage over fresh in-memory cookie and local backends
pub fn memory_storage(page: &Url) -> Storage {
    let host = page.host_str().unwrap_or_default().to_string();
    Storage::for_page(
        page,
        Arc::new(InMemoryCookieJar::new(host)),
        Arc::new(InMemoryLocalStore::new()),
    )
}

type ScriptedAnswer = (Duration, Result<Option<String>, LookupError>);

/// Peer lookup answering each domain after a scripted delay.
///
/// Domains without a script never answer.
#[derive(Debug, Default)]
pub struct MockLookup {
    answers: Mutex<HashMap<String, ScriptedAnswer>>,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(
        self,
        domain: &str,
        delay: Duration,
        result: Result<Option<String>, LookupError>,
    ) -> Self {
        self.set_answer(domain, delay, result);
        self
    }

    pub fn set_answer(
        &self,
        domain: &str,
        delay: Duration,
        result: Result<Option<String>, LookupError>,
    ) {
        self.answers
            .lock()
            .unwrap()
            .insert(domain.to_string(), (delay, result));
    }

    /// Lookups started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lookups that ran to completion
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerLookup for MockLookup {
    async fn lookup(&self, domain: &str, _write_key: &str) -> Result<Option<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.answers.lock().unwrap().get(domain).cloned();
        let Some((delay, result)) = scripted else {
            return std::future::pending().await;
        };
        tokio::time::sleep(delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentBeacon {
    pub url: String,
    pub body: String,
    pub content_type: String,
}

/// Beacon that records every attempt and accepts or rejects all of them
#[derive(Debug)]
pub struct RecordingBeacon {
    accept: bool,
    sent: Mutex<Vec<SentBeacon>>,
}

impl RecordingBeacon {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentBeacon> {
        self.sent.lock().unwrap().clone()
    }
}

impl BeaconTransport for RecordingBeacon {
    fn send_beacon(&self, url: &str, body: String, content_type: &str) -> bool {
        self.sent.lock().unwrap().push(SentBeacon {
            url: url.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        self.accept
    }
}

/// Queue that keeps items instead of sending them
#[derive(Debug)]
pub struct RecordingQueue {
    items: Mutex<Vec<QueueItem>>,
    started: AtomicBool,
    events: broadcast::Sender<Processed>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            items: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            events,
        }
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Default for RecordingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryQueue for RecordingQueue {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    fn add_item(&self, item: QueueItem) -> Result<(), QueueError> {
        self.items.lock().unwrap().push(item);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Processed> {
        self.events.subscribe()
    }
}
