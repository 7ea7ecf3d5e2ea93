//! Retry queue for collection requests
//!
//! The dispatcher hands composed requests to a [`DeliveryQueue`] and returns
//! immediately; the outcome of each item is announced later as a
//! [`Processed`] event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, QueueError};
use crate::transport::{self, HttpResponse};

const EVENT_CAPACITY: usize = 256;
const MAX_BACKOFF_DOUBLINGS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub payload: Value,
}

/// Fired once per item when it is delivered or given up on
#[derive(Debug, Clone)]
pub struct Processed {
    pub item: QueueItem,
    pub attempts: u32,
    pub result: Result<HttpResponse, QueueError>,
}

#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Begin processing items, including any added before the call
    fn start(&self);

    /// Stop taking items off the queue; pending items stay queued
    async fn stop(&self);

    fn add_item(&self, item: QueueItem) -> Result<(), QueueError>;

    fn subscribe(&self) -> broadcast::Receiver<Processed>;
}

/// Sends one queued item
#[derive(Debug, Clone)]
pub struct QueueProcessor {
    http: Client,
    timeout: Duration,
}

impl QueueProcessor {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Stamp a fresh `sentAt` and POST the item
    pub async fn process(&self, item: &mut QueueItem) -> Result<HttpResponse, DispatchError> {
        refresh_sent_at(&mut item.payload);
        let body = serde_json::to_string(&item.payload)?;
        transport::post(&self.http, &item.url, &item.headers, body, self.timeout).await
    }
}

/// Items can sit in the queue for a while; the endpoint rejects stale clocks
pub fn refresh_sent_at(payload: &mut Value) {
    if let Some(fields) = payload.as_object_mut() {
        fields.insert(
            "sentAt".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
}

/// Client errors other than 429 will fail the same way every time
fn is_retryable(error: &DispatchError) -> bool {
    match error {
        DispatchError::Status { status, .. } => *status == 429 || *status >= 500,
        DispatchError::Encode(_) => false,
        _ => true,
    }
}

fn backoff_for(base: Duration, attempt: u32) -> Duration {
    base * 2u32.pow(attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS))
}

/// In-process queue with bounded attempts and exponential backoff
pub struct MemoryQueue {
    namespace: String,
    max_attempts: u32,
    backoff: Duration,
    processor: Arc<QueueProcessor>,
    tx: mpsc::UnboundedSender<QueueItem>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<QueueItem>>>,
    events: broadcast::Sender<Processed>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<mpsc::UnboundedReceiver<QueueItem>>>>,
}

impl MemoryQueue {
    pub fn new(
        namespace: impl Into<String>,
        processor: QueueProcessor,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            namespace: namespace.into(),
            max_attempts: max_attempts.max(1),
            backoff,
            processor: Arc::new(processor),
            tx,
            rx: Mutex::new(Some(rx)),
            events,
            shutdown,
            worker: Mutex::new(None),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl DeliveryQueue for MemoryQueue {
    fn start(&self) {
        let Some(mut rx) = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            debug!(namespace = %self.namespace, "queue already running");
            return;
        };
        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let processor = self.processor.clone();
        let events = self.events.clone();
        let max_attempts = self.max_attempts;
        let backoff = self.backoff;
        let namespace = self.namespace.clone();

        info!(namespace = %namespace, "retry queue started");
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    item = rx.recv() => match item {
                        Some(item) => {
                            tokio::spawn(deliver(
                                processor.clone(),
                                item,
                                max_attempts,
                                backoff,
                                events.clone(),
                            ));
                        }
                        None => break,
                    },
                }
            }
            info!(namespace = %namespace, "retry queue stopped");
            rx
        });
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    async fn stop(&self) {
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(handle) = handle else {
            return;
        };
        self.shutdown.send_replace(true);
        match handle.await {
            Ok(rx) => *self.rx.lock().unwrap_or_else(|e| e.into_inner()) = Some(rx),
            Err(e) => warn!(namespace = %self.namespace, error = %e, "queue worker ended abnormally"),
        }
    }

    fn add_item(&self, item: QueueItem) -> Result<(), QueueError> {
        debug!(namespace = %self.namespace, url = %item.url, "queued");
        self.tx.send(item).map_err(|_| QueueError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Processed> {
        self.events.subscribe()
    }
}

async fn deliver(
    processor: Arc<QueueProcessor>,
    mut item: QueueItem,
    max_attempts: u32,
    backoff: Duration,
    events: broadcast::Sender<Processed>,
) {
    let mut attempts = 0;
    let result = loop {
        attempts += 1;
        match processor.process(&mut item).await {
            Ok(resp) => break Ok(resp),
            Err(e) if attempts < max_attempts && is_retryable(&e) => {
                let delay = backoff_for(backoff, attempts);
                warn!(url = %item.url, attempt = attempts, error = %e, delay_ms = delay.as_millis() as u64, "delivery failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(url = %item.url, attempts, error = %e, "delivery abandoned");
                break Err(QueueError::Exhausted {
                    attempts,
                    last_error: e.to_string(),
                });
            }
        }
    };

    // No subscribers is fine
    let _ = events.send(Processed {
        item,
        attempts,
        result,
    });
}
