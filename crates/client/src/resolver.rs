//! Cross-domain identifier resolution
//!
//! Every configured peer outside the page's own top-level domain is asked for
//! the visitor's id concurrently. The first peer that answers with an id wins;
//! the remaining lookups run to completion in the background and are ignored.
//! If every peer answers cleanly with "no id", a fresh id is minted here. If any
//! peer failed and none produced an id, resolution fails instead of minting, so
//! a visitor whose id lives on an unreachable peer does not get a second one.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};
use tracklet_config::Settings;
use tracklet_storage::Storage;
use uuid::Uuid;

use crate::error::{LookupError, ResolveError};
use crate::lookup::PeerLookup;
use crate::page::Page;

pub const XID_KEY: &str = "seg_xid";
pub const XID_FROM_DOMAIN_KEY: &str = "seg_xid_fd";
pub const XID_TIMESTAMP_KEY: &str = "seg_xid_ts";

/// Deprecated key → current key
const LEGACY_KEYS: [(&str, &str); 3] = [
    ("segment_cross_domain_id", XID_KEY),
    ("segment_cross_domain_id_from_domain", XID_FROM_DOMAIN_KEY),
    ("segment_cross_domain_id_timestamp", XID_TIMESTAMP_KEY),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub cross_domain_id: String,
    /// Peer that supplied the id, or the page host when minted locally
    pub from_domain: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverState {
    Idle,
    Racing,
    Resolved(Resolution),
    Failed(ResolveError),
}

/// Top-level domain used for peer de-duplication: the last two labels, port stripped.
/// IP literals are returned whole.
pub fn top_level_domain(domain: &str) -> String {
    if let Ok(ip) = domain.parse::<IpAddr>() {
        return ip.to_string();
    }
    if let Ok(addr) = domain.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    let host = domain.rsplit_once(':').map_or(domain, |(host, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) {
            host
        } else {
            domain
        }
    });
    if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return ip.to_string();
    }
    let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    let start = labels.len().saturating_sub(2);
    labels[start..].join(".").to_ascii_lowercase()
}

/// Peers worth asking: those outside the page's top-level domain, in order, without repeats
pub fn candidates(servers: &[String], page_host: &str) -> Vec<String> {
    let own = top_level_domain(page_host);
    let mut out: Vec<String> = Vec::with_capacity(servers.len());
    for server in servers {
        let server = server.trim();
        if server.is_empty() || top_level_domain(server) == own {
            continue;
        }
        if !out.iter().any(|s| s.eq_ignore_ascii_case(server)) {
            out.push(server.to_string());
        }
    }
    out
}

/// Move values from the deprecated keys to the current ones, once.
///
/// Returns whether anything was migrated.
pub fn migrate_legacy(storage: &Storage) -> bool {
    let Some(legacy_id) = storage.read(LEGACY_KEYS[0].0).filter(|v| !v.is_empty()) else {
        return false;
    };
    debug!(cross_domain_id = %legacy_id, "migrating legacy cross-domain id");
    for (old, new) in LEGACY_KEYS {
        if let Some(value) = storage.read(old) {
            storage.write(new, &value);
        }
        storage.remove(old);
    }
    true
}

/// The resolution persisted by an earlier page load, if any
pub fn cached(storage: &Storage) -> Option<Resolution> {
    let cross_domain_id = storage.read(XID_KEY).filter(|v| !v.is_empty())?;
    let from_domain = storage.read(XID_FROM_DOMAIN_KEY).unwrap_or_default();
    let resolved_at = storage
        .read(XID_TIMESTAMP_KEY)
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    Some(Resolution {
        cross_domain_id,
        from_domain,
        resolved_at,
    })
}

/// Outcome of the race once it is decided
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Found { domain: String, id: String },
    Mint,
    Fail { domain: String, error: LookupError },
}

/// Counter-and-first-wins bookkeeping for the lookup race.
///
/// `record` returns a verdict at most once: on the first answer carrying an id,
/// or when the last outstanding lookup finishes without one.
#[derive(Debug)]
pub struct RaceTally {
    issued: usize,
    finished: usize,
    decided: bool,
    last_error: Option<(String, LookupError)>,
}

impl RaceTally {
    pub fn new(issued: usize) -> Self {
        Self {
            issued,
            finished: 0,
            decided: false,
            last_error: None,
        }
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn record(
        &mut self,
        domain: &str,
        result: Result<Option<String>, LookupError>,
    ) -> Option<Verdict> {
        self.finished += 1;
        match result {
            Err(error) => self.last_error = Some((domain.to_string(), error)),
            Ok(Some(id)) if !self.decided => {
                self.decided = true;
                return Some(Verdict::Found {
                    domain: domain.to_string(),
                    id,
                });
            }
            Ok(_) => {}
        }

        if self.decided || self.finished < self.issued {
            return None;
        }
        self.decided = true;
        Some(self.conclusion())
    }

    /// Verdict when nobody produced an id: any error fails the race, clean misses mint
    pub fn conclusion(&self) -> Verdict {
        match &self.last_error {
            Some((domain, error)) => Verdict::Fail {
                domain: domain.clone(),
                error: error.clone(),
            },
            None => Verdict::Mint,
        }
    }
}

pub struct CrossDomainResolver {
    settings: Arc<Settings>,
    page: Page,
    storage: Arc<Storage>,
    lookup: Arc<dyn PeerLookup>,
    state: Mutex<ResolverState>,
}

impl CrossDomainResolver {
    pub fn new(
        settings: Arc<Settings>,
        page: Page,
        storage: Arc<Storage>,
        lookup: Arc<dyn PeerLookup>,
    ) -> Self {
        Self {
            settings,
            page,
            storage,
            lookup,
            state: Mutex::new(ResolverState::Idle),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_state(&self, state: ResolverState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Take over a resolution found in storage; the resolver will not race afterwards
    pub fn adopt(&self, resolution: Resolution) {
        debug!(cross_domain_id = %resolution.cross_domain_id, "adopting stored cross-domain id");
        self.set_state(ResolverState::Resolved(resolution));
    }

    /// Run the race and persist the winner.
    ///
    /// A resolver that already resolved, or finds an id in storage, returns it
    /// again without racing; one that failed may be re-run. Dropping the
    /// returned future mid-race puts the resolver back to `Idle`.
    pub async fn resolve(&self) -> Result<Resolution, ResolveError> {
        if !self.settings.cross_domain_enabled() {
            return Err(ResolveError::NotEnabled);
        }
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let ResolverState::Resolved(resolution) = &*state {
                return Ok(resolution.clone());
            }
            if *state == ResolverState::Racing {
                return Err(ResolveError::InProgress);
            }
            if let Some(stored) = cached(&self.storage) {
                *state = ResolverState::Resolved(stored.clone());
                return Ok(stored);
            }
            *state = ResolverState::Racing;
        }
        let mut guard = RacingGuard {
            state: &self.state,
            settled: false,
        };

        let peers = candidates(&self.settings.cross_domain_id_servers, &self.page.host());
        let outcome = if peers.is_empty() {
            debug!(host = %self.page.host(), "no peers outside own domain, minting");
            Ok(self.mint())
        } else {
            self.race(peers).await
        };

        match &outcome {
            Ok(resolution) => {
                self.persist(resolution);
                info!(
                    cross_domain_id = %resolution.cross_domain_id,
                    from_domain = %resolution.from_domain,
                    "cross-domain id resolved"
                );
                self.set_state(ResolverState::Resolved(resolution.clone()));
            }
            Err(e) => {
                warn!(error = %e, "cross-domain id resolution failed");
                self.set_state(ResolverState::Failed(e.clone()));
            }
        }
        guard.settled = true;
        outcome
    }

    async fn race(&self, peers: Vec<String>) -> Result<Resolution, ResolveError> {
        let timeout = self.settings.lookup_timeout();
        let mut pending = FuturesUnordered::new();
        for domain in peers {
            let lookup = self.lookup.clone();
            let write_key = self.settings.api_key.clone();
            pending.push(async move {
                let result = lookup_with_timeout(lookup.as_ref(), &domain, &write_key, timeout).await;
                (domain, result)
            });
        }

        let mut tally = RaceTally::new(pending.len());
        debug!(issued = pending.len(), "cross-domain lookups issued");

        while let Some((domain, result)) = pending.next().await {
            if let Err(e) = &result {
                warn!(domain = %domain, error = %e, "cross-domain lookup failed");
            }
            let Some(verdict) = tally.record(&domain, result) else {
                continue;
            };

            if !pending.is_empty() {
                debug!(outstanding = pending.len(), "race decided, draining remaining lookups");
                tokio::spawn(async move {
                    while let Some((domain, result)) = pending.next().await {
                        debug!(domain = %domain, result = ?result, "ignoring late lookup answer");
                    }
                });
            }
            return self.settle(verdict);
        }

        self.settle(tally.conclusion())
    }

    fn settle(&self, verdict: Verdict) -> Result<Resolution, ResolveError> {
        match verdict {
            Verdict::Found { domain, id } => Ok(Resolution {
                cross_domain_id: id,
                from_domain: domain,
                resolved_at: Utc::now(),
            }),
            Verdict::Mint => Ok(self.mint()),
            Verdict::Fail { domain, error } => Err(ResolveError::Lookup {
                domain,
                source: error,
            }),
        }
    }

    fn mint(&self) -> Resolution {
        Resolution {
            cross_domain_id: Uuid::new_v4().to_string(),
            from_domain: self.page.host(),
            resolved_at: Utc::now(),
        }
    }

    fn persist(&self, resolution: &Resolution) {
        self.storage.write(XID_KEY, &resolution.cross_domain_id);
        self.storage.write(XID_FROM_DOMAIN_KEY, &resolution.from_domain);
        self.storage.write(
            XID_TIMESTAMP_KEY,
            &resolution.resolved_at.timestamp_millis().to_string(),
        );
    }
}

/// Resets an abandoned race to `Idle`
struct RacingGuard<'a> {
    state: &'a Mutex<ResolverState>,
    settled: bool,
}

impl Drop for RacingGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ResolverState::Racing {
            debug!("cross-domain race abandoned");
            *state = ResolverState::Idle;
        }
    }
}

async fn lookup_with_timeout(
    lookup: &dyn PeerLookup,
    domain: &str,
    write_key: &str,
    timeout: Duration,
) -> Result<Option<String>, LookupError> {
    match tokio::time::timeout(timeout, lookup.lookup(domain, write_key)).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{memory_storage, test_settings, MockLookup};

    fn resolver_with(
        servers: &[&str],
        page_url: &str,
        lookup: Arc<MockLookup>,
    ) -> (CrossDomainResolver, Arc<Storage>) {
        let mut settings = test_settings("k1");
        settings.cross_domain_id_servers = servers.iter().map(|s| s.to_string()).collect();
        settings.lookup_timeout_ms = 1_000;
        let page = Page::parse(page_url, "test-agent").unwrap();
        let storage = Arc::new(memory_storage(&page.url));
        let resolver =
            CrossDomainResolver::new(Arc::new(settings), page, storage.clone(), lookup);
        (resolver, storage)
    }

    fn lookup_error() -> LookupError {
        LookupError::Status {
            status: 500,
            reason: "Internal Server Error".to_string(),
        }
    }

    // =========================================================================
    // Tally
    // =========================================================================

    #[test]
    fn test_tally_first_id_wins() {
        let mut tally = RaceTally::new(3);
        assert_eq!(tally.record("b.example", Ok(None)), None);
        assert_eq!(
            tally.record("a.example", Ok(Some("X".to_string()))),
            Some(Verdict::Found {
                domain: "a.example".to_string(),
                id: "X".to_string()
            })
        );
        assert_eq!(tally.record("c.example", Ok(Some("Y".to_string()))), None);
        assert_eq!(tally.finished(), 3);
    }

    #[test]
    fn test_tally_all_clean_misses_mint() {
        let mut tally = RaceTally::new(2);
        assert_eq!(tally.record("a.example", Ok(None)), None);
        assert_eq!(tally.record("b.example", Ok(None)), Some(Verdict::Mint));
    }

    #[test]
    fn test_tally_error_blocks_mint_and_keeps_last_error() {
        let first = LookupError::Connection("reset".to_string());
        let mut tally = RaceTally::new(3);
        assert_eq!(tally.record("a.example", Err(first)), None);
        assert_eq!(tally.record("b.example", Err(lookup_error())), None);
        assert_eq!(
            tally.record("c.example", Ok(None)),
            Some(Verdict::Fail {
                domain: "b.example".to_string(),
                error: lookup_error()
            })
        );
    }

    #[test]
    fn test_tally_success_after_error_still_wins() {
        let mut tally = RaceTally::new(2);
        assert_eq!(tally.record("a.example", Err(lookup_error())), None);
        assert!(matches!(
            tally.record("b.example", Ok(Some("X".to_string()))),
            Some(Verdict::Found { .. })
        ));
    }

    #[test]
    fn test_tally_empty_id_is_not_a_win() {
        let mut tally = RaceTally::new(1);
        assert_eq!(tally.record("a.example", Ok(None)), Some(Verdict::Mint));
    }

    // =========================================================================
    // Candidates and persistence
    // =========================================================================

    #[test]
    fn test_top_level_domain() {
        assert_eq!(top_level_domain("app.example.com"), "example.com");
        assert_eq!(top_level_domain("example.com"), "example.com");
        assert_eq!(top_level_domain("a.example"), "a.example");
        assert_eq!(top_level_domain("shop.example.com:8443"), "example.com");
        assert_eq!(top_level_domain("localhost"), "localhost");
        assert_eq!(top_level_domain("192.168.0.1"), "192.168.0.1");
        assert_eq!(top_level_domain("10.0.0.1:8080"), "10.0.0.1");
        assert_eq!(top_level_domain("[::1]:8080"), "::1");
    }

    #[test]
    fn test_candidates_keep_foreign_ip_peers() {
        let servers = vec!["192.168.0.1".to_string(), "10.0.0.1:9000".to_string()];
        assert_eq!(candidates(&servers, "10.0.0.1"), vec!["192.168.0.1"]);
    }

    #[test]
    fn test_candidates_exclude_own_domain_and_repeats() {
        let servers: Vec<String> = ["example.com", "shop.example.com", "other.org", "OTHER.org", "", "third.net"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            candidates(&servers, "www.example.com"),
            vec!["other.org", "third.net"]
        );
    }

    #[test]
    fn test_migrate_legacy_moves_values_once() {
        let page = Page::parse("https://app.example.com/", "ua").unwrap();
        let storage = memory_storage(&page.url);
        storage.write("segment_cross_domain_id", "OLD");
        storage.write("segment_cross_domain_id_from_domain", "a.example");
        storage.write("segment_cross_domain_id_timestamp", "1700000000000");

        assert!(migrate_legacy(&storage));
        assert_eq!(storage.read(XID_KEY).as_deref(), Some("OLD"));
        assert_eq!(storage.read(XID_FROM_DOMAIN_KEY).as_deref(), Some("a.example"));
        assert_eq!(storage.read(XID_TIMESTAMP_KEY).as_deref(), Some("1700000000000"));
        assert!(storage.read("segment_cross_domain_id").is_none());
        assert!(storage.read("segment_cross_domain_id_from_domain").is_none());

        assert!(!migrate_legacy(&storage));
        assert_eq!(storage.read(XID_KEY).as_deref(), Some("OLD"));

        let resolution = cached(&storage).unwrap();
        assert_eq!(resolution.cross_domain_id, "OLD");
        assert_eq!(resolution.from_domain, "a.example");
        assert_eq!(resolution.resolved_at.timestamp_millis(), 1_700_000_000_000);
    }

    // =========================================================================
    // Race
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_first_peer_with_id_wins() {
        let lookup = Arc::new(
            MockLookup::new()
                .answer("a.example", Duration::from_millis(10), Ok(Some("X".to_string())))
                .answer("b.example", Duration::from_millis(50), Ok(None)),
        );
        let (resolver, storage) =
            resolver_with(&["a.example", "b.example"], "https://app.example/", lookup.clone());

        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.cross_domain_id, "X");
        assert_eq!(resolution.from_domain, "a.example");
        assert_eq!(resolver.state(), ResolverState::Resolved(resolution.clone()));
        assert_eq!(storage.read(XID_KEY).as_deref(), Some("X"));
        assert_eq!(storage.read(XID_FROM_DOMAIN_KEY).as_deref(), Some("a.example"));
        assert!(storage.read(XID_TIMESTAMP_KEY).is_some());
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_independent_of_other_completions() {
        let lookup = Arc::new(
            MockLookup::new()
                .answer("b.example", Duration::from_millis(5), Ok(None))
                .answer("c.example", Duration::from_millis(10), Err(lookup_error()))
                .answer("a.example", Duration::from_millis(40), Ok(Some("X".to_string()))),
        );
        let (resolver, _) = resolver_with(
            &["a.example", "b.example", "c.example"],
            "https://app.example/",
            lookup,
        );

        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.cross_domain_id, "X");
        assert_eq!(resolution.from_domain, "a.example");
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_success_ignored_and_not_cancelled() {
        let lookup = Arc::new(
            MockLookup::new()
                .answer("a.example", Duration::from_millis(10), Ok(Some("FIRST".to_string())))
                .answer("b.example", Duration::from_millis(500), Ok(Some("SECOND".to_string()))),
        );
        let (resolver, storage) =
            resolver_with(&["a.example", "b.example"], "https://app.example/", lookup.clone());

        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.cross_domain_id, "FIRST");
        assert_eq!(lookup.completed(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(lookup.completed(), 2);
        assert_eq!(storage.read(XID_KEY).as_deref(), Some("FIRST"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_clean_misses_mint_locally() {
        let lookup = Arc::new(
            MockLookup::new()
                .answer("a.example", Duration::from_millis(10), Ok(None))
                .answer("b.example", Duration::from_millis(20), Ok(None)),
        );
        let (resolver, storage) =
            resolver_with(&["a.example", "b.example"], "https://app.example/", lookup);

        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.from_domain, "app.example");
        assert!(Uuid::parse_str(&resolution.cross_domain_id).is_ok());
        assert_eq!(
            storage.read(XID_KEY).as_deref(),
            Some(resolution.cross_domain_id.as_str())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_without_id_fails_and_does_not_mint() {
        let lookup = Arc::new(
            MockLookup::new()
                .answer("a.example", Duration::from_millis(10), Err(lookup_error()))
                .answer("b.example", Duration::from_millis(20), Ok(None)),
        );
        let (resolver, storage) =
            resolver_with(&["a.example", "b.example"], "https://app.example/", lookup);

        let err = resolver.resolve().await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::Lookup {
                domain: "a.example".to_string(),
                source: lookup_error()
            }
        );
        assert!(matches!(resolver.state(), ResolverState::Failed(_)));
        assert!(storage.read(XID_KEY).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_peer_times_out_as_error() {
        // b.example has no scripted answer and never responds
        let lookup = Arc::new(
            MockLookup::new().answer("a.example", Duration::from_millis(10), Ok(None)),
        );
        let (resolver, _) =
            resolver_with(&["a.example", "b.example"], "https://app.example/", lookup);

        let err = resolver.resolve().await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::Lookup {
                domain: "b.example".to_string(),
                source: LookupError::Timeout { timeout_ms: 1_000 }
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_candidates_mints_without_lookups() {
        let lookup = Arc::new(MockLookup::new());
        let (resolver, _) = resolver_with(
            &["example.com", "cdn.example.com"],
            "https://www.example.com/",
            lookup.clone(),
        );

        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.from_domain, "www.example.com");
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resolution_can_be_retried() {
        let lookup = Arc::new(
            MockLookup::new().answer("a.example", Duration::from_millis(10), Err(lookup_error())),
        );
        let (resolver, _) = resolver_with(&["a.example"], "https://app.example/", lookup.clone());
        assert!(resolver.resolve().await.is_err());

        lookup.set_answer("a.example", Duration::from_millis(10), Ok(Some("X".to_string())));
        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.cross_domain_id, "X");

        // resolved ids are immutable
        lookup.set_answer("a.example", Duration::from_millis(10), Ok(Some("Y".to_string())));
        assert_eq!(resolver.resolve().await.unwrap().cross_domain_id, "X");
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_race_can_be_restarted() {
        let lookup = Arc::new(
            MockLookup::new().answer("a.example", Duration::from_millis(500), Ok(Some("X".to_string()))),
        );
        let (resolver, _) = resolver_with(&["a.example"], "https://app.example/", lookup);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), resolver.resolve()).await;
        assert!(abandoned.is_err());
        assert_eq!(resolver.state(), ResolverState::Idle);

        let resolution = resolver.resolve().await.unwrap();
        assert_eq!(resolution.cross_domain_id, "X");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_id_is_not_raced_again() {
        let lookup = Arc::new(
            MockLookup::new().answer("a.example", Duration::from_millis(10), Ok(Some("NEW".to_string()))),
        );
        let (resolver, storage) =
            resolver_with(&["a.example"], "https://app.example/", lookup.clone());
        storage.write(XID_KEY, "STORED");

        assert_eq!(resolver.resolve().await.unwrap().cross_domain_id, "STORED");
        assert_eq!(lookup.calls(), 0);
        assert_eq!(storage.read(XID_KEY).as_deref(), Some("STORED"));
    }

    #[tokio::test]
    async fn test_disabled_without_servers() {
        let (resolver, _) = resolver_with(&[], "https://app.example/", Arc::new(MockLookup::new()));
        assert_eq!(resolver.resolve().await, Err(ResolveError::NotEnabled));
        assert_eq!(resolver.state(), ResolverState::Idle);
    }
}
