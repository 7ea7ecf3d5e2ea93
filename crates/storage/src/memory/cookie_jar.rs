use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::cookie::{CookieEntry, CookieJar, CookieOptions};

const DEFAULT_PUBLIC_SUFFIXES: &[&str] = &["co.uk", "com.au", "co.jp", "github.io"];

/// Cookie jar that applies a browser-like domain policy for one page host.
///
/// A `Domain` attribute is accepted only if it domain-matches the host, has at
/// least two labels and is not a listed public suffix. IP hosts only accept
/// their own address.
pub struct InMemoryCookieJar {
    host: String,
    public_suffixes: Vec<String>,
    cookies: DashMap<String, CookieEntry>,
    blocked: AtomicBool,
    sets: AtomicUsize,
}

impl InMemoryCookieJar {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            public_suffixes: DEFAULT_PUBLIC_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            cookies: DashMap::new(),
            blocked: AtomicBool::new(false),
            sets: AtomicUsize::new(0),
        }
    }

    pub fn with_public_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_suffixes
            .extend(suffixes.into_iter().map(|s| s.into().to_ascii_lowercase()));
        self
    }

    /// Refuse every write, as with cookies disabled
    pub fn block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    /// Stored entry, including the attributes it was accepted with
    pub fn entry(&self, name: &str) -> Option<CookieEntry> {
        self.cookies.get(name).map(|e| e.value().clone())
    }

    /// Number of `set` calls seen, accepted or not
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn accepts_domain(&self, domain: &str) -> bool {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        if self.host.parse::<IpAddr>().is_ok() {
            return domain == self.host;
        }
        if !domain.contains('.') || self.public_suffixes.iter().any(|s| *s == domain) {
            return false;
        }
        self.host == domain || self.host.ends_with(&format!(".{}", domain))
    }
}

impl CookieJar for InMemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|e| e.value.clone())
    }

    fn set(&self, entry: CookieEntry) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.blocked.load(Ordering::SeqCst) {
            return;
        }
        if let Some(domain) = entry.domain.as_deref() {
            if !domain.is_empty() && !self.accepts_domain(domain) {
                return;
            }
        }
        if entry.max_age == Duration::ZERO {
            self.cookies.remove(&entry.name);
            return;
        }
        self.cookies.insert(entry.name.clone(), entry);
    }

    fn remove(&self, name: &str, _options: &CookieOptions) {
        self.cookies.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_domain(domain: &str) -> CookieOptions {
        CookieOptions::default().with_domain(Some(domain.to_string()))
    }

    #[test]
    fn test_accepts_parent_domain() {
        let jar = InMemoryCookieJar::new("app.example.com");
        jar.set(CookieEntry::new("k", "v", &with_domain(".example.com")));
        assert_eq!(jar.get("k"), Some("v".to_string()));
        assert_eq!(jar.entry("k").unwrap().domain, Some(".example.com".to_string()));
    }

    #[test]
    fn test_rejects_foreign_and_suffix_domains() {
        let jar = InMemoryCookieJar::new("app.example.co.uk");
        jar.set(CookieEntry::new("a", "v", &with_domain(".other.com")));
        jar.set(CookieEntry::new("b", "v", &with_domain(".co.uk")));
        jar.set(CookieEntry::new("c", "v", &with_domain(".uk")));
        assert!(jar.get("a").is_none());
        assert!(jar.get("b").is_none());
        assert!(jar.get("c").is_none());
        assert_eq!(jar.set_count(), 3);
    }

    #[test]
    fn test_host_only_always_accepted() {
        let jar = InMemoryCookieJar::new("dev");
        jar.set(CookieEntry::new("k", "v", &CookieOptions::default()));
        assert_eq!(jar.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_blocked_jar_drops_writes() {
        let jar = InMemoryCookieJar::new("app.example.com");
        jar.block();
        jar.set(CookieEntry::new("k", "v", &CookieOptions::default()));
        assert!(jar.get("k").is_none());
    }
}
