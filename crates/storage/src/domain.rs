//! Registrable ("top") domain discovery by cookie probing
//!
//! The widest domain a cookie can be shared on is whatever the environment
//! accepts: public suffixes are refused by the jar itself, so probing candidate
//! domains from the shortest up finds the registrable domain without a suffix
//! list.

use tracing::debug;
use url::{Host, Url};

use crate::cookie::{CookieEntry, CookieJar, CookieOptions};

const PROBE_COOKIE: &str = "__tld__";

/// Candidate cookie domains for `url`, shortest first.
///
/// `https://a.b.example.com` yields `example.com`, `b.example.com`,
/// `a.b.example.com`. IP literals and single-label hosts yield nothing.
pub fn levels(url: &Url) -> Vec<String> {
    let host = match url.host() {
        Some(Host::Domain(host)) => host,
        _ => return Vec::new(),
    };

    let parts: Vec<&str> = host.split('.').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 1 {
        return Vec::new();
    }

    (0..parts.len() - 1)
        .rev()
        .map(|i| parts[i..].join("."))
        .collect()
}

/// Widest domain on which `jar` accepts a cookie for `url`, without leading dot
pub fn top_domain(url: &Url, jar: &dyn CookieJar) -> Option<String> {
    for level in levels(url) {
        let options = CookieOptions::default().with_domain(Some(format!(".{}", level)));
        jar.set(CookieEntry::new(PROBE_COOKIE, "1", &options));
        if jar.get(PROBE_COOKIE).is_some() {
            jar.remove(PROBE_COOKIE, &options);
            debug!(url = %url, domain = %level, "resolved top domain");
            return Some(level);
        }
    }
    debug!(url = %url, "no shareable cookie domain");
    None
}
