use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::cookie::{CookieEntry, CookieJar, CookieOptions};
use crate::domain::top_domain;
use crate::local::LocalStore;

/// Which backend a `Storage` settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Cookie,
    Local,
}

impl StorageKind {
    /// Local-file and extension pages get the local store, everything else cookies
    pub fn for_scheme(scheme: &str) -> Self {
        match scheme {
            "file" | "chrome-extension" => StorageKind::Local,
            _ => StorageKind::Cookie,
        }
    }
}

enum Backend {
    Cookie(Arc<dyn CookieJar>),
    Local(Arc<dyn LocalStore>),
}

/// Key/value access for visitor state on one page.
///
/// Failures never escape: a failed write returns `false`, a failed read is a
/// missing value.
pub struct Storage {
    page: Url,
    backend: Backend,
    cookie_domain: OnceCell<Option<String>>,
}

impl Storage {
    /// Pick the backend for `page` once; it does not change afterwards
    pub fn for_page(page: &Url, cookies: Arc<dyn CookieJar>, local: Arc<dyn LocalStore>) -> Self {
        let kind = StorageKind::for_scheme(page.scheme());
        debug!(page = %page, kind = ?kind, "selected storage backend");
        let backend = match kind {
            StorageKind::Cookie => Backend::Cookie(cookies),
            StorageKind::Local => Backend::Local(local),
        };
        Self {
            page: page.clone(),
            backend,
            cookie_domain: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self.backend {
            Backend::Cookie(_) => StorageKind::Cookie,
            Backend::Local(_) => StorageKind::Local,
        }
    }

    pub fn read(&self, key: &str) -> Option<String> {
        match &self.backend {
            Backend::Cookie(jar) => jar.get(key),
            Backend::Local(store) => store.get(key),
        }
    }

    /// Read and decode a JSON value; undecodable data counts as absent
    pub fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring malformed stored value");
                None
            }
        }
    }

    /// Write `value` and verify it reads back.
    ///
    /// Cookies are first written on the widest shareable domain; if that write
    /// is not visible afterwards the cookie is rewritten host-only.
    pub fn write(&self, key: &str, value: &str) -> bool {
        match &self.backend {
            Backend::Local(store) => {
                if let Err(e) = store.set(key, value) {
                    debug!(key = %key, error = %e, "local store write failed");
                    return false;
                }
                store.get(key).as_deref() == Some(value)
            }
            Backend::Cookie(jar) => {
                let domain = self.cookie_domain(jar.as_ref());
                let options = CookieOptions::default().with_domain(domain);
                debug!(key = %key, domain = ?options.domain, "store cookie");
                jar.set(CookieEntry::new(key, value, &options));
                if jar.get(key).as_deref() == Some(value) {
                    return true;
                }

                let options = options.with_domain(None);
                debug!(key = %key, "fallback store cookie host-only");
                jar.set(CookieEntry::new(key, value, &options));
                let stored = jar.get(key).as_deref() == Some(value);
                if !stored {
                    debug!(key = %key, "cookie write not persisted");
                }
                stored
            }
        }
    }

    pub fn remove(&self, key: &str) {
        match &self.backend {
            Backend::Local(store) => {
                if let Err(e) = store.remove(key) {
                    debug!(key = %key, error = %e, "local store remove failed");
                }
            }
            Backend::Cookie(jar) => {
                let domain = self.cookie_domain(jar.as_ref());
                jar.remove(key, &CookieOptions::default().with_domain(domain));
                jar.remove(key, &CookieOptions::default());
            }
        }
    }

    fn cookie_domain(&self, jar: &dyn CookieJar) -> Option<String> {
        self.cookie_domain
            .get_or_init(|| top_domain(&self.page, jar).map(|d| format!(".{}", d)))
            .clone()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("page", &self.page.as_str())
            .field("kind", &self.kind())
            .finish()
    }
}
