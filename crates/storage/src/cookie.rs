use std::time::Duration;

/// One year, the lifetime of every persisted visitor cookie
pub const COOKIE_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Attributes applied when setting a cookie
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    pub max_age: Duration,
    pub secure: bool,
    pub path: String,
    /// `None` writes a host-only cookie
    pub domain: Option<String>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: COOKIE_MAX_AGE,
            secure: false,
            path: "/".to_string(),
            domain: None,
        }
    }
}

impl CookieOptions {
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }
}

/// A cookie as handed to the jar
#[derive(Debug, Clone, PartialEq)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub max_age: Duration,
    pub secure: bool,
    pub path: String,
}

impl CookieEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: &CookieOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: options.domain.clone(),
            max_age: options.max_age,
            secure: options.secure,
            path: options.path.clone(),
        }
    }
}

/// Cookie primitives of the embedding environment.
///
/// Implementations apply the environment's own acceptance policy: a rejected
/// `set` is silent, and is only observable through a subsequent `get`.
pub trait CookieJar: Send + Sync {
    /// Read a cookie visible to the current page
    fn get(&self, name: &str) -> Option<String>;

    /// Set a cookie (silently dropped if the environment rejects it)
    fn set(&self, entry: CookieEntry);

    /// Expire a cookie
    fn remove(&self, name: &str, options: &CookieOptions);
}
