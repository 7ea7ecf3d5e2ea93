//! tracklet-storage: Key/value persistence for visitor state
//!
//! Cookie and local-store primitives are capabilities supplied by the host
//! (`CookieJar`, `LocalStore`). The `Storage` adapter picks one of them per page
//! and adds the cross-subdomain write policy on top. In-memory and file-backed
//! implementations are provided for tests and sandboxed contexts.

pub mod adapter;
pub mod cookie;
pub mod domain;
pub mod error;
pub mod file;
pub mod local;
pub mod memory;

pub use adapter::{Storage, StorageKind};
pub use cookie::{CookieEntry, CookieJar, CookieOptions, COOKIE_MAX_AGE};
pub use domain::{levels, top_domain};
pub use error::StorageError;
pub use file::FileLocalStore;
pub use local::LocalStore;
pub use memory::{InMemoryCookieJar, InMemoryLocalStore};
