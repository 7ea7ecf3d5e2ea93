//! In-memory implementations for testing
pub mod cookie_jar;
pub mod local;

pub use cookie_jar::InMemoryCookieJar;
pub use local::InMemoryLocalStore;
