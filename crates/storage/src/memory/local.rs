use dashmap::DashMap;

use crate::error::StorageError;
use crate::local::LocalStore;

pub struct InMemoryLocalStore {
    data: DashMap<String, String>,
}

impl InMemoryLocalStore {
    pub fn new() -> Self {
        Self { data: DashMap::new() }
    }
}

impl Default for InMemoryLocalStore {
    fn default() -> Self { Self::new() }
}

impl LocalStore for InMemoryLocalStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }
}
