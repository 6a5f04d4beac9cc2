use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::store::StorageService;
use crate::error::Result;

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("settings").await.unwrap(), None);

        storage.set("settings", json!({"a": 1})).await.unwrap();
        assert_eq!(storage.get("settings").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(storage.len(), 1);

        storage.remove("settings").await.unwrap();
        storage.remove("settings").await.unwrap();
        assert!(storage.is_empty());
    }
}
