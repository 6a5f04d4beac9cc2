use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::store::StorageService;
use crate::error::{CheckpointError, Result};

/// Storage backed by a single JSON object on disk.
///
/// Reads are served from memory. Every write rewrites the file through a
/// temporary file and an atomic rename, one writer at a time.
pub struct JsonFileStorage {
    path: PathBuf,
    entries: DashMap<String, Value>,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Open the store at `path`, creating the parent directory if needed.
    ///
    /// A missing file starts empty. A file with invalid JSON also starts
    /// empty, with a warning; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CheckpointError::Storage(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }

        let entries = DashMap::new();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| CheckpointError::Storage(format!("Failed to read storage file: {}", e)))?;
            match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => {
                    for (key, value) in map {
                        entries.insert(key, value);
                    }
                }
                Err(e) => {
                    tracing::warn!("Storage: Failed to parse {}: {}. Starting empty.", path.display(), e);
                }
            }
        }

        tracing::debug!("Storage: Opened {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path,
            entries,
            write_lock: Mutex::new(()),
        })
    }

    /// `<data dir>/checkpoint-relay/storage.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("checkpoint-relay").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    async fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| CheckpointError::Storage(format!("Failed to serialize storage: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to write temporary storage file: {}", e)))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to rename storage file: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl StorageService for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush().await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage.set("segments", json!([{"id": 1}])).await.unwrap();
        storage.set("lastCheckpoint", json!({"checkpoint": "x"})).await.unwrap();
        storage.remove("lastCheckpoint").await.unwrap();

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("segments").await.unwrap(), Some(json!([{"id": 1}])));
        assert_eq!(reopened.get("lastCheckpoint").await.unwrap(), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_invalid_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = JsonFileStorage::open(&path).unwrap();
        assert_eq!(storage.get("settings").await.unwrap(), None);

        storage.set("settings", json!({})).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<Value>(&contents).is_ok());
    }
}
