use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub const KEY_SETTINGS: &str = "settings";
pub const KEY_SEGMENTS: &str = "segments";
pub const KEY_LAST_CHECKPOINT: &str = "lastCheckpoint";

/// Key-value storage shared by the page side and the calling surface.
///
/// Values are arbitrary JSON. A missing key reads as `None`; removing a
/// missing key is not an error.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}
