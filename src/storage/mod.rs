pub mod store;
pub mod memory;
pub mod json_file;

pub use store::{StorageService, KEY_LAST_CHECKPOINT, KEY_SEGMENTS, KEY_SETTINGS};
pub use memory::MemoryStorage;
pub use json_file::JsonFileStorage;
