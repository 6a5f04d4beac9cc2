// Module declarations
pub mod browser;
pub mod commands;
pub mod error;
pub mod intelligence;
pub mod logging;
pub mod platform;
pub mod relay;
pub mod segments;
pub mod settings;
pub mod storage;

pub use browser::{extract_conversation, ConversationStats, Message, Role};
pub use commands::{ContentHandler, MessagingChannel, PageChannel, PageHost, Request, Response, Status};
pub use error::{CheckpointError, Result};
pub use platform::{classify, classify_url, Platform};
pub use relay::{Clipboard, Relay, RelayConfig, RelayOutcome};
pub use segments::{Segment, SegmentId, SegmentSource, SegmentStore};
pub use settings::{Settings, SettingsManager};
pub use storage::{JsonFileStorage, MemoryStorage, StorageService};
