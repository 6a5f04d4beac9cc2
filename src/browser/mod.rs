// Page-side module: reads chat page snapshots, extracts and cleans the
// conversation, finds the input controls and watches for checkpoint completion

pub mod cleaner;
pub mod dom;
pub mod extractors;
pub mod injector;
pub mod locator;
pub mod watcher;

pub use extractors::{extract_conversation, ConversationStats, Message, Role};
pub use injector::{inject_text, EditableField, InjectionMethod};
pub use locator::{find_input_field, find_send_control, FieldKind, LocatedElement};
pub use watcher::{wait_for_checkpoint, TargetTextSource, WatchConfig, CHECKPOINT_END, CHECKPOINT_START};
