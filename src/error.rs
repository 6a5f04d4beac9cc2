use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Error types for the extraction, checkpoint and segment pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointError {
    /// No editable input field matched any selector for the platform
    InputNotFound,

    /// No enabled send control matched any selector for the platform
    SendControlNotFound,

    /// No AI message element could be located on the page
    MessageNotFound,

    /// The completion watcher exceeded its time budget
    Timeout { elapsed: Duration },

    /// Terminal markers missing, out of order, or payload implausibly short
    MalformedPayload(String),

    /// The text-generation service returned a non-success response
    RemoteService {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Storage service read or write failed
    Storage(String),

    /// Messaging channel failed to deliver a request or response
    Messaging(String),

    /// Both text injection tiers failed
    Injection(String),

    /// Settings failed validation
    InvalidSettings(String),

    /// Manual absorb was requested with an empty selection
    NothingSelected,
}

impl Display for CheckpointError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CheckpointError::InputNotFound => {
                write!(f, "Could not find input field. Try manual mode or refresh the page.")
            }
            CheckpointError::SendControlNotFound => {
                write!(f, "Could not find an enabled send button")
            }
            CheckpointError::MessageNotFound => {
                write!(f, "No AI message found on the page")
            }
            CheckpointError::Timeout { elapsed } => {
                write!(f, "Timeout waiting for AI response after {}ms", elapsed.as_millis())
            }
            CheckpointError::MalformedPayload(reason) => {
                write!(f, "Checkpoint extraction failed: {}", reason)
            }
            CheckpointError::RemoteService { provider, status, message } => match status {
                Some(code) => write!(f, "{} API failed ({}): {}", provider, code, message),
                None => write!(f, "{} API failed: {}", provider, message),
            },
            CheckpointError::Storage(msg) => {
                write!(f, "Storage operation failed: {}", msg)
            }
            CheckpointError::Messaging(msg) => {
                write!(f, "Messaging channel error: {}", msg)
            }
            CheckpointError::Injection(msg) => {
                write!(f, "Text injection failed: {}", msg)
            }
            CheckpointError::InvalidSettings(msg) => {
                write!(f, "Invalid settings: {}", msg)
            }
            CheckpointError::NothingSelected => {
                write!(f, "Please select some text first.")
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

impl CheckpointError {
    /// Timeouts, malformed payloads and a reply that never appeared share the
    /// same recovery path: select the response manually.
    pub fn is_timeout_like(&self) -> bool {
        matches!(
            self,
            CheckpointError::Timeout { .. }
                | CheckpointError::MalformedPayload(_)
                | CheckpointError::MessageNotFound
        )
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
