// Text injection into the chat input field
// Tier 1 uses the editor-level insert command so rich editors keep their
// internal state in sync. Tier 2 writes the value or text content directly and
// fires the events frameworks listen for.

use serde::{Deserialize, Serialize};

use super::locator::FieldKind;
use crate::error::{CheckpointError, Result};

/// Which tier ended up writing the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMethod {
    InsertCommand,
    DirectValue,
    DirectTextContent,
}

/// A live editable element on the host page
pub trait EditableField {
    fn kind(&self) -> FieldKind;

    fn focus(&mut self);

    /// Run the editor-level insert-text command. Returns false when the
    /// editor rejects it.
    fn insert_text_command(&mut self, text: &str) -> bool;

    fn set_value(&mut self, text: &str) -> Result<()>;

    fn set_text_content(&mut self, text: &str) -> Result<()>;

    fn dispatch_event(&mut self, name: &str, bubbles: bool);
}

/// Write `text` into `field`, falling back to a direct write when the insert
/// command fails
pub fn inject_text(field: &mut dyn EditableField, text: &str) -> Result<InjectionMethod> {
    field.focus();

    if field.insert_text_command(text) {
        tracing::debug!("Injector: Inserted {} chars via insert command", text.chars().count());
        return Ok(InjectionMethod::InsertCommand);
    }

    tracing::debug!("Injector: Insert command failed, writing directly");
    let method = if field.kind().takes_value() {
        field.set_value(text)?;
        InjectionMethod::DirectValue
    } else {
        field.set_text_content(text)?;
        InjectionMethod::DirectTextContent
    };

    field.dispatch_event("input", true);
    field.dispatch_event("change", true);

    tracing::info!("Injector: Injected {} chars via {:?}", text.chars().count(), method);
    Ok(method)
}

/// Wrap a host failure from either direct-write tier
pub fn injection_failed(reason: impl Into<String>) -> CheckpointError {
    CheckpointError::Injection(reason.into())
}
