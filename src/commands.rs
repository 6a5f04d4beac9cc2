// Messaging contract between the calling surface and the chat page, and the
// page-side handlers that serve it

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::browser::cleaner;
use crate::browser::extractors::{extract_conversation_from_html, ConversationStats, Message};
use crate::browser::injector::{inject_text, EditableField};
use crate::browser::locator::{self, FieldKind};
use crate::browser::watcher::{self, TargetTextSource, WatchConfig};
use crate::error::{CheckpointError, Result};
use crate::intelligence::prompts;
use crate::platform::{self, Platform};
use crate::segments::store::{combine, Segment};
use crate::storage::{StorageService, KEY_LAST_CHECKPOINT, KEY_SEGMENTS};

/// Request sent to the page, discriminated by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    AutoCompress {
        #[serde(rename = "customPrompt", default, skip_serializing_if = "Option::is_none")]
        custom_prompt: Option<String>,
        #[serde(rename = "autoSend", default = "default_auto_send")]
        auto_send: bool,
    },
    ManualAbsorb,
    Inject {
        text: String,
    },
    GetStats,
    GetConversation,
    /// Keyboard shortcut: inject the saved segments without opening the UI
    KeyboardInject,
}

fn default_auto_send() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    Timeout,
    PendingSend,
    Clipboard,
}

/// Tagged response; every failure on the page side ends up here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ConversationStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Vec<Message>>,
}

impl Response {
    fn with_status(status: Status) -> Self {
        Self {
            status,
            message: None,
            checkpoint: None,
            timestamp: None,
            platform: None,
            stats: None,
            conversation: None,
        }
    }

    pub fn success() -> Self {
        Self::with_status(Status::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(Status::Error).with_message(message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::with_status(Status::Timeout).with_message(message)
    }

    pub fn pending_send(message: impl Into<String>) -> Self {
        Self::with_status(Status::PendingSend).with_message(message)
    }

    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::with_status(Status::Clipboard).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        self.checkpoint = Some(checkpoint.into());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<CheckpointError> for Response {
    fn from(error: CheckpointError) -> Self {
        if error.is_timeout_like() {
            Response::timeout("AI response timeout. Please select the response manually.")
        } else {
            Response::error(error.to_string())
        }
    }
}

/// Checkpoint written by the page after a successful in-chat compression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCheckpoint {
    pub checkpoint: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub platform: Platform,
}

/// The live chat page, as seen from the handlers
#[async_trait]
pub trait PageHost: Send + Sync {
    fn hostname(&self) -> String;

    /// Current serialized DOM
    async fn document_html(&self) -> Result<String>;

    async fn selected_text(&self) -> Result<String>;

    /// Live handle to the element matched by `selector`
    fn editable_field(&self, selector: &str, kind: FieldKind) -> Option<Box<dyn EditableField + Send>>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn write_clipboard(&self, text: &str) -> Result<()>;
}

/// Request/response channel from the calling surface to a page
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Re-reads the page on every watcher tick
struct PageTextSource<'a> {
    host: &'a dyn PageHost,
    platform: Platform,
}

#[async_trait]
impl TargetTextSource for PageTextSource<'_> {
    async fn current_text(&self) -> Option<String> {
        match self.host.document_html().await {
            Ok(html) => watcher::locate_target_text_in_html(&html, self.platform),
            Err(e) => {
                tracing::debug!("Watcher: Page read failed: {}", e);
                None
            }
        }
    }
}

/// Page-side request handlers
pub struct ContentHandler {
    host: Arc<dyn PageHost>,
    storage: Arc<dyn StorageService>,
    config: WatchConfig,
}

impl ContentHandler {
    pub fn new(host: Arc<dyn PageHost>, storage: Arc<dyn StorageService>) -> Self {
        Self {
            host,
            storage,
            config: WatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform(&self) -> Platform {
        platform::classify(&self.host.hostname())
    }

    /// Serve one request. Never fails; errors come back as tagged responses.
    pub async fn handle(&self, request: Request) -> Response {
        tracing::debug!("Content: Received {:?}", request);
        let result = match request {
            Request::AutoCompress {
                custom_prompt,
                auto_send,
            } => self.auto_compress(custom_prompt, auto_send).await,
            Request::ManualAbsorb => self.manual_absorb().await,
            Request::Inject { text } => self.inject(&text).await,
            Request::GetStats => self.get_stats().await,
            Request::GetConversation => self.get_conversation().await,
            Request::KeyboardInject => self.keyboard_inject().await,
        };

        result.unwrap_or_else(|e| {
            tracing::error!("Content: Request failed: {}", e);
            Response::from(e)
        })
    }

    /// Wire entry point: decode a JSON request and encode the response
    pub async fn handle_json(&self, request: Value) -> Value {
        let response = match serde_json::from_value::<Request>(request) {
            Ok(request) => self.handle(request).await,
            Err(e) => Response::error(format!("Unknown request: {}", e)),
        };
        serde_json::to_value(&response).unwrap_or(Value::Null)
    }

    /// Inject `text` into the page's input field
    async fn write_to_input(&self, text: &str) -> Result<()> {
        let html = self.host.document_html().await?;
        let (selector, kind) =
            locator::input_field_selector(&html, self.platform()).ok_or(CheckpointError::InputNotFound)?;
        let mut field = self
            .host
            .editable_field(selector, kind)
            .ok_or(CheckpointError::InputNotFound)?;
        inject_text(field.as_mut(), text)?;
        Ok(())
    }

    async fn auto_compress(&self, custom_prompt: Option<String>, auto_send: bool) -> Result<Response> {
        let platform = self.platform();
        tracing::info!("Content: Starting auto-compression on {}", platform);

        let prompt = custom_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(prompts::default_compression_prompt);
        self.write_to_input(&prompt).await?;
        tokio::time::sleep(self.config.settle_delay).await;

        if !auto_send {
            return Ok(Response::pending_send("Prompt injected. Click Send when ready."));
        }

        let html = self.host.document_html().await?;
        let clicked = match locator::send_control_selector(&html, platform) {
            Some(send) => self.host.click(send).await,
            None => Err(CheckpointError::SendControlNotFound),
        };
        if let Err(e) = clicked {
            tracing::warn!("Content: {}, leaving send to the user", e);
            return Ok(Response::pending_send(
                "Prompt injected. Please click Send, then select the AI response.",
            ));
        }

        let source = PageTextSource {
            host: self.host.as_ref(),
            platform,
        };
        let checkpoint = watcher::wait_for_checkpoint(&source, &self.config).await?;

        let record = LastCheckpoint {
            checkpoint,
            timestamp: Utc::now(),
            platform,
        };
        let value = serde_json::to_value(&record)
            .map_err(|e| CheckpointError::Storage(format!("Failed to serialize checkpoint: {}", e)))?;
        if let Err(e) = self.storage.set(KEY_LAST_CHECKPOINT, value).await {
            tracing::error!("Content: {}", e);
            return Ok(Response::error("Failed to save checkpoint"));
        }

        tracing::info!(
            "Content: Checkpoint saved ({} chars)",
            record.checkpoint.chars().count()
        );
        let mut response = Response::success()
            .with_checkpoint(record.checkpoint)
            .with_platform(platform);
        response.timestamp = Some(record.timestamp);
        Ok(response)
    }

    async fn manual_absorb(&self) -> Result<Response> {
        let selection = self.host.selected_text().await?;
        let selection = selection.trim();
        if selection.is_empty() {
            tracing::warn!("Content: No text selected");
            return Err(CheckpointError::NothingSelected);
        }

        let checkpoint = cleaner::collapse_blank_lines(selection);
        tracing::info!("Content: Absorbed {} chars", checkpoint.chars().count());
        Ok(Response::success()
            .with_checkpoint(checkpoint)
            .with_platform(self.platform()))
    }

    async fn inject(&self, text: &str) -> Result<Response> {
        match self.write_to_input(text).await {
            Ok(()) => Ok(Response::success().with_message("Context injected successfully!")),
            Err(CheckpointError::InputNotFound) => {
                self.host.write_clipboard(text).await?;
                Ok(Response::clipboard("Input field not found. Text copied to clipboard."))
            }
            Err(e) => Err(e),
        }
    }

    async fn keyboard_inject(&self) -> Result<Response> {
        let segments: Vec<Segment> = match self.storage.get(KEY_SEGMENTS).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Content: Stored segments are invalid: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let combined = combine(&segments);
        if combined.is_empty() {
            return Ok(Response::error("No segments to inject"));
        }
        self.inject(&combined).await
    }

    async fn get_stats(&self) -> Result<Response> {
        let html = self.host.document_html().await?;
        let platform = self.platform();
        let messages = extract_conversation_from_html(&html, platform);

        let mut response = Response::success().with_platform(platform);
        response.stats = Some(ConversationStats::from_messages(&messages));
        Ok(response)
    }

    async fn get_conversation(&self) -> Result<Response> {
        let html = self.host.document_html().await?;
        let platform = self.platform();
        let messages = extract_conversation_from_html(&html, platform);
        tracing::info!("Content: Extracted {} messages from {}", messages.len(), platform);

        let mut response = Response::success().with_platform(platform);
        response.conversation = Some(messages);
        Ok(response)
    }
}

/// In-process channel straight into a `ContentHandler`
pub struct PageChannel {
    handler: Arc<ContentHandler>,
}

impl PageChannel {
    pub fn new(handler: Arc<ContentHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl MessagingChannel for PageChannel {
    async fn send(&self, request: Request) -> Result<Response> {
        Ok(self.handler.handle(request).await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::browser::injector::tests::MockField;
    use crate::browser::watcher::tests::escape_html;
    use crate::browser::watcher::{CHECKPOINT_END, CHECKPOINT_START};
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Mutex;

    /// Field handle that writes through to state the test can inspect
    struct SharedField(Arc<Mutex<MockField>>);

    impl EditableField for SharedField {
        fn kind(&self) -> FieldKind {
            self.0.lock().unwrap().kind()
        }
        fn focus(&mut self) {
            self.0.lock().unwrap().focus()
        }
        fn insert_text_command(&mut self, text: &str) -> bool {
            self.0.lock().unwrap().insert_text_command(text)
        }
        fn set_value(&mut self, text: &str) -> Result<()> {
            self.0.lock().unwrap().set_value(text)
        }
        fn set_text_content(&mut self, text: &str) -> Result<()> {
            self.0.lock().unwrap().set_text_content(text)
        }
        fn dispatch_event(&mut self, name: &str, bubbles: bool) {
            self.0.lock().unwrap().dispatch_event(name, bubbles)
        }
    }

    /// Scripted page: serves HTML frames in order, repeating the last one
    pub(crate) struct MockHost {
        hostname: String,
        frames: Mutex<Vec<String>>,
        selection: String,
        pub field: Arc<Mutex<MockField>>,
        pub clicks: Mutex<Vec<String>>,
        pub clipboard: Mutex<Option<String>>,
    }

    impl MockHost {
        pub fn new(hostname: &str, frames: Vec<String>) -> Self {
            let mut frames = frames;
            frames.reverse();
            Self {
                hostname: hostname.to_string(),
                frames: Mutex::new(frames),
                selection: String::new(),
                field: Arc::new(Mutex::new(MockField::new(FieldKind::ContentEditable).with_command(true))),
                clicks: Mutex::new(Vec::new()),
                clipboard: Mutex::new(None),
            }
        }

        pub fn with_selection(mut self, selection: &str) -> Self {
            self.selection = selection.to_string();
            self
        }

        pub fn injected(&self) -> String {
            self.field.lock().unwrap().content.clone()
        }
    }

    #[async_trait]
    impl PageHost for MockHost {
        fn hostname(&self) -> String {
            self.hostname.clone()
        }

        async fn document_html(&self) -> Result<String> {
            let mut frames = self.frames.lock().unwrap();
            let html = if frames.len() > 1 {
                frames.pop()
            } else {
                frames.last().cloned()
            };
            Ok(html.unwrap_or_default())
        }

        async fn selected_text(&self) -> Result<String> {
            Ok(self.selection.clone())
        }

        fn editable_field(&self, _selector: &str, _kind: FieldKind) -> Option<Box<dyn EditableField + Send>> {
            Some(Box::new(SharedField(self.field.clone())))
        }

        async fn click(&self, selector: &str) -> Result<()> {
            self.clicks.lock().unwrap().push(selector.to_string());
            Ok(())
        }

        async fn write_clipboard(&self, text: &str) -> Result<()> {
            *self.clipboard.lock().unwrap() = Some(text.to_string());
            Ok(())
        }
    }

    pub(crate) const CHATGPT_INPUT_PAGE: &str = r#"<main>
        <div data-message-author-role="user">Hi</div>
        <div data-message-author-role="assistant">Hello there. I can help.</div>
        <div id="prompt-textarea" contenteditable="true"></div>
        <button data-testid="send-button">Send</button>
    </main>"#;

    pub(crate) fn checkpoint_body() -> String {
        "Goal: ship the relay. Status: extraction works. ".repeat(4)
    }

    pub(crate) fn answered_page() -> String {
        format!(
            r#"<main><div data-message-author-role="assistant">{}
{}
{}</div></main>"#,
            escape_html(CHECKPOINT_START),
            checkpoint_body(),
            escape_html(CHECKPOINT_END)
        )
    }

    fn handler(host: MockHost) -> (ContentHandler, Arc<MockHost>, Arc<MemoryStorage>) {
        let host = Arc::new(host);
        let storage = Arc::new(MemoryStorage::new());
        let handler = ContentHandler::new(host.clone(), storage.clone());
        (handler, host, storage)
    }

    #[test]
    fn test_request_wire_format() {
        let request: Request =
            serde_json::from_value(json!({"kind": "auto_compress", "customPrompt": "compress"})).unwrap();
        assert_eq!(
            request,
            Request::AutoCompress {
                custom_prompt: Some("compress".to_string()),
                auto_send: true,
            }
        );
        assert_eq!(
            serde_json::to_value(Request::Inject { text: "x".into() }).unwrap(),
            json!({"kind": "inject", "text": "x"})
        );
        assert_eq!(
            serde_json::to_value(Request::KeyboardInject).unwrap(),
            json!({"kind": "keyboard_inject"})
        );
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_value(Response::pending_send("click send")).unwrap();
        assert_eq!(json, json!({"status": "pending_send", "message": "click send"}));
    }

    #[tokio::test]
    async fn test_get_conversation_and_stats() {
        let (handler, _, _) = handler(MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]));

        let response = handler.handle(Request::GetConversation).await;
        assert!(response.is_success());
        assert_eq!(response.platform, Some(Platform::ChatGpt));
        let conversation = response.conversation.unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[1].content, "Hello there.\n\nI can help.");

        let response = handler.handle(Request::GetStats).await;
        assert_eq!(response.stats.unwrap().total_messages, 2);
    }

    #[tokio::test]
    async fn test_manual_absorb() {
        let host = MockHost::new("claude.ai", vec![String::new()]).with_selection("  one\n\n\n\ntwo  ");
        let (handler, _, _) = handler(host);
        let response = handler.handle(Request::ManualAbsorb).await;
        assert_eq!(response.checkpoint.as_deref(), Some("one\n\ntwo"));
        assert_eq!(response.platform, Some(Platform::Claude));
    }

    #[tokio::test]
    async fn test_manual_absorb_without_selection() {
        let (handler, _, _) = handler(MockHost::new("claude.ai", vec![String::new()]));
        let response = handler.handle(Request::ManualAbsorb).await;
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.message.as_deref(), Some("Please select some text first."));
    }

    #[tokio::test]
    async fn test_inject_into_field() {
        let (handler, host, _) = handler(MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]));
        let response = handler.handle(Request::Inject { text: "context".into() }).await;
        assert!(response.is_success());
        assert_eq!(host.injected(), "context");
    }

    #[tokio::test]
    async fn test_inject_falls_back_to_clipboard() {
        let (handler, host, _) = handler(MockHost::new("chatgpt.com", vec!["<p>no input</p>".to_string()]));
        let response = handler.handle(Request::Inject { text: "context".into() }).await;
        assert_eq!(response.status, Status::Clipboard);
        assert_eq!(host.clipboard.lock().unwrap().as_deref(), Some("context"));
    }

    #[tokio::test]
    async fn test_inject_direct_write_dispatches_events() {
        let host = MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]);
        *host.field.lock().unwrap() = MockField::new(FieldKind::TextArea);
        let (handler, host, _) = handler(host);
        handler.write_to_input("direct").await.unwrap();
        assert_eq!(host.injected(), "direct");
        let events = host.field.lock().unwrap().events.clone();
        assert_eq!(events, vec![("input".to_string(), true), ("change".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_auto_compress_without_input() {
        let (handler, _, _) = handler(MockHost::new("gemini.google.com", vec!["<main></main>".to_string()]));
        let response = handler
            .handle(Request::AutoCompress { custom_prompt: None, auto_send: true })
            .await;
        assert_eq!(response.status, Status::Error);
        assert_eq!(
            response.message.as_deref(),
            Some("Could not find input field. Try manual mode or refresh the page.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_compress_manual_send() {
        let (handler, host, _) = handler(MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]));
        let response = handler
            .handle(Request::AutoCompress { custom_prompt: Some("compress it".into()), auto_send: false })
            .await;
        assert_eq!(response.status, Status::PendingSend);
        assert_eq!(host.injected(), "compress it");
        assert!(host.clicks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_compress_without_send_control() {
        let page = r#"<main><div id="prompt-textarea" contenteditable="true"></div>
            <button data-testid="send-button" disabled>Send</button></main>"#;
        let (handler, host, _) = handler(MockHost::new("chatgpt.com", vec![page.to_string()]));
        let response = handler
            .handle(Request::AutoCompress { custom_prompt: None, auto_send: true })
            .await;
        assert_eq!(response.status, Status::PendingSend);
        assert_eq!(
            response.message.as_deref(),
            Some("Prompt injected. Please click Send, then select the AI response.")
        );
        assert!(host.clicks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_compress_waits_for_checkpoint() {
        let host = MockHost::new(
            "chatgpt.com",
            vec![
                CHATGPT_INPUT_PAGE.to_string(),
                CHATGPT_INPUT_PAGE.to_string(),
                answered_page(),
            ],
        );
        let (handler, host, storage) = handler(host);

        let response = handler
            .handle(Request::AutoCompress { custom_prompt: None, auto_send: true })
            .await;
        assert!(response.is_success(), "{:?}", response);
        assert_eq!(response.checkpoint.as_deref(), Some(checkpoint_body().trim()));
        assert!(host.injected().contains(CHECKPOINT_START));
        assert_eq!(
            *host.clicks.lock().unwrap(),
            vec!["button[data-testid=\"send-button\"]".to_string()]
        );

        let saved = storage.get(KEY_LAST_CHECKPOINT).await.unwrap().unwrap();
        let saved: LastCheckpoint = serde_json::from_value(saved).unwrap();
        assert_eq!(saved.platform, Platform::ChatGpt);
        assert_eq!(saved.checkpoint, checkpoint_body().trim());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_compress_times_out() {
        let host = MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]);
        let (handler, _, storage) = handler(host);
        let response = handler
            .handle(Request::AutoCompress { custom_prompt: None, auto_send: true })
            .await;
        assert_eq!(response.status, Status::Timeout);
        assert_eq!(storage.get(KEY_LAST_CHECKPOINT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keyboard_inject_uses_saved_segments() {
        let (handler, host, storage) = handler(MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]));
        assert_eq!(handler.handle(Request::KeyboardInject).await.status, Status::Error);

        storage
            .set(
                KEY_SEGMENTS,
                json!([
                    {"id": 1, "content": "A", "platform": "claude", "timestamp": "2026-01-01T00:00:00Z"},
                    {"id": 2, "content": "B", "platform": "claude", "timestamp": "2026-01-01T00:00:01Z"}
                ]),
            )
            .await
            .unwrap();
        assert!(handler.handle(Request::KeyboardInject).await.is_success());
        assert_eq!(host.injected(), "A\n\nB");
    }

    #[tokio::test]
    async fn test_handle_json_and_channel() {
        let (handler, _, _) = handler(MockHost::new("chatgpt.com", vec![CHATGPT_INPUT_PAGE.to_string()]));
        let handler = Arc::new(handler);

        let reply = handler.handle_json(json!({"kind": "unknown_action"})).await;
        assert_eq!(reply["status"], "error");

        let channel = PageChannel::new(handler);
        let response = channel.send(Request::GetStats).await.unwrap();
        assert_eq!(response.platform, Some(Platform::ChatGpt));
    }
}
