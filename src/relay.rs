// Calling-surface workflows: compression, absorb, bulk capture and injection
// of the saved segments into the active chat page

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::browser::cleaner;
use crate::browser::extractors::{Message, Role};
use crate::commands::{LastCheckpoint, MessagingChannel, Request, Response, Status};
use crate::error::{CheckpointError, Result};
use crate::intelligence::{create_generator, prompts, ProviderConfig, TextGenerator};
use crate::platform::Platform;
use crate::segments::{Segment, SegmentSource, SegmentStore};
use crate::settings::{ApiSettings, CompressionMode, SettingsManager};
use crate::storage::{StorageService, KEY_LAST_CHECKPOINT};

/// Tunables for the relay workflows
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Combined text longer than this (in chars) may be compressed before injection
    pub long_content_threshold: usize,
    /// Messages formatted between yields during bulk capture
    pub batch_size: usize,
    /// Wait before reading the stored checkpoint when the page gave no checkpoint
    pub fallback_delay: Duration,
    /// Stored checkpoints older than this are ignored
    pub checkpoint_freshness: chrono::Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            long_content_threshold: 500,
            batch_size: 25,
            fallback_delay: Duration::from_secs(3),
            checkpoint_freshness: chrono::Duration::minutes(5),
        }
    }
}

/// Clipboard of the calling surface
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// Result of a relay workflow
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    SegmentAdded { segment: Segment, message: String },
    Captured { segment: Segment, messages: usize },
    Injected { chars: usize, compressed: bool, via_clipboard: bool },
    /// Nothing changed; the user has to act
    NeedsUser(String),
}

impl RelayOutcome {
    /// Status line for the user
    pub fn message(&self) -> String {
        match self {
            RelayOutcome::SegmentAdded { message, .. } => message.clone(),
            RelayOutcome::Captured { messages, .. } => {
                format!("Success! {} msgs captured & cleaned.", messages)
            }
            RelayOutcome::Injected { via_clipboard: true, .. } => {
                "Copied to clipboard (input not found)".to_string()
            }
            RelayOutcome::Injected { .. } => "Context injected! Click Send to continue.".to_string(),
            RelayOutcome::NeedsUser(message) => message.clone(),
        }
    }

    pub fn segment(&self) -> Option<&Segment> {
        match self {
            RelayOutcome::SegmentAdded { segment, .. } | RelayOutcome::Captured { segment, .. } => {
                Some(segment)
            }
            _ => None,
        }
    }
}

fn failure(response: &Response, fallback: &str) -> CheckpointError {
    CheckpointError::Messaging(
        response
            .message
            .clone()
            .unwrap_or_else(|| fallback.to_string()),
    )
}

/// "User said:" / "AI said:" blocks, yielding to the scheduler between batches
pub async fn format_capture(messages: &[Message], batch_size: usize) -> String {
    let mut blocks = Vec::with_capacity(messages.len());
    for batch in messages.chunks(batch_size.max(1)) {
        for message in batch {
            let content = cleaner::sanitize_for_capture(&message.content);
            if content.is_empty() {
                continue;
            }
            let label = match message.role {
                Role::User => "User said:",
                Role::Model => "AI said:",
            };
            blocks.push(format!("{}\n{}", label, content));
        }
        tokio::task::yield_now().await;
    }
    blocks.join("\n\n")
}

/// A generator that passed its availability check, with its provider config
struct Remote {
    generator: Arc<dyn TextGenerator>,
    config: ProviderConfig,
}

/// Workflows run by the calling surface against one chat page
pub struct Relay {
    channel: Arc<dyn MessagingChannel>,
    storage: Arc<dyn StorageService>,
    settings: Arc<SettingsManager>,
    clipboard: Arc<dyn Clipboard>,
    generator: Option<Arc<dyn TextGenerator>>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(
        channel: Arc<dyn MessagingChannel>,
        storage: Arc<dyn StorageService>,
        settings: Arc<SettingsManager>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        Self {
            channel,
            storage,
            settings,
            clipboard,
            generator: None,
            config: RelayConfig::default(),
        }
    }

    /// Use `generator` instead of one chosen from the saved API settings
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    fn generator_for(&self, api: &ApiSettings) -> Arc<dyn TextGenerator> {
        self.generator
            .clone()
            .unwrap_or_else(|| create_generator(api))
    }

    /// Generator and provider config for remote compression, or the reason
    /// it cannot be used
    async fn remote(&self, api: &ApiSettings) -> std::result::Result<Remote, String> {
        if !api.enabled {
            return Err("Remote compression is disabled".to_string());
        }
        let generator = self.generator_for(api);
        let config = ProviderConfig::from_settings(api);
        let availability = generator.check_availability(&config).await;
        if !availability.available {
            return Err(availability
                .reason
                .unwrap_or_else(|| format!("{} API is unavailable", api.provider.display_name())));
        }
        Ok(Remote { generator, config })
    }

    async fn compress_text(&self, text: &str, remote: &Remote) -> Result<String> {
        let prompt = prompts::build_compression_prompt(text);
        let compressed = remote.generator.generate(&prompt, &remote.config).await?;
        Ok(compressed.trim().to_string())
    }

    /// Create a checkpoint from the current conversation.
    ///
    /// Goes through the remote API when one is configured, otherwise asks the
    /// chat model itself.
    pub async fn compress(&self, store: &mut SegmentStore) -> Result<RelayOutcome> {
        let settings = self.settings.get().await;
        match self.remote(&settings.api).await {
            Ok(remote) => self.compress_remote(store, &settings.api, &remote).await,
            Err(reason) => {
                tracing::debug!("Relay: Compressing in chat ({})", reason);
                self.compress_in_chat(store, settings.compression_mode.auto_send())
                    .await
            }
        }
    }

    /// Compress through the remote API, failing if it is not available
    pub async fn compress_with_api(&self, store: &mut SegmentStore, api: &ApiSettings) -> Result<RelayOutcome> {
        let remote = self.remote(api).await.map_err(|reason| CheckpointError::RemoteService {
            provider: api.provider.display_name().to_string(),
            status: None,
            message: reason,
        })?;
        self.compress_remote(store, api, &remote).await
    }

    async fn compress_remote(
        &self,
        store: &mut SegmentStore,
        api: &ApiSettings,
        remote: &Remote,
    ) -> Result<RelayOutcome> {
        let response = self.channel.send(Request::GetConversation).await?;
        if response.status != Status::Success {
            return Err(failure(&response, "Failed to get conversation"));
        }

        let platform = response.platform.unwrap_or_default();
        let conversation = response.conversation.unwrap_or_default();
        if conversation.is_empty() {
            return Ok(RelayOutcome::NeedsUser("No messages found on page".to_string()));
        }

        tracing::info!(
            "Relay: Compressing {} messages with {}",
            conversation.len(),
            api.provider.display_name()
        );
        let text = prompts::format_conversation(&conversation);
        let checkpoint = self.compress_text(&text, remote).await?;

        let segment = store
            .add(checkpoint, platform, Some(SegmentSource::Auto))
            .ok_or_else(|| CheckpointError::RemoteService {
                provider: api.provider.display_name().to_string(),
                status: None,
                message: "empty checkpoint".to_string(),
            })?;
        Ok(RelayOutcome::SegmentAdded {
            segment,
            message: format!(
                "Checkpoint created via {} API!",
                api.provider.as_str().to_uppercase()
            ),
        })
    }

    /// In-chat compression, falling back to the stored checkpoint when the
    /// page reply carries none
    pub async fn compress_in_chat(&self, store: &mut SegmentStore, auto_send: bool) -> Result<RelayOutcome> {
        let request = Request::AutoCompress {
            custom_prompt: None,
            auto_send,
        };
        let response = match self.channel.send(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!("Relay: No reply to auto-compress: {}", e);
                None
            }
        };

        if let Some(response) = &response {
            match (response.status, &response.checkpoint) {
                (Status::Success, Some(checkpoint)) => {
                    let platform = response.platform.unwrap_or_default();
                    if let Some(segment) = store.add(checkpoint.clone(), platform, Some(SegmentSource::Auto)) {
                        return Ok(RelayOutcome::SegmentAdded {
                            segment,
                            message: "Checkpoint created!".to_string(),
                        });
                    }
                }
                (Status::PendingSend, _) => {
                    return Ok(RelayOutcome::NeedsUser(
                        "Prompt injected. Click Send, then use Manual Absorb.".to_string(),
                    ));
                }
                _ => {}
            }
        }

        tracing::debug!(
            "Relay: Checking stored checkpoint in {}ms",
            self.config.fallback_delay.as_millis()
        );
        tokio::time::sleep(self.config.fallback_delay).await;
        if let Some(segment) = self.take_stored_checkpoint(store).await? {
            return Ok(RelayOutcome::SegmentAdded {
                segment,
                message: "Checkpoint retrieved!".to_string(),
            });
        }

        match response {
            Some(response) if response.status == Status::Error => {
                Err(failure(&response, "Auto-compress failed"))
            }
            _ => Ok(RelayOutcome::NeedsUser(
                "Timeout. Please select AI response and use Manual Absorb.".to_string(),
            )),
        }
    }

    /// Add the checkpoint the page stored, if it is recent, and remove it
    async fn take_stored_checkpoint(&self, store: &mut SegmentStore) -> Result<Option<Segment>> {
        let Some(value) = self.storage.get(KEY_LAST_CHECKPOINT).await? else {
            tracing::debug!("Relay: No stored checkpoint");
            return Ok(None);
        };
        let stored: LastCheckpoint = match serde_json::from_value(value) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Relay: Stored checkpoint is invalid: {}", e);
                return Ok(None);
            }
        };

        let age = Utc::now().signed_duration_since(stored.timestamp);
        if age >= self.config.checkpoint_freshness {
            tracing::info!("Relay: Stored checkpoint is too old ({}s)", age.num_seconds());
            return Ok(None);
        }

        let segment = store.add(stored.checkpoint, stored.platform, Some(SegmentSource::Auto));
        if segment.is_some() {
            self.storage.remove(KEY_LAST_CHECKPOINT).await?;
        }
        Ok(segment)
    }

    /// Add the page's current selection as a segment
    pub async fn manual_absorb(&self, store: &mut SegmentStore) -> Result<RelayOutcome> {
        let response = self.channel.send(Request::ManualAbsorb).await?;
        let (Status::Success, Some(checkpoint)) = (response.status, response.checkpoint.clone()) else {
            return Err(failure(&response, "Manual absorb failed"));
        };

        let platform = response.platform.unwrap_or_default();
        match store.add(checkpoint, platform, Some(SegmentSource::Manual)) {
            Some(segment) => Ok(RelayOutcome::SegmentAdded {
                segment,
                message: "Checkpoint absorbed!".to_string(),
            }),
            None => Err(CheckpointError::NothingSelected),
        }
    }

    /// Replace every segment with the whole formatted conversation and copy it
    /// to the clipboard. Callers confirm the replacement beforehand.
    pub async fn copy_all(&self, store: &mut SegmentStore) -> Result<RelayOutcome> {
        let response = self.channel.send(Request::GetConversation).await?;
        if response.status != Status::Success {
            return Err(CheckpointError::Messaging("Failed to capture conversation".to_string()));
        }

        let platform = response.platform.unwrap_or(Platform::Unknown);
        let conversation = response.conversation.unwrap_or_default();
        let text = format_capture(&conversation, self.config.batch_size).await;
        if text.is_empty() {
            return Ok(RelayOutcome::NeedsUser("No messages found on page".to_string()));
        }

        let Some(segment) = store.replace_all(text.clone(), platform, Some(SegmentSource::BulkCapture)) else {
            return Ok(RelayOutcome::NeedsUser("No messages found on page".to_string()));
        };
        if let Err(e) = self.clipboard.write_text(&text).await {
            tracing::warn!("Relay: Clipboard write failed: {}", e);
        }

        tracing::info!("Relay: Captured {} messages from {}", conversation.len(), platform);
        Ok(RelayOutcome::Captured {
            segment,
            messages: conversation.len(),
        })
    }

    /// Whether injecting the combined text should first offer compression.
    ///
    /// Bulk captures always qualify when long; otherwise only long text in
    /// manual mode does.
    pub fn offers_compression(&self, store: &SegmentStore, mode: CompressionMode) -> bool {
        let chars = store.combined().chars().count();
        if chars <= self.config.long_content_threshold {
            return false;
        }
        let bulk = store
            .segments()
            .iter()
            .any(|s| s.source == Some(SegmentSource::BulkCapture));
        bulk || mode == CompressionMode::Manual
    }

    /// Inject the combined segments into the page.
    ///
    /// With `compress`, the text goes through the remote API first when one
    /// is configured; a failed compression injects the full text.
    pub async fn inject(&self, store: &SegmentStore, compress: bool) -> Result<RelayOutcome> {
        let mut text = store.combined();
        if text.is_empty() {
            return Ok(RelayOutcome::NeedsUser(
                "No segments found. Create checkpoint first!".to_string(),
            ));
        }

        let mut compressed = false;
        if compress {
            let api = self.settings.get().await.api;
            match self.remote(&api).await {
                Ok(remote) => match self.compress_text(&text, &remote).await {
                    Ok(shorter) if !shorter.is_empty() => {
                        tracing::info!(
                            "Relay: Compressed {} to {} chars",
                            text.chars().count(),
                            shorter.chars().count()
                        );
                        text = shorter;
                        compressed = true;
                    }
                    Ok(_) => tracing::warn!("Relay: Compression returned nothing, injecting full text"),
                    Err(e) => tracing::warn!("Relay: Compression failed, injecting full text: {}", e),
                },
                Err(reason) => tracing::info!("Relay: Injecting full text ({})", reason),
            }
        }

        let chars = text.chars().count();
        let response = self.channel.send(Request::Inject { text }).await?;
        match response.status {
            Status::Success => Ok(RelayOutcome::Injected {
                chars,
                compressed,
                via_clipboard: false,
            }),
            Status::Clipboard => Ok(RelayOutcome::Injected {
                chars,
                compressed,
                via_clipboard: true,
            }),
            _ => Err(failure(&response, "Inject failed")),
        }
    }
}
