use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use crate::error::{CheckpointError, Result};
use crate::platform::Platform;
use crate::storage::{StorageService, KEY_SEGMENTS};

/// Segments longer than this start collapsed
pub const COLLAPSE_THRESHOLD: usize = 200;

pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(8);

/// Creation-time ordered segment identifier (milliseconds, bumped on collision)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a segment entered the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentSource {
    Auto,
    Manual,
    BulkCapture,
}

/// One user-editable chunk of captured or compressed conversation text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    pub content: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SegmentSource>,
}

/// Store change notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SegmentEvent {
    Added { id: SegmentId },
    Deleted { id: SegmentId },
    Edited { id: SegmentId },
    Moved { from: usize, to: usize },
    CollapseToggled { id: SegmentId, collapsed: bool },
    Cleared { count: usize },
    ClearUndone { count: usize },
    Replaced { id: SegmentId },
    Restored { count: usize },
}

/// Receives every store change; rendering subscribes here
pub trait SegmentEventEmitter: Send + Sync {
    fn emit(&self, event: &SegmentEvent, segments: &[Segment]);
}

/// Emitter that drops every event
pub struct NoopSegmentEventEmitter;

impl SegmentEventEmitter for NoopSegmentEventEmitter {
    fn emit(&self, _event: &SegmentEvent, _segments: &[Segment]) {}
}

enum PersistCommand {
    Write(Vec<Segment>),
    Flush(oneshot::Sender<()>),
}

struct ClearSnapshot {
    segments: Vec<Segment>,
    taken_at: Instant,
}

/// Ordered, owned list of segments.
///
/// Every mutation notifies the emitter and queues a snapshot for the
/// background writer. The writer applies snapshots in order, so the last
/// mutation wins. Write failures are logged; the in-memory list stays
/// authoritative.
pub struct SegmentStore {
    segments: Vec<Segment>,
    last_id: u64,
    undo: Option<ClearSnapshot>,
    undo_window: Duration,
    storage: Arc<dyn StorageService>,
    emitter: Arc<dyn SegmentEventEmitter>,
    persister: Option<mpsc::UnboundedSender<PersistCommand>>,
}

impl SegmentStore {
    /// Create an empty store.
    ///
    /// The background writer is spawned when called inside a tokio runtime;
    /// outside one, mutations are not persisted until `persist` is called.
    pub fn new(storage: Arc<dyn StorageService>, emitter: Arc<dyn SegmentEventEmitter>) -> Self {
        let persister = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = mpsc::unbounded_channel();
                handle.spawn(run_persister(storage.clone(), rx));
                Some(tx)
            }
            Err(_) => {
                tracing::debug!("SegmentStore: No runtime, background persistence disabled");
                None
            }
        };

        Self {
            segments: Vec::new(),
            last_id: 0,
            undo: None,
            undo_window: DEFAULT_UNDO_WINDOW,
            storage,
            emitter,
            persister,
        }
    }

    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    fn next_id(&mut self) -> SegmentId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last_id = now.max(self.last_id + 1);
        SegmentId(self.last_id)
    }

    fn new_segment(&mut self, content: String, platform: Platform, source: Option<SegmentSource>) -> Segment {
        Segment {
            id: self.next_id(),
            collapsed: content.chars().count() > COLLAPSE_THRESHOLD,
            content,
            platform,
            created_at: Utc::now(),
            source,
        }
    }

    fn changed(&self, event: SegmentEvent) {
        self.emitter.emit(&event, &self.segments);
        if let Some(tx) = &self.persister {
            if tx.send(PersistCommand::Write(self.segments.clone())).is_err() {
                tracing::warn!("SegmentStore: Background writer stopped, change not persisted");
            }
        }
    }

    /// Append a segment. Empty content is ignored.
    pub fn add(
        &mut self,
        content: impl Into<String>,
        platform: Platform,
        source: Option<SegmentSource>,
    ) -> Option<Segment> {
        let content = content.into();
        if content.is_empty() {
            tracing::warn!("SegmentStore: Ignoring empty segment");
            return None;
        }

        let segment = self.new_segment(content, platform, source);
        tracing::debug!(
            "SegmentStore: Added segment {} ({} chars from {})",
            segment.id,
            segment.content.chars().count(),
            platform
        );
        self.segments.push(segment.clone());
        self.changed(SegmentEvent::Added { id: segment.id });
        Some(segment)
    }

    pub fn delete(&mut self, id: SegmentId) -> bool {
        let before = self.segments.len();
        self.segments.retain(|s| s.id != id);
        if self.segments.len() == before {
            return false;
        }
        self.changed(SegmentEvent::Deleted { id });
        true
    }

    /// Replace a segment's content with the trimmed `new_content`
    pub fn edit(&mut self, id: SegmentId, new_content: &str) -> bool {
        let trimmed = new_content.trim();
        if trimmed.is_empty() {
            return false;
        }
        let Some(segment) = self.segments.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        segment.content = trimmed.to_string();
        self.changed(SegmentEvent::Edited { id });
        true
    }

    /// Remove the segment at `from` and reinsert it at `to`
    pub fn move_segment(&mut self, from: usize, to: usize) -> bool {
        let len = self.segments.len();
        if from >= len || to >= len || from == to {
            return false;
        }
        let moved = self.segments.remove(from);
        self.segments.insert(to, moved);
        self.changed(SegmentEvent::Moved { from, to });
        true
    }

    pub fn toggle_collapsed(&mut self, id: SegmentId) -> Option<bool> {
        let segment = self.segments.iter_mut().find(|s| s.id == id)?;
        segment.collapsed = !segment.collapsed;
        let collapsed = segment.collapsed;
        self.changed(SegmentEvent::CollapseToggled { id, collapsed });
        Some(collapsed)
    }

    /// Empty the store, keeping a snapshot for `undo_clear`
    pub fn clear(&mut self) -> usize {
        self.clear_at(Instant::now())
    }

    pub(crate) fn clear_at(&mut self, now: Instant) -> usize {
        if self.segments.is_empty() {
            return 0;
        }
        let segments = std::mem::take(&mut self.segments);
        let count = segments.len();
        self.undo = Some(ClearSnapshot {
            segments,
            taken_at: now,
        });
        tracing::info!("SegmentStore: Cleared {} segments", count);
        self.changed(SegmentEvent::Cleared { count });
        count
    }

    /// Restore the last cleared segments if the undo window is still open.
    ///
    /// Segments added after the clear are kept after the restored ones.
    pub fn undo_clear(&mut self) -> bool {
        self.undo_clear_at(Instant::now())
    }

    pub(crate) fn undo_clear_at(&mut self, now: Instant) -> bool {
        let Some(snapshot) = self.undo.take() else {
            return false;
        };
        if now.saturating_duration_since(snapshot.taken_at) > self.undo_window {
            tracing::debug!("SegmentStore: Undo window expired");
            return false;
        }

        let count = snapshot.segments.len();
        let added_since = std::mem::replace(&mut self.segments, snapshot.segments);
        self.segments.extend(added_since);
        self.changed(SegmentEvent::ClearUndone { count });
        true
    }

    pub fn can_undo_clear(&self) -> bool {
        self.undo
            .as_ref()
            .is_some_and(|s| s.taken_at.elapsed() <= self.undo_window)
    }

    /// Replace every segment with a single new one
    pub fn replace_all(
        &mut self,
        content: impl Into<String>,
        platform: Platform,
        source: Option<SegmentSource>,
    ) -> Option<Segment> {
        let content = content.into();
        if content.is_empty() {
            tracing::warn!("SegmentStore: Ignoring empty replacement");
            return None;
        }

        let segment = self.new_segment(content, platform, source);
        let replaced = self.segments.len();
        self.segments = vec![segment.clone()];
        tracing::info!("SegmentStore: Replaced {} segments", replaced);
        self.changed(SegmentEvent::Replaced { id: segment.id });
        Some(segment)
    }

    /// Trimmed, non-empty contents joined by a blank line, in store order
    pub fn combined(&self) -> String {
        combine(&self.segments)
    }

    pub fn total_chars(&self) -> usize {
        self.segments.iter().map(|s| s.content.chars().count()).sum()
    }

    /// "N segment(s), M characters"
    pub fn summary_line(&self) -> String {
        let n = self.segments.len();
        format!(
            "{} segment{}, {} characters",
            n,
            if n == 1 { "" } else { "s" },
            self.total_chars()
        )
    }

    /// Write the current list to storage now
    pub async fn persist(&self) -> Result<()> {
        write_snapshot(self.storage.as_ref(), &self.segments).await
    }

    /// Wait until every queued background write has been applied
    pub async fn flush(&self) {
        let Some(tx) = &self.persister else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(PersistCommand::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Replace the list with the persisted one, if storage holds a valid array.
    ///
    /// Returns the number of restored segments; anything unusable leaves the
    /// store empty.
    pub async fn restore(&mut self) -> Result<usize> {
        let value = self.storage.get(KEY_SEGMENTS).await?;
        let segments = match value {
            Some(value @ Value::Array(_)) => match serde_json::from_value::<Vec<Segment>>(value) {
                Ok(segments) => segments,
                Err(e) => {
                    tracing::warn!("SegmentStore: Persisted segments are invalid: {}", e);
                    Vec::new()
                }
            },
            Some(_) => {
                tracing::warn!("SegmentStore: Persisted segments are not an array");
                Vec::new()
            }
            None => Vec::new(),
        };

        let count = segments.len();
        self.last_id = self
            .last_id
            .max(segments.iter().map(|s| s.id.0).max().unwrap_or(0));
        self.segments = segments;
        self.undo = None;
        tracing::info!("SegmentStore: Restored {} segments", count);
        self.emitter
            .emit(&SegmentEvent::Restored { count }, &self.segments);
        Ok(count)
    }
}

/// Join rule shared by the store and the exports
pub fn combine(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.content.trim())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn write_snapshot(storage: &dyn StorageService, segments: &[Segment]) -> Result<()> {
    let value = serde_json::to_value(segments)
        .map_err(|e| CheckpointError::Storage(format!("Failed to serialize segments: {}", e)))?;
    storage.set(KEY_SEGMENTS, value).await
}

async fn run_persister(
    storage: Arc<dyn StorageService>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Write(mut snapshot) => {
                // Skip straight to the newest queued snapshot
                let mut pending_flush = Vec::new();
                while let Ok(next) = rx.try_recv() {
                    match next {
                        PersistCommand::Write(newer) => snapshot = newer,
                        PersistCommand::Flush(done) => {
                            pending_flush.push(done);
                            break;
                        }
                    }
                }

                if let Err(e) = write_snapshot(storage.as_ref(), &snapshot).await {
                    tracing::error!("SegmentStore: Failed to persist segments: {}", e);
                }
                for done in pending_flush {
                    let _ = done.send(());
                }
            }
            PersistCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("SegmentStore: Background writer stopped");
}
