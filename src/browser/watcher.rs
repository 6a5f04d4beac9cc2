// Completion watcher - polls the latest AI message until the checkpoint
// markers appear and the text stops changing.
//
// The state machine (`CompletionWatcher`) is pure: it is fed the current time
// and the current target text once per tick. `wait_for_checkpoint` drives it
// from a tokio interval against a `TargetTextSource`.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

use super::dom;
use crate::error::{CheckpointError, Result};
use crate::platform::Platform;

pub const CHECKPOINT_START: &str = "<<<CHECKPOINT_START>>>";
pub const CHECKPOINT_END: &str = "<<<CHECKPOINT_END>>>";

/// Polling tunables for a single wait
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub poll_interval: Duration,
    pub budget: Duration,
    /// Consecutive same-length observations required once the end marker is seen
    pub stable_cycles: u32,
    pub min_payload_chars: usize,
    /// Pause between injecting the prompt and clicking send
    pub settle_delay: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(800),
            budget: Duration::from_secs(60),
            stable_cycles: 3,
            min_payload_chars: 100,
            settle_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPhase {
    WaitingForStart,
    Growing,
    Stabilizing,
    Done(String),
    TimedOut,
    Failed(String),
}

impl WatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WatchPhase::Done(_) | WatchPhase::TimedOut | WatchPhase::Failed(_)
        )
    }
}

/// Bookkeeping for one wait
#[derive(Debug, Clone)]
pub struct WatchState {
    pub started_at: Instant,
    pub last_observed_length: Option<usize>,
    pub stable_cycles: u32,
    pub budget: Duration,
}

pub struct CompletionWatcher {
    config: WatchConfig,
    state: WatchState,
    phase: WatchPhase,
}

impl CompletionWatcher {
    pub fn new(config: WatchConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    pub fn starting_at(config: WatchConfig, started_at: Instant) -> Self {
        let state = WatchState {
            started_at,
            last_observed_length: None,
            stable_cycles: 0,
            budget: config.budget,
        };
        Self {
            config,
            state,
            phase: WatchPhase::WaitingForStart,
        }
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn phase(&self) -> &WatchPhase {
        &self.phase
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.started_at)
    }

    /// Advance one tick. Terminal phases are sticky.
    pub fn observe(&mut self, now: Instant, text: Option<&str>) -> WatchPhase {
        if self.phase.is_terminal() {
            return self.phase.clone();
        }

        let elapsed = self.elapsed_at(now);
        self.phase = if elapsed > self.state.budget {
            tracing::warn!("Watcher: Timeout after {}ms", elapsed.as_millis());
            WatchPhase::TimedOut
        } else {
            self.transition(text, elapsed)
        };
        self.phase.clone()
    }

    fn transition(&mut self, text: Option<&str>, elapsed: Duration) -> WatchPhase {
        let text = match text {
            Some(text) if text.contains(CHECKPOINT_START) => text,
            _ => {
                tracing::debug!("Watcher: Waiting for AI to start... ({}s)", elapsed.as_secs());
                self.state.stable_cycles = 0;
                return WatchPhase::WaitingForStart;
            }
        };

        let length = text.chars().count();
        if !text.contains(CHECKPOINT_END) {
            tracing::debug!("Watcher: Waiting for end marker... ({} chars)", length);
            self.state.stable_cycles = 0;
            return WatchPhase::Growing;
        }

        if self.state.last_observed_length != Some(length) {
            tracing::debug!("Watcher: AI typing... ({} chars)", length);
            self.state.last_observed_length = Some(length);
            self.state.stable_cycles = 0;
            return WatchPhase::Growing;
        }

        self.state.stable_cycles += 1;
        tracing::debug!(
            "Watcher: Content stable ({}/{})",
            self.state.stable_cycles,
            self.config.stable_cycles
        );
        if self.state.stable_cycles < self.config.stable_cycles {
            return WatchPhase::Stabilizing;
        }

        match extract_checkpoint(text, self.config.min_payload_chars) {
            Ok(payload) => {
                tracing::info!("Watcher: Extraction complete ({} chars)", payload.chars().count());
                WatchPhase::Done(payload)
            }
            Err(e) => {
                tracing::error!("Watcher: {}", e);
                WatchPhase::Failed(e.to_string())
            }
        }
    }
}

/// Trimmed text between the first start marker and the first end marker.
///
/// Fails when the first end marker does not follow the first start marker.
pub fn extract_checkpoint(text: &str, min_chars: usize) -> Result<String> {
    let start = text
        .find(CHECKPOINT_START)
        .ok_or_else(|| CheckpointError::MalformedPayload("start marker not found".into()))?;
    let end = text
        .find(CHECKPOINT_END)
        .ok_or_else(|| CheckpointError::MalformedPayload("end marker not found".into()))?;
    let body_start = start + CHECKPOINT_START.len();
    if end < body_start {
        return Err(CheckpointError::MalformedPayload(
            "end marker before start marker".into(),
        ));
    }

    let payload = text[body_start..end].trim();
    let chars = payload.chars().count();
    if chars < min_chars {
        return Err(CheckpointError::MalformedPayload(format!(
            "checkpoint too short ({} chars, need {})",
            chars, min_chars
        )));
    }
    Ok(payload.to_string())
}

pub fn message_selectors(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::ChatGpt => &["[data-message-author-role=\"assistant\"]"],
        Platform::Claude => &["[data-test-render-count]", ".font-claude-message"],
        Platform::Gemini => &["model-response", ".model-response-text"],
        Platform::Unknown => &["[class*=\"assistant\"]", "[class*=\"bot\"]", "[class*=\"ai\"]"],
    }
}

/// Text of the most recent AI message, if one can be found.
///
/// Within the first selector that matches anything, the last element carrying
/// the start marker wins over the last element overall. With no selector
/// matches, the innermost element holding both markers is used.
pub fn locate_target_text(doc: &Html, platform: Platform) -> Option<String> {
    for &css in message_selectors(platform) {
        let matches = dom::select_all(doc, css);
        let Some(last) = matches.last() else {
            continue;
        };

        let target = matches
            .iter()
            .rev()
            .find(|el| dom::text_content(el).contains(CHECKPOINT_START))
            .unwrap_or(last);
        return Some(dom::text_content(target));
    }

    // Descendants come after their ancestors, so the last match is innermost
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| {
            let text = dom::text_content(el);
            text.contains(CHECKPOINT_START) && text.contains(CHECKPOINT_END)
        })
        .last()
        .map(|el| dom::text_content(&el))
}

/// Parse `html` and locate the target text
pub fn locate_target_text_in_html(html: &str, platform: Platform) -> Option<String> {
    let doc = Html::parse_document(html);
    locate_target_text(&doc, platform)
}

/// Something that can be re-read on every watcher tick
#[async_trait]
pub trait TargetTextSource: Send + Sync {
    async fn current_text(&self) -> Option<String>;
}

/// Poll `source` until the checkpoint is complete, malformed, or the budget runs out.
///
/// Running out of budget without ever seeing an AI message is `MessageNotFound`.
pub async fn wait_for_checkpoint(source: &dyn TargetTextSource, config: &WatchConfig) -> Result<String> {
    let mut watcher = CompletionWatcher::new(config.clone());
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Watcher: Waiting for checkpoint (budget {}s)", config.budget.as_secs());

    // The first tick completes immediately; the first check happens one interval in
    ticker.tick().await;
    let mut seen_message = false;
    loop {
        ticker.tick().await;
        let text = source.current_text().await;
        let now = Instant::now();
        seen_message |= text.is_some();

        match watcher.observe(now, text.as_deref()) {
            WatchPhase::Done(payload) => return Ok(payload),
            WatchPhase::Failed(reason) => return Err(CheckpointError::MalformedPayload(reason)),
            WatchPhase::TimedOut if !seen_message => return Err(CheckpointError::MessageNotFound),
            WatchPhase::TimedOut => {
                return Err(CheckpointError::Timeout {
                    elapsed: watcher.elapsed_at(now),
                })
            }
            _ => {}
        }
    }
}
