// Extractor router - dispatches to the right conversation strategy based on Platform

pub mod chatgpt;
pub mod claude;
pub mod gemini;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use super::cleaner;
use super::dom;
use crate::platform::Platform;

/// Blocks shorter than this with no code are attributed to the user
const USER_LENGTH_CEILING: usize = 500;

/// Text shorter than this is treated as UI chrome by the generic-container strategies
const MIN_MESSAGE_CHARS: usize = 50;

/// A container holding a button is chrome unless it has at least this much text
const MIN_TEXT_WITH_BUTTON: usize = 200;

/// Menu and toolbar phrases that mark an element as chrome rather than a message
const CHROME_PHRASES: &[&str] = &[
    "New chat",
    "Search",
    "Add files",
    "Collapse menu",
    "More options",
];

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One extracted conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Derived size figures for a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total_messages: usize,
    pub total_chars: usize,
    pub estimated_tokens: usize,
}

impl ConversationStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        let total_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        Self {
            total_messages: messages.len(),
            total_chars,
            estimated_tokens: total_chars.div_ceil(4),
        }
    }
}

/// Per-platform extraction strategy.
///
/// `primary` runs first; `fallback` only runs when `primary` finds nothing.
pub trait ConversationStrategy: Sync {
    fn name(&self) -> &'static str;

    fn primary(&self, doc: &Html) -> Vec<Message>;

    fn fallback(&self, doc: &Html) -> Vec<Message>;

    fn extract(&self, doc: &Html) -> Vec<Message> {
        let messages = self.primary(doc);
        if !messages.is_empty() {
            tracing::debug!("Extractor/{}: primary strategy found {} messages", self.name(), messages.len());
            return messages;
        }

        let messages = self.fallback(doc);
        tracing::debug!("Extractor/{}: fallback strategy found {} messages", self.name(), messages.len());
        messages
    }
}

/// Strategy for a platform; `None` for Unknown
pub fn strategy_for(platform: Platform) -> Option<&'static dyn ConversationStrategy> {
    match platform {
        Platform::ChatGpt => Some(&chatgpt::ChatGptStrategy),
        Platform::Claude => Some(&claude::ClaudeStrategy),
        Platform::Gemini => Some(&gemini::GeminiStrategy),
        Platform::Unknown => None,
    }
}

/// Extract the conversation in document order. Never fails: an empty result
/// means no messages were found.
pub fn extract_conversation(doc: &Html, platform: Platform) -> Vec<Message> {
    match strategy_for(platform) {
        Some(strategy) => strategy.extract(doc),
        None => {
            tracing::debug!("Extractor: No strategy for platform '{}'", platform);
            Vec::new()
        }
    }
}

/// Parse `html` and extract the conversation
pub fn extract_conversation_from_html(html: &str, platform: Platform) -> Vec<Message> {
    let doc = Html::parse_document(html);
    extract_conversation(&doc, platform)
}

/// Clean the element's text and append it if anything remains
pub(crate) fn push_cleaned(messages: &mut Vec<Message>, role: Role, el: &ElementRef) {
    let content = cleaner::clean(&dom::text_content(el));
    if !content.is_empty() {
        messages.push(Message::new(role, content));
    }
}

/// Last-resort attribution: short, code-free blocks are user prompts.
///
/// Short assistant replies are misattributed to the user; there is no signal
/// to correct that.
pub(crate) fn role_by_length(el: &ElementRef) -> Role {
    let text_len = dom::text_content(el).chars().count();
    let has_code = el.inner_html().to_lowercase().contains("<code");
    if text_len < USER_LENGTH_CEILING && !has_code {
        Role::User
    } else {
        Role::Model
    }
}

/// Heuristic UI-chrome filter for strategies that scan generic containers
pub(crate) fn is_ui_chrome(el: &ElementRef) -> bool {
    let text = dom::text_content(el);
    let len = text.chars().count();

    if len < MIN_MESSAGE_CHARS {
        return true;
    }
    if CHROME_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return true;
    }
    if matches!(dom::tag_name(el), "button" | "a") {
        return true;
    }
    dom::has_descendant(el, "button") && len < MIN_TEXT_WITH_BUTTON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_messages() {
        let messages = vec![
            Message::new(Role::User, "abcd"),
            Message::new(Role::Model, "efghi"),
        ];
        let stats = ConversationStats::from_messages(&messages);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_chars, 9);
        assert_eq!(stats.estimated_tokens, 3);
    }

    #[test]
    fn test_stats_empty() {
        assert_eq!(ConversationStats::from_messages(&[]), ConversationStats::default());
    }

    #[test]
    fn test_stats_serializes_camel_case() {
        let json = serde_json::to_value(ConversationStats::default()).unwrap();
        assert!(json.get("totalMessages").is_some());
        assert!(json.get("estimatedTokens").is_some());
    }

    #[test]
    fn test_unknown_platform_yields_nothing() {
        let html = r#"<div data-message-author-role="user">Hi</div>"#;
        assert!(extract_conversation_from_html(html, Platform::Unknown).is_empty());
    }

    #[test]
    fn test_unknown_hostname_end_to_end() {
        let platform = crate::platform::classify("example.org");
        assert_eq!(platform, Platform::Unknown);
        let html = r#"<main><div class="message">A long enough message body that would otherwise be extracted fine.</div></main>"#;
        assert!(extract_conversation_from_html(html, platform).is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::new(Role::Model, "x")).unwrap();
        assert_eq!(json, r#"{"role":"model","content":"x"}"#);
    }

    #[test]
    fn test_is_ui_chrome() {
        let doc = Html::parse_document(
            r#"<div id="short">tiny</div>
               <button id="btn">This is a button with a very long label that exceeds fifty characters</button>
               <div id="menu">New chat and a lot of other words to push this over fifty chars</div>
               <div id="ok">A perfectly ordinary paragraph of model output that is long enough.</div>"#,
        );
        let by_id = |id: &str| dom::select_all(&doc, &format!("#{}", id))[0];
        assert!(is_ui_chrome(&by_id("short")));
        assert!(is_ui_chrome(&by_id("btn")));
        assert!(is_ui_chrome(&by_id("menu")));
        assert!(!is_ui_chrome(&by_id("ok")));
    }
}
