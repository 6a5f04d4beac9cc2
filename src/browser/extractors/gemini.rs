// Gemini conversation extractor
// Gemini has no stable role attribute, so this scans generic message containers
// inside <main>, drops UI chrome (menus, toolbars, buttons), and sniffs "user"
// in class names. Falls back to user-query / model-response containers.

use scraper::{ElementRef, Html};
use std::collections::HashSet;

use super::{is_ui_chrome, push_cleaned, ConversationStrategy, Message, Role};
use crate::browser::dom;

const CANDIDATE_SELECTORS: &[&str] = &["[class*=\"message\"]", "[data-message-id]"];
const FALLBACK_SELECTORS: &[&str] = &["[class*=\"user-query\"]", "[class*=\"model-response\"]"];

/// Phrases that disqualify a fallback container
const FALLBACK_CHROME_PHRASES: &[&str] = &["New chat", "Search"];
const FALLBACK_MIN_CHARS: usize = 50;

pub struct GeminiStrategy;

impl GeminiStrategy {
    fn is_user(el: &ElementRef) -> bool {
        dom::class_attr(el).contains("user")
            || dom::has_descendant(el, "[class*=\"user\"]")
            || el.value().attr("data-role") == Some("user")
    }

    /// Valid candidates that are neither conversation wrappers nor nested inside
    /// another kept candidate. A wrapper holds two or more separate candidates.
    fn message_blocks(candidates: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
        let ids: HashSet<_> = candidates.iter().map(|el| el.id()).collect();

        let wrappers: HashSet<_> = candidates
            .iter()
            .filter(|el| {
                let inner: Vec<ElementRef> = el
                    .descendants()
                    .filter(|d| d.id() != el.id() && ids.contains(&d.id()))
                    .filter_map(ElementRef::wrap)
                    .collect();
                dom::outermost(inner).len() >= 2
            })
            .map(|el| el.id())
            .collect();

        let remaining: Vec<ElementRef> = candidates
            .into_iter()
            .filter(|el| !wrappers.contains(&el.id()))
            .collect();
        dom::outermost(remaining)
    }
}

impl ConversationStrategy for GeminiStrategy {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn primary(&self, doc: &Html) -> Vec<Message> {
        let root = dom::select_all(doc, "main")
            .into_iter()
            .next()
            .unwrap_or_else(|| doc.root_element());

        let wanted: Vec<_> = CANDIDATE_SELECTORS
            .iter()
            .filter_map(|css| dom::selector(css))
            .collect();

        let candidates: Vec<ElementRef> = root
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| wanted.iter().any(|sel| sel.matches(el)))
            .filter(|el| !is_ui_chrome(el))
            .collect();

        let mut messages = Vec::new();
        for el in Self::message_blocks(candidates) {
            let role = if Self::is_user(&el) { Role::User } else { Role::Model };
            push_cleaned(&mut messages, role, &el);
        }
        messages
    }

    fn fallback(&self, doc: &Html) -> Vec<Message> {
        let mut messages = Vec::new();
        for el in dom::outermost(dom::select_any(doc, FALLBACK_SELECTORS)) {
            let text = dom::text_content(&el);
            if text.chars().count() < FALLBACK_MIN_CHARS {
                continue;
            }
            if FALLBACK_CHROME_PHRASES.iter().any(|p| text.contains(p)) {
                continue;
            }

            let role = if dom::class_attr(&el).contains("user") {
                Role::User
            } else {
                Role::Model
            };
            push_cleaned(&mut messages, role, &el);
        }
        messages
    }
}
