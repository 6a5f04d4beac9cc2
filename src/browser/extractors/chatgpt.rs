// ChatGPT conversation extractor
// Uses the stable [data-message-author-role] attribute; falls back to
// [data-message-id] turn containers with role sniffing when the attribute is missing.

use scraper::Html;

use super::{push_cleaned, role_by_length, ConversationStrategy, Message, Role};
use crate::browser::dom;

const AUTHOR_ROLE_SELECTOR: &str = "[data-message-author-role]";
const MESSAGE_ID_SELECTOR: &str = "[data-message-id]";

pub struct ChatGptStrategy;

impl ConversationStrategy for ChatGptStrategy {
    fn name(&self) -> &'static str {
        "chatgpt"
    }

    fn primary(&self, doc: &Html) -> Vec<Message> {
        let mut messages = Vec::new();
        for el in dom::outermost(dom::select_all(doc, AUTHOR_ROLE_SELECTOR)) {
            let role = match el.value().attr("data-message-author-role") {
                Some("user") => Role::User,
                _ => Role::Model,
            };
            push_cleaned(&mut messages, role, &el);
        }
        messages
    }

    fn fallback(&self, doc: &Html) -> Vec<Message> {
        let mut messages = Vec::new();
        for el in dom::outermost(dom::select_all(doc, MESSAGE_ID_SELECTOR)) {
            let class = dom::class_attr(&el).to_lowercase();
            let role = if class.contains("user") || dom::has_descendant(&el, "[data-role=\"user\"]") {
                Role::User
            } else if class.contains("assistant")
                || dom::has_descendant(&el, "[data-role=\"assistant\"]")
            {
                Role::Model
            } else {
                role_by_length(&el)
            };
            push_cleaned(&mut messages, role, &el);
        }
        messages
    }
}
