// Claude conversation extractor
// Walks [data-test-render-count] turn containers. Role comes from the
// font-user-message / font-claude-message markers, then markup keywords, then length.
// Falls back to collecting the font marker elements directly.

use scraper::{ElementRef, Html};

use super::{push_cleaned, role_by_length, ConversationStrategy, Message, Role};
use crate::browser::dom;

const TURN_SELECTOR: &str = "[data-test-render-count]";
const USER_MARKER: &str = "font-user-message";
const MODEL_MARKER: &str = "font-claude-message";

const USER_KEYWORDS: &[&str] = &["user avatar", "text-user-message", "role=\"user\""];
const MODEL_KEYWORDS: &[&str] = &["claude avatar", "text-claude-message", "role=\"assistant\""];

pub struct ClaudeStrategy;

impl ClaudeStrategy {
    fn classify_turn(turn: &ElementRef) -> Role {
        if dom::contains_match(turn, &format!(".{}", USER_MARKER)) {
            return Role::User;
        }
        if dom::contains_match(turn, &format!(".{}", MODEL_MARKER)) {
            return Role::Model;
        }

        let markup = turn.inner_html().to_lowercase();
        if USER_KEYWORDS.iter().any(|k| markup.contains(k))
            || dom::has_descendant(turn, "[data-role=\"user\"]")
        {
            return Role::User;
        }
        if MODEL_KEYWORDS.iter().any(|k| markup.contains(k))
            || dom::has_descendant(turn, "[data-role=\"assistant\"]")
        {
            return Role::Model;
        }

        role_by_length(turn)
    }
}

impl ConversationStrategy for ClaudeStrategy {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn primary(&self, doc: &Html) -> Vec<Message> {
        let mut messages = Vec::new();
        for turn in dom::outermost(dom::select_all(doc, TURN_SELECTOR)) {
            let role = Self::classify_turn(&turn);
            push_cleaned(&mut messages, role, &turn);
        }
        messages
    }

    fn fallback(&self, doc: &Html) -> Vec<Message> {
        let user = format!(".{}", USER_MARKER);
        let model = format!(".{}", MODEL_MARKER);

        let mut messages = Vec::new();
        for el in dom::outermost(dom::select_any(doc, &[user.as_str(), model.as_str()])) {
            let role = if dom::has_class(&el, USER_MARKER) {
                Role::User
            } else {
                Role::Model
            };
            push_cleaned(&mut messages, role, &el);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::super::extract_conversation_from_html;
    use super::*;
    use crate::platform::Platform;

    #[test]
    fn test_font_markers() {
        let html = r#"
            <div data-test-render-count="1"><div class="font-user-message">How do I sort a Vec</div></div>
            <div data-test-render-count="1"><div class="font-claude-message">Use sort or sort_unstable</div></div>
        "#;
        let messages = extract_conversation_from_html(html, Platform::Claude);
        assert_eq!(
            messages,
            vec![
                Message::new(Role::User, "How do I sort a Vec"),
                Message::new(Role::Model, "Use sort or sort_unstable"),
            ]
        );
    }

    #[test]
    fn test_keyword_heuristics() {
        let long_reply = "word ".repeat(150);
        let html = format!(
            r#"<div data-test-render-count="2"><img alt="User avatar"><p>{}</p></div>
               <div data-test-render-count="2"><div data-role="assistant">short answer</div></div>"#,
            long_reply
        );
        let messages = extract_conversation_from_html(&html, Platform::Claude);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Model);
    }

    #[test]
    fn test_length_fallback() {
        let long_reply = "word ".repeat(150);
        let html = format!(
            r#"<div data-test-render-count="1">quick question</div>
               <div data-test-render-count="1">{}</div>
               <div data-test-render-count="1">see <code>x</code></div>"#,
            long_reply
        );
        let messages = extract_conversation_from_html(&html, Platform::Claude);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[2].role, Role::Model);
    }

    #[test]
    fn test_fallback_markers_in_document_order() {
        let html = r#"
            <section><p class="font-user-message">first prompt</p></section>
            <section><p class="font-claude-message">first answer</p></section>
            <section><p class="font-user-message">second prompt</p></section>
        "#;
        let messages = extract_conversation_from_html(html, Platform::Claude);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User]);
        assert_eq!(messages[2].content, "second prompt");
    }
}
