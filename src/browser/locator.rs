// Input and send-control discovery - ordered per-platform selector lists

use scraper::{ElementRef, Html};

use super::dom;
use crate::platform::Platform;

/// How an editable element accepts text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    TextArea,
    TextInput,
    ContentEditable,
}

impl FieldKind {
    fn of(el: &ElementRef) -> Self {
        match dom::tag_name(el) {
            "textarea" => FieldKind::TextArea,
            "input" => FieldKind::TextInput,
            _ => FieldKind::ContentEditable,
        }
    }

    /// Plain form controls take a `value`; everything else takes text content
    pub fn takes_value(&self) -> bool {
        matches!(self, FieldKind::TextArea | FieldKind::TextInput)
    }
}

/// An element matched by one of the locator selectors
#[derive(Debug, Clone, Copy)]
pub struct LocatedElement<'a> {
    /// The selector that matched; hosts use it to address the live element
    pub selector: &'static str,
    pub kind: FieldKind,
    pub element: ElementRef<'a>,
}

pub fn input_selectors(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Claude => &[
            "div[contenteditable=\"true\"]",
            "div[role=\"textbox\"]",
            "textarea",
        ],
        Platform::ChatGpt => &[
            "#prompt-textarea",
            "textarea[placeholder*=\"Message\"]",
            "div[contenteditable=\"true\"]",
            "textarea",
        ],
        Platform::Gemini => &[
            "div[contenteditable=\"true\"]",
            "textarea[aria-label*=\"Ask\"]",
            "textarea",
        ],
        Platform::Unknown => &[
            "div[contenteditable=\"true\"]",
            "textarea",
            "input[type=\"text\"]",
        ],
    }
}

pub fn send_selectors(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Claude | Platform::Gemini => {
            &["button[aria-label*=\"Send\"]", "button[type=\"submit\"]"]
        }
        Platform::ChatGpt => &[
            "button[data-testid=\"send-button\"]",
            "button[aria-label*=\"Send\"]",
        ],
        Platform::Unknown => &["button[type=\"submit\"]", "button[aria-label*=\"Send\"]"],
    }
}

fn is_disabled(el: &ElementRef) -> bool {
    el.value().attr("disabled").is_some() || el.value().attr("aria-disabled") == Some("true")
}

/// First element matching the platform's input selectors
pub fn find_input_field(doc: &Html, platform: Platform) -> Option<LocatedElement<'_>> {
    for &css in input_selectors(platform) {
        if let Some(element) = dom::select_all(doc, css).into_iter().next() {
            tracing::debug!("Locator: Found input via {}", css);
            return Some(LocatedElement {
                selector: css,
                kind: FieldKind::of(&element),
                element,
            });
        }
    }
    tracing::debug!("Locator: No input field for platform '{}'", platform);
    None
}

/// First enabled element matching the platform's send selectors.
///
/// Only the first match of each selector is considered, the way
/// `querySelector` behaves on the live page.
pub fn find_send_control(doc: &Html, platform: Platform) -> Option<LocatedElement<'_>> {
    for &css in send_selectors(platform) {
        if let Some(element) = dom::select_all(doc, css).into_iter().next() {
            if is_disabled(&element) {
                tracing::debug!("Locator: Send control via {} is disabled", css);
                continue;
            }
            return Some(LocatedElement {
                selector: css,
                kind: FieldKind::of(&element),
                element,
            });
        }
    }
    None
}

/// Selector of the input field, without keeping the document borrowed
pub fn input_field_selector(html: &str, platform: Platform) -> Option<(&'static str, FieldKind)> {
    let doc = Html::parse_document(html);
    find_input_field(&doc, platform).map(|found| (found.selector, found.kind))
}

/// Selector of an enabled send control, without keeping the document borrowed
pub fn send_control_selector(html: &str, platform: Platform) -> Option<&'static str> {
    let doc = Html::parse_document(html);
    find_send_control(&doc, platform).map(|found| found.selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chatgpt_prefers_prompt_textarea() {
        let doc = Html::parse_document(
            r#"<div contenteditable="true">other</div><div id="prompt-textarea" contenteditable="true"></div>"#,
        );
        let found = find_input_field(&doc, Platform::ChatGpt).unwrap();
        assert_eq!(found.selector, "#prompt-textarea");
        assert_eq!(found.kind, FieldKind::ContentEditable);
    }

    #[test]
    fn test_gemini_falls_through_to_textarea() {
        let doc = Html::parse_document(r#"<textarea aria-label="Ask Gemini"></textarea>"#);
        let found = find_input_field(&doc, Platform::Gemini).unwrap();
        assert_eq!(found.selector, "textarea[aria-label*=\"Ask\"]");
        assert_eq!(found.kind, FieldKind::TextArea);
        assert!(found.kind.takes_value());
    }

    #[test]
    fn test_unknown_platform_text_input() {
        let doc = Html::parse_document(r#"<input type="text" name="q">"#);
        let found = find_input_field(&doc, Platform::Unknown).unwrap();
        assert_eq!(found.kind, FieldKind::TextInput);
    }

    #[test]
    fn test_no_input_field() {
        let doc = Html::parse_document("<p>read only</p>");
        assert!(find_input_field(&doc, Platform::Claude).is_none());
    }

    #[test]
    fn test_send_control_skips_disabled() {
        let doc = Html::parse_document(
            r#"<button data-testid="send-button" disabled>Send</button>
               <button aria-label="Send prompt">Send</button>"#,
        );
        let found = find_send_control(&doc, Platform::ChatGpt).unwrap();
        assert_eq!(found.selector, "button[aria-label*=\"Send\"]");
    }

    #[test]
    fn test_send_control_all_disabled() {
        let doc = Html::parse_document(
            r#"<button aria-label="Send" aria-disabled="true"></button><button type="submit" disabled></button>"#,
        );
        assert!(find_send_control(&doc, Platform::Claude).is_none());
    }

    #[test]
    fn test_selector_helpers() {
        let html = r#"<textarea></textarea><button type="submit">Go</button>"#;
        assert_eq!(
            input_field_selector(html, Platform::Claude),
            Some(("textarea", FieldKind::TextArea))
        );
        assert_eq!(send_control_selector(html, Platform::Claude), Some("button[type=\"submit\"]"));
    }
}
