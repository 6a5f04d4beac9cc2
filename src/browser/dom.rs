// DOM helpers over scraper - selector parsing, text content and document order

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Parse a CSS selector; an invalid selector matches nothing.
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::warn!("Dom: Invalid selector '{}': {:?}", css, e);
            None
        }
    }
}

/// Every element matching `css`, in document order
pub fn select_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => doc.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// Elements matching any of several selectors, deduplicated and in document order
pub fn select_any<'a>(doc: &'a Html, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    let wanted: Vec<Selector> = selectors.iter().filter_map(|css| selector(css)).collect();
    if wanted.is_empty() {
        return Vec::new();
    }

    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| wanted.iter().any(|sel| sel.matches(el)))
        .collect()
}

/// Concatenated text nodes of the element and its descendants
pub fn text_content(el: &ElementRef) -> String {
    el.text().collect()
}

/// True if the element itself or a descendant matches `css`
pub fn contains_match(el: &ElementRef, css: &str) -> bool {
    match selector(css) {
        Some(sel) => sel.matches(el) || el.select(&sel).next().is_some(),
        None => false,
    }
}

/// True if a proper descendant (not the element itself) matches `css`
pub fn has_descendant(el: &ElementRef, css: &str) -> bool {
    match selector(css) {
        Some(sel) => el.select(&sel).any(|d| d.id() != el.id()),
        None => false,
    }
}

pub fn has_class(el: &ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Raw `class` attribute, empty when absent
pub fn class_attr<'a>(el: &ElementRef<'a>) -> &'a str {
    el.value().attr("class").unwrap_or("")
}

pub fn tag_name<'a>(el: &ElementRef<'a>) -> &'a str {
    el.value().name()
}

/// Keep only elements with no other element of the set among their ancestors.
pub fn outermost<'a>(elements: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
    let ids: HashSet<_> = elements.iter().map(|el| el.id()).collect();
    elements
        .into_iter()
        .filter(|el| !el.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_any_keeps_document_order() {
        let doc = Html::parse_document(
            r#"<div class="b">1</div><div class="a">2</div><div class="b">3</div>"#,
        );
        let found = select_any(&doc, &[".a", ".b"]);
        let texts: Vec<String> = found.iter().map(text_content).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_select_any_deduplicates() {
        let doc = Html::parse_document(r#"<div class="a b">x</div>"#);
        assert_eq!(select_any(&doc, &[".a", ".b"]).len(), 1);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let doc = Html::parse_document("<div>x</div>");
        assert!(select_all(&doc, "div[").is_empty());
    }

    #[test]
    fn test_has_descendant_excludes_self() {
        let doc = Html::parse_document(r#"<div class="x"><span>y</span></div>"#);
        let el = select_all(&doc, "div.x")[0];
        assert!(!has_descendant(&el, ".x"));
        assert!(contains_match(&el, ".x"));
        assert!(has_descendant(&el, "span"));
    }

    #[test]
    fn test_outermost() {
        let doc = Html::parse_document(
            r#"<div class="m" id="outer"><div class="m" id="inner">x</div></div><div class="m" id="other">y</div>"#,
        );
        let all = select_all(&doc, ".m");
        let kept: Vec<&str> = outermost(all)
            .iter()
            .filter_map(|el| el.value().attr("id"))
            .collect();
        assert_eq!(kept, vec!["outer", "other"]);
    }
}
