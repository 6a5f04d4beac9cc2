// Text normalizer - cleans raw scraped message text
//
// DOM text extraction concatenates text nodes, so control labels leak into the
// message body and line breaks between paragraphs are lost. `clean` strips the
// known labels and re-inserts paragraph breaks at likely sentence boundaries.

use regex::Regex;
use std::sync::LazyLock;

/// Paragraph-break marker inserted between reasoning trace and answer
pub const SECTION_BREAK: &str = "\n\n---\n\n";

/// Reasoning-trace delimiter rendered by thinking models
const REASONING_DELIMITER: &str = "Show thinking";

/// Literal UI labels that leak into extracted text
const UI_ARTIFACTS: &[&str] = &[
    "Copy code",
    "Use microphone",
    "Search (⌘⇧K)",
    "Add files",
    "Collapse menu",
    "New chat (⌘⇧O)",
    "Copy response",
    "Edit prompt",
];

static MORE_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bMore\b").unwrap());

static PAGINATION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[^\S\n]*[0-9]+ / [0-9]+[^\S\n]*$").unwrap());

static SEPARATOR_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^---$").unwrap());

// Two or more question marks directly followed by the start of an answer
static QUESTION_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([？?]{2,})([A-Z\p{Han}])").unwrap());

static LATIN_SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!])[ \t]*([A-Z])").unwrap());

static CJK_SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([。！)])[ \t]*([A-Z\p{Han}])").unwrap());

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Passes after which `clean` stops even if the text still changes
const MAX_CLEAN_PASSES: usize = 8;

/// Clean raw message text. Deterministic and idempotent.
///
/// A pass can expose new labels (a delimiter replacement puts a glued `More`
/// or a pagination counter on its own line), so passes repeat until the text
/// stops changing.
pub fn clean(raw: &str) -> String {
    let mut current = clean_pass(raw);
    for _ in 1..MAX_CLEAN_PASSES {
        let next = clean_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn clean_pass(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let stripped = strip_ui_artifacts(raw);
    let mut cleaned = stripped.trim().to_string();

    if cleaned.contains(REASONING_DELIMITER) {
        cleaned = cleaned.replace(REASONING_DELIMITER, SECTION_BREAK);
    } else if !SEPARATOR_LINE.is_match(&cleaned) {
        cleaned = QUESTION_BOUNDARY
            .replace_all(&cleaned, format!("${{1}}{}${{2}}", SECTION_BREAK).as_str())
            .into_owned();
    }

    cleaned = CJK_SENTENCE_END
        .replace_all(&cleaned, "${1}\n\n${2}")
        .into_owned();
    cleaned = LATIN_SENTENCE_END
        .replace_all(&cleaned, "${1}\n\n${2}")
        .into_owned();

    collapse_blank_lines(&cleaned).trim().to_string()
}

/// Remove UI labels until nothing more is removed, so a label split around
/// another label cannot survive a single pass.
fn strip_ui_artifacts(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = current.clone();
        for artifact in UI_ARTIFACTS {
            next = next.replace(artifact, "");
        }
        next = MORE_LABEL.replace_all(&next, "").into_owned();
        next = PAGINATION_LINE.replace_all(&next, "").into_owned();

        if next == current {
            return next;
        }
        current = next;
    }
}

/// Reduce any run of 3+ newlines to exactly 2
pub fn collapse_blank_lines(text: &str) -> String {
    EXCESS_NEWLINES.replace_all(text, "\n\n").into_owned()
}

/// Whitespace cleanup for bulk capture: collapse blank runs, trim the text and
/// every line.
pub fn sanitize_for_capture(text: &str) -> String {
    let collapsed = collapse_blank_lines(text);
    let lines: Vec<&str> = collapsed.trim().split('\n').map(str::trim).collect();
    collapse_blank_lines(&lines.join("\n"))
}
