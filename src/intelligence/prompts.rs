// Prompt templates for checkpoint compression
// The in-chat prompt asks the chat model itself to wrap its answer in the
// checkpoint markers; the API prompt is sent to a separate provider with the
// formatted conversation appended.

use serde::{Deserialize, Serialize};

use crate::browser::extractors::{Message, Role};
use crate::browser::watcher::{CHECKPOINT_END, CHECKPOINT_START};

/// A script must reach this many characters before it decides the language
const LANGUAGE_THRESHOLD: usize = 10;

/// Prompt injected into the chat input for in-chat compression
pub fn default_compression_prompt() -> String {
    format!(
        "CONTEXT COMPRESSION TASK\n\n\
         You are helping me transition to a new chat session. Compress our entire conversation \
         into a structured checkpoint that I can paste into a new session to continue seamlessly.\n\n\
         CRITICAL: Analyze our actual conversation history and fill in specific details. \
         Do NOT just repeat the template structure.\n\n\
         Your output MUST follow this EXACT format:\n\n\
         {start}\n\n\
         1. Project Goal\n[What are we actually trying to solve or build?]\n\n\
         2. Current Status\n[What is verified and complete? What are we stuck on?]\n\n\
         3. Immutable Decisions\n[Constraints and design decisions we agreed on and should not re-discuss]\n\n\
         4. Pending Actions\n[Immediate next steps in priority order]\n\n\
         5. Critical Context\n[Essential details: code snippets, names, requirements, technical constraints]\n\n\
         {end}\n\n\
         IMPORTANT RULES:\n\
         - Replace ALL bracketed placeholders with ACTUAL content from our conversation\n\
         - Optimize for information density\n\
         - Include ONLY facts and decisions from our actual conversation\n\
         - Do NOT include explanatory text or meta-commentary\n\
         - Your response MUST start with {start} and end with {end}",
        start = CHECKPOINT_START,
        end = CHECKPOINT_END,
    )
}

const API_COMPRESSION_TEMPLATE: &str = "\
You are a context compression specialist. Extract what matters and drop the noise.

Most of the value of a conversation sits in a small part of it. Extract that part.

OUTPUT FORMAT (plain text, no markdown headings, bold or bullets with *):

GOAL (10% of output):
[One sentence: what exactly are we building or solving? Name the project and version.]

CURRENT STATE (30%, most important):
[What works for certain? What is the current blocker?]

KEY DECISIONS (20%):
[Constraints we agreed on, with specific file names, function names and the reason for each choice]

WHAT FAILED (15%):
[Approaches that did not work, with error messages or symptoms]

NEXT STEP (25%):
[Immediate actionable steps in priority order]

RULES:
- Target roughly 10:1 compression
- Use specific terms: file names, function names, exact URLs, version numbers
- Avoid vague phrases such as \"the system\" or \"we decided\"
- For long conversations, prioritize the latest decisions
- Only facts from the conversation, nothing invented";

/// Dominant script or accent family of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Chinese,
    Japanese,
    Korean,
    Russian,
    Arabic,
    Thai,
    German,
    French,
    Spanish,
    English,
}

impl Language {
    /// Candidates in tie-break order; English is the fallback
    const DETECTABLE: [Language; 9] = [
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
        Language::Russian,
        Language::Arabic,
        Language::Thai,
        Language::German,
        Language::French,
        Language::Spanish,
    ];

    fn matches(&self, c: char) -> bool {
        match self {
            Language::Chinese => ('\u{4e00}'..='\u{9fa5}').contains(&c),
            Language::Japanese => ('\u{3040}'..='\u{309f}').contains(&c) || ('\u{30a0}'..='\u{30ff}').contains(&c),
            Language::Korean => ('\u{ac00}'..='\u{d7af}').contains(&c) || ('\u{1100}'..='\u{11ff}').contains(&c),
            Language::Russian => ('\u{0400}'..='\u{04ff}').contains(&c),
            Language::Arabic => ('\u{0600}'..='\u{06ff}').contains(&c),
            Language::Thai => ('\u{0e00}'..='\u{0e7f}').contains(&c),
            Language::German => "äöüßÄÖÜ".contains(c),
            Language::French => "àâçéèêëîïôûùüÿœæ".contains(lower(c)),
            Language::Spanish => "áéíóúüñ¿¡".contains(lower(c)),
            Language::English => false,
        }
    }

    /// Instruction prepended to the API prompt
    pub fn instruction(&self) -> &'static str {
        match self {
            Language::Chinese => "CRITICAL: Output MUST be in Chinese (中文). 所有输出必须使用中文。",
            Language::Japanese => "CRITICAL: Output MUST be in Japanese (日本語). すべての出力は日本語でなければなりません。",
            Language::Korean => "CRITICAL: Output MUST be in Korean (한국어). 모든 출력은 한국어로 작성해야 합니다.",
            Language::Russian => "CRITICAL: Output MUST be in Russian (Русский). Весь вывод должен быть на русском языке.",
            Language::Arabic => "CRITICAL: Output MUST be in Arabic (العربية). يجب أن يكون الناتج بالعربية.",
            Language::Thai => "CRITICAL: Output MUST be in Thai (ภาษาไทย). ผลลัพธ์ทั้งหมดต้องเป็นภาษาไทย",
            Language::German => "CRITICAL: Output MUST be in German (Deutsch). Alle Ausgaben müssen auf Deutsch sein.",
            Language::French => "CRITICAL: Output MUST be in French (Français). Toutes les sorties doivent être en français.",
            Language::Spanish => "CRITICAL: Output MUST be in Spanish (Español). Toda la salida debe estar en español.",
            Language::English => "Output in the same language as the conversation.",
        }
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Language whose characters occur most often, if it occurs at least ten times
pub fn detect_language(text: &str) -> Language {
    let mut best = Language::English;
    let mut best_count = 0;

    for language in Language::DETECTABLE {
        let count = text.chars().filter(|&c| language.matches(c)).count();
        if count > best_count {
            best = language;
            best_count = count;
        }
    }

    if best_count < LANGUAGE_THRESHOLD {
        Language::English
    } else {
        best
    }
}

/// "Human: ..." / "AI: ..." turns separated by blank lines
pub fn format_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "Human",
                Role::Model => "AI",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full API prompt for `text`, with the language instruction first
pub fn build_compression_prompt(text: &str) -> String {
    let language = detect_language(text);
    tracing::debug!("Prompts: Detected language {:?}", language);
    format!(
        "{}\n\n{}\n\nText to compress:\n{}",
        language.instruction(),
        API_COMPRESSION_TEMPLATE,
        text
    )
}
