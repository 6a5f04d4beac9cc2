// Platform classification - maps a page hostname to one of the supported chat sites

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported chat platforms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Gemini,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Domain suffix allow-list, checked in order
const KNOWN_DOMAINS: &[(&str, Platform)] = &[
    ("claude.ai", Platform::Claude),
    ("chatgpt.com", Platform::ChatGpt),
    ("openai.com", Platform::ChatGpt),
    ("gemini.google.com", Platform::Gemini),
];

impl Platform {
    /// Lowercase identifier, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::Claude => "claude",
            Platform::Gemini => "gemini",
            Platform::Unknown => "unknown",
        }
    }

    /// Upper-case badge label used in stats display
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "CHATGPT",
            Platform::Claude => "CLAUDE",
            Platform::Gemini => "GEMINI",
            Platform::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Platform::Unknown
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a hostname by domain suffix. Total: anything unrecognised is `Unknown`.
pub fn classify(hostname: &str) -> Platform {
    let host = hostname.trim().trim_end_matches('.').to_ascii_lowercase();

    KNOWN_DOMAINS
        .iter()
        .find(|(domain, _)| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .map(|prefix| prefix.ends_with('.'))
                    .unwrap_or(false)
        })
        .map(|(_, platform)| *platform)
        .unwrap_or(Platform::Unknown)
}

/// Extract the host from a URL (e.g. "https://chatgpt.com:443/c/abc" -> "chatgpt.com")
pub fn extract_host(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");
    let host_port = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    host_port.split(':').next().unwrap_or("")
}

/// Classify a full URL
pub fn classify_url(url: &str) -> Platform {
    classify(extract_host(url))
}
