// HttpTextGenerator - remote text generation via the Gemini, OpenAI and Anthropic HTTP APIs

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::provider::{ProviderConfig, TextGenerator};
use crate::error::{CheckpointError, Result};
use crate::settings::ApiProvider;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Non-JSON error bodies are cut to this many characters in error messages
const ERROR_BODY_PREVIEW: usize = 200;

pub struct HttpTextGenerator {
    client: Client,
}

impl HttpTextGenerator {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn request(&self, prompt: &str, config: &ProviderConfig) -> RequestBuilder {
        let body = request_body(prompt, config);
        match config.provider {
            ApiProvider::Gemini => self
                .client
                .post(format!("{}/{}:generateContent", GEMINI_BASE, config.model()))
                .query(&[("key", config.api_key.as_str())])
                .json(&body),
            ApiProvider::OpenAi => self
                .client
                .post(OPENAI_URL)
                .bearer_auth(&config.api_key)
                .json(&body),
            ApiProvider::Anthropic => self
                .client
                .post(ANTHROPIC_URL)
                .header("x-api-key", &config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body),
        }
    }
}

impl Default for HttpTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON request body for a single user turn
pub fn request_body(prompt: &str, config: &ProviderConfig) -> Value {
    match config.provider {
        ApiProvider::Gemini => json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        }),
        ApiProvider::OpenAi => json!({
            "model": config.model(),
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": config.max_tokens,
        }),
        ApiProvider::Anthropic => json!({
            "model": config.model(),
            "max_tokens": config.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        }),
    }
}

/// Pull the generated text out of a successful response body
pub fn parse_response(provider: ApiProvider, body: &Value) -> Result<String> {
    let text = match provider {
        ApiProvider::Gemini => body.pointer("/candidates/0/content/parts/0/text"),
        ApiProvider::OpenAi => body.pointer("/choices/0/message/content"),
        ApiProvider::Anthropic => body.pointer("/content/0/text"),
    };

    text.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CheckpointError::RemoteService {
            provider: provider.display_name().to_string(),
            status: None,
            message: format!("{} returned empty response", provider.display_name()),
        })
}

/// Error for a non-2xx response.
///
/// Uses the provider's `error.message` when the body is JSON; otherwise a
/// status-coded message with a preview of the raw body.
pub fn error_from_response(provider: ApiProvider, status: u16, body: &str) -> CheckpointError {
    let message = match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} API request failed", provider.display_name())),
        Err(_) => {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            format!("{} API request failed: {}", provider.display_name(), preview.trim())
        }
    };

    CheckpointError::RemoteService {
        provider: provider.display_name().to_string(),
        status: Some(status),
        message,
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, config: &ProviderConfig) -> Result<String> {
        tracing::info!(
            "Intelligence/{}: Generating with {} ({} prompt chars)",
            config.provider,
            config.model(),
            prompt.chars().count()
        );

        let response = self
            .request(prompt, config)
            .send()
            .await
            .map_err(|e| CheckpointError::RemoteService {
                provider: config.provider.display_name().to_string(),
                status: None,
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Intelligence/{}: API error {}", config.provider, status);
            return Err(error_from_response(config.provider, status.as_u16(), &body));
        }

        let body: Value = response.json().await.map_err(|e| CheckpointError::RemoteService {
            provider: config.provider.display_name().to_string(),
            status: Some(status.as_u16()),
            message: format!("Failed to parse response: {}", e),
        })?;

        let text = parse_response(config.provider, &body)?;
        tracing::info!(
            "Intelligence/{}: Received {} chars",
            config.provider,
            text.chars().count()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gemini_response() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "compressed" }] } }]
        });
        assert_eq!(parse_response(ApiProvider::Gemini, &body).unwrap(), "compressed");
    }

    #[test]
    fn test_parse_openai_response() {
        let body = json!({ "choices": [{ "message": { "role": "assistant", "content": "done" } }] });
        assert_eq!(parse_response(ApiProvider::OpenAi, &body).unwrap(), "done");
    }

    #[test]
    fn test_parse_anthropic_response() {
        let body = json!({ "content": [{ "type": "text", "text": "summary" }] });
        assert_eq!(parse_response(ApiProvider::Anthropic, &body).unwrap(), "summary");
    }

    #[test]
    fn test_parse_empty_candidates() {
        let err = parse_response(ApiProvider::Gemini, &json!({ "candidates": [] })).unwrap_err();
        assert_eq!(err.to_string(), "Gemini API failed: Gemini returned empty response");
    }

    #[test]
    fn test_error_uses_provider_message() {
        let body = r#"{"error":{"message":"API key not valid","code":400}}"#;
        match error_from_response(ApiProvider::Gemini, 400, body) {
            CheckpointError::RemoteService { status, message, .. } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_error_without_message() {
        let err = error_from_response(ApiProvider::OpenAi, 500, r#"{"detail":"boom"}"#);
        assert_eq!(err.to_string(), "OpenAI API failed (500): OpenAI API request failed");
    }

    #[test]
    fn test_error_non_json_body_is_truncated() {
        let body = "x".repeat(500);
        match error_from_response(ApiProvider::Anthropic, 502, &body) {
            CheckpointError::RemoteService { message, .. } => {
                assert!(message.starts_with("Claude API request failed: "));
                assert!(message.chars().count() < 250);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_request_bodies() {
        let openai = ProviderConfig::new(ApiProvider::OpenAi, "k");
        let body = request_body("hi", &openai);
        assert_eq!(body["model"], "gpt-4-turbo-preview");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["content"], "hi");

        let gemini = ProviderConfig::new(ApiProvider::Gemini, "k");
        assert_eq!(request_body("hi", &gemini)["contents"][0]["parts"][0]["text"], "hi");
    }
}
