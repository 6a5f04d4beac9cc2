// TextGenerator trait - backend-agnostic remote text generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::settings::{ApiProvider, ApiSettings};

/// Result of an availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub available: bool,
    pub reason: Option<String>,
}

/// Everything needed to address one provider
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: ApiProvider,
    pub api_key: String,
    /// Overrides the provider's default model
    pub model: Option<String>,
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;

    pub fn new(provider: ApiProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_settings(api: &ApiSettings) -> Self {
        Self::new(api.provider, api.key.trim())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn model(&self) -> &str {
        match &self.model {
            Some(model) => model,
            None => default_model(self.provider),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &crate::settings::mask_api_key(&self.api_key))
            .field("model", &self.model())
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

pub fn default_model(provider: ApiProvider) -> &'static str {
    match provider {
        ApiProvider::Gemini => "gemini-2.0-flash",
        ApiProvider::OpenAi => "gpt-4-turbo-preview",
        ApiProvider::Anthropic => "claude-3-5-sonnet-20241022",
    }
}

/// Remote text generation
///
/// The default implementation is `HttpTextGenerator`, which calls the
/// provider's public HTTP API directly.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Check if the generator can serve requests for `config`
    async fn check_availability(&self, config: &ProviderConfig) -> AvailabilityResult {
        if config.api_key.trim().is_empty() {
            return AvailabilityResult {
                available: false,
                reason: Some(format!("{} API key is empty", config.provider.display_name())),
            };
        }
        AvailabilityResult {
            available: true,
            reason: None,
        }
    }

    /// Send a single-turn prompt and return the generated text
    async fn generate(&self, prompt: &str, config: &ProviderConfig) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let api = ApiSettings {
            enabled: true,
            provider: ApiProvider::OpenAi,
            key: " sk-abc ".to_string(),
        };
        let config = ProviderConfig::from_settings(&api);
        assert_eq!(config.api_key, "sk-abc");
        assert_eq!(config.model(), "gpt-4-turbo-preview");
        assert_eq!(config.max_tokens, 2000);

        let config = config.with_model("gpt-4o");
        assert_eq!(config.model(), "gpt-4o");
    }

    #[test]
    fn test_debug_hides_key() {
        let config = ProviderConfig::new(ApiProvider::Gemini, "AIzaSyD-secretsecret-wxyz");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secretsecret"));
    }
}
