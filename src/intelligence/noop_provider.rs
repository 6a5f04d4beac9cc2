// NoOpGenerator - stands in when remote compression is not configured

use async_trait::async_trait;

use super::provider::{AvailabilityResult, ProviderConfig, TextGenerator};
use crate::error::{CheckpointError, Result};

/// Generator that is never available
///
/// Lets the relay hold a `TextGenerator` unconditionally; every call fails
/// with the configured reason.
pub struct NoOpGenerator {
    reason: String,
}

impl NoOpGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for NoOpGenerator {
    async fn check_availability(&self, _config: &ProviderConfig) -> AvailabilityResult {
        AvailabilityResult {
            available: false,
            reason: Some(self.reason.clone()),
        }
    }

    async fn generate(&self, _prompt: &str, config: &ProviderConfig) -> Result<String> {
        Err(CheckpointError::RemoteService {
            provider: config.provider.display_name().to_string(),
            status: None,
            message: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ApiProvider;

    #[tokio::test]
    async fn test_always_unavailable() {
        let generator = NoOpGenerator::new("remote compression disabled");
        let config = ProviderConfig::new(ApiProvider::Gemini, "key");
        let availability = generator.check_availability(&config).await;
        assert!(!availability.available);
        assert!(generator.generate("prompt", &config).await.is_err());
    }
}
