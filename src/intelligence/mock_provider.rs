// MockTextGenerator - scripted generator for tests

use async_trait::async_trait;
use std::sync::Mutex;

use super::provider::{ProviderConfig, TextGenerator};
use crate::error::{CheckpointError, Result};

/// Returns a fixed response or error and records every prompt it receives
#[derive(Default)]
pub struct MockTextGenerator {
    response: Option<String>,
    error: Option<CheckpointError>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_error(mut self, error: CheckpointError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str, _config: &ProviderConfig) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(self.response.clone().unwrap_or_default())
    }
}
