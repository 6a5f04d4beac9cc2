use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CheckpointError, Result};
use crate::storage::{StorageService, KEY_SETTINGS};

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub compression_mode: CompressionMode,
    #[serde(default)]
    pub api: ApiSettings,
}

/// Whether the compress action drives the chat page or only prepares it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Inject the prompt, click send, wait for the checkpoint
    #[default]
    Auto,
    /// Inject the prompt and let the user send it
    Manual,
}

impl CompressionMode {
    pub fn auto_send(&self) -> bool {
        matches!(self, CompressionMode::Auto)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[default]
    Gemini,
    OpenAi,
    Anthropic,
}

impl ApiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProvider::Gemini => "gemini",
            ApiProvider::OpenAi => "openai",
            ApiProvider::Anthropic => "anthropic",
        }
    }

    /// Name shown to the user
    pub fn display_name(&self) -> &'static str {
        match self {
            ApiProvider::Gemini => "Gemini",
            ApiProvider::OpenAi => "OpenAI",
            ApiProvider::Anthropic => "Claude",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote compression settings
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: ApiProvider,
    #[serde(default)]
    pub key: String,
}

impl ApiSettings {
    /// Enabled with a non-blank key
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.key.trim().is_empty()
    }
}

// Keeps the key out of logs
impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("key", &mask_api_key(&self.key))
            .finish()
    }
}

/// First 8 and last 4 characters of the key; `***` for short keys
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "***".to_string();
    }
    let start: String = chars[..8].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", start, end)
}

/// Loads, validates and persists settings through the storage service
pub struct SettingsManager {
    storage: Arc<dyn StorageService>,
    current_settings: RwLock<Settings>,
}

impl SettingsManager {
    /// Creates a SettingsManager and loads settings from storage.
    ///
    /// Missing, unreadable or invalid settings fall back to defaults with a
    /// warning; loading never fails.
    pub async fn load(storage: Arc<dyn StorageService>) -> Self {
        let settings = match storage.get(KEY_SETTINGS).await {
            Ok(Some(value)) => match serde_json::from_value::<Settings>(value) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Settings: Failed to parse settings JSON: {}. Using defaults.", e);
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!("Settings: Failed to read settings: {}. Using defaults.", e);
                Settings::default()
            }
        };

        tracing::debug!("Settings: Loaded {:?}", settings);
        Self {
            storage,
            current_settings: RwLock::new(settings),
        }
    }

    /// Returns a clone of the current settings
    pub async fn get(&self) -> Settings {
        self.current_settings.read().await.clone()
    }

    /// Validate, persist, then update in memory.
    ///
    /// In-memory settings only change once the write has succeeded.
    pub async fn update(&self, settings: Settings) -> Result<()> {
        Self::validate(&settings)?;

        let value = serde_json::to_value(&settings)
            .map_err(|e| CheckpointError::Storage(format!("Failed to serialize settings: {}", e)))?;
        self.storage.set(KEY_SETTINGS, value).await?;

        *self.current_settings.write().await = settings;
        tracing::info!("Settings: Saved");
        Ok(())
    }

    pub async fn set_compression_mode(&self, mode: CompressionMode) -> Result<()> {
        let mut settings = self.get().await;
        settings.compression_mode = mode;
        self.update(settings).await
    }

    /// Save API settings; the key is trimmed first
    pub async fn set_api(&self, enabled: bool, provider: ApiProvider, key: &str) -> Result<()> {
        let mut settings = self.get().await;
        settings.api = ApiSettings {
            enabled,
            provider,
            key: key.trim().to_string(),
        };
        self.update(settings).await
    }

    /// Drop the saved key and disable remote compression
    pub async fn clear_api(&self) -> Result<()> {
        let mut settings = self.get().await;
        settings.api = ApiSettings::default();
        self.update(settings).await
    }

    /// Validates settings constraints
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` when the API is enabled with a blank key.
    pub fn validate(settings: &Settings) -> Result<()> {
        if settings.api.enabled && settings.api.key.trim().is_empty() {
            return Err(CheckpointError::InvalidSettings(
                "Please enter an API key".to_string(),
            ));
        }
        Ok(())
    }
}
