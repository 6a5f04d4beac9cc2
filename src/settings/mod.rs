pub mod manager;


pub use manager::{mask_api_key, ApiProvider, ApiSettings, CompressionMode, Settings, SettingsManager};
