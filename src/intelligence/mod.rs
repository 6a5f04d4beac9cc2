// Intelligence module - remote compression through third-party text generation APIs

pub mod provider;
pub mod http_provider;
pub mod noop_provider;
pub mod prompts;

#[cfg(test)]
pub mod mock_provider;

pub use provider::{AvailabilityResult, ProviderConfig, TextGenerator};
pub use http_provider::HttpTextGenerator;
pub use noop_provider::NoOpGenerator;

use std::sync::Arc;

use crate::settings::ApiSettings;

/// Pick a generator for the saved API settings.
///
/// Usable settings get the HTTP generator; anything else gets a NoOpGenerator
/// carrying the reason, so callers always hold a valid generator.
pub fn create_generator(api: &ApiSettings) -> Arc<dyn TextGenerator> {
    if api.is_usable() {
        tracing::info!("Intelligence: Using {} API", api.provider.display_name());
        Arc::new(HttpTextGenerator::new())
    } else if api.enabled {
        tracing::warn!("Intelligence: API enabled without a key, remote compression disabled");
        Arc::new(NoOpGenerator::new("API key is empty"))
    } else {
        Arc::new(NoOpGenerator::new("Remote compression is disabled"))
    }
}
