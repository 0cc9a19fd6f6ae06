//! LLM provider implementations for kazpaGPT.
//!
//! All providers implement the `kazpa_core::Provider` trait. The server
//! talks to a single OpenAI-compatible backend picked from configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use kazpa_core::error::ProviderError;
use kazpa_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Build the configured provider.
///
/// Returns `Ok(None)` when no API key is available. The server still
/// starts in that state and reports the missing credential per request.
pub fn build_from_config(
    config: &kazpa_config::AppConfig,
) -> Result<Option<Arc<dyn Provider>>, ProviderError> {
    let Some(api_key) = config.provider.api_key.clone() else {
        warn!("No API key configured; chat requests will fail until one is set");
        return Ok(None);
    };

    let provider = OpenAiCompatProvider::new(
        &config.provider.name,
        &config.provider.base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    debug!(provider = %config.provider.name, base_url = %provider.base_url(), "Provider ready");
    Ok(Some(Arc::new(provider)))
}
