//! Provider client adapters.

pub mod anthropic_api;
pub mod mock;
pub mod openai_api;

pub use anthropic_api::AnthropicApiClient;
pub use mock::MockProviderClient;
pub use openai_api::OpenAiApiClient;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::models::ProviderId;
use crate::domain::ports::{ProviderClient, ProviderError};
use crate::services::config::{ProviderAccountConfig, ProvidersConfig};

/// Build one client for a provider slot based on its configured backend.
pub fn build_client(
    config: &ProviderAccountConfig,
) -> Result<Arc<dyn ProviderClient>, ProviderError> {
    match config.backend.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicApiClient::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAiApiClient::from_config(config)?)),
        other => Err(ProviderError::Transport(format!(
            "unknown provider backend: {other}"
        ))),
    }
}

/// Build the full routing table from configuration.
pub fn build_clients(
    config: &ProvidersConfig,
) -> Result<BTreeMap<ProviderId, Arc<dyn ProviderClient>>, ProviderError> {
    let mut clients: BTreeMap<ProviderId, Arc<dyn ProviderClient>> = BTreeMap::new();
    clients.insert(ProviderId::Primary, build_client(&config.primary)?);
    clients.insert(ProviderId::Secondary, build_client(&config.secondary)?);
    Ok(clients)
}
