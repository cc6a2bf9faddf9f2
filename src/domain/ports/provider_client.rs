//! Provider invocation port.
//!
//! Abstracts the external text-generation/evaluation capability. One client
//! per configured provider slot; the router treats them uniformly, so adding
//! a provider means implementing this trait and wiring a config entry.

use async_trait::async_trait;
use thiserror::Error;

/// A single invocation request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Prompt text sent to the provider.
    pub prompt: String,
    /// Token generation ceiling for this invocation.
    pub max_tokens: u32,
}

impl ProviderRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// A successful invocation.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text.
    pub text: String,
    /// Actual tokens consumed (input + output), as reported by the provider.
    pub tokens_used: u64,
}

/// Errors surfaced by provider clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Uniform invoke capability over a provider backend.
///
/// Implementations must be `Send + Sync`; the router calls them from
/// concurrent test cycles.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable identifier for logging (e.g. "anthropic-api").
    fn client_id(&self) -> &str;

    /// Perform one invocation.
    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
