//! OpenAI Chat Completions API provider client.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::domain::ports::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse};
use crate::services::config::ProviderAccountConfig;

/// Transport-level request timeout; the router enforces its own tighter
/// per-invocation deadline on top.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP client against the OpenAI Chat Completions API.
pub struct OpenAiApiClient {
    http: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl OpenAiApiClient {
    /// Build from a provider slot's config, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &ProviderAccountConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ProviderError::Auth(format!("{} not set", config.api_key_env)))?;
        Ok(Self::new(&config.api_url, &config.model, api_key))
    }

    pub fn new(api_url: &str, model: &str, api_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url: api_url.to_string(),
            model: model.to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[async_trait]
impl ProviderClient for OpenAiApiClient {
    fn client_id(&self) -> &str {
        "openai-api"
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(ProviderError::Auth(format!("status {}", response.status())));
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited("HTTP 429".to_string()));
            }
            status => {
                return Err(ProviderError::Transport(format!("status {status}")));
            }
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::MalformedResponse("empty choices".to_string()))?;

        Ok(ProviderResponse {
            text,
            tokens_used: parsed.usage.total_tokens,
        })
    }
}
