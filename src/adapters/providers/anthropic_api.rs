//! Anthropic Messages API provider client.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::domain::ports::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse};
use crate::services::config::ProviderAccountConfig;

const API_VERSION: &str = "2023-06-01";

/// Transport-level request timeout; the router enforces its own tighter
/// per-invocation deadline on top.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP client against the Anthropic Messages API.
pub struct AnthropicApiClient {
    http: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl AnthropicApiClient {
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait]
impl ProviderClient for AnthropicApiClient {
    fn client_id(&self) -> &str {
        "anthropic-api"
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(ProviderResponse {
            text,
            tokens_used: parsed.usage.input_tokens + parsed.usage.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_invocation_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("anthropic-version", API_VERSION)
            .with_status(200)
            .with_body(
                r#"{"content":[{"type":"text","text":"SCORE: 88"}],
                    "usage":{"input_tokens":120,"output_tokens":30}}"#,
            )
            .create_async()
            .await;

        let client = AnthropicApiClient::new(
            &format!("{}/v1/messages", server.url()),
            "claude-test",
            "test-key",
        );
        let response = client
            .invoke(ProviderRequest::new("grade this", 200))
            .await
            .unwrap();

        assert_eq!(response.text, "SCORE: 88");
        assert_eq!(response.tokens_used, 150);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .create_async()
            .await;

        let client = AnthropicApiClient::new(
            &format!("{}/v1/messages", server.url()),
            "claude-test",
            "test-key",
        );
        let err = client
            .invoke(ProviderRequest::new("prompt", 100))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .create_async()
            .await;

        let client = AnthropicApiClient::new(
            &format!("{}/v1/messages", server.url()),
            "claude-test",
            "bad-key",
        );
        let err = client
            .invoke(ProviderRequest::new("prompt", 100))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Auth(_)));
    }
}
