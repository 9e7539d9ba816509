// Anthropic Generation Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API.
// Cacheable system blocks are marked with ephemeral cache_control so the
// shared prompt prefix is billed once per swarm, not once per worker.

use crate::domain::llm::{
    GenerationClient, GenerationError, GenerationOutput, GenerationRequest, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: Vec<SystemBlockPayload>,
    messages: Vec<MessagePayload>,
}

#[derive(Serialize)]
struct SystemBlockPayload {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

#[derive(Serialize)]
struct MessagePayload {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: UsagePayload,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsagePayload {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

impl AnthropicAdapter {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT.to_string(), api_key)
    }

    /// Point the adapter at a non-default endpoint (proxies, test servers).
    pub fn with_endpoint(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl GenerationClient for AnthropicAdapter {
    async fn create(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let payload = MessagesRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            system: request
                .system
                .into_iter()
                .map(|block| SystemBlockPayload {
                    block_type: "text",
                    text: block.text,
                    cache_control: block
                        .cacheable
                        .then_some(CacheControl { control_type: "ephemeral" }),
                })
                .collect(),
            messages: vec![MessagePayload {
                role: "user",
                content: request.user_message,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => GenerationError::Authentication(error_text),
                429 => GenerationError::RateLimit,
                400 | 422 => GenerationError::InvalidRequest(error_text),
                404 => GenerationError::ModelNotFound(error_text),
                408 | 504 => GenerationError::Timeout,
                _ => GenerationError::Provider(format!("HTTP {}: {}", status, error_text)),
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("Failed to parse response: {}", e)))?;

        let text: String = body.content.iter().map(|c| c.text.as_str()).collect();

        debug!(
            input_tokens = body.usage.input_tokens,
            cache_read_tokens = body.usage.cache_read_input_tokens,
            output_tokens = body.usage.output_tokens,
            "generation call complete"
        );

        Ok(GenerationOutput {
            text,
            usage: TokenUsage {
                input_tokens: body.usage.input_tokens,
                output_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::SystemBlock;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "test-model".to_string(),
            max_tokens: 1024,
            system: vec![
                SystemBlock::cacheable("shared context"),
                SystemBlock::plain("controls section"),
            ],
            user_message: "Generate the questions.".to_string(),
        }
    }

    #[test]
    fn test_payload_marks_only_cacheable_blocks() {
        let req = request();
        let payload = MessagesRequest {
            model: req.model,
            max_tokens: req.max_tokens,
            system: req
                .system
                .into_iter()
                .map(|block| SystemBlockPayload {
                    block_type: "text",
                    text: block.text,
                    cache_control: block
                        .cacheable
                        .then_some(CacheControl { control_type: "ephemeral" }),
                })
                .collect(),
            messages: vec![MessagePayload {
                role: "user",
                content: req.user_message,
            }],
        };

        let value = serde_json::to_value(&payload).unwrap();
        let system = value["system"].as_array().unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[0]["cache_control"]["type"], "ephemeral");
        assert!(system[1].get("cache_control").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_create_parses_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "content": [{"type": "text", "text": "[]"}],
                    "usage": {
                        "input_tokens": 900,
                        "output_tokens": 120,
                        "cache_read_input_tokens": 800
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = AnthropicAdapter::with_endpoint(server.url(), "test-key".to_string());
        let output = adapter.create(request()).await.unwrap();

        assert_eq!(output.text, "[]");
        assert_eq!(output.usage.input_tokens, 900);
        assert_eq!(output.usage.output_tokens, 120);
        assert_eq!(output.usage.cache_read_tokens, 800);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_maps_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(429)
            .with_body("{\"error\": \"rate_limit_error\"}")
            .create_async()
            .await;

        let adapter = AnthropicAdapter::with_endpoint(server.url(), "test-key".to_string());
        let err = adapter.create(request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimit));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_create_maps_authentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(401)
            .with_body("invalid x-api-key")
            .create_async()
            .await;

        let adapter = AnthropicAdapter::with_endpoint(server.url(), "bad-key".to_string());
        let err = adapter.create(request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Authentication(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_create_concatenates_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "content": [
                        {"type": "text", "text": "[{\"control_id\""},
                        {"type": "text", "text": ": \"A.1\"}]"}
                    ],
                    "usage": {"input_tokens": 10, "output_tokens": 5}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = AnthropicAdapter::with_endpoint(server.url(), "test-key".to_string());
        let output = adapter.create(request()).await.unwrap();
        assert_eq!(output.text, "[{\"control_id\": \"A.1\"}]");
        assert_eq!(output.usage.cache_read_tokens, 0);
    }
}
