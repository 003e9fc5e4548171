use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::GenerationError;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One call to the generation service. The timeout is the deadline for the
/// whole outbound request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the first text block of the completion.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request).await
    }
}

#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: Option<String>,
    api_version: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(base_url: String, api_key: Option<String>, api_version: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_version,
            client: reqwest::Client::new(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;
        let url = format!("{}/v1/messages", self.base_url);

        // Single user turn, no system prompt
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(GenerationError::from_reqwest)?;

        // Auth and rate-limit statuses get their own variants
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => GenerationError::Authentication {
                    status: status.as_u16(),
                    body,
                },
                429 => GenerationError::RateLimited { body },
                code => GenerationError::Api { status: code, body },
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Deserialization(err)
            }
        })?;

        // Skip tool_use and other non-text blocks
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or(GenerationError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(5),
        }
    }

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new(
            server.uri(),
            Some("test-key".to_string()),
            DEFAULT_API_VERSION.to_string(),
        )
    }

    #[tokio::test]
    async fn test_returns_first_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", DEFAULT_API_VERSION))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "max_tokens": DEFAULT_MAX_TOKENS,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                    {"type": "text", "text": "{\"risks\": []}"},
                    {"type": "text", "text": "ignored"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server).generate(&request("hello")).await.unwrap();
        assert_eq!(text, "{\"risks\": []}");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = AnthropicClient::new(server.uri(), Some("  ".to_string()), DEFAULT_API_VERSION.to_string());
        assert!(!client.has_api_key());

        let err = client.generate(&request("hello")).await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_maps_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = client(&server);

        let err = client.generate(&request("a")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Authentication { status: 401, ref body } if body == "invalid x-api-key"));
        assert!(!err.is_transient());

        let err = client.generate(&request("b")).await.unwrap_err();
        assert!(matches!(err, GenerationError::RateLimited { .. }));

        let err = client.generate(&request("c")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 529, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_no_text_block_is_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&server)
            .await;

        let err = client(&server).generate(&request("hello")).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyContent));
    }

    #[tokio::test]
    async fn test_request_deadline_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": [{"type": "text", "text": "{}"}]}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut req = request("hello");
        req.timeout = Duration::from_millis(50);
        let err = client(&server).generate(&req).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout));
    }
}
