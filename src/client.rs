//! Backends the form uses to obtain generated text.
//!
//! - [`HttpGenerationClient`] posts to a running server's `/api/generate`.
//! - [`LocalGeneration`] runs the [`Generator`] in-process.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::generate::Generator;
use crate::models::{ErrorResponse, GenerateRequest, GenerateResponse};

/// Error text used when a failed response carries no `error` field.
pub const CLIENT_FALLBACK_ERROR: &str = "Failed to generate content";

/// Turns a generate request into the model's raw answer text.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Client for a remote `POST /api/generate` endpoint.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGenerationClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    ///
    /// `timeout` should cover the server's handler deadline.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", self.endpoint))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .ok()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| CLIENT_FALLBACK_ERROR.to_string());
            tracing::warn!(%status, error = %message, "generate endpoint returned an error");
            return Err(anyhow!(message));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Invalid response from generate endpoint")?;
        Ok(parsed.result)
    }
}

/// Calls the generation handler directly, without HTTP.
pub struct LocalGeneration {
    generator: Generator,
}

impl LocalGeneration {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GenerationBackend for LocalGeneration {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.generator.generate(request).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            system_instruction: Some("Emit YAML.".to_string()),
            instructions: None,
            knowledge_seed: Some("Phoenix".to_string()),
        }
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = HttpGenerationClient::new("http://localhost:3000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:3000/api/generate");
    }

    #[tokio::test]
    async fn test_success_returns_result_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "systemInstruction": "Emit YAML.",
                "knowledgeSeed": "Phoenix"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result":"```yaml\nk: v\n```"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = HttpGenerationClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let text = client.generate(&request()).await.unwrap();

        assert_eq!(text, "```yaml\nk: v\n```");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_validation_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Instructions and Knowledge Seed are required"}"#)
            .create_async()
            .await;

        let client = HttpGenerationClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert_eq!(err.to_string(), "Instructions and Knowledge Seed are required");
    }

    #[tokio::test]
    async fn test_non_json_error_body_uses_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_header("content-type", "text/html")
            .with_body("<html>Internal Server Error</html>")
            .create_async()
            .await;

        let client = HttpGenerationClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert_eq!(err.to_string(), CLIENT_FALLBACK_ERROR);
    }

    #[tokio::test]
    async fn test_success_without_result_field_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(r#"{"unexpected":true}"#)
            .create_async()
            .await;

        let client = HttpGenerationClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.generate(&request()).await.unwrap_err();

        assert!(err.to_string().contains("Invalid response from generate endpoint"));
    }
}
