//! Chat-completion provider abstraction and implementations.
//!
//! Defines the [`CompletionProvider`] trait and concrete implementations:
//! - **[`OpenAIProvider`]**: calls an OpenAI-compatible `POST /chat/completions`
//!   endpoint with one system and one user message.
//! - **[`DisabledProvider`]**: returns errors; used when no provider is configured.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider from
//! the configuration:
//!
//! ```rust
//! # use ilabyaml::config::CompletionConfig;
//! # use ilabyaml::completion::create_provider;
//! let config = CompletionConfig {
//!     provider: "disabled".to_string(),
//!     ..CompletionConfig::default()
//! };
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Failure Policy
//!
//! A single attempt is made per request. HTTP errors, timeouts and
//! malformed responses are returned to the caller unchanged; there is no
//! retry or backoff.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::models::CompletionRequest;

/// Text completion given a system and a user message.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Run one completion and return the first choice's message text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

// ============ Disabled Provider ============

/// A provider that always fails.
///
/// Used when `completion.provider = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl CompletionProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Completion provider for the OpenAI chat completions API.
///
/// The API key is read once, at construction, from the environment
/// variable named by `completion.api_key_env`.
pub struct OpenAIProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a provider from configuration, reading the key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or empty.
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable not set", config.api_key_env))?;
        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit key.
    pub fn with_api_key(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!(
                "OpenAI API error {}: {}",
                status,
                provider_error_message(&body_text)
            );
        }

        let json: Value = response.json().await?;
        tracing::debug!(response = %json, "provider response");
        parse_openai_response(&json)
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw text.
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Parse a chat completions response and return `choices[0].message.content`.
fn parse_openai_response(json: &Value) -> Result<String> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices"))?;

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing message content"))
}

/// Create a completion provider based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"disabled"` | [`DisabledProvider`] |
pub fn create_provider(config: &CompletionConfig) -> Result<Box<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "first" } },
                { "message": { "role": "assistant", "content": "second" } }
            ]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "first");
    }

    #[test]
    fn test_parse_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        let err = parse_openai_response(&json).unwrap_err();
        assert!(err.to_string().contains("missing choices"));
    }

    #[test]
    fn test_parse_null_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        });
        assert!(parse_openai_response(&json).is_err());
    }

    #[test]
    fn test_provider_error_message_extracts_json() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(provider_error_message(body), "Incorrect API key provided");
        assert_eq!(provider_error_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn test_request_body_carries_parameters() {
        let provider = OpenAIProvider::with_api_key(&CompletionConfig::default(), "sk-test").unwrap();
        let body = provider.request_body(&CompletionRequest {
            system: "sys".to_string(),
            user: "usr".to_string(),
        });
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["temperature"], 0.7);
        assert!(body.to_string().contains(r#""temperature":0.7"#));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = CompletionConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..CompletionConfig::default()
        };
        let provider = OpenAIProvider::with_api_key(&config, "k").unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let err = DisabledProvider
            .complete(&CompletionRequest {
                system: String::new(),
                user: String::new(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
