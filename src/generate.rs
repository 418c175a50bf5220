//! Generation request handling: validation, prompt construction, and the
//! single bounded call to the completion provider.
//!
//! This is the transport-independent core behind `POST /api/generate`;
//! [`crate::server`] wraps it in an HTTP route and
//! [`crate::client::LocalGeneration`] calls it in-process.

use std::sync::Arc;
use std::time::Duration;

use crate::completion::CompletionProvider;
use crate::config::GenerateConfig;
use crate::error::GenerateError;
use crate::models::{CompletionRequest, GenerateRequest};

/// Validates generation requests and forwards them to a provider.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn CompletionProvider>,
    policy: GenerateConfig,
}

impl Generator {
    pub fn new(provider: Arc<dyn CompletionProvider>, policy: GenerateConfig) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &dyn CompletionProvider {
        self.provider.as_ref()
    }

    /// Check a request and turn it into the provider's message pair.
    ///
    /// Rejects a request whose `systemInstruction` or `knowledgeSeed` is
    /// absent or empty, then one whose knowledge seed exceeds the
    /// configured character limit.
    pub fn prepare(&self, request: &GenerateRequest) -> Result<CompletionRequest, GenerateError> {
        let system = request.system_instruction.as_deref().unwrap_or_default();
        let seed = request.knowledge_seed.as_deref().unwrap_or_default();

        if system.is_empty() || seed.is_empty() {
            return Err(GenerateError::MissingInput);
        }

        if let Some(limit) = self.policy.seed_limit() {
            let len = seed.chars().count();
            if len > limit {
                return Err(GenerateError::SeedTooLarge { len, limit });
            }
        }

        let system = if system.trim().is_empty() {
            self.policy.default_system_instruction.clone()
        } else {
            system.to_string()
        };

        Ok(CompletionRequest {
            system,
            user: user_message(request.instructions.as_deref().unwrap_or_default(), seed),
        })
    }

    /// Validate, call the provider once, and return its text verbatim.
    ///
    /// The provider call is bounded by `generate.deadline_secs`. There is
    /// no retry.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        tracing::info!(
            instructions_len = request.instructions.as_ref().map(|s| s.chars().count()),
            knowledge_seed_len = request.knowledge_seed.as_ref().map(|s| s.chars().count()),
            "received generate request"
        );

        let completion = self.prepare(request).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected generate request");
        })?;

        let deadline = Duration::from_secs(self.policy.deadline_secs);
        let result = tokio::time::timeout(deadline, self.provider.complete(&completion)).await;

        match result {
            Ok(Ok(text)) => {
                tracing::debug!(
                    model = self.provider.model_name(),
                    result_len = text.len(),
                    "completion succeeded"
                );
                Ok(text)
            }
            Ok(Err(e)) => {
                tracing::error!(model = self.provider.model_name(), error = %format!("{:#}", e), "completion failed");
                Err(GenerateError::upstream(&e))
            }
            Err(_) => {
                tracing::error!(
                    model = self.provider.model_name(),
                    deadline_secs = self.policy.deadline_secs,
                    "completion deadline exceeded"
                );
                Err(GenerateError::DeadlineExceeded(self.policy.deadline_secs))
            }
        }
    }
}

/// Format the user message sent alongside the system instruction.
pub fn user_message(instructions: &str, knowledge_seed: &str) -> String {
    format!(
        "Instructions: {}\n\nKnowledge Seed:\n{}",
        instructions, knowledge_seed
    )
}
