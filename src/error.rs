//! Error types for generation and the form trigger.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Fallback message for upstream failures that carry no text.
pub const GENERIC_FAILURE: &str = "Failed to process your request";

/// Failure of the generation request handler.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Instructions and Knowledge Seed are required")]
    MissingInput,

    #[error("Knowledge Seed is too large. Please reduce the content.")]
    SeedTooLarge { len: usize, limit: usize },

    #[error("{0}")]
    Upstream(String),

    #[error("Request timed out after {0} seconds")]
    DeadlineExceeded(u64),
}

impl GenerateError {
    /// Wrap a provider error, keeping its message when it has one.
    pub fn upstream(err: &anyhow::Error) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            Self::Upstream(GENERIC_FAILURE.to_string())
        } else {
            Self::Upstream(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput | Self::SeedTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::DeadlineExceeded(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.status() == StatusCode::BAD_REQUEST
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

/// Failure of the form's generate action.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Please fill in the following required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("At least one pattern is required")]
    NoPatterns,

    #[error("{0}")]
    Generation(String),
}
