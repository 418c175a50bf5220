//! Data types exchanged between the form client, the HTTP handler, and
//! the completion provider.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`.
///
/// Field names are camelCase on the wire. Every field is optional at the
/// serde level so that missing values reach validation and produce the
/// documented 400 message instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub knowledge_seed: Option<String>,
}

/// Success body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: String,
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One system + user message pair for a completion provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}
