//! HTTP server for qna.yaml generation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/generate` | Validate input, call the completion provider, return its text |
//! | `POST` | `/api/assemble` | Render a submission and model text as a `qna.yaml` download |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every error response has the shape:
//!
//! ```json
//! { "error": "Instructions and Knowledge Seed are required" }
//! ```
//!
//! Validation failures are `400`; provider failures (HTTP errors,
//! timeouts, malformed responses, deadline exceeded) are `500`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser form
//! served from another origin can call the API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::assemble::assemble;
use crate::completion::{create_provider, CompletionProvider};
use crate::config::Config;
use crate::export::{QNA_FILE_NAME, QNA_MIME_TYPE};
use crate::form::{FormDefaults, Submission};
use crate::generate::Generator;
use crate::models::{ErrorResponse, GenerateRequest, GenerateResponse};
use crate::postprocess::strip_wrapper_lines;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    generator: Generator,
    defaults: Arc<FormDefaults>,
}

impl AppState {
    pub fn new(config: &Config, provider: Arc<dyn CompletionProvider>, defaults: Arc<FormDefaults>) -> Self {
        Self {
            generator: Generator::new(provider, config.generate.clone()),
            defaults,
        }
    }
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// drive it without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/generate", post(handle_generate))
        .route("/api/assemble", post(handle_assemble))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and runs until the process is terminated.
/// The completion provider and form defaults are built from the config
/// before binding, so a missing API key fails at startup.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider: Arc<dyn CompletionProvider> = Arc::from(create_provider(&config.completion)?);
    let defaults = Arc::new(FormDefaults::from_config(&config.form)?);
    let state = AppState::new(config, provider, defaults);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        model = state.generator.provider().model_name(),
        "ilabyaml server listening"
    );
    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn bad_request(message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: message.into(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

// ============ POST /api/generate ============

/// Handler for `POST /api/generate`.
///
/// Returns `200 { result }` with the provider's text, `400 { error }`
/// for validation failures or an unreadable body, `500 { error }` when
/// the provider call fails.
async fn handle_generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "unreadable generate request");
            return bad_request(rejection.body_text());
        }
    };

    match state.generator.generate(&request).await {
        Ok(result) => Json(GenerateResponse { result }).into_response(),
        Err(e) => e.into_response(),
    }
}

// ============ POST /api/assemble ============

/// Body of `POST /api/assemble`.
#[derive(Debug, Deserialize, Serialize)]
pub struct AssembleRequest {
    #[serde(default)]
    pub submission: Submission,
    /// Model answer as returned by `/api/generate`.
    #[serde(default)]
    pub text: String,
    /// Drop the answer's first and last lines before assembly.
    #[serde(default = "default_strip_wrapper")]
    pub strip_wrapper: bool,
}

fn default_strip_wrapper() -> bool {
    true
}

/// Handler for `POST /api/assemble`.
///
/// Responds with the rendered document as a `text/yaml` attachment named
/// `qna.yaml`.
async fn handle_assemble(
    State(state): State<AppState>,
    payload: Result<Json<AssembleRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let text = if request.strip_wrapper {
        strip_wrapper_lines(&request.text)
    } else {
        request.text
    };
    let yaml = assemble(&request.submission, &state.defaults, &text);

    (
        [
            (header::CONTENT_TYPE, QNA_MIME_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", QNA_FILE_NAME),
            ),
        ],
        yaml,
    )
        .into_response()
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
