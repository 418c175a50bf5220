//! # ilabyaml
//!
//! Generate InstructLab taxonomy `qna.yaml` files from a knowledge seed
//! using a hosted chat-completion model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ FormState  │──▶│ /api/generate │──▶│ CompletionProvider│
//! │ (reducer)  │   │  Generator    │   │  (OpenAI)        │
//! └─────┬──────┘   └──────┬───────┘   └─────────────────┘
//!       │   answer text   │
//!       ◀─────────────────┘
//!       ▼
//! strip_wrapper_lines ──▶ assemble ──▶ qna.yaml
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! ilabyaml serve                              # start HTTP server
//! ilabyaml init-form form.toml                # starting form from bundled defaults
//! ilabyaml generate --form form.toml --out .  # writes ./qna.yaml
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Wire and provider request types |
//! | [`error`] | Handler and trigger error types |
//! | [`completion`] | Completion provider abstraction |
//! | [`generate`] | Request validation and the provider call |
//! | [`server`] | HTTP server |
//! | [`client`] | Generation backends used by the form |
//! | [`postprocess`] | Answer wrapper-line stripping |
//! | [`assemble`] | `qna.yaml` templating |
//! | [`form`] | Form state, reducer, and generate trigger |
//! | [`export`] | Writing and printing the document |

pub mod assemble;
pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod export;
pub mod form;
pub mod generate;
pub mod models;
pub mod postprocess;
pub mod server;
