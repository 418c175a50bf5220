//! TOML configuration parsing and validation.
//!
//! Every section is optional; an absent config file yields
//! [`Config::default`], which targets the OpenAI chat completions API with
//! `gpt-4o-mini` and the bundled form defaults.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// System message used when a request carries a blank system instruction.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are an AI assistant that generates YAML files based on instructions and knowledge seeds.";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
    #[serde(default)]
    pub form: FormConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Settings for the upstream chat-completion provider.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    45
}

/// Policy for the generation request handler.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerateConfig {
    /// Overall handler deadline, covering the provider call.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Knowledge seed size guard in characters. `0` disables the guard.
    #[serde(default = "default_max_seed_chars")]
    pub max_seed_chars: usize,
    #[serde(default = "default_system_instruction")]
    pub default_system_instruction: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            max_seed_chars: default_max_seed_chars(),
            default_system_instruction: default_system_instruction(),
        }
    }
}

impl GenerateConfig {
    /// The active size limit, or `None` when the guard is turned off.
    pub fn seed_limit(&self) -> Option<usize> {
        (self.max_seed_chars > 0).then_some(self.max_seed_chars)
    }
}

fn default_deadline_secs() -> u64 {
    50
}
fn default_max_seed_chars() -> usize {
    50_000
}
fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FormConfig {
    /// Replaces the bundled form defaults when set.
    #[serde(default)]
    pub defaults_path: Option<PathBuf>,
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but falls back to [`Config::default`] when the
/// file does not exist. A file that exists but fails to parse is still
/// an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    let completion = &config.completion;

    match completion.provider.as_str() {
        "openai" | "disabled" => {}
        other => bail!(
            "Unknown completion provider: '{}'. Must be openai or disabled.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&completion.temperature) {
        bail!("completion.temperature must be in [0.0, 2.0]");
    }
    if completion.max_tokens == 0 {
        bail!("completion.max_tokens must be > 0");
    }
    if completion.timeout_secs == 0 {
        bail!("completion.timeout_secs must be > 0");
    }
    if config.generate.deadline_secs < completion.timeout_secs {
        bail!(
            "generate.deadline_secs ({}) must be >= completion.timeout_secs ({})",
            config.generate.deadline_secs,
            completion.timeout_secs
        );
    }
    if completion.is_enabled() && completion.model.trim().is_empty() {
        bail!("completion.model must be specified when provider is 'openai'");
    }

    Ok(())
}
