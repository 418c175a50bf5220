//! Form state and its transitions.
//!
//! [`FormState`] holds every field the user edits plus UI state (active
//! tab, system-instruction edit toggle, loading flag) and the current
//! YAML output. All edits go through [`FormState::apply`], a pure reducer
//! over [`Action`]. [`trigger_generate`] is the one asynchronous
//! transition: validate, call a [`GenerationBackend`], strip the answer's
//! wrapper lines, assemble the document, store it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use crate::assemble::assemble;
use crate::client::GenerationBackend;
use crate::config::FormConfig;
use crate::error::TriggerError;
use crate::models::GenerateRequest;
use crate::postprocess::strip_wrapper_lines;

const BUNDLED_DEFAULTS: &str = include_str!("../data/defaults.toml");

/// Bundled starting values for the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefaults {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub commit: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub knowledge_seed: String,
    #[serde(default)]
    pub system_instruction: String,
}

fn default_version() -> String {
    "2".to_string()
}

impl FormDefaults {
    /// Defaults compiled into the binary from `data/defaults.toml`.
    pub fn bundled() -> Result<Self> {
        toml::from_str(BUNDLED_DEFAULTS).context("Failed to parse bundled form defaults")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read form defaults: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse form defaults: {}", path.display()))
    }

    /// The configured override file, or the bundled defaults.
    pub fn from_config(config: &FormConfig) -> Result<Self> {
        match &config.defaults_path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        }
    }
}

/// User-entered values of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
    pub version: String,
    pub domain: String,
    pub created_by: String,
    pub repo: String,
    pub commit: String,
    pub patterns: Vec<String>,
    pub system_instruction: String,
    pub instructions: String,
    pub knowledge_seed: String,
}

impl Default for Submission {
    fn default() -> Self {
        Self {
            version: default_version(),
            domain: String::new(),
            created_by: String::new(),
            repo: String::new(),
            commit: String::new(),
            patterns: vec![String::new()],
            system_instruction: String::new(),
            instructions: String::new(),
            knowledge_seed: String::new(),
        }
    }
}

impl Submission {
    pub fn from_defaults(defaults: &FormDefaults) -> Self {
        let patterns = if defaults.patterns.is_empty() {
            vec![String::new()]
        } else {
            defaults.patterns.clone()
        };
        Self {
            version: defaults.version.clone(),
            domain: defaults.domain.clone(),
            created_by: defaults.created_by.clone(),
            repo: defaults.repo.clone(),
            commit: defaults.commit.clone(),
            patterns,
            system_instruction: defaults.system_instruction.clone(),
            instructions: String::new(),
            knowledge_seed: defaults.knowledge_seed.clone(),
        }
    }

    /// Names of required scalar fields that are blank after trimming.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("version", &self.version),
            ("domain", &self.domain),
            ("created_by", &self.created_by),
            ("repo", &self.repo),
            ("commit", &self.commit),
            ("system_instruction", &self.system_instruction),
            ("knowledge_seed", &self.knowledge_seed),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn has_pattern(&self) -> bool {
        self.patterns.iter().any(|p| !p.trim().is_empty())
    }

    pub fn generate_request(&self) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Some(self.system_instruction.clone()),
            instructions: Some(self.instructions.clone()),
            knowledge_seed: Some(self.knowledge_seed.clone()),
        }
    }
}

/// Instruction view shown on the right-hand side of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    System,
    User,
    Knowledge,
}

/// A form transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetVersion(String),
    SetDomain(String),
    SetCreatedBy(String),
    SetRepo(String),
    SetCommit(String),
    /// Ignored while the system instruction is locked.
    SetSystemInstruction(String),
    ToggleSystemEditable,
    SetInstructions(String),
    SetKnowledgeSeed(String),
    SelectTab(Tab),
    AddPattern,
    UpdatePattern(usize, String),
    RemovePattern(usize),
    /// Restore the bundled defaults, keeping the current system instruction.
    Reset,
    /// Empty every field (version back to "2", one blank pattern), keeping
    /// the current system instruction.
    ClearDefaults,
    /// Manual edit of the generated document.
    SetYamlOutput(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub submission: Submission,
    pub active_tab: Tab,
    pub system_editable: bool,
    pub loading: bool,
    pub yaml_output: String,
    defaults: Arc<FormDefaults>,
    loading_signal: LoadingSignal,
}

/// Publishes `loading` to subscribers outside the `&mut` borrow held by
/// [`trigger_generate`].
///
/// A cloned form gets its own channel, seeded with the current value.
#[derive(Debug)]
struct LoadingSignal(watch::Sender<bool>);

impl LoadingSignal {
    fn new(initial: bool) -> Self {
        Self(watch::channel(initial).0)
    }

    fn set(&self, loading: bool) {
        self.0.send_replace(loading);
    }
}

impl Clone for LoadingSignal {
    fn clone(&self) -> Self {
        Self::new(*self.0.borrow())
    }
}

impl PartialEq for LoadingSignal {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl FormState {
    pub fn new(defaults: Arc<FormDefaults>) -> Self {
        Self {
            submission: Submission::from_defaults(&defaults),
            active_tab: Tab::default(),
            system_editable: false,
            loading: false,
            yaml_output: String::new(),
            defaults,
            loading_signal: LoadingSignal::new(false),
        }
    }

    pub fn defaults(&self) -> &FormDefaults {
        &self.defaults
    }

    /// Watch the `loading` flag while a generation holds the form mutably.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading_signal.0.subscribe()
    }

    pub fn apply(mut self, action: Action) -> Self {
        let sub = &mut self.submission;
        match action {
            Action::SetVersion(v) => sub.version = v,
            Action::SetDomain(v) => sub.domain = v,
            Action::SetCreatedBy(v) => sub.created_by = v,
            Action::SetRepo(v) => sub.repo = v,
            Action::SetCommit(v) => sub.commit = v,
            Action::SetSystemInstruction(v) => {
                if self.system_editable {
                    sub.system_instruction = v;
                }
            }
            Action::ToggleSystemEditable => self.system_editable = !self.system_editable,
            Action::SetInstructions(v) => sub.instructions = v,
            Action::SetKnowledgeSeed(v) => sub.knowledge_seed = v,
            Action::SelectTab(tab) => self.active_tab = tab,
            Action::AddPattern => {
                let next = self
                    .defaults
                    .patterns
                    .get(sub.patterns.len())
                    .cloned()
                    .unwrap_or_default();
                sub.patterns.push(next);
            }
            Action::UpdatePattern(index, value) => {
                if let Some(slot) = sub.patterns.get_mut(index) {
                    *slot = value;
                }
            }
            Action::RemovePattern(index) => {
                if sub.patterns.len() > 1 && index < sub.patterns.len() {
                    sub.patterns.remove(index);
                }
            }
            Action::Reset => {
                let system_instruction = std::mem::take(&mut sub.system_instruction);
                *sub = Submission {
                    system_instruction,
                    ..Submission::from_defaults(&self.defaults)
                };
            }
            Action::ClearDefaults => {
                let system_instruction = std::mem::take(&mut sub.system_instruction);
                *sub = Submission {
                    system_instruction,
                    ..Submission::default()
                };
            }
            Action::SetYamlOutput(v) => self.yaml_output = v,
        }
        self
    }

    pub fn apply_all(self, actions: impl IntoIterator<Item = Action>) -> Self {
        actions.into_iter().fold(self, FormState::apply)
    }
}

/// A form saved as TOML. Absent fields keep whatever the form already holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

impl FormFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read form file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse form file: {}", path.display()))
    }

    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            version: Some(submission.version.clone()),
            domain: Some(submission.domain.clone()),
            created_by: Some(submission.created_by.clone()),
            repo: Some(submission.repo.clone()),
            commit: Some(submission.commit.clone()),
            patterns: Some(submission.patterns.clone()),
            instructions: Some(submission.instructions.clone()),
            knowledge_seed: Some(submission.knowledge_seed.clone()),
            system_instruction: Some(submission.system_instruction.clone()),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize form file")
    }

    /// Overlay this file onto `state` through the reducer.
    pub fn apply_to(self, state: FormState) -> FormState {
        let mut actions = Vec::new();
        actions.extend(self.version.map(Action::SetVersion));
        actions.extend(self.domain.map(Action::SetDomain));
        actions.extend(self.created_by.map(Action::SetCreatedBy));
        actions.extend(self.repo.map(Action::SetRepo));
        actions.extend(self.commit.map(Action::SetCommit));
        actions.extend(self.instructions.map(Action::SetInstructions));
        actions.extend(self.knowledge_seed.map(Action::SetKnowledgeSeed));
        if let Some(system) = self.system_instruction {
            let toggle = !state.system_editable;
            if toggle {
                actions.push(Action::ToggleSystemEditable);
            }
            actions.push(Action::SetSystemInstruction(system));
            if toggle {
                actions.push(Action::ToggleSystemEditable);
            }
        }
        if let Some(patterns) = self.patterns {
            actions.extend(pattern_actions(state.submission.patterns.len(), patterns));
        }
        state.apply_all(actions)
    }
}

/// Actions that turn a pattern list of length `current` into `target`.
fn pattern_actions(current: usize, target: Vec<String>) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut len = current;
    for (index, pattern) in target.iter().enumerate() {
        if index >= len {
            actions.push(Action::AddPattern);
            len += 1;
        }
        actions.push(Action::UpdatePattern(index, pattern.clone()));
    }
    // Removal stops at one entry.
    let keep = target.len().max(1);
    while len > keep {
        len -= 1;
        actions.push(Action::RemovePattern(len));
    }
    if target.is_empty() {
        actions.push(Action::UpdatePattern(0, String::new()));
    }
    actions
}

/// Clears `loading` when dropped, including when the generate future is
/// cancelled mid-flight.
struct LoadingGuard<'a>(&'a mut FormState);

impl<'a> LoadingGuard<'a> {
    fn engage(state: &'a mut FormState) -> Self {
        state.loading = true;
        state.loading_signal.set(true);
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.loading = false;
        self.0.loading_signal.set(false);
    }
}

/// Run one generation for the form and store the assembled document.
///
/// On success `yaml_output` is replaced and the new document is returned.
/// On any failure the previous `yaml_output` is left untouched. `loading`
/// is true only while the backend call is outstanding.
pub async fn trigger_generate(
    state: &mut FormState,
    backend: &dyn GenerationBackend,
) -> Result<String, TriggerError> {
    let missing = state.submission.missing_fields();
    if !missing.is_empty() {
        return Err(TriggerError::MissingFields(missing));
    }
    if !state.submission.has_pattern() {
        return Err(TriggerError::NoPatterns);
    }

    let request = state.submission.generate_request();
    tracing::info!(
        instructions_len = state.submission.instructions.chars().count(),
        knowledge_seed_len = state.submission.knowledge_seed.chars().count(),
        "generating qna.yaml"
    );

    let mut guard = LoadingGuard::engage(state);
    let answer = backend.generate(&request).await.map_err(|e| {
        tracing::error!(error = %format!("{:#}", e), "generation failed");
        TriggerError::Generation(e.to_string())
    })?;

    let body = strip_wrapper_lines(&answer);
    let yaml = assemble(&guard.0.submission, &guard.0.defaults, &body);
    guard.0.yaml_output = yaml.clone();
    Ok(yaml)
}
