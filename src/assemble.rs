//! `qna.yaml` assembly.
//!
//! The document is built by plain string templating, not a YAML
//! serializer. Field values and the model text are inserted as-is, so a
//! value containing YAML syntax (a colon followed by a space, a leading
//! dash, quotes) produces a malformed document. Output is deterministic:
//! the same inputs always give the same string.
//!
//! ```text
//! version: {version}
//! domain: {domain}
//! created_by: {created_by}
//! {model text}
//! document:
//!   repo: {repo}
//!   commit: {commit}
//!   patterns:
//!     - {pattern}
//! ```

use crate::form::{FormDefaults, Submission};

/// Pattern used when neither the form nor the defaults provide one.
pub const FALLBACK_PATTERN: &str = "filename.md";

/// Render the final document.
///
/// Empty scalar fields fall back to the matching value in `defaults`.
/// Blank pattern entries are skipped; when none remain, a single line
/// with the first default pattern is written, or [`FALLBACK_PATTERN`] when
/// that one is missing or blank.
/// The result has no trailing newline.
pub fn assemble(submission: &Submission, defaults: &FormDefaults, model_text: &str) -> String {
    let patterns: Vec<String> = submission
        .patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("    - {}", p))
        .collect();

    let patterns = if patterns.is_empty() {
        let fallback = defaults
            .patterns
            .first()
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(FALLBACK_PATTERN);
        format!("    - {}", fallback)
    } else {
        patterns.join("\n")
    };

    format!(
        "version: {}\n\
         domain: {}\n\
         created_by: {}\n\
         {}\n\
         document:\n  \
         repo: {}\n  \
         commit: {}\n  \
         patterns:\n\
         {}",
        or_default(&submission.version, &defaults.version),
        or_default(&submission.domain, &defaults.domain),
        or_default(&submission.created_by, &defaults.created_by),
        model_text,
        or_default(&submission.repo, &defaults.repo),
        or_default(&submission.commit, &defaults.commit),
        patterns,
    )
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
