//! Cleanup of the model's answer before it is spliced into `qna.yaml`.
//!
//! The system instruction asks the model to wrap its YAML in a fenced
//! block. [`strip_wrapper_lines`] removes that framing positionally: the
//! first and last lines are dropped whenever there are at least three
//! lines. The remaining content is not inspected.

/// Drop the first and last lines of `text` when it has at least three lines.
///
/// Lines are split on `\n` only; an empty final segment after a trailing
/// newline counts as a line.
///
/// ```rust
/// use ilabyaml::postprocess::strip_wrapper_lines;
///
/// assert_eq!(strip_wrapper_lines("```yaml\nk: v\n```"), "k: v");
/// assert_eq!(strip_wrapper_lines("a\nb"), "a\nb");
/// ```
pub fn strip_wrapper_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 3 {
        return text.to_string();
    }
    lines[1..lines.len() - 1].join("\n")
}
