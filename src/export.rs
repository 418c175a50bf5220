//! Export of the generated document.
//!
//! Writes `qna.yaml` into a directory (the "download" action) or prints
//! the document to stdout verbatim (the "copy" action, for piping into a
//! clipboard tool).

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const QNA_FILE_NAME: &str = "qna.yaml";
pub const QNA_MIME_TYPE: &str = "text/yaml";

/// Write `yaml` to `dir/qna.yaml`, replacing any existing file.
pub fn write_qna(dir: &Path, yaml: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = dir.join(QNA_FILE_NAME);
    std::fs::write(&path, yaml)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = yaml.len(), "wrote qna.yaml");
    Ok(path)
}

/// Print `yaml` to stdout with no added newline.
pub fn write_stdout(yaml: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(yaml.as_bytes())?;
    out.flush()?;
    Ok(())
}
