//! Delegation to the `markitdown` command-line converter.
//!
//! Office documents, e-books and audio go through the external tool:
//! `markitdown <path>` prints Markdown on stdout. The program name comes from
//! `MARKITDOWN_BIN` (default `markitdown`).

use crate::error::ConversionError;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Run `program <path>` and return its stdout as Markdown.
pub async fn run_external(program: &str, path: &Path) -> Result<String, ConversionError> {
    debug!("Running {} {}", program, path.display());

    let output = Command::new(program)
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ConversionError::ConverterUnavailable {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ConversionError::ConverterFailed {
            program: program.to_string(),
            path: path.to_path_buf(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
