//! Artifact persistence.
//!
//! Primary artifacts are fully overwritten on every run through a temp file +
//! rename, so a crash mid-write never leaves a truncated artifact behind and
//! identical runs produce byte-identical files. The placeholder deliverable
//! is the exception: it is created once and never touched again.

use crate::error::IngestError;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Content of the placeholder deliverable scaffolded for downstream steps.
pub const DELIVERABLE_PLACEHOLDER: &str = "# Full Run-down (placeholder)\n\nPopulate via LLM step.";

/// Write `content` to `path`, creating parent directories and replacing any
/// existing file.
pub async fn write_artifact(path: &Path, content: impl AsRef<[u8]>) -> Result<(), IngestError> {
    let map_err = |source: std::io::Error| IngestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(map_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, content.as_ref())
        .await
        .map_err(map_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(map_err(e));
    }

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Create `path` with `content` only if it does not exist yet.
///
/// Returns `true` when the file was created by this call.
pub async fn scaffold_if_absent(path: &Path, content: &str) -> Result<bool, IngestError> {
    let path_buf = path.to_path_buf();
    let content = content.to_string();

    tokio::task::spawn_blocking(move || {
        let map_err = |source: std::io::Error| IngestError::OutputWriteFailed {
            path: path_buf.clone(),
            source,
        };

        if let Some(parent) = path_buf.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(map_err)?;
        }

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path_buf)
        {
            Ok(mut file) => {
                file.write_all(content.as_bytes()).map_err(map_err)?;
                debug!("Scaffolded {}", path_buf.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(map_err(e)),
        }
    })
    .await
    .map_err(|e| IngestError::Internal(format!("Scaffold task panicked: {}", e)))?
}
