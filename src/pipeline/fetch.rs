//! Fetch stage: obtain the raw PDF bytes from a URL or a local path.
//!
//! The bytes are held in memory for the rest of the run. The text extractor
//! parses them directly; the OCR stage writes them into its scratch
//! directory because the raster tool needs a file. We validate the PDF magic
//! bytes (`%PDF`) here so callers get a meaningful error rather than a parser
//! failure further down.

use crate::config::InputSource;
use crate::error::IngestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Where a [`SourceDocument`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Url(String),
    Path(PathBuf),
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Url(url) => f.write_str(url),
            Origin::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Raw PDF bytes plus provenance. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    origin: Origin,
}

impl SourceDocument {
    pub fn new(bytes: impl Into<Arc<[u8]>>, origin: Origin) -> Self {
        Self {
            bytes: bytes.into(),
            origin,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.origin, Origin::Url(_))
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Fetch the configured input. Exactly one of the two fetchers runs.
pub async fn fetch(source: &InputSource, timeout_secs: u64) -> Result<SourceDocument, IngestError> {
    match source {
        InputSource::Url(url) => fetch_remote(url, timeout_secs).await,
        InputSource::Local(path) => load_local(path).await,
    }
}

/// Read a local PDF, validating existence, permissions and magic bytes.
pub async fn load_local(path: &Path) -> Result<SourceDocument, IngestError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            // Directories and other unreadable entries land here.
            debug!("Reading {} failed: {}", path.display(), e);
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let origin = Origin::Path(path.to_path_buf());
    check_magic(&bytes, &origin)?;

    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceDocument::new(bytes, origin))
}

/// Download a URL with a single GET bounded by `timeout_secs`.
pub async fn fetch_remote(url: &str, timeout_secs: u64) -> Result<SourceDocument, IngestError> {
    info!("Downloading PDF from: {}", url);

    if !is_url(url) {
        return Err(IngestError::DownloadFailed {
            url: url.to_string(),
            reason: "not an HTTP/HTTPS URL".into(),
        });
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IngestError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            IngestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            IngestError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(IngestError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_send_err)?;

    let origin = Origin::Url(url.to_string());
    check_magic(&bytes, &origin)?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(SourceDocument::new(bytes.to_vec(), origin))
}

/// Reject payloads that do not start with `%PDF`.
fn check_magic(bytes: &[u8], origin: &Origin) -> Result<(), IngestError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(IngestError::NotAPdf {
            origin: origin.to_string(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = load_local(Path::new("/definitely/not/a/real/file.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn local_non_pdf_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();

        let err = load_local(&path).await.unwrap_err();
        match err {
            IngestError::NotAPdf { magic, .. } => assert_eq!(magic, b"hell".to_vec()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn local_pdf_loaded_with_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%%EOF\n").unwrap();

        let doc = load_local(&path).await.unwrap();
        assert_eq!(doc.origin(), &Origin::Path(path.clone()));
        assert!(doc.bytes().starts_with(b"%PDF"));
        assert!(!doc.is_remote());
    }

    #[tokio::test]
    async fn non_http_url_rejected_without_io() {
        let err = fetch_remote("ftp://example.com/a.pdf", 5).await.unwrap_err();
        assert!(matches!(err, IngestError::DownloadFailed { .. }));
    }

    #[test]
    fn empty_payload_is_not_a_pdf() {
        let err = check_magic(b"", &Origin::Url("https://x/y.pdf".into())).unwrap_err();
        assert!(matches!(err, IngestError::NotAPdf { .. }));
    }
}
