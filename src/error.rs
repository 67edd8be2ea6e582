//! Error types for the pdf-ingest library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`IngestError`] (**fatal**): the run cannot proceed (input missing,
//!   download failed, document unreadable, output not writable). Returned as
//!   `Err(IngestError)` from [`crate::ingest::ingest`] and friends.
//!
//! * [`StageWarning`] (**non-fatal**): a single page or image could not be
//!   processed, or the OCR stage could not run at all. The run still writes
//!   whatever it produced; warnings are collected in
//!   [`crate::output::IngestOutput::warnings`].
//!
//! * [`OcrError`]: raised by [`crate::pipeline::ocr::OcrProvider`]
//!   implementations and converted into a [`StageWarning`] at the OCR stage
//!   boundary. It never escapes a run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither a URL nor a local path was supplied.
    #[error("No input given: provide a source URL or a local PDF path")]
    MissingInput,

    /// Input file was not found at the given path.
    #[error("Local PDF not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The payload was read, but is not a PDF.
    #[error("Input is not a valid PDF: '{origin}'\nFirst bytes: {magic:?}")]
    NotAPdf { origin: String, magic: Vec<u8> },

    /// HTTP request failed or the server answered with a non-success status.
    #[error("Failed to download '{url}': {reason}\nCheck the URL and your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The document structure cannot be parsed at all.
    #[error("PDF '{origin}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { origin: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{origin}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { origin: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{origin}'")]
    WrongPassword { origin: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Embedded text extraction needs libpdfium at runtime. You can:\n\
  • Install pdfium system-wide (it is then found on the library path).\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// `true` for the errors raised while obtaining the source bytes.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            IngestError::MissingInput
                | IngestError::FileNotFound { .. }
                | IngestError::PermissionDenied { .. }
                | IngestError::NotAPdf { .. }
                | IngestError::DownloadFailed { .. }
                | IngestError::DownloadTimeout { .. }
        )
    }
}

/// A non-fatal degradation recorded during a run.
///
/// The run still succeeds; the affected page or image simply contributes
/// less text than it could have.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StageWarning {
    /// Embedded text of one page could not be read; the page is kept with
    /// empty text.
    #[error("Page {page}: embedded text extraction failed: {detail}")]
    PageExtractionFailed { page: usize, detail: String },

    /// The raster tool could not produce page images; OCR contributed nothing.
    #[error("OCR skipped: rasterization failed: {detail}")]
    RasterizationFailed { detail: String },

    /// The OCR engine failed on one image; that image contributed no block.
    #[error("OCR failed for image '{image}': {detail}")]
    RecognitionFailed { image: String, detail: String },
}

/// Failure of an external raster tool or OCR engine invocation.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The executable could not be started (not installed, not on `PATH`).
    #[error("'{tool}' is not available: {detail}")]
    ToolUnavailable { tool: String, detail: String },

    /// The executable ran and exited unsuccessfully.
    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The executable did not finish within the configured timeout and was killed.
    #[error("'{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// Reading tool output or the scratch directory failed.
    #[error("I/O error during OCR: {0}")]
    Io(#[from] std::io::Error),

    /// The configured language code is not safe to pass to the engine.
    #[error("Invalid OCR language code '{0}'")]
    InvalidLanguage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = IngestError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(e.to_string().contains("/tmp/missing.pdf"));
        assert!(e.is_fetch_error());
    }

    #[test]
    fn download_failed_is_fetch_error() {
        let e = IngestError::DownloadFailed {
            url: "https://example.com/a.pdf".into(),
            reason: "HTTP 404 Not Found".into(),
        };
        assert!(e.to_string().contains("404"));
        assert!(e.is_fetch_error());
    }

    #[test]
    fn output_write_is_not_fetch_error() {
        let e = IngestError::OutputWriteFailed {
            path: PathBuf::from("data/raw_text.txt"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!e.is_fetch_error());
        assert!(e.to_string().contains("data/raw_text.txt"));
    }

    #[test]
    fn recognition_warning_display() {
        let w = StageWarning::RecognitionFailed {
            image: "page-03.png".into(),
            detail: "exit status 1".into(),
        };
        let msg = w.to_string();
        assert!(msg.contains("page-03.png"), "got: {msg}");
    }

    #[test]
    fn ocr_timeout_display() {
        let e = OcrError::Timeout {
            tool: "tesseract".into(),
            secs: 120,
        };
        assert!(e.to_string().contains("120s"));
    }
}
