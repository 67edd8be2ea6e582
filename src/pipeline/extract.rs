//! Embedded text extraction: one [`PageText`] per page via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`extract_pages`] moves the work onto tokio's blocking pool.
//!
//! ## Page-level tolerance
//!
//! A page whose content stream cannot be decoded keeps its slot with empty
//! text and a [`StageWarning::PageExtractionFailed`]; the remaining pages are
//! still read. Only a document that cannot be opened at all is fatal.

use crate::error::{IngestError, StageWarning};
use crate::output::PageText;
use crate::pipeline::fetch::SourceDocument;
use pdfium_render::prelude::*;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pages read from a document plus the pages that degraded.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub pages: Vec<PageText>,
    pub warnings: Vec<StageWarning>,
}

impl Extraction {
    /// Append the outcome of reading page `index` (1-based).
    ///
    /// A failed read becomes an empty page plus a warning.
    pub fn push_page<E: Display>(&mut self, index: usize, text: Result<String, E>) {
        match text {
            Ok(t) => {
                debug!("Page {}: {} chars of embedded text", index, t.chars().count());
                self.pages.push(PageText::new(index, t));
            }
            Err(e) => {
                let detail = e.to_string();
                warn!("Page {}: embedded text extraction failed: {}", index, detail);
                self.pages.push(PageText::new(index, String::new()));
                self.warnings
                    .push(StageWarning::PageExtractionFailed { page: index, detail });
            }
        }
    }
}

/// Produces per-page embedded text from PDF bytes.
///
/// Implementations are synchronous; the run driver calls them on the
/// blocking pool through [`extract_pages`].
pub trait TextExtractor: Send + Sync {
    fn extract(&self, doc: &SourceDocument) -> Result<Extraction, IngestError>;
}

/// Run `extractor` on the blocking pool.
pub async fn extract_pages(
    extractor: Arc<dyn TextExtractor>,
    doc: &SourceDocument,
) -> Result<Extraction, IngestError> {
    let doc = doc.clone();
    tokio::task::spawn_blocking(move || extractor.extract(&doc))
        .await
        .map_err(|e| IngestError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// [`TextExtractor`] backed by the pdfium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextExtractor {
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumTextExtractor {
    pub fn new(password: Option<String>, library_path: Option<PathBuf>) -> Self {
        Self {
            password,
            library_path,
        }
    }

    /// Bind to libpdfium: the configured file or directory, else the system library.
    fn bind(&self) -> Result<Pdfium, IngestError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| IngestError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

/// File name of the pdfium shared library on this platform.
fn platform_library_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "pdfium.dll"
    } else if cfg!(target_os = "macos") {
        "libpdfium.dylib"
    } else {
        "libpdfium.so"
    }
}

/// Resolve a directory to the platform library file inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(platform_library_name())
    } else {
        path.to_path_buf()
    }
}

impl TextExtractor for PdfiumTextExtractor {
    fn extract(&self, doc: &SourceDocument) -> Result<Extraction, IngestError> {
        let pdfium = self.bind()?;
        let origin = doc.origin().to_string();
        let password = self.password.as_deref();

        let document = pdfium
            .load_pdf_from_byte_slice(doc.bytes(), password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        IngestError::WrongPassword {
                            origin: origin.clone(),
                        }
                    } else {
                        IngestError::PasswordRequired {
                            origin: origin.clone(),
                        }
                    }
                } else {
                    IngestError::CorruptPdf {
                        origin: origin.clone(),
                        detail: err_str,
                    }
                }
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let mut extraction = Extraction {
            pages: Vec::with_capacity(total_pages),
            warnings: Vec::new(),
        };
        for (i, page) in pages.iter().enumerate() {
            extraction.push_page(i + 1, page.text().map(|t| t.all()));
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fetch::Origin;

    struct FixedExtractor(Vec<Result<String, String>>);

    impl TextExtractor for FixedExtractor {
        fn extract(&self, _doc: &SourceDocument) -> Result<Extraction, IngestError> {
            let mut out = Extraction::default();
            for (i, r) in self.0.iter().enumerate() {
                out.push_page(i + 1, r.clone());
            }
            Ok(out)
        }
    }

    fn doc() -> SourceDocument {
        SourceDocument::new(b"%PDF-1.4".to_vec(), Origin::Path("t.pdf".into()))
    }

    #[test]
    fn failed_page_keeps_its_slot() {
        let mut ex = Extraction::default();
        ex.push_page(1, Ok::<_, String>("first".into()));
        ex.push_page(2, Err("bad content stream"));
        ex.push_page(3, Ok::<_, String>("third".into()));

        assert_eq!(ex.pages.len(), 3);
        assert_eq!(ex.pages[1].index, 2);
        assert!(ex.pages[1].embedded_text.is_empty());
        assert_eq!(ex.pages[2].embedded_text, "third");
        assert_eq!(
            ex.warnings,
            vec![StageWarning::PageExtractionFailed {
                page: 2,
                detail: "bad content stream".into()
            }]
        );
    }

    #[tokio::test]
    async fn extract_pages_runs_on_blocking_pool() {
        let extractor: Arc<dyn TextExtractor> = Arc::new(FixedExtractor(vec![
            Ok("a".into()),
            Err("unsupported encoding".into()),
        ]));
        let ex = extract_pages(extractor, &doc()).await.unwrap();
        assert_eq!(ex.pages.len(), 2);
        assert_eq!(ex.warnings.len(), 1);
    }

    #[tokio::test]
    async fn zero_pages_is_empty() {
        let extractor: Arc<dyn TextExtractor> = Arc::new(FixedExtractor(vec![]));
        let ex = extract_pages(extractor, &doc()).await.unwrap();
        assert!(ex.pages.is_empty());
        assert!(ex.warnings.is_empty());
    }

    #[test]
    fn library_file_resolves_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            library_file(dir.path()),
            dir.path().join(platform_library_name())
        );
    }

    #[test]
    fn library_file_keeps_explicit_file() {
        let p = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(p), p.to_path_buf());
    }
}
