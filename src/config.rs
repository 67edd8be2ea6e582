//! Configuration types for a PDF ingestion run.
//!
//! All run behaviour is controlled through [`IngestConfig`], built via its
//! [`IngestConfigBuilder`]. Toggles that older scripts read from the
//! environment at arbitrary points (force OCR, tool locations) are plain
//! fields here: the library never consults ambient globals, so two runs with
//! equal configs and equal input produce equal artifacts.

use crate::error::IngestError;
use crate::pipeline::ocr::validate_language;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default location of the merged raw text artifact.
pub const DEFAULT_RAW_TEXT_PATH: &str = "data/raw_text.txt";
/// Default location of the structured markdown artifact.
pub const DEFAULT_STRUCTURED_PATH: &str = "data/structured.md";
/// Default location of the placeholder deliverable for downstream steps.
pub const DEFAULT_DELIVERABLE_PATH: &str = "deliverables/full_rundown.md";
/// Default location of the persisted copy of a downloaded PDF.
pub const DEFAULT_SOURCE_COPY_PATH: &str = "data/source.pdf";

/// Where the PDF comes from. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputSource {
    /// HTTP/HTTPS URL fetched with a GET request.
    Url(String),
    /// File on the local filesystem.
    Local(PathBuf),
}

impl InputSource {
    /// Human-readable provenance used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            InputSource::Url(url) => url.clone(),
            InputSource::Local(path) => path.display().to_string(),
        }
    }
}

/// Constants of the text-density heuristic.
///
/// A page is *emptyish* when its trimmed embedded text has fewer than
/// `threshold_chars_per_page` characters. OCR is needed once the emptyish
/// count exceeds `max(min_emptyish_pages, page_count / emptyish_divisor)`.
/// The defaults (500, 2, 3) are empirical and meant to be tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityPolicy {
    pub threshold_chars_per_page: usize,
    pub min_emptyish_pages: usize,
    pub emptyish_divisor: usize,
}

impl Default for DensityPolicy {
    fn default() -> Self {
        Self {
            threshold_chars_per_page: 500,
            min_emptyish_pages: 2,
            emptyish_divisor: 3,
        }
    }
}

/// Configuration for one ingestion run.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_ingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .local_path("report.pdf")
///     .force_ocr(true)
///     .ocr_language("eng+deu")
///     .build()
///     .unwrap();
/// assert!(config.force_ocr);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// The PDF to ingest. `None` fails the run with [`IngestError::MissingInput`].
    pub source: Option<InputSource>,

    /// Run OCR regardless of the density verdict. Default: false.
    ///
    /// Meant for documents known to be scanned, where a few pages of stray
    /// embedded text would otherwise hide the need for OCR.
    pub force_ocr: bool,

    /// Density heuristic constants.
    pub density: DensityPolicy,

    /// Language passed to the OCR engine (`-l`). Default: "eng".
    pub ocr_language: String,

    /// Raster resolution for OCR page images. Range: 72–600. Default: 150.
    pub dpi: u32,

    /// Raster tool executable. Default: "pdftoppm".
    pub raster_tool: PathBuf,

    /// OCR engine executable. Default: "tesseract".
    pub ocr_engine: PathBuf,

    /// Upper bound for every external tool invocation, in seconds. Default: 120.
    ///
    /// A timed-out tool is killed and treated exactly like a failed one.
    pub tool_timeout_secs: u64,

    /// HTTP timeout for URL inputs, in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Number of images recognised concurrently. Default: 4.
    pub ocr_concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit libpdfium location (file or directory). If None, the system
    /// library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Merged raw text output. Default: `data/raw_text.txt`.
    pub raw_text_path: PathBuf,

    /// Structured markdown output. Default: `data/structured.md`.
    pub structured_path: PathBuf,

    /// Placeholder deliverable created once if absent. Default:
    /// `deliverables/full_rundown.md`. None disables scaffolding.
    pub deliverable_path: Option<PathBuf>,

    /// Where to persist the downloaded PDF for URL inputs. Default: None.
    pub source_copy_path: Option<PathBuf>,

    /// Parent directory for the OCR scratch directory. Default: system temp.
    pub scratch_dir: Option<PathBuf>,

    /// Optional stage/progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: None,
            force_ocr: false,
            density: DensityPolicy::default(),
            ocr_language: "eng".to_string(),
            dpi: 150,
            raster_tool: PathBuf::from("pdftoppm"),
            ocr_engine: PathBuf::from("tesseract"),
            tool_timeout_secs: 120,
            download_timeout_secs: 60,
            ocr_concurrency: 4,
            password: None,
            pdfium_lib_path: None,
            raw_text_path: PathBuf::from(DEFAULT_RAW_TEXT_PATH),
            structured_path: PathBuf::from(DEFAULT_STRUCTURED_PATH),
            deliverable_path: Some(PathBuf::from(DEFAULT_DELIVERABLE_PATH)),
            source_copy_path: None,
            scratch_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("source", &self.source)
            .field("force_ocr", &self.force_ocr)
            .field("density", &self.density)
            .field("ocr_language", &self.ocr_language)
            .field("dpi", &self.dpi)
            .field("raster_tool", &self.raster_tool)
            .field("ocr_engine", &self.ocr_engine)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("raw_text_path", &self.raw_text_path)
            .field("structured_path", &self.structured_path)
            .field("deliverable_path", &self.deliverable_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn IngestProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
            source_url: None,
            local_path: None,
        }
    }

    /// The configured input, or [`IngestError::MissingInput`].
    pub fn require_source(&self) -> Result<&InputSource, IngestError> {
        self.source.as_ref().ok_or(IngestError::MissingInput)
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
    source_url: Option<String>,
    local_path: Option<PathBuf>,
}

impl IngestConfigBuilder {
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn local_path(mut self, path: impl AsRef<Path>) -> Self {
        self.local_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.config.force_ocr = v;
        self
    }

    pub fn density(mut self, policy: DensityPolicy) -> Self {
        self.config.density = policy;
        self
    }

    pub fn threshold_chars_per_page(mut self, n: usize) -> Self {
        self.config.density.threshold_chars_per_page = n;
        self
    }

    pub fn min_emptyish_pages(mut self, n: usize) -> Self {
        self.config.density.min_emptyish_pages = n;
        self
    }

    pub fn emptyish_divisor(mut self, n: usize) -> Self {
        self.config.density.emptyish_divisor = n;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn raster_tool(mut self, path: impl AsRef<Path>) -> Self {
        self.config.raster_tool = path.as_ref().to_path_buf();
        self
    }

    pub fn ocr_engine(mut self, path: impl AsRef<Path>) -> Self {
        self.config.ocr_engine = path.as_ref().to_path_buf();
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.pdfium_lib_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn raw_text_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.raw_text_path = path.as_ref().to_path_buf();
        self
    }

    pub fn structured_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.structured_path = path.as_ref().to_path_buf();
        self
    }

    pub fn deliverable_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.deliverable_path = path;
        self
    }

    pub fn source_copy_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.source_copy_path = path;
        self
    }

    pub fn scratch_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.scratch_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing input is not a build error: it surfaces as
    /// [`IngestError::MissingInput`] when the run starts, before any I/O.
    pub fn build(mut self) -> Result<IngestConfig, IngestError> {
        self.config.source = match (self.source_url, self.local_path) {
            (Some(_), Some(_)) => {
                return Err(IngestError::InvalidConfig(
                    "Provide either a source URL or a local path, not both".into(),
                ))
            }
            (Some(url), None) => Some(InputSource::Url(url)),
            (None, Some(path)) => Some(InputSource::Local(path)),
            (None, None) => None,
        };

        let c = &self.config;
        if c.density.emptyish_divisor == 0 {
            return Err(IngestError::InvalidConfig(
                "Emptyish divisor must be ≥ 1".into(),
            ));
        }
        validate_language(&c.ocr_language)
            .map_err(|e| IngestError::InvalidConfig(e.to_string()))?;
        if c.raw_text_path == c.structured_path {
            return Err(IngestError::InvalidConfig(format!(
                "Raw text and structured outputs must differ, both are {}",
                c.raw_text_path.display()
            )));
        }
        Ok(self.config)
    }
}
