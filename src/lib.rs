//! # pdf-ingest
//!
//! Ingest one PDF, extract its embedded text and fall back to OCR when the
//! text is too sparse to trust, producing merged artifacts for downstream
//! consumers (summarisers, narrators, diagram generators).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Fetch     download from URL (60 s timeout) or read local file
//!  ├─ 2. Extract   per-page embedded text via pdfium (spawn_blocking)
//!  ├─ 3. Density   emptyish pages > max(2, n/3)?  (or forced OCR)
//!  ├─ 4. OCR       pdftoppm → tesseract per page image, failures degrade
//!  ├─ 5. Merge     "--- PAGE n ---" / "--- OCR page-n.png ---" markers
//!  └─ 6. Write     data/raw_text.txt, data/structured.md, deliverable scaffold
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_ingest::{ingest, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::builder()
//!         .local_path("report.pdf")
//!         .build()?;
//!     let output = ingest(&config).await?;
//!     println!("{}", output.raw_text_path.display());
//!     for w in &output.warnings {
//!         eprintln!("warning: {w}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime requirements
//!
//! | Tool        | Used by  | Missing means                      |
//! |-------------|----------|------------------------------------|
//! | libpdfium   | Extract  | fatal `PdfiumBindingFailed`        |
//! | `pdftoppm`  | OCR      | warning, no OCR text               |
//! | `tesseract` | OCR      | warning per image, no OCR text     |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-ingest` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DensityPolicy, IngestConfig, IngestConfigBuilder, InputSource};
pub use error::{IngestError, OcrError, StageWarning};
pub use ingest::{ingest, ingest_with, inspect, inspect_with};
pub use output::{
    DensityVerdict, ExtractionReport, IngestOutput, IngestStats, Inspection, OcrBlock, OcrStatus,
    PageText,
};
pub use pipeline::extract::{Extraction, PdfiumTextExtractor, TextExtractor};
pub use pipeline::fetch::{Origin, SourceDocument};
pub use pipeline::ocr::{CommandLineOcr, OcrProvider};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback, RunStage};
