//! Progress-callback trait for stage and per-image OCR events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to observe a run
//! as it moves through its stages and as OCR works through page images.
//!
//! # Example
//!
//! ```rust
//! use pdf_ingest::{IngestConfig, IngestProgressCallback, RunStage};
//! use std::sync::Arc;
//!
//! struct StagePrinter;
//!
//! impl IngestProgressCallback for StagePrinter {
//!     fn on_stage(&self, stage: RunStage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(Arc::new(StagePrinter) as Arc<dyn IngestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The states a run passes through, in order.
///
/// Exactly one of `OcrAttempted` / `OcrSkipped` is visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStage {
    Fetched,
    Extracted,
    DensityChecked,
    OcrAttempted,
    OcrSkipped,
    Merged,
    Written,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Fetched => "fetched",
            RunStage::Extracted => "extracted",
            RunStage::DensityChecked => "density checked",
            RunStage::OcrAttempted => "OCR attempted",
            RunStage::OcrSkipped => "OCR skipped",
            RunStage::Merged => "merged",
            RunStage::Written => "written",
        };
        f.write_str(name)
    }
}

/// Called by the run driver as it advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// OCR recognition runs several images at once, so `on_image_complete` and
/// `on_image_error` may be called concurrently. Protect shared mutable state
/// with `Mutex` or atomics.
pub trait IngestProgressCallback: Send + Sync {
    /// Called when the run enters `stage`.
    fn on_stage(&self, stage: RunStage) {
        let _ = stage;
    }

    /// Called once rasterization produced `total_images` page images.
    fn on_ocr_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called when an image was recognised.
    ///
    /// # Arguments
    /// * `ordinal`: 1-indexed image position (equals the page number)
    /// * `total`:   number of images being recognised
    /// * `chars`:   characters of recognised text
    fn on_image_complete(&self, ordinal: usize, total: usize, chars: usize) {
        let _ = (ordinal, total, chars);
    }

    /// Called when recognition of an image failed; the image is skipped.
    fn on_image_error(&self, ordinal: usize, total: usize, error: &str) {
        let _ = (ordinal, total, error);
    }

    /// Called once after the artifacts were written.
    ///
    /// # Arguments
    /// * `pages`:      pages in the document
    /// * `ocr_blocks`: OCR blocks merged into the output
    fn on_ingest_complete(&self, pages: usize, ocr_blocks: usize) {
        let _ = (pages, ocr_blocks);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;
