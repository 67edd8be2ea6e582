//! Data produced by a run: per-page text, OCR blocks and the final report.

use crate::error::StageWarning;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Text of one page.
///
/// Created by the text extractor with `ocr_text: None`; only the OCR stage
/// fills `ocr_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub index: usize,
    /// Embedded text; empty when the page had none or could not be read.
    pub embedded_text: String,
    /// Text recognised from this page's image, if OCR ran and succeeded.
    pub ocr_text: Option<String>,
}

impl PageText {
    pub fn new(index: usize, embedded_text: impl Into<String>) -> Self {
        Self {
            index,
            embedded_text: embedded_text.into(),
            ocr_text: None,
        }
    }

    /// Character count of the trimmed embedded text.
    pub fn stripped_len(&self) -> usize {
        self.embedded_text.trim().chars().count()
    }
}

/// Per-page text plus the OCR decision. Recomputed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub pages: Vec<PageText>,
    pub needs_ocr: bool,
}

/// How the OCR decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityVerdict {
    /// Pages in the document.
    pub page_count: usize,
    /// Pages whose trimmed text is below the threshold.
    pub emptyish_pages: usize,
    /// The emptyish count must exceed this for OCR to be needed.
    pub limit: usize,
    /// Result of the heuristic alone.
    pub computed: bool,
    /// Whether the forced-OCR override was set.
    pub forced: bool,
}

impl DensityVerdict {
    /// Whether OCR runs: the heuristic said so, or it was forced.
    pub fn needs_ocr(&self) -> bool {
        self.computed || self.forced
    }
}

/// Text recognised from one page image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrBlock {
    /// 1-indexed image position, one image per page.
    pub page: usize,
    /// File name of the rasterized image, e.g. `page-03.png`.
    pub image_name: String,
    pub text: String,
}

/// What happened in the OCR stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcrStatus {
    /// Density was sufficient and OCR was not forced.
    Skipped,
    /// OCR ran; `recognized` of `images` images produced a block.
    Attempted { images: usize, recognized: usize },
}

/// Result of [`crate::ingest::inspect`]: extraction and density only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub origin: String,
    pub report: ExtractionReport,
    pub verdict: DensityVerdict,
    pub warnings: Vec<StageWarning>,
}

/// Timing and count statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub page_count: usize,
    pub emptyish_pages: usize,
    pub ocr_blocks: usize,
    pub raw_text_bytes: usize,
    pub fetch_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a successful [`crate::ingest::ingest`] run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    pub raw_text_path: PathBuf,
    pub structured_path: PathBuf,
    /// Set when this run created the placeholder deliverable.
    pub scaffold_created: Option<PathBuf>,
    /// Set when the downloaded PDF was persisted.
    pub source_copy: Option<PathBuf>,
    pub report: ExtractionReport,
    pub verdict: DensityVerdict,
    pub ocr: OcrStatus,
    pub ocr_blocks: Vec<OcrBlock>,
    pub warnings: Vec<StageWarning>,
    pub stats: IngestStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripped_len_counts_chars_not_bytes() {
        let p = PageText::new(1, "  héllo \n");
        assert_eq!(p.stripped_len(), 5);
    }

    #[test]
    fn forced_verdict_needs_ocr() {
        let v = DensityVerdict {
            page_count: 9,
            emptyish_pages: 0,
            limit: 3,
            computed: false,
            forced: true,
        };
        assert!(v.needs_ocr());
    }
}
