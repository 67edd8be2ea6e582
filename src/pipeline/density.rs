//! Text-density heuristic: decide whether OCR fallback is required.
//!
//! A handful of sparse pages (cover, full-page figures, blank separators) is
//! normal in born-digital documents and must not trigger OCR. Once roughly a
//! third of the pages carry almost no embedded text, the document is most
//! likely scanned and OCR is attempted.

use crate::config::DensityPolicy;
use crate::output::{DensityVerdict, PageText};
use tracing::debug;

/// Number of pages whose trimmed embedded text is shorter than the threshold.
pub fn count_emptyish(pages: &[PageText], threshold_chars_per_page: usize) -> usize {
    pages
        .iter()
        .filter(|p| p.stripped_len() < threshold_chars_per_page)
        .count()
}

/// `true` when the document should be OCRed.
///
/// Zero pages cannot be assessed and default to `true`. Otherwise OCR is
/// needed iff `emptyish > max(min_emptyish_pages, n / emptyish_divisor)`.
pub fn needs_ocr(pages: &[PageText], policy: &DensityPolicy) -> bool {
    assess(pages, policy, false).computed
}

/// Full verdict, including the forced-OCR override.
pub fn assess(pages: &[PageText], policy: &DensityPolicy, force_ocr: bool) -> DensityVerdict {
    let n = pages.len();
    let emptyish = count_emptyish(pages, policy.threshold_chars_per_page);
    let limit = policy
        .min_emptyish_pages
        .max(n / policy.emptyish_divisor.max(1));
    let computed = n == 0 || emptyish > limit;

    debug!(
        "Density: {}/{} emptyish pages (limit {}), needs_ocr={}, forced={}",
        emptyish, n, limit, computed, force_ocr
    );

    DensityVerdict {
        page_count: n,
        emptyish_pages: emptyish,
        limit,
        computed,
        forced: force_ocr,
    }
}
