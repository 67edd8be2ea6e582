//! Pipeline stages for PDF ingestion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the external backends (pdfium, poppler,
//! tesseract) stay behind narrow seams.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ density ──▶ [ocr] ──▶ merge ──▶ write
//! (URL/path) (pdfium)   (heuristic)  (pdftoppm  (markers)  (artifacts)
//!                                     +tesseract)
//! ```
//!
//! 1. [`fetch`]: obtain the PDF bytes from a URL or a local file
//! 2. [`extract`]: per-page embedded text; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`density`]: decide whether the text is too sparse to trust
//! 4. [`ocr`]: rasterize and recognise; every failure degrades instead
//!    of aborting
//! 5. [`merge`]: raw text with page/OCR markers and its markdown rendering
//! 6. [`write`]: overwrite artifacts, scaffold the deliverable once

pub mod density;
pub mod extract;
pub mod fetch;
pub mod merge;
pub mod ocr;
pub mod write;
