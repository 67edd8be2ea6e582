//! Merge embedded text and OCR text into the raw text and markdown artifacts.
//!
//! Concatenation is strict append. Embedded and OCR text for the same page
//! are both kept; reconciling them is left to downstream consumers, which
//! rely on the markers below to tell contributions apart.

use crate::output::{OcrBlock, PageText};

/// Heading of the structured markdown rendering.
pub const STRUCTURED_HEADING: &str = "# Structured Extraction";

/// `--- PAGE {index} ---`
pub fn page_marker(index: usize) -> String {
    format!("--- PAGE {} ---", index)
}

/// `--- OCR {image_name} ---`
pub fn ocr_marker(image_name: &str) -> String {
    format!("--- OCR {} ---", image_name)
}

/// Build the merged raw text body.
///
/// Each page contributes `"\n\n" + marker + "\n" + embedded text`. When OCR
/// produced blocks, a blank separator follows and then each block as
/// `"\n\n" + OCR marker + "\n" + text`, in OCR order.
pub fn build_raw_text(pages: &[PageText], ocr_blocks: &[OcrBlock]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str("\n\n");
        out.push_str(&page_marker(page.index));
        out.push('\n');
        out.push_str(&page.embedded_text);
    }

    if !ocr_blocks.is_empty() {
        out.push_str("\n\n");
        for block in ocr_blocks {
            out.push_str("\n\n");
            out.push_str(&ocr_marker(&block.image_name));
            out.push('\n');
            out.push_str(&block.text);
        }
    }
    out
}

/// Prefix the raw text with the fixed heading, reproducing it line for line.
pub fn build_structured_markdown(raw_text: &str) -> String {
    let mut lines = vec![format!("{}\n", STRUCTURED_HEADING)];
    lines.extend(raw_text.lines().map(str::to_string));
    lines.join("\n")
}

/// Number of page markers in a raw text body.
pub fn count_page_markers(raw_text: &str) -> usize {
    raw_text
        .lines()
        .filter(|l| l.starts_with("--- PAGE ") && l.ends_with(" ---"))
        .count()
}

/// Number of OCR markers in a raw text body.
pub fn count_ocr_markers(raw_text: &str) -> usize {
    raw_text
        .lines()
        .filter(|l| l.starts_with("--- OCR ") && l.ends_with(" ---"))
        .count()
}
