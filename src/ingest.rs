//! Run driver: one PDF in, raw text and structured markdown out.
//!
//! A run is an explicit state machine:
//!
//! ```text
//! Fetched ─▶ Extracted ─▶ DensityChecked ─┬─▶ OcrAttempted ─┬─▶ Merged ─▶ Written
//!                                         └─▶ OcrSkipped ───┘
//! ```
//!
//! Failure modes per transition:
//!
//! | Transition                  | On failure                                   |
//! |-----------------------------|----------------------------------------------|
//! | → Fetched                   | fatal, nothing written                       |
//! | Fetched → Extracted         | document unreadable: fatal; bad page: warning |
//! | Extracted → DensityChecked  | cannot fail                                  |
//! | DensityChecked → OcrAttempted | degrade to no OCR text, warning            |
//! | → Merged                    | cannot fail                                  |
//! | Merged → Written            | fatal                                        |

use crate::config::IngestConfig;
use crate::error::{IngestError, StageWarning};
use crate::output::{
    DensityVerdict, ExtractionReport, IngestOutput, IngestStats, Inspection, OcrBlock, OcrStatus,
    PageText,
};
use crate::pipeline::extract::{extract_pages, PdfiumTextExtractor, TextExtractor};
use crate::pipeline::fetch::{self, SourceDocument};
use crate::pipeline::ocr::{run_ocr, CommandLineOcr, OcrOutcome, OcrProvider};
use crate::pipeline::{density, merge, write};
use crate::progress::RunStage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name of the PDF copy handed to the raster tool inside the scratch directory.
const SCRATCH_PDF_NAME: &str = "source.pdf";

/// Ingest the configured PDF with the production backends (pdfium, pdftoppm,
/// tesseract).
///
/// # Errors
/// Returns `Err(IngestError)` only for fatal errors:
/// - no input configured, file not found, download failed
/// - document cannot be opened
/// - an artifact cannot be written
///
/// OCR problems never fail the run; they show up in
/// [`IngestOutput::warnings`].
pub async fn ingest(config: &IngestConfig) -> Result<IngestOutput, IngestError> {
    let extractor: Arc<dyn TextExtractor> = Arc::new(PdfiumTextExtractor::new(
        config.password.clone(),
        config.pdfium_lib_path.clone(),
    ));
    let ocr: Arc<dyn OcrProvider> = Arc::new(
        CommandLineOcr::from_config(config).map_err(|e| IngestError::InvalidConfig(e.to_string()))?,
    );
    ingest_with(config, extractor, ocr).await
}

/// Ingest with caller-supplied backends.
pub async fn ingest_with(
    config: &IngestConfig,
    extractor: Arc<dyn TextExtractor>,
    ocr: Arc<dyn OcrProvider>,
) -> Result<IngestOutput, IngestError> {
    let source = config.require_source()?;
    info!("Starting ingestion: {}", source.describe());

    let mut run = Run {
        config,
        extractor,
        ocr,
        warnings: Vec::new(),
        stats: IngestStats::default(),
        started: Instant::now(),
    };

    let fetch_start = Instant::now();
    let doc = fetch::fetch(source, config.download_timeout_secs).await?;
    run.stats.fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

    let mut state = RunState::Fetched { source: doc };
    loop {
        run.enter(state.stage());
        state = match state {
            RunState::Written(output) => return Ok(*output),
            other => run.advance(other).await?,
        };
    }
}

/// Fetch, extract and assess density without running OCR or writing anything.
pub async fn inspect(config: &IngestConfig) -> Result<Inspection, IngestError> {
    inspect_with(
        config,
        Arc::new(PdfiumTextExtractor::new(
            config.password.clone(),
            config.pdfium_lib_path.clone(),
        )),
    )
    .await
}

/// [`inspect`] with a caller-supplied extractor.
pub async fn inspect_with(
    config: &IngestConfig,
    extractor: Arc<dyn TextExtractor>,
) -> Result<Inspection, IngestError> {
    let source = config.require_source()?;
    let doc = fetch::fetch(source, config.download_timeout_secs).await?;
    let extraction = extract_pages(extractor, &doc).await?;
    let verdict = density::assess(&extraction.pages, &config.density, config.force_ocr);

    Ok(Inspection {
        origin: doc.origin().to_string(),
        report: ExtractionReport {
            pages: extraction.pages,
            needs_ocr: verdict.needs_ocr(),
        },
        verdict,
        warnings: extraction.warnings,
    })
}

// ── State machine ────────────────────────────────────────────────────────

enum RunState {
    Fetched {
        source: SourceDocument,
    },
    Extracted {
        source: SourceDocument,
        pages: Vec<PageText>,
    },
    DensityChecked {
        source: SourceDocument,
        pages: Vec<PageText>,
        verdict: DensityVerdict,
    },
    OcrAttempted {
        source: SourceDocument,
        pages: Vec<PageText>,
        verdict: DensityVerdict,
        images: usize,
        blocks: Vec<OcrBlock>,
    },
    OcrSkipped {
        source: SourceDocument,
        pages: Vec<PageText>,
        verdict: DensityVerdict,
    },
    Merged {
        source: SourceDocument,
        report: ExtractionReport,
        verdict: DensityVerdict,
        ocr: OcrStatus,
        blocks: Vec<OcrBlock>,
        raw_text: String,
        structured: String,
    },
    Written(Box<IngestOutput>),
}

impl RunState {
    fn stage(&self) -> RunStage {
        match self {
            RunState::Fetched { .. } => RunStage::Fetched,
            RunState::Extracted { .. } => RunStage::Extracted,
            RunState::DensityChecked { .. } => RunStage::DensityChecked,
            RunState::OcrAttempted { .. } => RunStage::OcrAttempted,
            RunState::OcrSkipped { .. } => RunStage::OcrSkipped,
            RunState::Merged { .. } => RunStage::Merged,
            RunState::Written(_) => RunStage::Written,
        }
    }
}

struct Run<'a> {
    config: &'a IngestConfig,
    extractor: Arc<dyn TextExtractor>,
    ocr: Arc<dyn OcrProvider>,
    warnings: Vec<StageWarning>,
    stats: IngestStats,
    started: Instant,
}

impl Run<'_> {
    fn enter(&self, stage: RunStage) {
        debug!("Run stage: {}", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(stage);
        }
    }

    async fn advance(&mut self, state: RunState) -> Result<RunState, IngestError> {
        match state {
            RunState::Fetched { source } => {
                let start = Instant::now();
                let extraction = extract_pages(Arc::clone(&self.extractor), &source).await?;
                self.stats.extract_duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Extracted embedded text from {} pages ({} failed)",
                    extraction.pages.len(),
                    extraction.warnings.len()
                );
                self.warnings.extend(extraction.warnings);
                Ok(RunState::Extracted {
                    source,
                    pages: extraction.pages,
                })
            }

            RunState::Extracted { source, pages } => {
                let verdict =
                    density::assess(&pages, &self.config.density, self.config.force_ocr);
                Ok(RunState::DensityChecked {
                    source,
                    pages,
                    verdict,
                })
            }

            RunState::DensityChecked {
                source,
                pages,
                verdict,
            } => {
                if !verdict.needs_ocr() {
                    info!(
                        "Text density sufficient ({}/{} emptyish pages); skipping OCR",
                        verdict.emptyish_pages, verdict.page_count
                    );
                    return Ok(RunState::OcrSkipped {
                        source,
                        pages,
                        verdict,
                    });
                }

                if verdict.forced && !verdict.computed {
                    info!("OCR forced by configuration; running OCR");
                } else {
                    info!(
                        "Low text density detected ({}/{} emptyish pages); running OCR",
                        verdict.emptyish_pages, verdict.page_count
                    );
                }

                let start = Instant::now();
                let outcome = self.run_ocr_stage(&source).await;
                self.stats.ocr_duration_ms = start.elapsed().as_millis() as u64;
                self.warnings.extend(outcome.warnings);

                let mut pages = pages;
                for block in &outcome.blocks {
                    if let Some(page) = block.page.checked_sub(1).and_then(|i| pages.get_mut(i)) {
                        page.ocr_text = Some(block.text.clone());
                    }
                }

                Ok(RunState::OcrAttempted {
                    source,
                    pages,
                    verdict,
                    images: outcome.images,
                    blocks: outcome.blocks,
                })
            }

            RunState::OcrAttempted {
                source,
                pages,
                verdict,
                images,
                blocks,
            } => {
                let ocr = OcrStatus::Attempted {
                    images,
                    recognized: blocks.len(),
                };
                Ok(merged(source, pages, verdict, ocr, blocks))
            }

            RunState::OcrSkipped {
                source,
                pages,
                verdict,
            } => Ok(merged(source, pages, verdict, OcrStatus::Skipped, Vec::new())),

            RunState::Merged {
                source,
                report,
                verdict,
                ocr,
                blocks,
                raw_text,
                structured,
            } => {
                let config = self.config;
                write::write_artifact(&config.raw_text_path, &raw_text).await?;
                write::write_artifact(&config.structured_path, &structured).await?;

                let source_copy = match (&config.source_copy_path, source.is_remote()) {
                    (Some(path), true) => {
                        write::write_artifact(path, source.bytes()).await?;
                        Some(path.clone())
                    }
                    _ => None,
                };

                let scaffold_created = match &config.deliverable_path {
                    Some(path) => {
                        if write::scaffold_if_absent(path, write::DELIVERABLE_PLACEHOLDER).await? {
                            Some(path.clone())
                        } else {
                            None
                        }
                    }
                    None => None,
                };

                self.stats.page_count = report.pages.len();
                self.stats.emptyish_pages = verdict.emptyish_pages;
                self.stats.ocr_blocks = blocks.len();
                self.stats.raw_text_bytes = raw_text.len();
                self.stats.total_duration_ms = self.started.elapsed().as_millis() as u64;

                info!(
                    "Ingestion complete: {} pages, {} OCR blocks, {} warnings, {}ms",
                    self.stats.page_count,
                    self.stats.ocr_blocks,
                    self.warnings.len(),
                    self.stats.total_duration_ms
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_ingest_complete(report.pages.len(), blocks.len());
                }

                Ok(RunState::Written(Box::new(IngestOutput {
                    raw_text_path: config.raw_text_path.clone(),
                    structured_path: config.structured_path.clone(),
                    scaffold_created,
                    source_copy,
                    report,
                    verdict,
                    ocr,
                    ocr_blocks: blocks,
                    warnings: std::mem::take(&mut self.warnings),
                    stats: std::mem::take(&mut self.stats),
                })))
            }

            RunState::Written(output) => Ok(RunState::Written(output)),
        }
    }

    /// Materialise the PDF in a scratch directory and run OCR over it.
    ///
    /// Scratch setup failures degrade exactly like a failed rasterization.
    async fn run_ocr_stage(&self, source: &SourceDocument) -> OcrOutcome {
        let scratch = match scratch_dir(self.config.scratch_dir.as_ref()) {
            Ok(dir) => dir,
            Err(e) => return scratch_failure(format!("cannot create scratch directory: {e}")),
        };

        let pdf_path = scratch.path().join(SCRATCH_PDF_NAME);
        if let Err(e) = tokio::fs::write(&pdf_path, source.bytes()).await {
            return scratch_failure(format!("cannot write {}: {e}", pdf_path.display()));
        }

        // `scratch` lives until the end of this call; images are removed with it.
        run_ocr(
            self.ocr.as_ref(),
            &pdf_path,
            scratch.path(),
            self.config.ocr_concurrency,
            self.config.progress_callback.as_ref(),
        )
        .await
    }
}

fn merged(
    source: SourceDocument,
    pages: Vec<PageText>,
    verdict: DensityVerdict,
    ocr: OcrStatus,
    blocks: Vec<OcrBlock>,
) -> RunState {
    let raw_text = merge::build_raw_text(&pages, &blocks);
    let structured = merge::build_structured_markdown(&raw_text);
    RunState::Merged {
        source,
        report: ExtractionReport {
            pages,
            needs_ocr: verdict.needs_ocr(),
        },
        verdict,
        ocr,
        blocks,
        raw_text,
        structured,
    }
}

fn scratch_dir(parent: Option<&PathBuf>) -> std::io::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pdf-ingest-");
    match parent {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            builder.tempdir_in(dir)
        }
        None => builder.tempdir(),
    }
}

fn scratch_failure(detail: String) -> OcrOutcome {
    warn!("OCR skipped: {}", detail);
    OcrOutcome {
        images: 0,
        blocks: Vec::new(),
        warnings: vec![StageWarning::RasterizationFailed { detail }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fetch::Origin;

    #[test]
    fn state_stage_names() {
        let doc = SourceDocument::new(b"%PDF".to_vec(), Origin::Path("a.pdf".into()));
        assert_eq!(RunState::Fetched { source: doc.clone() }.stage(), RunStage::Fetched);
        assert_eq!(
            RunState::Extracted {
                source: doc,
                pages: vec![]
            }
            .stage(),
            RunStage::Extracted
        );
    }

    #[test]
    fn merged_report_carries_effective_decision() {
        let doc = SourceDocument::new(b"%PDF".to_vec(), Origin::Path("a.pdf".into()));
        let verdict = DensityVerdict {
            page_count: 1,
            emptyish_pages: 0,
            limit: 2,
            computed: false,
            forced: true,
        };
        let state = merged(
            doc,
            vec![PageText::new(1, "hello")],
            verdict,
            OcrStatus::Attempted {
                images: 1,
                recognized: 0,
            },
            vec![],
        );
        match state {
            RunState::Merged {
                report, raw_text, ..
            } => {
                assert!(report.needs_ocr);
                assert_eq!(raw_text, "\n\n--- PAGE 1 ---\nhello");
            }
            _ => panic!("expected Merged"),
        }
    }

    #[test]
    fn scratch_dir_in_custom_parent() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("scratch");
        let dir = scratch_dir(Some(&nested)).unwrap();
        assert!(dir.path().starts_with(&nested));
        let path = dir.path().to_path_buf();
        drop(dir);
        assert!(!path.exists());
    }
}
