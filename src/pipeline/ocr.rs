//! OCR fallback: rasterize pages with an external tool, recognise each image.
//!
//! The external tools sit behind the [`OcrProvider`] trait so the run driver
//! can be exercised with doubles that fail, stall or return partial results.
//! [`CommandLineOcr`] is the production provider (`pdftoppm` + `tesseract`).
//!
//! ## Failure model
//!
//! Nothing in this stage is fatal. [`run_ocr`] turns a failed rasterization
//! into "no OCR text" and a failed recognition into "no block for that
//! image", recording a [`StageWarning`] for each. Every tool invocation is
//! bounded by a timeout; a timed-out process is killed and counts as failed.
//! There is a single attempt per image.

use crate::config::IngestConfig;
use crate::error::{OcrError, StageWarning};
use crate::output::OcrBlock;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File name prefix of rasterized page images inside the scratch directory.
pub const IMAGE_PREFIX: &str = "page";

/// Capability interface over the raster tool and the OCR engine.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Render every page of `pdf_path` into `out_dir`, one image per page,
    /// returned in page order.
    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError>;

    /// Recognise the text of a single image. Empty output is `Ok("")`.
    async fn recognize(&self, image_path: &Path) -> Result<String, OcrError>;
}

/// Result of the OCR stage.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    /// Images produced by rasterization.
    pub images: usize,
    /// One block per recognised image, in ascending image order.
    pub blocks: Vec<OcrBlock>,
    pub warnings: Vec<StageWarning>,
}

/// Rasterize `pdf_path` and recognise every image.
///
/// Up to `concurrency` images are recognised at once; blocks are sorted back
/// into image order before returning.
pub async fn run_ocr(
    provider: &dyn OcrProvider,
    pdf_path: &Path,
    scratch: &Path,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> OcrOutcome {
    let images = match provider.rasterize(pdf_path, scratch).await {
        Ok(images) => images,
        Err(e) => {
            warn!("Rasterization failed, continuing without OCR text: {}", e);
            return OcrOutcome {
                images: 0,
                blocks: Vec::new(),
                warnings: vec![StageWarning::RasterizationFailed {
                    detail: e.to_string(),
                }],
            };
        }
    };

    let total = images.len();
    info!("Rasterized {} page images", total);
    if let Some(cb) = progress {
        cb.on_ocr_start(total);
    }

    let mut results: Vec<(usize, String, Result<String, OcrError>)> =
        stream::iter(images.iter().enumerate().map(|(i, path)| async move {
            let ordinal = i + 1;
            let name = image_name(path);
            let result = provider.recognize(path).await;
            if let Some(cb) = progress {
                match &result {
                    Ok(text) => cb.on_image_complete(ordinal, total, text.chars().count()),
                    Err(e) => cb.on_image_error(ordinal, total, &e.to_string()),
                }
            }
            (ordinal, name, result)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    // Completion order is arbitrary under concurrency.
    results.sort_by_key(|(ordinal, _, _)| *ordinal);

    let mut outcome = OcrOutcome {
        images: total,
        ..Default::default()
    };
    for (ordinal, name, result) in results {
        match result {
            Ok(text) => {
                debug!("OCR {}: {} chars", name, text.chars().count());
                outcome.blocks.push(OcrBlock {
                    page: ordinal,
                    image_name: name,
                    text,
                });
            }
            Err(e) => {
                warn!("OCR failed for {}, skipping: {}", name, e);
                outcome.warnings.push(StageWarning::RecognitionFailed {
                    image: name,
                    detail: e.to_string(),
                });
            }
        }
    }
    outcome
}

fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reject language codes that could smuggle extra arguments to the engine.
///
/// Valid codes are ASCII alphanumerics plus `+` and `_`, e.g. `eng`,
/// `eng+deu`, `chi_sim`.
pub fn validate_language(lang: &str) -> Result<(), OcrError> {
    if lang.is_empty() || lang.len() > 20 {
        return Err(OcrError::InvalidLanguage(lang.to_string()));
    }
    if !lang
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '_')
    {
        return Err(OcrError::InvalidLanguage(lang.to_string()));
    }
    Ok(())
}

// ── Command-line provider ────────────────────────────────────────────────────

static RE_PAGE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page-(\d+)\.png$").expect("valid page image regex"));

/// [`OcrProvider`] running `pdftoppm` and `tesseract` as child processes.
#[derive(Debug, Clone)]
pub struct CommandLineOcr {
    raster_tool: PathBuf,
    ocr_engine: PathBuf,
    language: String,
    dpi: u32,
    timeout: Duration,
}

impl CommandLineOcr {
    pub fn new(
        raster_tool: impl Into<PathBuf>,
        ocr_engine: impl Into<PathBuf>,
        language: impl Into<String>,
        dpi: u32,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let language = language.into();
        validate_language(&language)?;
        Ok(Self {
            raster_tool: raster_tool.into(),
            ocr_engine: ocr_engine.into(),
            language,
            dpi,
            timeout,
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, OcrError> {
        Self::new(
            config.raster_tool.clone(),
            config.ocr_engine.clone(),
            config.ocr_language.clone(),
            config.dpi,
            Duration::from_secs(config.tool_timeout_secs),
        )
    }
}

#[async_trait]
impl OcrProvider for CommandLineOcr {
    async fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let prefix = out_dir.join(IMAGE_PREFIX);
        let args: Vec<OsString> = vec![
            "-png".into(),
            "-r".into(),
            self.dpi.to_string().into(),
            pdf_path.as_os_str().to_owned(),
            prefix.into_os_string(),
        ];
        run_tool(&self.raster_tool, &args, self.timeout).await?;
        collect_page_images(out_dir).await
    }

    async fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        let args: Vec<OsString> = vec![
            image_path.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
        ];
        let output = run_tool(&self.ocr_engine, &args, self.timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// List `page-N.png` files in `dir`, ordered by `N`.
///
/// The raster tool zero-pads `N` to the width of the page count, so the
/// number is parsed rather than relying on lexical order.
async fn collect_page_images(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut images: Vec<(u64, PathBuf)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = RE_PAGE_IMAGE.captures(name) {
            if let Ok(n) = caps[1].parse::<u64>() {
                images.push((n, entry.path()));
            }
        }
    }
    images.sort_by_key(|(n, _)| *n);
    Ok(images.into_iter().map(|(_, p)| p).collect())
}

/// Run `program` with `args`, killing it after `timeout`.
async fn run_tool(program: &Path, args: &[OsString], timeout: Duration) -> Result<Output, OcrError> {
    let tool = program.display().to_string();
    debug!("Running {} {:?}", tool, args);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            return Err(OcrError::Timeout {
                tool,
                secs: timeout.as_secs(),
            })
        }
        Ok(Err(e)) => {
            return Err(OcrError::ToolUnavailable {
                tool,
                detail: e.to_string(),
            })
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr: String = stderr.trim().chars().take(500).collect();
        return Err(OcrError::ToolFailed {
            tool,
            status: output.status.to_string(),
            stderr,
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::IngestProgressCallback;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Produces `pages` fake images; recognition fails for `failing` ordinals
    /// and finishes later pages first to scramble completion order.
    struct ScriptedOcr {
        pages: usize,
        failing: HashSet<usize>,
        raster_fails: bool,
    }

    #[async_trait]
    impl OcrProvider for ScriptedOcr {
        async fn rasterize(&self, _pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
            if self.raster_fails {
                return Err(OcrError::ToolUnavailable {
                    tool: "pdftoppm".into(),
                    detail: "No such file or directory".into(),
                });
            }
            Ok((1..=self.pages)
                .map(|i| out_dir.join(format!("page-{i}.png")))
                .collect())
        }

        async fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
            let name = image_name(image_path);
            let n: usize = RE_PAGE_IMAGE.captures(&name).unwrap()[1].parse().unwrap();
            tokio::time::sleep(Duration::from_millis((self.pages - n) as u64 * 5)).await;
            if self.failing.contains(&n) {
                return Err(OcrError::ToolFailed {
                    tool: "tesseract".into(),
                    status: "exit status: 1".into(),
                    stderr: "Error in pixReadStream".into(),
                });
            }
            Ok(format!("text of {n}"))
        }
    }

    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        ok: AtomicUsize,
        err: AtomicUsize,
    }

    impl IngestProgressCallback for Counter {
        fn on_ocr_start(&self, total_images: usize) {
            self.started.store(total_images, Ordering::SeqCst);
        }
        fn on_image_complete(&self, _o: usize, _t: usize, _c: usize) {
            self.ok.fetch_add(1, Ordering::SeqCst);
        }
        fn on_image_error(&self, _o: usize, _t: usize, _e: &str) {
            self.err.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn blocks_are_in_page_order_despite_concurrency() {
        let provider = ScriptedOcr {
            pages: 6,
            failing: HashSet::new(),
            raster_fails: false,
        };
        let out = run_ocr(&provider, Path::new("in.pdf"), Path::new("/scratch"), 4, None).await;
        let pages: Vec<usize> = out.blocks.iter().map(|b| b.page).collect();
        assert_eq!(pages, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(out.blocks[0].image_name, "page-1.png");
        assert_eq!(out.blocks[5].text, "text of 6");
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn failed_image_is_skipped_not_fatal() {
        let provider = ScriptedOcr {
            pages: 4,
            failing: [2, 3].into_iter().collect(),
            raster_fails: false,
        };
        let counter = Arc::new(Counter::default());
        let cb: ProgressCallback = counter.clone();
        let out = run_ocr(&provider, Path::new("in.pdf"), Path::new("/s"), 2, Some(&cb)).await;

        assert_eq!(out.images, 4);
        let names: Vec<&str> = out.blocks.iter().map(|b| b.image_name.as_str()).collect();
        assert_eq!(names, vec!["page-1.png", "page-4.png"]);
        assert_eq!(out.warnings.len(), 2);
        assert!(matches!(
            &out.warnings[0],
            StageWarning::RecognitionFailed { image, .. } if image == "page-2.png"
        ));
        assert_eq!(counter.started.load(Ordering::SeqCst), 4);
        assert_eq!(counter.ok.load(Ordering::SeqCst), 2);
        assert_eq!(counter.err.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rasterization_failure_degrades_to_no_text() {
        let provider = ScriptedOcr {
            pages: 3,
            failing: HashSet::new(),
            raster_fails: true,
        };
        let out = run_ocr(&provider, Path::new("in.pdf"), Path::new("/s"), 4, None).await;
        assert_eq!(out.images, 0);
        assert!(out.blocks.is_empty());
        assert!(matches!(
            out.warnings.as_slice(),
            [StageWarning::RasterizationFailed { .. }]
        ));
    }

    #[test]
    fn language_validation() {
        assert!(validate_language("eng").is_ok());
        assert!(validate_language("eng+deu").is_ok());
        assert!(validate_language("chi_sim").is_ok());
        assert!(validate_language("").is_err());
        assert!(validate_language("eng --psm 0").is_err());
        assert!(validate_language("eng;rm").is_err());
    }

    #[tokio::test]
    async fn page_images_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "source.pdf", "page-3.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let images = collect_page_images(dir.path()).await.unwrap();
        let names: Vec<String> = images.iter().map(|p| image_name(p)).collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let ocr = CommandLineOcr::new(
            "/nonexistent/pdftoppm",
            "/nonexistent/tesseract",
            "eng",
            150,
            Duration::from_secs(5),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = ocr
            .rasterize(Path::new("in.pdf"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::ToolUnavailable { .. }), "got {err:?}");

        let err = ocr.recognize(&dir.path().join("page-1.png")).await.unwrap_err();
        assert!(matches!(err, OcrError::ToolUnavailable { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let err = run_tool(
            Path::new("sleep"),
            &["5".into()],
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OcrError::Timeout { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_tool_failure() {
        let err = run_tool(Path::new("false"), &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::ToolFailed { .. }), "got {err:?}");
    }

    #[test]
    fn invalid_language_rejected_at_construction() {
        let err = CommandLineOcr::new("pdftoppm", "tesseract", "eng -c x=1", 150, Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidLanguage(_)));
    }
}
