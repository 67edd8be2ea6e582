//! CLI binary for pdf-ingest.
//!
//! A thin shim over the library crate that maps CLI flags to `IngestConfig`,
//! runs one ingestion and prints the artifact paths.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_ingest::{
    ingest, inspect, IngestConfig, IngestError, IngestOutput, IngestProgressCallback, Inspection, OcrStatus,
    ProgressCallback, RunStage,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner for the stage transitions, switching to a bar while OCR works
/// through the page images. Images may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    failed_images: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Ingesting");
        bar.set_message("Fetching PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed_images: AtomicUsize::new(0),
        })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: RunStage) {
        self.bar.set_message(stage.to_string());
        if stage == RunStage::OcrSkipped {
            self.bar
                .println(format!("  {} text layer is dense enough, OCR skipped", dim("·")));
        }
    }

    fn on_ocr_start(&self, total_images: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_images as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    fn on_image_complete(&self, ordinal: usize, total: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            green("✓"),
            ordinal,
            total,
            dim(&format!("{chars:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, ordinal: usize, total: usize, error: &str) {
        self.failed_images.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}",
            red("✗"),
            ordinal,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_ingest_complete(&self, pages: usize, ocr_blocks: usize) {
        self.bar.finish_and_clear();
        let failed = self.failed_images.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages ingested, {} OCR blocks",
                green("✔"),
                bold(&pages.to_string()),
                ocr_blocks
            );
        } else {
            eprintln!(
                "{} {} pages ingested, {} OCR blocks  ({} images failed)",
                yellow("⚠"),
                bold(&pages.to_string()),
                ocr_blocks,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Ingest a local PDF
  pdf-ingest --local-path report.pdf

  # Ingest from a URL, keeping a copy of the download
  pdf-ingest --source-url https://arxiv.org/pdf/1706.03762

  # Scanned document: always OCR, German + English
  pdf-ingest --local-path scan.pdf --force-ocr --ocr-lang deu+eng

  # Check whether OCR would run, without writing anything
  pdf-ingest --local-path report.pdf --inspect-only

OUTPUTS:
  data/raw_text.txt              page text with "--- PAGE n ---" markers, then OCR blocks
  data/structured.md             "# Structured Extraction" followed by the raw text
  deliverables/full_rundown.md   placeholder, created once and never overwritten
  data/source.pdf                copy of the downloaded PDF (URL input only)

EXTERNAL TOOLS:
  libpdfium   text extraction (required; set PDFIUM_LIB_PATH or install system-wide)
  pdftoppm    page rasterization for OCR (poppler-utils; optional)
  tesseract   OCR engine (optional)
  Missing OCR tools only produce warnings; the embedded text is still written.

ENVIRONMENT VARIABLES:
  FORCE_OCR          Same as --force-ocr
  PDFIUM_LIB_PATH    Path to libpdfium (file or directory)
  RUST_LOG           Override the log filter (e.g. pdf_ingest=debug)
"##;

/// Ingest a PDF into raw text and structured markdown, with OCR fallback.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-ingest",
    version,
    about = "Ingest a PDF into raw text and structured markdown, with OCR fallback",
    long_about = "Fetch a PDF from a URL or the local filesystem, extract its embedded text per \
page and run OCR (pdftoppm + tesseract) when the text layer is too sparse. Writes a merged raw \
text file, a structured markdown file and a placeholder deliverable.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP,
    group(ArgGroup::new("input").required(true).args(["source_url", "local_path"]))
)]
struct Cli {
    /// HTTP/HTTPS URL of the PDF.
    #[arg(long, env = "PDF_INGEST_SOURCE_URL")]
    source_url: Option<String>,

    /// Path to a local PDF.
    #[arg(long, env = "PDF_INGEST_LOCAL_PATH")]
    local_path: Option<PathBuf>,

    /// Run OCR regardless of the text-density heuristic.
    #[arg(long, env = "FORCE_OCR", value_parser = parse_flag, default_value = "false",
          num_args = 0..=1, default_missing_value = "true")]
    force_ocr: bool,

    /// Merged raw text output.
    #[arg(long, default_value = pdf_ingest::config::DEFAULT_RAW_TEXT_PATH)]
    raw_text_out: PathBuf,

    /// Structured markdown output.
    #[arg(long, default_value = pdf_ingest::config::DEFAULT_STRUCTURED_PATH)]
    structured_out: PathBuf,

    /// Placeholder deliverable, created only if absent.
    #[arg(long, default_value = pdf_ingest::config::DEFAULT_DELIVERABLE_PATH)]
    deliverable: PathBuf,

    /// Do not scaffold the placeholder deliverable.
    #[arg(long)]
    no_deliverable: bool,

    /// Where to keep a copy of a downloaded PDF (URL input only).
    #[arg(long, default_value = pdf_ingest::config::DEFAULT_SOURCE_COPY_PATH)]
    source_copy: PathBuf,

    /// Do not keep a copy of a downloaded PDF.
    #[arg(long)]
    no_source_copy: bool,

    /// Pages with fewer trimmed characters than this count as emptyish.
    #[arg(long, default_value_t = 500)]
    threshold_chars: usize,

    /// Minimum emptyish-page allowance before OCR is triggered.
    #[arg(long, default_value_t = 2)]
    min_emptyish: usize,

    /// OCR triggers when emptyish pages exceed page_count / this divisor.
    #[arg(long, default_value_t = 3)]
    emptyish_divisor: usize,

    /// OCR language code(s) passed to tesseract (e.g. eng, deu+eng).
    #[arg(long, env = "PDF_INGEST_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Rasterization DPI for OCR (72–600).
    #[arg(long, env = "PDF_INGEST_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Raster tool executable.
    #[arg(long, default_value = "pdftoppm")]
    raster_tool: PathBuf,

    /// OCR engine executable.
    #[arg(long, default_value = "tesseract")]
    ocr_engine: PathBuf,

    /// Per-invocation timeout for external tools, in seconds.
    #[arg(long, default_value_t = 120)]
    tool_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF_INGEST_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Number of page images recognised concurrently.
    #[arg(long, default_value_t = 4)]
    ocr_concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF_INGEST_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Report page densities and the OCR decision only; write nothing.
    #[arg(long)]
    inspect_only: bool,

    /// Print the run result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Accepts the usual spellings of a boolean environment toggle.
fn parse_flag(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the progress bar active, library INFO logs would fight the bar.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let inspection = inspect(&config)
            .await
            .map_err(|e| with_failure_context(e, "Failed to inspect PDF"))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&inspection)
                    .context("Failed to serialise inspection")?
            );
        } else {
            print_inspection(&inspection);
        }
        return Ok(());
    }

    // ── Run ingestion ────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn IngestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let output = ingest(&config)
        .await
        .map_err(|e| with_failure_context(e, "Ingestion failed"))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        print_summary(&output);
    }
    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let mut builder = IngestConfig::builder()
        .force_ocr(cli.force_ocr)
        .threshold_chars_per_page(cli.threshold_chars)
        .min_emptyish_pages(cli.min_emptyish)
        .emptyish_divisor(cli.emptyish_divisor)
        .ocr_language(cli.ocr_lang.clone())
        .dpi(cli.dpi)
        .raster_tool(&cli.raster_tool)
        .ocr_engine(&cli.ocr_engine)
        .tool_timeout_secs(cli.tool_timeout)
        .download_timeout_secs(cli.download_timeout)
        .ocr_concurrency(cli.ocr_concurrency)
        .raw_text_path(&cli.raw_text_out)
        .structured_path(&cli.structured_out)
        .deliverable_path((!cli.no_deliverable).then(|| cli.deliverable.clone()))
        .source_copy_path((!cli.no_source_copy).then(|| cli.source_copy.clone()));

    if let Some(ref url) = cli.source_url {
        builder = builder.source_url(url.clone());
    }
    if let Some(ref path) = cli.local_path {
        builder = builder.local_path(path);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Fetch failures happen before anything is written; say so.
fn with_failure_context(err: IngestError, fallback: &'static str) -> anyhow::Error {
    let context = if err.is_fetch_error() {
        "Could not obtain the PDF, no files were written"
    } else {
        fallback
    };
    anyhow::Error::new(err).context(context)
}

fn print_inspection(inspection: &Inspection) {
    let verdict = &inspection.verdict;
    println!("Source:          {}", inspection.origin);
    println!("Pages:           {}", verdict.page_count);
    println!(
        "Emptyish pages:  {} (limit {})",
        verdict.emptyish_pages, verdict.limit
    );
    println!(
        "Needs OCR:       {}{}",
        verdict.needs_ocr(),
        if verdict.forced && !verdict.computed {
            " (forced)"
        } else {
            ""
        }
    );
    for page in &inspection.report.pages {
        println!("  page {:>4}  {:>7} chars", page.index, page.stripped_len());
    }
    for w in &inspection.warnings {
        eprintln!("{} {}", yellow("warning:"), w);
    }
}

fn print_summary(output: &IngestOutput) {
    for w in &output.warnings {
        eprintln!("{} {}", yellow("warning:"), w);
    }

    let ocr = match output.ocr {
        OcrStatus::Skipped => "skipped".to_string(),
        OcrStatus::Attempted { images, recognized } => {
            format!("{recognized}/{images} images recognised")
        }
    };
    eprintln!(
        "{}  {} pages  OCR {}  {}ms",
        if output.warnings.is_empty() {
            green("✔")
        } else {
            yellow("⚠")
        },
        output.stats.page_count,
        ocr,
        output.stats.total_duration_ms,
    );

    println!("{}", output.raw_text_path.display());
    println!("{}", output.structured_path.display());
    if let Some(ref path) = output.scaffold_created {
        println!("{}", path.display());
    }
    if let Some(ref path) = output.source_copy {
        println!("{}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn exactly_one_input_required() {
        assert!(Cli::try_parse_from(["pdf-ingest", "--local-path", "a.pdf"]).is_ok());
        assert!(Cli::try_parse_from([
            "pdf-ingest",
            "--local-path",
            "a.pdf",
            "--source-url",
            "https://example.com/a.pdf",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["pdf-ingest", "--force-ocr"]).is_err());
    }

    #[test]
    fn flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "pdf-ingest",
            "--local-path",
            "scan.pdf",
            "--force-ocr",
            "--ocr-lang",
            "deu+eng",
            "--no-deliverable",
            "--raw-text-out",
            "out/raw.txt",
        ])
        .unwrap();
        let config = build_config(&cli, None).unwrap();
        assert!(config.force_ocr);
        assert_eq!(config.ocr_language, "deu+eng");
        assert_eq!(config.deliverable_path, None);
        assert_eq!(config.raw_text_path, PathBuf::from("out/raw.txt"));
    }

    #[test]
    fn long_help_lists_outputs() {
        use clap::CommandFactory;
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("\"# Structured Extraction\""));
        assert!(help.contains("RUST_LOG"));
    }

    #[test]
    fn fetch_failures_say_nothing_was_written() {
        let err = with_failure_context(
            IngestError::DownloadTimeout {
                url: "https://example.com/a.pdf".into(),
                secs: 60,
            },
            "Ingestion failed",
        );
        assert_eq!(err.to_string(), "Could not obtain the PDF, no files were written");

        let err = with_failure_context(IngestError::Internal("boom".into()), "Ingestion failed");
        assert_eq!(err.to_string(), "Ingestion failed");
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn parse_flag_spellings() {
        assert_eq!(parse_flag("1"), Ok(true));
        assert_eq!(parse_flag("Yes"), Ok(true));
        assert_eq!(parse_flag("0"), Ok(false));
        assert_eq!(parse_flag(""), Ok(false));
        assert!(parse_flag("maybe").is_err());
    }
}
