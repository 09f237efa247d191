//! CLI binary for ocr-refinery.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `RefineryConfig`, runs the requested stages and writes each stage's
//! output to its own destination.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_refinery::{
    ExportOutcome, Extraction, Language, Notice, NoticeLevel, OcrBackend, PipelineProgress,
    ProgressCallback, Refinement, Refinery, RefineryConfig, SearchablePdfResult, Stage,
    DEFAULT_CORRECTION_ENDPOINT, DEFAULT_CORRECTION_MODEL,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

fn render_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => format!("{} {}", dim("ℹ"), notice.message),
        NoticeLevel::Warning => format!("{} {}", yellow("⚠"), notice.message),
        NoticeLevel::Error => format!("{} {}", red("✗"), red(&notice.message)),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the running stage, with one log line per finished stage
/// and per notice.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgress for CliProgress {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix(stage.label());
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, ok: bool) {
        let mark = if ok { green("✓") } else { yellow("⚠") };
        self.bar.println(format!("  {} {}", mark, stage.label()));
        self.bar.set_message("");
    }

    fn on_page(&self, page_num: usize, total_pages: usize) {
        self.bar.set_message(format!("page {page_num}/{total_pages}"));
    }

    fn on_notice(&self, notice: &Notice) {
        self.bar.println(format!("    {}", render_notice(notice)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Raw OCR text to stdout
  ocr-refinery scan.png

  # French scan, cleaned text and a regenerated PDF
  ocr-refinery -l fra lettre.jpg --text-out lettre.txt --pdf-out lettre.pdf

  # Add a selectable text layer to a scanned PDF
  ocr-refinery contract.pdf --searchable-out contract_searchable.pdf

  # Everything, as a JSON report
  ocr-refinery report.pdf --refine --json > report.json

  # Use a remote OCR service instead of local tesseract
  ocr-refinery scan.png --ocr-endpoint https://ocr.internal/v1/ocr

LANGUAGES:
  eng  English     spa  Spanish     fra  French
  deu  German      ita  Italian     por  Portuguese
  rus  Russian     chi_sim  Chinese (simplified)   jpn  Japanese

ENVIRONMENT VARIABLES:
  TOGETHER_API_KEY            Bearer token for the cleanup endpoint
  EDGEQUAKE_LLM_PROVIDER      Route cleanup through an edgequake-llm provider
  EDGEQUAKE_MODEL             Model for that provider
  PDFIUM_LIB_PATH             Path to libpdfium (PDF input)
  OCR_REFINERY_FONT_CACHE_DIR Where the Unicode export font is cached
  RUST_LOG                    Override log filtering

EXTERNAL TOOLS:
  tesseract   OCR engine (with traineddata for the chosen language)
  ocrmypdf    Only for --searchable-out
"#;

/// Extract text from scans and PDFs with OCR, clean it with an LLM, and
/// export it as text or PDF.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-refinery",
    version,
    about = "OCR images and PDFs, clean the text with an LLM, export as text or PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local jpg/jpeg/png/pdf path or HTTP/HTTPS URL.
    input: String,

    /// OCR language code (eng, spa, fra, deu, ita, por, rus, chi_sim, jpn).
    #[arg(short, long, env = "OCR_REFINERY_LANG", default_value = "eng")]
    lang: String,

    /// Write the raw OCR text here instead of stdout.
    #[arg(long, env = "OCR_REFINERY_RAW_OUT")]
    raw_out: Option<PathBuf>,

    /// Run LLM cleanup and PDF export (implied by --text-out / --pdf-out).
    #[arg(long)]
    refine: bool,

    /// Write the cleaned text to this file.
    #[arg(long)]
    text_out: Option<PathBuf>,

    /// Write the regenerated PDF to this file.
    #[arg(long)]
    pdf_out: Option<PathBuf>,

    /// Add a text layer to a PDF input and write it here.
    #[arg(long)]
    searchable_out: Option<PathBuf>,

    /// Print a JSON report instead of plain text.
    #[arg(long, env = "OCR_REFINERY_JSON")]
    json: bool,

    /// Tesseract binary.
    #[arg(long, env = "OCR_REFINERY_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Remote OCR endpoint; replaces local tesseract when set.
    #[arg(long, env = "OCR_REFINERY_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Remote OCR timeout in seconds.
    #[arg(long, env = "OCR_REFINERY_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Longest edge of rasterised PDF pages, in pixels.
    #[arg(long, env = "OCR_REFINERY_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Chat-completion endpoint for cleanup.
    #[arg(long, env = "OCR_REFINERY_ENDPOINT", default_value = DEFAULT_CORRECTION_ENDPOINT)]
    endpoint: String,

    /// Cleanup model.
    #[arg(long, env = "OCR_REFINERY_MODEL", default_value = DEFAULT_CORRECTION_MODEL)]
    model: String,

    /// Bearer token for the cleanup endpoint.
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Use a named edgequake-llm provider (openai, anthropic, ollama, …) for
    /// cleanup, with --model naming that provider's model.
    #[arg(long)]
    provider: Option<String>,

    /// Cleanup temperature (0.0–2.0).
    #[arg(long, env = "OCR_REFINERY_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max tokens in the cleaned text.
    #[arg(long, env = "OCR_REFINERY_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Cleanup request timeout in seconds.
    #[arg(long, env = "OCR_REFINERY_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom cleanup instruction.
    #[arg(long, env = "OCR_REFINERY_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// TrueType font for PDF export (default: cached DejaVu Sans).
    #[arg(long, env = "OCR_REFINERY_FONT")]
    font: Option<PathBuf>,

    /// Never download the export font; fall back to Helvetica instead.
    #[arg(long, env = "OCR_REFINERY_NO_FONT_DOWNLOAD")]
    no_font_download: bool,

    /// Export font size in points.
    #[arg(long, env = "OCR_REFINERY_FONT_SIZE", default_value_t = 12.0)]
    font_size: f32,

    /// ocrmypdf binary.
    #[arg(long, env = "OCR_REFINERY_OCRMYPDF", default_value = "ocrmypdf")]
    ocrmypdf: String,

    /// HTTP download timeout for URL inputs, in seconds.
    #[arg(long, env = "OCR_REFINERY_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "OCR_REFINERY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR_REFINERY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR_REFINERY_QUIET")]
    quiet: bool,
}

impl Cli {
    fn wants_refinement(&self) -> bool {
        self.refine || self.text_out.is_some() || self.pdf_out.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the user all the feedback that matters; keep INFO
    // logs out of its way unless asked for.
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

    let language: Language = cli.lang.parse().context("Invalid --lang")?;

    let progress = show_progress.then(CliProgress::new);
    let config = build_config(
        &cli,
        progress.clone().map(|p| p as ProgressCallback),
    )
    .await?;
    let refinery = Refinery::new(config);

    if let Some(ref out) = cli.searchable_out {
        if overwrites_input(&cli.input, out) {
            anyhow::bail!(
                "--searchable-out '{}' is the input file; choose a different path",
                out.display()
            );
        }
    }

    let doc = refinery
        .load(&cli.input, language)
        .await
        .with_context(|| format!("Failed to load '{}'", cli.input))?;

    // ── Searchable PDF (sibling stage, independent of extraction) ────────
    let searchable = match cli.searchable_out {
        Some(ref path) => Some(refinery.make_searchable(&doc, Some(path)).await),
        None => None,
    };

    // ── Extraction (fatal on error) ──────────────────────────────────────
    let extraction = match refinery.extract(&doc).await {
        Ok(extraction) => extraction,
        Err(e) => {
            if let Some(ref p) = progress {
                p.finish();
            }
            if cli.json {
                let report = serde_json::json!({
                    "extraction": null,
                    "error": e.to_string(),
                    "searchable": searchable,
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else if !cli.quiet && !show_progress {
                if let Some(ref result) = searchable {
                    eprintln!("  {}", render_notice(&result.notice()));
                }
            }
            return Err(e).context("Text extraction failed");
        }
    };

    // ── Refinement (never fatal) ─────────────────────────────────────────
    let refinement = if cli.wants_refinement() {
        Some(refinery.refine(&extraction).await)
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.finish();
    }

    // ── Outputs ──────────────────────────────────────────────────────────
    if let Some(ref path) = cli.raw_out {
        std::fs::write(path, &extraction.text)
            .with_context(|| format!("Failed to write raw text to {}", path.display()))?;
    }

    if let Some(ref refinement) = refinement {
        write_refinement(&cli, refinement)?;
    }

    if cli.json {
        let report = serde_json::json!({
            "extraction": extraction,
            "refinement": refinement,
            "searchable": searchable,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    if cli.raw_out.is_none() {
        print_text(&extraction.text)?;
    }

    if let Some(ExportOutcome::Fallback { text, .. }) = refinement.as_ref().map(|r| &r.export) {
        if !cli.quiet {
            eprintln!("{}", bold("Cleaned text (copy it from below):"));
        }
        print_text(text)?;
    }

    if !cli.quiet {
        print_summary(
            &extraction,
            refinement.as_ref(),
            searchable.as_ref(),
            !show_progress,
        );
    }

    Ok(())
}

/// Whether `out` names the same existing file as a local `input`.
fn overwrites_input(input: &str, out: &Path) -> bool {
    if ocr_refinery::pipeline::input::is_url(input) {
        return false;
    }
    match (std::fs::canonicalize(input), std::fs::canonicalize(out)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn write_refinement(cli: &Cli, refinement: &Refinement) -> Result<()> {
    if let Some(ref path) = cli.text_out {
        std::fs::write(path, refinement.cleaned_text())
            .with_context(|| format!("Failed to write cleaned text to {}", path.display()))?;
    }
    if let (Some(path), Some(pdf)) = (cli.pdf_out.as_ref(), refinement.export.pdf()) {
        std::fs::write(path, pdf.as_bytes())
            .with_context(|| format!("Failed to write PDF to {}", path.display()))?;
    }
    Ok(())
}

fn print_text(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_summary(
    extraction: &Extraction,
    refinement: Option<&Refinement>,
    searchable: Option<&SearchablePdfResult>,
    print_notices: bool,
) {
    eprintln!(
        "{} {} page(s), {} chars  {}",
        green("✔"),
        extraction.page_count,
        extraction.text.chars().count(),
        dim(&format!("{}ms", extraction.duration_ms)),
    );

    if !print_notices {
        return;
    }
    if let Some(result) = searchable {
        eprintln!("  {}", render_notice(&result.notice()));
    }
    if let Some(refinement) = refinement {
        for notice in refinement.notices() {
            eprintln!("  {}", render_notice(&notice));
        }
    }
}

/// Map CLI args to `RefineryConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RefineryConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let ocr = match cli.ocr_endpoint {
        Some(ref endpoint) => OcrBackend::Remote {
            endpoint: endpoint.clone(),
            timeout_secs: cli.ocr_timeout,
        },
        None => OcrBackend::Tesseract {
            binary: cli.tesseract.clone(),
        },
    };

    let mut builder = RefineryConfig::builder()
        .ocr_backend(ocr)
        .max_rendered_pixels(cli.max_pixels)
        .correction_endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .correction_timeout_secs(cli.api_timeout)
        .download_font(!cli.no_font_download)
        .font_size(cli.font_size)
        .ocrmypdf_path(cli.ocrmypdf.clone())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
