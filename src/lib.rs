//! # ocr-refinery
//!
//! Extract text from scanned images and PDFs with OCR, clean it with an LLM,
//! and hand every intermediate result back to the caller: raw text, cleaned
//! text, a regenerated PDF, and a searchable copy of the original PDF.
//!
//! ## Why stage-by-stage results?
//!
//! OCR output is valuable even when the later steps fail. The pipeline
//! therefore treats only extraction as fatal; correction falls back to the
//! raw text, PDF export falls back to copyable text, and adding a text layer
//! reports one of three outcomes. No failure downstream can take an earlier
//! result away.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Input       path, URL or bytes → per-request temp dir
//!  ├─ 2. Preprocess  grayscale PNG pages (pdfium for PDFs, spawn_blocking)
//!  ├─ 3. OCR         tesseract or remote OCR service, per page
//!  │                 ── Extraction returned here ──
//!  ├─ 4. Correct     one chat-completion call; degrades to the raw text
//!  └─ 5. Export      text-fitting layout → PDF; degrades to plain text
//!
//!  PDF ── Searchable  ocrmypdf → Tagged | AlreadyTagged | Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_refinery::{Document, Language, Refinery, RefineryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from TOGETHER_API_KEY when not set here.
//!     let refinery = Refinery::new(RefineryConfig::default());
//!     let doc = Document::from_bytes("scan.png", std::fs::read("scan.png")?, Language::Eng)?;
//!
//!     let extraction = refinery.extract(&doc).await?;
//!     println!("{}", extraction.text);
//!
//!     let refinement = refinery.refine(&extraction).await;
//!     for notice in refinement.notices() {
//!         eprintln!("{notice}");
//!     }
//!     if let Some(pdf) = refinement.export.pdf() {
//!         std::fs::write("cleaned.pdf", pdf.as_bytes())?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-refinery` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr-refinery = { version = "0.3", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Stage | Needs |
//! |-------|-------|
//! | OCR (default) | `tesseract` on PATH with the language's traineddata |
//! | PDF input | the pdfium shared library (`PDFIUM_LIB_PATH` or system) |
//! | Searchable PDF | `ocrmypdf` on PATH |
//! | Correction | `TOGETHER_API_KEY`, or an `edgequake-llm` provider |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod refine;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CorrectionConfig, ExportConfig, OcrBackend, RefineryConfig, RefineryConfigBuilder,
    DEFAULT_CORRECTION_ENDPOINT, DEFAULT_CORRECTION_MODEL,
};
pub use document::{Document, ImageFormat, Language, MediaKind};
pub use error::{CorrectionError, ExportError, RefineryError};
pub use export::layout::PageGeometry;
pub use export::{export_text_pdf, RawPdf};
pub use output::{
    CorrectionResult, CorrectionStatus, ExportOutcome, ExportedPdf, Extraction, FontUsed,
    Notice, NoticeLevel, Refinement, RenderedPdf, SearchablePdfResult,
};
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback, Stage};
pub use refine::Refinery;
