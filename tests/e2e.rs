//! End-to-end tests against the real external tools.
//!
//! These need `tesseract` (with `eng` traineddata), the pdfium shared
//! library and, for the searchable test, `ocrmypdf`. The correction test also
//! makes a live API call. They are gated behind `E2E_ENABLED` so they do not
//! run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! The PDF inputs are produced by the crate's own exporter, so no fixtures
//! are needed.

use ocr_refinery::export::export_blocking;
use ocr_refinery::{
    Document, ExportConfig, Language, Refinery, RefineryConfig, RefineryError,
    SearchablePdfResult,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/e2e-output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Route library logs to the test output; `RUST_LOG=debug` for detail.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        init_tracing();
    }};
}

const SAMPLE: &str = "The quick brown fox jumps over the lazy dog.\n\n\
                      Optical character recognition turns pictures of text into text.";

/// A text PDF rendered by the exporter, large enough for tesseract to read.
fn sample_pdf() -> Vec<u8> {
    let mut config = ExportConfig::default();
    config.page.font_size = 18.0;
    export_blocking(SAMPLE, &config)
        .expect("exporter should produce a PDF")
        .pdf
        .as_bytes()
        .to_vec()
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_rendered_pdf() {
    e2e_skip_unless_enabled!();

    let doc = Document::from_bytes("sample.pdf", sample_pdf(), Language::Eng).unwrap();
    let refinery = Refinery::new(RefineryConfig::default());

    let extraction = refinery
        .extract(&doc)
        .await
        .expect("extraction should succeed");

    println!("--- BEGIN OCR ---\n{}\n--- END OCR ---", extraction.text);
    assert_eq!(extraction.page_count, 1);
    let lower = extraction.text.to_lowercase();
    assert!(lower.contains("quick brown fox"), "OCR missed the first line");
    assert!(lower.contains("recognition"), "OCR missed the second paragraph");
}

#[tokio::test]
async fn test_extract_missing_language_data_is_fatal() {
    e2e_skip_unless_enabled!();
    if std::env::var("E2E_EXPECT_MISSING_JPN").is_err() {
        println!("SKIP — set E2E_EXPECT_MISSING_JPN=1 when jpn traineddata is not installed");
        return;
    }

    let doc = Document::from_bytes("sample.pdf", sample_pdf(), Language::Jpn).unwrap();
    let err = Refinery::new(RefineryConfig::default())
        .extract(&doc)
        .await
        .unwrap_err();
    println!("error: {err}");
    assert!(matches!(err, RefineryError::OcrFailed { .. }), "{err:?}");
}

#[test]
fn test_extract_sync_wrapper() {
    e2e_skip_unless_enabled!();

    let doc = Document::from_bytes("sample.pdf", sample_pdf(), Language::Eng).unwrap();
    let result = Refinery::default()
        .extract_sync(&doc)
        .expect("extraction should succeed");
    assert!(!result.text.is_empty());
}

// ── Searchable PDF ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_text_pdf_is_already_tagged() {
    e2e_skip_unless_enabled!();

    let doc = Document::from_bytes("sample.pdf", sample_pdf(), Language::Eng).unwrap();
    let result = Refinery::default().make_searchable(&doc, None).await;

    // The exporter's output already carries a text layer.
    assert_eq!(result, SearchablePdfResult::AlreadyTagged, "{result:?}");
}

// ── Full pipeline with live correction ───────────────────────────────────────

#[tokio::test]
async fn test_full_pipeline_live_correction() {
    e2e_skip_unless_enabled!();
    if std::env::var("TOGETHER_API_KEY").is_err() {
        println!("SKIP — TOGETHER_API_KEY not set");
        return;
    }

    let doc = Document::from_bytes("sample.pdf", sample_pdf(), Language::Eng).unwrap();
    let refinery = Refinery::new(RefineryConfig::default());

    let extraction = refinery.extract(&doc).await.expect("extraction");
    let refinement = refinery.refine(&extraction).await;

    for notice in refinement.notices() {
        println!("{notice}");
    }
    assert!(
        !refinement.correction.is_degraded(),
        "correction degraded: {:?}",
        refinement.correction.status
    );
    assert!(refinement.cleaned_text().to_lowercase().contains("fox"));

    let pdf = refinement.export.pdf().expect("export should succeed");
    let out_path = output_dir().join("sample_cleaned.pdf");
    std::fs::write(&out_path, pdf.as_bytes()).ok();
    println!("[full_pipeline] Saved to {}", out_path.display());
}
