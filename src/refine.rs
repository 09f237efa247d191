//! Orchestrator: the request-level entry points.
//!
//! A request runs in two phases. [`Refinery::extract`] stages the upload,
//! preprocesses it and runs OCR; it is the only phase allowed to fail. The
//! caller keeps the resulting [`Extraction`] and may later hand it to
//! [`Refinery::refine`], which runs correction and then PDF re-export, each
//! degrading to a fallback value instead of failing.
//! [`Refinery::make_searchable`] is a sibling operation on PDF uploads and
//! shares nothing with the other two.
//!
//! Stages run strictly one after another; nothing overlaps.

use crate::config::RefineryConfig;
use crate::document::{Document, Language};
use crate::error::RefineryError;
use crate::export;
use crate::output::{Extraction, Notice, Refinement, SearchablePdfResult};
use crate::pipeline::{correct, input, ocr, preprocess, searchable};
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the pipeline with one configuration. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Refinery {
    config: RefineryConfig,
}

impl Refinery {
    pub fn new(config: RefineryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefineryConfig {
        &self.config
    }

    /// Load a local path or HTTP/HTTPS URL as a [`Document`].
    pub async fn load(&self, input: &str, language: Language) -> Result<Document, RefineryError> {
        input::load_input(input, language, self.config.download_timeout_secs).await
    }

    /// Extract text from `doc` with OCR.
    ///
    /// # Errors
    /// Any preprocessing or OCR failure is fatal for the request:
    /// unreadable image, corrupt or encrypted PDF, missing OCR engine,
    /// engine error.
    ///
    /// An empty `text` is not an error; it means the engine found nothing.
    pub async fn extract(&self, doc: &Document) -> Result<Extraction, RefineryError> {
        let start = Instant::now();
        info!("Starting extraction: {} ({})", doc.name(), doc.language());

        // ── Step 1: Stage + preprocess ───────────────────────────────────
        self.stage_start(Stage::Preprocess);
        let prepared = async {
            let staged = input::stage(doc)?;
            let pages = preprocess::preprocess(&staged, self.config.max_rendered_pixels).await?;
            Ok::<_, RefineryError>((staged, pages))
        }
        .await;
        let (staged, pages) = self.finish(Stage::Preprocess, prepared)?;
        debug!("Prepared {} page image(s)", pages.len());

        // ── Step 2: OCR ──────────────────────────────────────────────────
        self.stage_start(Stage::Ocr);
        let text = ocr::extract_text(
            &self.config.ocr,
            &pages,
            staged.language(),
            self.config.progress_callback.as_ref(),
        )
        .await;
        let text = self.finish(Stage::Ocr, text)?;

        // Staging directory and page images are removed here.
        drop(staged);

        if text.is_empty() {
            self.notify(&Notice::info("No text was found in this document."));
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extraction complete: {} pages, {} chars in {}ms",
            pages.len(),
            text.chars().count(),
            duration_ms
        );

        Ok(Extraction {
            text,
            language: doc.language(),
            page_count: pages.len(),
            source_name: doc.name().to_string(),
            duration_ms,
        })
    }

    /// Clean an extraction with the LLM and re-export it as PDF.
    ///
    /// Never fails. The PDF title defaults to the source file name.
    pub async fn refine(&self, extraction: &Extraction) -> Refinement {
        let title = self
            .config
            .export
            .title
            .clone()
            .unwrap_or_else(|| extraction.source_name.clone());
        self.refine_with_title(&extraction.text, Some(title)).await
    }

    /// Like [`refine`](Self::refine) for text from any source.
    pub async fn refine_text(&self, text: &str) -> Refinement {
        self.refine_with_title(text, self.config.export.title.clone())
            .await
    }

    async fn refine_with_title(&self, text: &str, title: Option<String>) -> Refinement {
        let start = Instant::now();

        // ── Step 1: Correction ───────────────────────────────────────────
        self.stage_start(Stage::Correction);
        let correction = correct::correct_text(text, &self.config.correction).await;
        self.stage_done(Stage::Correction, !correction.is_degraded());
        if let Some(notice) = correction.notice() {
            self.notify(&notice);
        }

        // ── Step 2: PDF re-export of the corrected text ──────────────────
        self.stage_start(Stage::Export);
        let mut export_config = self.config.export.clone();
        export_config.title = title;
        let export = export::export_text_pdf(&correction.text, &export_config).await;
        self.stage_done(Stage::Export, export.pdf().is_some());
        for notice in export.notices() {
            self.notify(&notice);
        }

        Refinement {
            correction,
            export,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Add a selectable text layer to a PDF upload.
    ///
    /// With `output` unset the result is written to a new
    /// `<stem>_*_searchable.pdf` in the system temp directory, which the
    /// caller then owns. Image uploads and tool failures yield
    /// [`SearchablePdfResult::Failed`].
    pub async fn make_searchable(
        &self,
        doc: &Document,
        output: Option<&Path>,
    ) -> SearchablePdfResult {
        self.stage_start(Stage::Tagging);
        let outcome = self.tag(doc, output).await;
        self.stage_done(
            Stage::Tagging,
            !matches!(outcome, SearchablePdfResult::Failed(_)),
        );
        self.notify(&outcome.notice());
        outcome
    }

    async fn tag(&self, doc: &Document, output: Option<&Path>) -> SearchablePdfResult {
        if !doc.kind().is_pdf() {
            return SearchablePdfResult::Failed(
                "Searchable PDF output is only available for PDF uploads.".into(),
            );
        }

        let staged = match input::stage(doc) {
            Ok(staged) => staged,
            Err(e) => return SearchablePdfResult::Failed(e.to_string()),
        };

        let produced = searchable::searchable_path(staged.path());
        let outcome = searchable::run_ocrmypdf(
            &self.config.ocrmypdf_path,
            staged.path(),
            &produced,
            staged.language(),
        )
        .await;

        match outcome {
            SearchablePdfResult::Tagged(path) => deliver(&path, output, doc.stem()),
            other => other,
        }
    }

    // ── Blocking wrappers ────────────────────────────────────────────────

    /// Blocking [`extract`](Self::extract). Creates a Tokio runtime internally.
    pub fn extract_sync(&self, doc: &Document) -> Result<Extraction, RefineryError> {
        runtime()?.block_on(self.extract(doc))
    }

    /// Blocking [`refine`](Self::refine).
    ///
    /// # Errors
    /// Only if the runtime cannot be created.
    pub fn refine_sync(&self, extraction: &Extraction) -> Result<Refinement, RefineryError> {
        Ok(runtime()?.block_on(self.refine(extraction)))
    }

    /// Blocking [`make_searchable`](Self::make_searchable).
    pub fn make_searchable_sync(
        &self,
        doc: &Document,
        output: Option<&Path>,
    ) -> SearchablePdfResult {
        match runtime() {
            Ok(rt) => rt.block_on(self.make_searchable(doc, output)),
            Err(e) => SearchablePdfResult::Failed(e.to_string()),
        }
    }

    // ── Progress plumbing ────────────────────────────────────────────────

    fn stage_start(&self, stage: Stage) {
        debug!("Stage start: {:?}", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn stage_done(&self, stage: Stage, ok: bool) {
        debug!("Stage done: {:?} ok={}", stage, ok);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, ok);
        }
    }

    fn notify(&self, notice: &Notice) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_notice(notice);
        }
    }

    /// Report a fatal stage result and pass it through.
    fn finish<T>(&self, stage: Stage, result: Result<T, RefineryError>) -> Result<T, RefineryError> {
        self.stage_done(stage, result.is_ok());
        if let Err(ref e) = result {
            warn!("{} failed: {}", stage.label(), e);
            self.notify(&Notice::error(e.to_string()));
        }
        result
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, RefineryError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RefineryError::Internal(format!("Failed to create tokio runtime: {e}")))
}

/// Copy the tagged PDF out of the staging area before it is removed.
fn deliver(produced: &Path, requested: Option<&Path>, stem: &str) -> SearchablePdfResult {
    let (dest, created): (PathBuf, bool) = match requested {
        Some(path) => (path.to_path_buf(), false),
        None => {
            let kept = tempfile::Builder::new()
                .prefix(&format!("{stem}_"))
                .suffix("_searchable.pdf")
                .tempfile()
                .and_then(|file| file.keep().map_err(|e| e.error));
            match kept {
                Ok((_, path)) => (path, true),
                Err(e) => {
                    return SearchablePdfResult::Failed(format!(
                        "could not create output file: {e}"
                    ))
                }
            }
        }
    };

    match std::fs::copy(produced, &dest) {
        Ok(_) => SearchablePdfResult::Tagged(dest),
        Err(e) => {
            if created {
                if let Err(rm) = std::fs::remove_file(&dest) {
                    debug!("Could not remove {}: {rm}", dest.display());
                }
            }
            SearchablePdfResult::Failed(format!("could not write {}: {e}", dest.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PipelineProgress;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgress for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage:?}"));
        }

        fn on_stage_complete(&self, stage: Stage, ok: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {stage:?} {ok}"));
        }

        fn on_notice(&self, notice: &Notice) {
            self.events
                .lock()
                .unwrap()
                .push(format!("notice {:?}", notice.level));
        }
    }

    fn offline_refinery(cache: &TempDir, recorder: Arc<Recorder>) -> Refinery {
        let config = RefineryConfig::builder()
            .correction_endpoint("http://127.0.0.1:9/v1/chat/completions")
            .api_key("test-key")
            .correction_timeout_secs(5)
            .font_url("http://127.0.0.1:9/DejaVuSans.ttf")
            .font_cache_dir(cache.path())
            .download_font(false)
            .tesseract_path("/nonexistent/bin/tesseract-for-tests")
            .progress_callback(recorder)
            .build()
            .unwrap();
        Refinery::new(config)
    }

    #[tokio::test]
    async fn refine_degrades_correction_but_still_exports() {
        let cache = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let refinery = offline_refinery(&cache, Arc::clone(&recorder));

        let refinement = refinery.refine_text("raw 0CR text").await;

        assert_eq!(refinement.cleaned_text(), "raw 0CR text");
        assert!(refinement.correction.is_degraded());
        assert!(refinement.export.pdf().is_some());

        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0], "start Correction");
        assert_eq!(events[1], "done Correction false");
        assert_eq!(events[2], "notice Warning");
        assert_eq!(events[3], "start Export");
        assert_eq!(events[4], "done Export true");
    }

    #[tokio::test]
    async fn ocr_failure_is_fatal_after_preprocess_succeeds() {
        let cache = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let refinery = offline_refinery(&cache, Arc::clone(&recorder));

        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::new_luma8(8, 8)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let doc = Document::from_bytes("blank.png", png.into_inner(), Language::Eng).unwrap();

        let err = refinery.extract(&doc).await.unwrap_err();
        assert!(matches!(err, RefineryError::OcrEngineUnavailable { .. }), "got {err:?}");

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            events[..4],
            [
                "start Preprocess".to_string(),
                "done Preprocess true".to_string(),
                "start Ocr".to_string(),
                "done Ocr false".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn images_cannot_be_made_searchable() {
        let doc = Document::from_bytes("scan.png", vec![0u8; 4], Language::Eng).unwrap();
        let result = Refinery::default().make_searchable(&doc, None).await;
        assert!(matches!(result, SearchablePdfResult::Failed(ref m) if m.contains("only available for PDF")));
    }

    #[tokio::test]
    async fn mislabelled_pdf_cannot_be_made_searchable() {
        let doc = Document::from_bytes("scan.pdf", b"GIF89a".to_vec(), Language::Eng).unwrap();
        let result = Refinery::default().make_searchable(&doc, None).await;
        assert!(matches!(result, SearchablePdfResult::Failed(ref m) if m.contains("not a valid PDF")));
    }

    #[test]
    fn delivered_copy_survives_staging_cleanup() {
        let staging = TempDir::new().unwrap();
        let produced = staging.path().join("scan_searchable.pdf");
        std::fs::write(&produced, b"%PDF-tagged").unwrap();

        let out_dir = TempDir::new().unwrap();
        let dest = out_dir.path().join("final.pdf");
        let result = deliver(&produced, Some(&dest), "scan");
        drop(staging);

        assert_eq!(result, SearchablePdfResult::Tagged(dest.clone()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-tagged");
    }

    #[test]
    fn failed_copy_leaves_no_kept_temp_file() {
        let staging = TempDir::new().unwrap();
        let missing = staging.path().join("never_written.pdf");
        let stem = format!("deliver-cleanup-{}", std::process::id());

        let result = deliver(&missing, None, &stem);

        let message = match result {
            SearchablePdfResult::Failed(m) => m,
            other => panic!("expected Failed, got {other:?}"),
        };
        let leftovers: Vec<_> = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(&format!("{stem}_")))
            .collect();
        assert!(leftovers.is_empty(), "{message}: {leftovers:?}");
    }
}
