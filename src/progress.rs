//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::RefineryConfigBuilder::progress_callback`] to hear about
//! each stage as the pipeline runs it: a spinner in the CLI, a status line in
//! a web handler, or a test recorder.
//!
//! # Example
//!
//! ```rust
//! use ocr_refinery::{PipelineProgress, RefineryConfig, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgress for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("{}…", stage.label());
//!     }
//! }
//!
//! let config = RefineryConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn PipelineProgress>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Notice;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The independently failable steps of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocess,
    Ocr,
    Correction,
    Export,
    Tagging,
}

impl Stage {
    /// Short user-facing description.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Preprocess => "Preparing document",
            Stage::Ocr => "Extracting text with OCR",
            Stage::Correction => "Cleaning text with AI",
            Stage::Export => "Generating PDF",
            Stage::Tagging => "Adding selectable text layer",
        }
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// Stages run strictly one after another, so calls never overlap for a single
/// request. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait PipelineProgress: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after a stage finished, whether it succeeded or degraded.
    ///
    /// # Arguments
    /// * `stage`    — the stage that finished
    /// * `ok`       — `false` when the stage failed or fell back
    fn on_stage_complete(&self, stage: Stage, ok: bool) {
        let _ = (stage, ok);
    }

    /// Called once per page during OCR.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages in the document
    fn on_page(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called for every user-facing warning or info message as it arises.
    fn on_notice(&self, notice: &Notice) {
        let _ = notice;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::RefineryConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

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

        fn on_page(&self, page_num: usize, total_pages: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("page {page_num}/{total_pages}"));
        }
    }

    #[test]
    fn noop_progress_does_not_panic() {
        let cb = NoopProgress;
        cb.on_stage_start(Stage::Ocr);
        cb.on_page(1, 2);
        cb.on_stage_complete(Stage::Ocr, true);
        cb.on_notice(&Notice::warning("font fallback"));
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        rec.on_stage_start(Stage::Ocr);
        rec.on_page(1, 2);
        rec.on_page(2, 2);
        rec.on_stage_complete(Stage::Ocr, true);

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["start Ocr", "page 1/2", "page 2/2", "done Ocr true"]
        );
    }

    #[test]
    fn every_stage_has_a_label() {
        for stage in [
            Stage::Preprocess,
            Stage::Ocr,
            Stage::Correction,
            Stage::Export,
            Stage::Tagging,
        ] {
            assert!(!stage.label().is_empty());
        }
    }
}
