//! Values produced by each pipeline stage.
//!
//! Every stage has its own output type and none of them owns another's: the
//! raw [`Extraction`] stays with the caller while [`Refinement`] carries the
//! correction and export results. A correction or export failure therefore
//! can never take the raw OCR text down with it.

use crate::document::Language;
use crate::error::{CorrectionError, ExportError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ── Notices ──────────────────────────────────────────────────────────────

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message meant for the end user, not for an operator log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "info: {}", self.message),
            NoticeLevel::Warning => write!(f, "warning: {}", self.message),
            NoticeLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Plain text OCR produced for one document.
///
/// `text` may be empty: a blank scan is a valid result, not a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub text: String,
    pub language: Language,
    /// Pages (or 1 for an image) that went through OCR.
    pub page_count: usize,
    /// Name of the uploaded file the text came from.
    pub source_name: String,
    pub duration_ms: u64,
}

// ── Correction ───────────────────────────────────────────────────────────

/// Whether the correction stage produced new text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorrectionStatus {
    Corrected,
    /// The original text was returned unchanged.
    Degraded { reason: CorrectionError },
}

/// Output of the correction stage: cleaned text, or the input verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub text: String,
    #[serde(flatten)]
    pub status: CorrectionStatus,
}

impl CorrectionResult {
    pub fn corrected(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: CorrectionStatus::Corrected,
        }
    }

    /// Fall back to `original`, recording why.
    pub fn degraded(original: impl Into<String>, reason: CorrectionError) -> Self {
        Self {
            text: original.into(),
            status: CorrectionStatus::Degraded { reason },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, CorrectionStatus::Degraded { .. })
    }

    /// The warning to show the user when correction fell back.
    pub fn notice(&self) -> Option<Notice> {
        match &self.status {
            CorrectionStatus::Corrected => None,
            CorrectionStatus::Degraded { reason } => Some(Notice::warning(format!(
                "Text cleanup failed ({reason}); showing the original OCR text."
            ))),
        }
    }
}

// ── Searchable PDF ───────────────────────────────────────────────────────

/// The three ways adding a text layer can end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SearchablePdfResult {
    /// A new PDF with a text layer was written to this path.
    Tagged(PathBuf),
    /// The input already had a text layer; nothing was written.
    AlreadyTagged,
    /// The tool failed; the message is the tool's own.
    Failed(String),
}

impl SearchablePdfResult {
    pub fn output_path(&self) -> Option<&PathBuf> {
        match self {
            SearchablePdfResult::Tagged(path) => Some(path),
            _ => None,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            SearchablePdfResult::Tagged(path) => {
                Notice::info(format!("Searchable PDF written to {}", path.display()))
            }
            SearchablePdfResult::AlreadyTagged => {
                Notice::info("This PDF already has selectable text. No need to OCR it again.")
            }
            SearchablePdfResult::Failed(reason) => Notice::error(format!("Error: {reason}")),
        }
    }
}

// ── PDF re-export ────────────────────────────────────────────────────────

/// A finished PDF file, always as immutable bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedPdf(Bytes);

impl RenderedPdf {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RenderedPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderedPdf(<{} bytes>)", self.0.len())
    }
}

/// Which font the export ended up using.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontUsed {
    pub name: String,
    /// `false` means the built-in Latin-1 fallback was used.
    pub unicode: bool,
}

/// A successful re-export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedPdf {
    #[serde(skip)]
    pub pdf: RenderedPdf,
    pub page_count: usize,
    pub line_count: usize,
    pub font: FontUsed,
    /// Degraded-mode warnings, e.g. the font fallback.
    pub notices: Vec<Notice>,
}

/// Result of the re-export stage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExportOutcome {
    Pdf(ExportedPdf),
    /// No PDF; present `text` as plain copyable output instead.
    Fallback { text: String, reason: ExportError },
}

impl ExportOutcome {
    pub fn pdf(&self) -> Option<&RenderedPdf> {
        match self {
            ExportOutcome::Pdf(exported) => Some(&exported.pdf),
            ExportOutcome::Fallback { .. } => None,
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        match self {
            ExportOutcome::Pdf(exported) => exported.notices.clone(),
            ExportOutcome::Fallback { reason, .. } => vec![
                Notice::error(format!("PDF generation failed: {reason}")),
                Notice::info("As a fallback, you can copy the text below."),
            ],
        }
    }
}

// ── Refinement ───────────────────────────────────────────────────────────

/// Everything produced after the user asked for cleanup.
#[derive(Debug, Clone, Serialize)]
pub struct Refinement {
    pub correction: CorrectionResult,
    pub export: ExportOutcome,
    pub duration_ms: u64,
}

impl Refinement {
    /// The cleaned text offered for download (original text if degraded).
    pub fn cleaned_text(&self) -> &str {
        &self.correction.text
    }

    /// All user-facing notices from both stages, in stage order.
    pub fn notices(&self) -> Vec<Notice> {
        self.correction
            .notice()
            .into_iter()
            .chain(self.export.notices())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_correction_keeps_original_and_warns() {
        let r = CorrectionResult::degraded("raw  text", CorrectionError::MissingApiKey);
        assert_eq!(r.text, "raw  text");
        assert!(r.is_degraded());
        let notice = r.notice().expect("degraded result carries a warning");
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.message.contains("no API key"));
    }

    #[test]
    fn corrected_has_no_notice() {
        let r = CorrectionResult::corrected("clean");
        assert!(!r.is_degraded());
        assert!(r.notice().is_none());
    }

    #[test]
    fn correction_json_shape() {
        let r = CorrectionResult::degraded("x", CorrectionError::Transport("refused".into()));
        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["text"], "x");
        assert_eq!(v["status"], "degraded");
    }

    #[test]
    fn searchable_notices() {
        assert_eq!(
            SearchablePdfResult::AlreadyTagged.notice().level,
            NoticeLevel::Info
        );
        let failed = SearchablePdfResult::Failed("tesseract not found".into());
        assert_eq!(failed.notice().level, NoticeLevel::Error);
        assert!(failed.notice().message.contains("tesseract not found"));
        assert!(failed.output_path().is_none());
    }

    #[test]
    fn fallback_export_suggests_copying() {
        let outcome = ExportOutcome::Fallback {
            text: "cleaned".into(),
            reason: ExportError::Serialise("boom".into()),
        };
        assert!(outcome.pdf().is_none());
        let notices = outcome.notices();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].message.contains("boom"));
    }

    #[test]
    fn rendered_pdf_debug_hides_bytes() {
        let pdf = RenderedPdf::new(Bytes::from_static(b"%PDF-1.5"));
        assert_eq!(format!("{pdf:?}"), "RenderedPdf(<8 bytes>)");
        assert_eq!(pdf.len(), 8);
    }
}
