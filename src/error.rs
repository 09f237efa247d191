//! Error types for the ocr-refinery library.
//!
//! Failures fall into two classes that the pipeline treats very differently:
//!
//! * [`RefineryError`] is **fatal**: the request cannot produce an extraction
//!   result at all (bad input, unreadable PDF, OCR engine failure, invalid
//!   configuration). Returned as `Err(RefineryError)` from
//!   [`crate::Refinery::extract`].
//!
//! * [`CorrectionError`] and [`ExportError`] are **non-fatal**: a later stage
//!   failed, but everything produced before it is still valid. These never
//!   escape as `Err`; they are carried inside
//!   [`crate::output::CorrectionResult`] and [`crate::output::ExportOutcome`]
//!   together with the fallback value the caller should use instead.
//!
//! Searchable-PDF failures are modelled by
//! [`crate::output::SearchablePdfResult::Failed`] and carry the tool's message
//! verbatim, so they have no error type of their own.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr-refinery library.
#[derive(Debug, Error)]
pub enum RefineryError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file extension is not one of jpg, jpeg, png, pdf.
    #[error("Unsupported file type '{extension}' for '{name}'\nSupported: jpg, jpeg, png, pdf.")]
    UnsupportedMediaType { name: String, extension: String },

    /// The language code is not in the supported OCR language list.
    #[error("Unsupported OCR language '{code}'\nSupported: eng, spa, fra, deu, ita, por, rus, chi_sim, jpn.")]
    UnsupportedLanguage { code: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file was declared a PDF but does not start with `%PDF`.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    // ── Preprocessing errors ──────────────────────────────────────────────
    /// The image could not be decoded or re-encoded.
    #[error("Could not read image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF input needs the pdfium shared library to rasterise pages.\n\
  • Install pdfium so the system loader can find it, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine binary could not be started.
    #[error("OCR engine '{engine}' is not available: {detail}\nIs it installed and on PATH?")]
    OcrEngineUnavailable { engine: String, detail: String },

    /// The OCR engine ran but reported an error.
    #[error("OCR failed on page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (temp dir creation, task panic, …).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why the correction stage fell back to the original text.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CorrectionError {
    /// No API key was configured for the chat-completion endpoint.
    #[error("no API key configured for the correction endpoint")]
    MissingApiKey,

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("request to correction endpoint failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("correction endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected `{choices:[{message:{content}}]}` shape.
    #[error("malformed response from correction endpoint: {0}")]
    MalformedResponse(String),

    /// The configured LLM provider could not be created or returned an error.
    #[error("LLM provider error: {0}")]
    Provider(String),
}

/// Why the PDF re-export stage could not produce a PDF.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExportError {
    /// The loaded font could not be parsed for metrics.
    #[error("font '{name}' could not be parsed: {detail}")]
    FontParse { name: String, detail: String },

    /// The layout produced could not be serialised as PDF.
    #[error("PDF serialisation failed: {0}")]
    Serialise(String),

    /// The export task panicked or was cancelled.
    #[error("PDF export task failed: {0}")]
    Task(String),
}
