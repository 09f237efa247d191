//! PDF re-export of cleaned text.
//!
//! ```text
//! text ──► resolve font ──► layout_text ──► write_pdf ──► RawPdf ──► RenderedPdf
//!            │  explicit path
//!            │  cached download
//!            │  fresh download
//!            └─ built-in Helvetica (warning)
//! ```
//!
//! Export never fails the request. Any error becomes
//! [`ExportOutcome::Fallback`] carrying the text so the caller can show it
//! as copyable output instead.

pub mod font;
pub mod layout;
pub mod writer;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::output::{ExportOutcome, ExportedPdf, FontUsed, Notice, RenderedPdf};
use bytes::Bytes;
use font::{ExportFont, TrueTypeFont};
use std::path::Path;
use tracing::{debug, info, warn};

/// PDF output as a writer may hand it back, before normalisation.
#[derive(Debug, Clone)]
pub enum RawPdf {
    /// A string holding Latin-1 bytes one char per byte.
    Text(String),
    Buffer(Vec<u8>),
    Shared(Bytes),
}

impl RawPdf {
    /// Convert to immutable bytes. Text is taken as Latin-1; a char above
    /// U+00FF cannot come from a byte string and becomes `?`.
    pub fn normalize(self) -> RenderedPdf {
        let bytes = match self {
            RawPdf::Text(text) => Bytes::from(
                text.chars()
                    .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
                    .collect::<Vec<u8>>(),
            ),
            RawPdf::Buffer(buf) => Bytes::from(buf),
            RawPdf::Shared(bytes) => bytes,
        };
        RenderedPdf::new(bytes)
    }
}

impl From<String> for RawPdf {
    fn from(text: String) -> Self {
        RawPdf::Text(text)
    }
}

impl From<Vec<u8>> for RawPdf {
    fn from(buf: Vec<u8>) -> Self {
        RawPdf::Buffer(buf)
    }
}

impl From<Bytes> for RawPdf {
    fn from(bytes: Bytes) -> Self {
        RawPdf::Shared(bytes)
    }
}

/// Render `text` as a PDF, degrading to [`ExportOutcome::Fallback`] on any error.
///
/// Font download and serialisation are blocking, so they run on the
/// blocking thread pool.
pub async fn export_text_pdf(text: &str, config: &ExportConfig) -> ExportOutcome {
    let owned = text.to_string();
    let cfg = config.clone();
    let joined = tokio::task::spawn_blocking(move || export_blocking(&owned, &cfg)).await;

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(ExportError::Task(e.to_string())),
    };

    match result {
        Ok(exported) => {
            info!(
                pages = exported.page_count,
                lines = exported.line_count,
                bytes = exported.pdf.len(),
                font = %exported.font.name,
                "PDF export complete"
            );
            ExportOutcome::Pdf(exported)
        }
        Err(reason) => {
            warn!("PDF export failed, falling back to plain text: {reason}");
            ExportOutcome::Fallback {
                text: text.to_string(),
                reason,
            }
        }
    }
}

/// Synchronous body of [`export_text_pdf`].
pub fn export_blocking(text: &str, config: &ExportConfig) -> Result<ExportedPdf, ExportError> {
    let (font, notices) = resolve_font(config);
    let page = &config.page;

    let layout = layout::layout_text(text, &font, page);
    debug!(
        pages = layout.page_count(),
        lines = layout.line_count(),
        "Text laid out"
    );

    let raw = writer::write_pdf(&layout, &font, page, config.title.as_deref())?;
    let pdf = RawPdf::from(raw).normalize();

    Ok(ExportedPdf {
        pdf,
        page_count: layout.page_count(),
        line_count: layout.line_count(),
        font: FontUsed {
            name: font.name().to_string(),
            unicode: font.is_unicode(),
        },
        notices,
    })
}

/// Pick the best available font, noting every fallback taken.
pub fn resolve_font(config: &ExportConfig) -> (ExportFont, Vec<Notice>) {
    let mut notices = Vec::new();

    if let Some(path) = &config.font_path {
        match load_truetype(path) {
            Ok(face) => return (ExportFont::Unicode(face), notices),
            Err(e) => {
                warn!("Configured font '{}' unusable: {e}", path.display());
                notices.push(Notice::warning(format!(
                    "Could not load font '{}': {e}.",
                    path.display()
                )));
            }
        }
    }

    let source = &config.font_source;
    let cached = font_cache::cached_font_path(source);
    let fetched = match cached {
        Some(path) => Some(path),
        None if config.download_font => match font_cache::ensure_font(source, None) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Font download from {} failed: {e}", source.url);
                notices.push(Notice::warning(format!(
                    "Could not download {}. PDF export may fail for non-English text.",
                    source.file_name
                )));
                None
            }
        },
        None => {
            debug!("Font not cached and downloads disabled");
            None
        }
    };

    if let Some(path) = fetched {
        match load_truetype(&path) {
            Ok(face) => return (ExportFont::Unicode(face), notices),
            Err(e) => {
                warn!("Cached font '{}' unusable: {e}", path.display());
                notices.push(Notice::warning(format!(
                    "Could not load {}: {e}.",
                    source.file_name
                )));
            }
        }
    }

    notices.push(Notice::warning(
        "Falling back to the built-in Helvetica font; characters outside Latin-1 will show as '?'.",
    ));
    (ExportFont::Builtin, notices)
}

fn load_truetype(path: &Path) -> Result<TrueTypeFont, ExportError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("EmbeddedFont");
    let data = std::fs::read(path).map_err(|e| ExportError::FontParse {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    TrueTypeFont::parse(name, data)
}
