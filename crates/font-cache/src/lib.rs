//! # font-cache
//!
//! Download a font file once and keep it in a per-user cache directory, so
//! PDF export can embed a Unicode-capable face without shipping one in the
//! binary.
//!
//! ## How it works
//!
//! On every call to [`ensure_font`]:
//!
//! 1. Checks the cache directory (default `~/.cache/ocr-refinery/fonts/`) for
//!    the requested file name.
//! 2. If absent, downloads the font from its URL.
//! 3. Validates the payload starts with a TrueType/OpenType signature, so an
//!    HTML error page is never cached as a font.
//! 4. Writes it to a temporary file inside the cache directory and renames it
//!    into place.
//!
//! Concurrent callers that both miss the cache each download the file and the
//! last rename wins. Both renames move a complete, validated file, so the
//! worst case is a redundant download, never a truncated font.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use font_cache::{ensure_font, FontSource};
//!
//! let path = ensure_font(&FontSource::dejavu_sans(), None).expect("font unavailable");
//! println!("font cached at {}", path.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `OCR_REFINERY_FONT_CACHE_DIR`: override the default cache directory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Where DejaVu Sans is fetched from when it is not cached yet.
pub const DEJAVU_SANS_URL: &str =
    "https://github.com/dejavu-fonts/dejavu-fonts/raw/master/ttf/DejaVuSans.ttf";

/// File name DejaVu Sans is cached under.
pub const DEJAVU_SANS_FILE: &str = "DejaVuSans.ttf";

/// Environment variable that relocates the cache directory.
pub const CACHE_DIR_ENV: &str = "OCR_REFINERY_FONT_CACHE_DIR";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by font-cache operations.
#[derive(Error, Debug)]
pub enum FontCacheError {
    /// Could not create or write into the local cache directory.
    #[error("Font cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Font download failed: {0}")]
    Download(String),

    /// The downloaded payload is not a TrueType/OpenType font.
    #[error("Downloaded file from '{url}' is not a font (first bytes: {magic:?})")]
    NotAFont { url: String, magic: Vec<u8> },

    /// The temporary download could not be moved into place.
    #[error("Failed to persist font to '{path}': {reason}")]
    Persist { path: PathBuf, reason: String },
}

// ── Font source ──────────────────────────────────────────────────────────────

/// A remote font and the name it is cached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSource {
    /// HTTP/HTTPS URL the font is downloaded from.
    pub url: String,
    /// File name inside the cache directory.
    pub file_name: String,
    /// Explicit cache directory. `None` uses [`font_cache_dir`].
    pub cache_dir: Option<PathBuf>,
}

impl FontSource {
    /// DejaVu Sans from the upstream repository.
    pub fn dejavu_sans() -> Self {
        Self {
            url: DEJAVU_SANS_URL.to_string(),
            file_name: DEJAVU_SANS_FILE.to_string(),
            cache_dir: None,
        }
    }

    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
            cache_dir: None,
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Directory the font lives in once cached.
    pub fn directory(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(font_cache_dir)
    }

    /// Full on-disk path of the cached font.
    pub fn target_path(&self) -> PathBuf {
        self.directory().join(&self.file_name)
    }
}

impl Default for FontSource {
    fn default() -> Self {
        Self::dejavu_sans()
    }
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the default font cache directory.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/ocr-refinery/fonts/`
/// - **Linux**: `~/.cache/ocr-refinery/fonts/`
/// - **Windows**: `%LOCALAPPDATA%\ocr-refinery\fonts\`
///
/// Override by setting `OCR_REFINERY_FONT_CACHE_DIR`.
pub fn font_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var(CACHE_DIR_ENV) {
        if !override_dir.is_empty() {
            return PathBuf::from(override_dir);
        }
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("ocr-refinery").join("fonts")
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` if the font is already on disk (no network access needed on
/// the next call to [`ensure_font`]).
pub fn is_font_cached(source: &FontSource) -> bool {
    source.target_path().is_file()
}

/// Returns the on-disk path of the font, or `None` if it is not cached.
pub fn cached_font_path(source: &FontSource) -> Option<PathBuf> {
    let path = source.target_path();
    path.is_file().then_some(path)
}

/// Ensures the font is present in the cache and returns its path.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during the
/// download. Pass `None` to suppress progress callbacks.
///
/// A cache hit never touches the network. A miss downloads, validates and
/// atomically persists the file; a failed download leaves the cache as it was.
pub fn ensure_font(
    source: &FontSource,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, FontCacheError> {
    if let Some(path) = cached_font_path(source) {
        return Ok(path);
    }

    let dir = source.directory();
    std::fs::create_dir_all(&dir).map_err(FontCacheError::CacheDir)?;

    let bytes = download_bytes(&source.url, on_progress)?;
    if !looks_like_font(&bytes) {
        return Err(FontCacheError::NotAFont {
            url: source.url.clone(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    let target = source.target_path();
    persist_atomically(&bytes, &dir, &target)?;
    Ok(target)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Streams a URL into a `Vec<u8>`, calling `on_progress` every 64 KiB.
fn download_bytes(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, FontCacheError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("font-cache/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| FontCacheError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| FontCacheError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(FontCacheError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let capacity = total.unwrap_or(1024 * 1024) as usize;
    let mut buf = Vec::with_capacity(capacity);

    let mut stream = response;
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded: u64 = 0;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(FontCacheError::Download(format!("Read error: {e}")));
            }
        }
    }

    Ok(buf)
}

/// TrueType (`00 01 00 00`, `true`), OpenType (`OTTO`) or a collection (`ttcf`).
fn looks_like_font(bytes: &[u8]) -> bool {
    matches!(
        bytes.get(..4),
        Some([0x00, 0x01, 0x00, 0x00]) | Some(b"true") | Some(b"OTTO") | Some(b"ttcf")
    )
}

/// Writes `bytes` to a sibling temp file and renames it over `target`.
fn persist_atomically(bytes: &[u8], dir: &Path, target: &Path) -> Result<(), FontCacheError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".font-download-")
        .tempfile_in(dir)
        .map_err(FontCacheError::CacheDir)?;
    tmp.write_all(bytes).map_err(FontCacheError::CacheDir)?;
    tmp.flush().map_err(FontCacheError::CacheDir)?;

    tmp.persist(target).map_err(|e| FontCacheError::Persist {
        path: target.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
