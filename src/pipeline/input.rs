//! Input resolution and staging.
//!
//! User input (a local path, a URL, or bytes already in memory) becomes a
//! [`Document`]. Before any stage touches it, the document is written into a
//! fresh per-request [`TempDir`] by [`stage`]; the returned
//! [`StagedDocument`] owns that directory, so everything the request wrote
//! (the upload, page images, intermediate files) disappears when it is
//! dropped, whether the request succeeded or not.

use crate::document::{Document, Language, MediaKind};
use crate::error::RefineryError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A document written to its own staging directory.
pub struct StagedDocument {
    path: PathBuf,
    kind: MediaKind,
    language: Language,
    dir: TempDir,
}

impl StagedDocument {
    /// Path of the staged upload.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory for this request's intermediate files.
    pub fn work_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn language(&self) -> Language {
        self.language
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Turn a path or URL into a [`Document`].
pub async fn load_input(
    input: &str,
    language: Language,
    timeout_secs: u64,
) -> Result<Document, RefineryError> {
    if is_url(input) {
        download_url(input, language, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(RefineryError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        load_local(Path::new(input), language)
    }
}

/// Read a local file into a [`Document`].
pub fn load_local(path: &Path, language: Language) -> Result<Document, RefineryError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RefineryError::InvalidInput {
            input: path.display().to_string(),
        })?
        .to_string();

    // Reject the extension before reading a possibly large file.
    MediaKind::from_file_name(&name)?;

    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RefineryError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => RefineryError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => RefineryError::Internal(format!("Failed to read '{}': {e}", path.display())),
    })?;

    debug!("Loaded local file: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(name, bytes, language)
}

/// Download a URL into a [`Document`].
async fn download_url(
    url: &str,
    language: Language,
    timeout_secs: u64,
) -> Result<Document, RefineryError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RefineryError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            RefineryError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            RefineryError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(RefineryError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let bytes = response.bytes().await.map_err(map_err)?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), filename);
    Document::from_bytes(filename, bytes.to_vec(), language)
}

/// Last path segment of the URL when it has an extension, else `download.pdf`.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download.pdf".to_string()
}

/// Write `doc` into a fresh staging directory.
///
/// PDFs are checked for the `%PDF` signature here so a mislabelled upload
/// fails with a clear message instead of a pdfium error.
pub fn stage(doc: &Document) -> Result<StagedDocument, RefineryError> {
    let kind = doc.kind();

    if kind.is_pdf() && !doc.bytes().starts_with(b"%PDF") {
        return Err(RefineryError::NotAPdf {
            path: PathBuf::from(doc.name()),
            magic: doc.bytes().iter().take(8).copied().collect(),
        });
    }

    let dir = tempfile::Builder::new()
        .prefix("ocr-refinery-")
        .tempdir()
        .map_err(|e| RefineryError::Internal(format!("Failed to create staging dir: {e}")))?;

    let path = dir
        .path()
        .join(format!("{}.{}", sanitise_stem(doc.stem()), kind.extension()));
    std::fs::write(&path, doc.bytes())
        .map_err(|e| RefineryError::Internal(format!("Failed to stage upload: {e}")))?;

    debug!("Staged '{}' at {}", doc.name(), path.display());

    Ok(StagedDocument {
        path,
        kind,
        language: doc.language(),
        dir,
    })
}

/// Keep staged file names to a safe character set for external tools.
fn sanitise_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(extract_filename("https://x.org/a/scan.png?dl=1"), "scan.png");
        assert_eq!(extract_filename("https://x.org/a/"), "download.pdf");
    }

    #[test]
    fn staging_writes_into_a_private_dir_and_cleans_up() {
        let doc = Document::from_bytes("my scan (1).png", vec![1, 2, 3], Language::Eng).unwrap();
        let staged = stage(&doc).unwrap();
        let dir = staged.work_dir().to_path_buf();

        assert_eq!(staged.path().file_name().unwrap(), "my_scan__1_.png");
        assert_eq!(std::fs::read(staged.path()).unwrap(), vec![1, 2, 3]);

        drop(staged);
        assert!(!dir.exists(), "staging dir should be removed on drop");
    }

    #[test]
    fn mislabelled_pdf_is_rejected() {
        let doc = Document::from_bytes("fake.pdf", b"PK\x03\x04zip".to_vec(), Language::Eng).unwrap();
        match stage(&doc) {
            Err(RefineryError::NotAPdf { magic, .. }) => assert_eq!(&magic[..2], b"PK"),
            Err(e) => panic!("expected NotAPdf, got {e:?}"),
            Ok(_) => panic!("expected NotAPdf, staging succeeded"),
        }
    }

    #[test]
    fn missing_local_file() {
        let err = load_local(Path::new("/definitely/not/here.pdf"), Language::Eng).unwrap_err();
        assert!(matches!(err, RefineryError::FileNotFound { .. }));
    }

    #[test]
    fn local_file_with_bad_extension_is_rejected_before_reading() {
        let err = load_local(Path::new("/definitely/not/here.docx"), Language::Eng).unwrap_err();
        assert!(matches!(err, RefineryError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn local_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.JPG");
        std::fs::write(&path, b"\xFF\xD8\xFF").unwrap();
        let doc = load_local(&path, Language::Fra).unwrap();
        assert_eq!(doc.name(), "page.JPG");
        assert_eq!(doc.language(), Language::Fra);
    }
}
