//! The upload boundary: what a request is allowed to hand the pipeline.
//!
//! A [`Document`] is the bytes of one uploaded file plus the two facts the
//! rest of the pipeline branches on: its [`MediaKind`] (derived from the file
//! extension) and the OCR [`Language`] the user picked. Both are closed enums
//! so an unsupported extension or language code is rejected here, once,
//! instead of surfacing as an obscure engine error three stages later.

use crate::error::RefineryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// OCR languages supported by every engine and by the text-layer tool.
///
/// The string form is the Tesseract traineddata code, which `ocrmypdf -l`
/// accepts unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Eng,
    Spa,
    Fra,
    Deu,
    Ita,
    Por,
    Rus,
    ChiSim,
    Jpn,
}

impl Language {
    /// Every supported language, in the order offered to users.
    pub const ALL: [Language; 9] = [
        Language::Eng,
        Language::Spa,
        Language::Fra,
        Language::Deu,
        Language::Ita,
        Language::Por,
        Language::Rus,
        Language::ChiSim,
        Language::Jpn,
    ];

    /// The engine-facing language code, e.g. `"chi_sim"`.
    pub fn code(self) -> &'static str {
        match self {
            Language::Eng => "eng",
            Language::Spa => "spa",
            Language::Fra => "fra",
            Language::Deu => "deu",
            Language::Ita => "ita",
            Language::Por => "por",
            Language::Rus => "rus",
            Language::ChiSim => "chi_sim",
            Language::Jpn => "jpn",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = RefineryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or(RefineryError::UnsupportedLanguage { code })
    }
}

/// Raster formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// What kind of file a [`Document`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image(ImageFormat),
    Pdf,
}

impl MediaKind {
    /// Classify a file name by its extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, RefineryError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" => Ok(MediaKind::Image(ImageFormat::Jpeg)),
            "png" => Ok(MediaKind::Image(ImageFormat::Png)),
            "pdf" => Ok(MediaKind::Pdf),
            _ => Err(RefineryError::UnsupportedMediaType {
                name: name.to_string(),
                extension,
            }),
        }
    }

    pub fn is_pdf(self) -> bool {
        matches!(self, MediaKind::Pdf)
    }

    /// Canonical extension used when staging the file.
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image(ImageFormat::Jpeg) => "jpg",
            MediaKind::Image(ImageFormat::Png) => "png",
            MediaKind::Pdf => "pdf",
        }
    }
}

/// One uploaded file.
///
/// Holds the bytes in memory; staging to disk happens per request in
/// [`crate::pipeline::input`], so a `Document` can be processed any number
/// of times without leaking temp files.
#[derive(Clone)]
pub struct Document {
    name: String,
    bytes: Vec<u8>,
    kind: MediaKind,
    language: Language,
}

impl Document {
    /// Build a document from uploaded bytes.
    ///
    /// The media kind comes from `name`'s extension; anything outside
    /// jpg/jpeg/png/pdf is rejected.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        language: Language,
    ) -> Result<Self, RefineryError> {
        let name = name.into();
        let kind = MediaKind::from_file_name(&name)?;
        Ok(Self {
            name,
            bytes: bytes.into(),
            kind,
            language,
        })
    }

    /// File name as uploaded (used for staging and download names).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Same document, different OCR language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// File stem used to derive output names, e.g. `"scan"` for `"scan.pdf"`.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("kind", &self.kind)
            .field("language", &self.language)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_parses_from_its_code() {
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>().unwrap(), lang);
        }
        assert_eq!(" CHI_SIM ".parse::<Language>().unwrap(), Language::ChiSim);
    }

    #[test]
    fn unknown_language_is_rejected() {
        let err = "klingon".parse::<Language>().unwrap_err();
        assert!(matches!(err, RefineryError::UnsupportedLanguage { ref code } if code == "klingon"));
    }

    #[test]
    fn language_serialises_as_code() {
        assert_eq!(serde_json::to_string(&Language::ChiSim).unwrap(), "\"chi_sim\"");
        assert_eq!(serde_json::to_string(&Language::Eng).unwrap(), "\"eng\"");
    }

    #[test]
    fn media_kind_from_extension() {
        assert_eq!(
            MediaKind::from_file_name("a.JPG").unwrap(),
            MediaKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            MediaKind::from_file_name("a.jpeg").unwrap(),
            MediaKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            MediaKind::from_file_name("scan.png").unwrap(),
            MediaKind::Image(ImageFormat::Png)
        );
        assert_eq!(MediaKind::from_file_name("x.Pdf").unwrap(), MediaKind::Pdf);
        assert!(MediaKind::from_file_name("notes.txt").is_err());
        assert!(MediaKind::from_file_name("no_extension").is_err());
    }

    #[test]
    fn document_stem_and_debug() {
        let doc = Document::from_bytes("invoice.pdf", b"%PDF-1.4".to_vec(), Language::Deu).unwrap();
        assert_eq!(doc.stem(), "invoice");
        assert!(doc.kind().is_pdf());
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("<8 bytes>"), "got: {dbg}");
    }
}
