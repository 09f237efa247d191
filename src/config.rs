//! Configuration types for the OCR refinement pipeline.
//!
//! All pipeline behaviour is controlled through [`RefineryConfig`], built via
//! its [`RefineryConfigBuilder`]. Stage-specific knobs are grouped into
//! [`OcrBackend`], [`CorrectionConfig`] and [`ExportConfig`] so each stage
//! only sees the settings it uses.

use crate::error::RefineryError;
use crate::export::layout::PageGeometry;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use font_cache::FontSource;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default chat-completion endpoint for text cleanup.
pub const DEFAULT_CORRECTION_ENDPOINT: &str = "https://api.together.xyz/v1/chat/completions";

/// Default model for text cleanup.
pub const DEFAULT_CORRECTION_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free";

/// Which OCR deployment turns page images into text.
///
/// Both variants honour the same contract (page image in, plain text out),
/// so switching between them changes where OCR runs, not what it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrBackend {
    /// Local Tesseract binary, invoked once per page.
    Tesseract {
        /// Binary name or path. Default: `"tesseract"` (looked up on PATH).
        binary: String,
    },
    /// Remote OCR service accepting a multipart upload and answering
    /// `{"text": "..."}`.
    Remote {
        endpoint: String,
        timeout_secs: u64,
    },
}

impl Default for OcrBackend {
    fn default() -> Self {
        OcrBackend::Tesseract {
            binary: "tesseract".to_string(),
        }
    }
}

/// Settings for the LLM correction stage.
#[derive(Clone)]
pub struct CorrectionConfig {
    /// Chat-completion URL. Default: Together AI.
    pub endpoint: String,

    /// Model identifier sent in the request body.
    pub model: String,

    /// Bearer token. If None, `TOGETHER_API_KEY` is read at call time.
    pub api_key: Option<String>,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Cleanup should change as little as possible; a low temperature keeps
    /// the model close to the input.
    pub temperature: f32,

    /// Maximum tokens in the cleaned response. Default: 1024.
    pub max_tokens: usize,

    /// Request timeout in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Custom system instruction. If None, uses [`crate::prompts::CLEANUP_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over the HTTP endpoint.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Named edgequake-llm provider (e.g. "openai", "ollama"). Used with
    /// `model` when set and no `provider` is given.
    pub provider_name: Option<String>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CORRECTION_ENDPOINT.to_string(),
            model: DEFAULT_CORRECTION_MODEL.to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 1024,
            timeout_secs: 60,
            system_prompt: None,
            provider: None,
            provider_name: None,
        }
    }
}

impl fmt::Debug for CorrectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("system_prompt", &self.system_prompt.is_some())
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

/// Settings for the PDF re-export stage.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Use this TrueType font instead of the cached download.
    pub font_path: Option<PathBuf>,

    /// Where the Unicode font is downloaded from and cached.
    pub font_source: FontSource,

    /// Allow downloading the font when it is not cached. Default: true.
    ///
    /// With `false` a cache miss goes straight to the built-in Latin-1 font.
    pub download_font: bool,

    /// Page size, margins, line height and font size.
    pub page: PageGeometry,

    /// Document title written into the PDF info dictionary.
    pub title: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_source: FontSource::dejavu_sans(),
            download_font: true,
            page: PageGeometry::default(),
            title: None,
        }
    }
}

/// Configuration for the whole pipeline.
///
/// Built via [`RefineryConfig::builder()`] or using
/// [`RefineryConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr_refinery::RefineryConfig;
///
/// let config = RefineryConfig::builder()
///     .tesseract_path("/usr/local/bin/tesseract")
///     .temperature(0.2)
///     .download_font(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RefineryConfig {
    /// OCR deployment. Default: local Tesseract.
    pub ocr: OcrBackend,

    /// Maximum rasterised page dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps memory for large-format PDF pages while staying well above the
    /// resolution Tesseract needs for body text.
    pub max_rendered_pixels: u32,

    /// LLM correction settings.
    pub correction: CorrectionConfig,

    /// PDF re-export settings.
    pub export: ExportConfig,

    /// Binary used to add a text layer to PDFs. Default: `"ocrmypdf"`.
    pub ocrmypdf_path: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Stage events sink. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self {
            ocr: OcrBackend::default(),
            max_rendered_pixels: 2000,
            correction: CorrectionConfig::default(),
            export: ExportConfig::default(),
            ocrmypdf_path: "ocrmypdf".to_string(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RefineryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefineryConfig")
            .field("ocr", &self.ocr)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("correction", &self.correction)
            .field("export", &self.export)
            .field("ocrmypdf_path", &self.ocrmypdf_path)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgress>"),
            )
            .finish()
    }
}

impl RefineryConfig {
    /// Create a new builder for `RefineryConfig`.
    pub fn builder() -> RefineryConfigBuilder {
        RefineryConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RefineryConfig`].
#[derive(Debug)]
pub struct RefineryConfigBuilder {
    config: RefineryConfig,
}

impl RefineryConfigBuilder {
    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr = backend;
        self
    }

    pub fn tesseract_path(mut self, binary: impl Into<String>) -> Self {
        self.config.ocr = OcrBackend::Tesseract {
            binary: binary.into(),
        };
        self
    }

    pub fn remote_ocr(mut self, endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        self.config.ocr = OcrBackend::Remote {
            endpoint: endpoint.into(),
            timeout_secs,
        };
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px;
        self
    }

    pub fn correction_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.correction.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.correction.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.correction.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.correction.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.correction.max_tokens = n;
        self
    }

    pub fn correction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.correction.timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.correction.system_prompt = Some(prompt.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.correction.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.correction.provider_name = Some(name.into());
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.export.font_path = Some(path.into());
        self
    }

    pub fn font_url(mut self, url: impl Into<String>) -> Self {
        self.config.export.font_source.url = url.into();
        self
    }

    pub fn font_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.export.font_source.cache_dir = Some(dir.into());
        self
    }

    pub fn download_font(mut self, v: bool) -> Self {
        self.config.export.download_font = v;
        self
    }

    pub fn page_geometry(mut self, page: PageGeometry) -> Self {
        self.config.export.page = page;
        self
    }

    pub fn font_size(mut self, pt: f32) -> Self {
        self.config.export.page.font_size = pt;
        self
    }

    pub fn pdf_title(mut self, title: impl Into<String>) -> Self {
        self.config.export.title = Some(title.into());
        self
    }

    pub fn ocrmypdf_path(mut self, binary: impl Into<String>) -> Self {
        self.config.ocrmypdf_path = binary.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RefineryConfig, RefineryError> {
        let c = &self.config;
        let corr = &c.correction;

        if !(0.0..=2.0).contains(&corr.temperature) {
            return Err(RefineryError::InvalidConfig(format!(
                "Temperature must be 0.0–2.0, got {}",
                corr.temperature
            )));
        }
        if corr.max_tokens == 0 {
            return Err(RefineryError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if corr.timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(RefineryError::InvalidConfig(
                "Timeouts must be at least 1 second".into(),
            ));
        }
        if c.max_rendered_pixels < 100 {
            return Err(RefineryError::InvalidConfig(format!(
                "max_rendered_pixels must be ≥ 100, got {}",
                c.max_rendered_pixels
            )));
        }
        if let OcrBackend::Remote { endpoint, timeout_secs } = &c.ocr {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(RefineryError::InvalidConfig(format!(
                    "Remote OCR endpoint must be an HTTP/HTTPS URL, got '{endpoint}'"
                )));
            }
            if *timeout_secs == 0 {
                return Err(RefineryError::InvalidConfig(
                    "Timeouts must be at least 1 second".into(),
                ));
            }
        }
        c.export
            .page
            .validate()
            .map_err(RefineryError::InvalidConfig)?;

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cleanup_contract() {
        let c = RefineryConfig::default();
        assert_eq!(c.correction.temperature, 0.3);
        assert_eq!(c.correction.max_tokens, 1024);
        assert_eq!(c.correction.endpoint, DEFAULT_CORRECTION_ENDPOINT);
        assert_eq!(c.ocr, OcrBackend::default());
        assert!(c.export.download_font);
    }

    #[test]
    fn builder_rejects_bad_temperature() {
        let err = RefineryConfig::builder().temperature(3.5).build().unwrap_err();
        assert!(err.to_string().contains("Temperature"), "got: {err}");
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        assert!(RefineryConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn builder_rejects_non_http_remote_ocr() {
        assert!(RefineryConfig::builder()
            .remote_ocr("ftp://ocr.example.com", 30)
            .build()
            .is_err());
        assert!(RefineryConfig::builder()
            .remote_ocr("https://ocr.example.com/v1/ocr", 30)
            .build()
            .is_ok());
    }

    #[test]
    fn builder_rejects_non_positive_font_size() {
        assert!(RefineryConfig::builder().font_size(0.0).build().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = RefineryConfig::builder()
            .api_key("tgp_secret_value")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("tgp_secret_value"));
        assert!(dbg.contains("<redacted>"));
    }
}
