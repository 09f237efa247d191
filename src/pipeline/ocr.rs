//! OCR adapter: page images in, plain text out.
//!
//! Every [`OcrBackend`] honours the same contract. A local Tesseract is
//! invoked as `tesseract <image> stdout -l <code>`; a remote service receives
//! a multipart upload (`file` plus `language`) and answers `{"text": "..."}`.
//! Either way, an engine failure is fatal for the request.

use crate::config::OcrBackend;
use crate::document::Language;
use crate::error::RefineryError;
use crate::pipeline::postprocess::{join_pages, normalise_ocr_text};
use crate::progress::ProgressCallback;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Deserialize)]
struct RemoteOcrResponse {
    text: String,
}

/// Run OCR over every page image and return the normalised, joined text.
///
/// An empty string is a valid result (a blank page is not an error).
pub async fn extract_text(
    backend: &OcrBackend,
    pages: &[PathBuf],
    language: Language,
    progress: Option<&ProgressCallback>,
) -> Result<String, RefineryError> {
    let client = match backend {
        OcrBackend::Remote { timeout_secs, .. } => Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(*timeout_secs))
                .build()
                .map_err(|e| RefineryError::Internal(format!("HTTP client: {e}")))?,
        ),
        OcrBackend::Tesseract { .. } => None,
    };

    let total = pages.len();
    let mut texts = Vec::with_capacity(total);
    for (idx, image) in pages.iter().enumerate() {
        let page_num = idx + 1;
        if let Some(cb) = progress {
            cb.on_page(page_num, total);
        }

        let raw = match (backend, &client) {
            (OcrBackend::Remote { endpoint, .. }, Some(client)) => {
                recognise_remote(client, endpoint, image, language, page_num).await?
            }
            (OcrBackend::Tesseract { binary }, _) => {
                recognise_tesseract(binary, image, language, page_num).await?
            }
            (OcrBackend::Remote { .. }, None) => {
                return Err(RefineryError::Internal("remote OCR client missing".into()))
            }
        };

        let text = normalise_ocr_text(&raw);
        debug!("OCR page {}/{}: {} chars", page_num, total, text.chars().count());
        texts.push(text);
    }

    let joined = join_pages(&texts);
    info!(
        "OCR complete: {} pages, {} chars",
        total,
        joined.chars().count()
    );
    Ok(joined)
}

/// One page through the local Tesseract binary.
pub async fn recognise_tesseract(
    binary: &str,
    image: &Path,
    language: Language,
    page: usize,
) -> Result<String, RefineryError> {
    let output = Command::new(binary)
        .arg(image)
        .arg("stdout")
        .arg("-l")
        .arg(language.code())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RefineryError::OcrEngineUnavailable {
            engine: binary.to_string(),
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            format!("{binary} exited with {}", output.status)
        } else {
            stderr
        };
        return Err(RefineryError::OcrFailed { page, detail });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// One page through a remote OCR endpoint.
pub async fn recognise_remote(
    client: &reqwest::Client,
    endpoint: &str,
    image: &Path,
    language: Language,
    page: usize,
) -> Result<String, RefineryError> {
    let bytes = tokio::fs::read(image)
        .await
        .map_err(|e| RefineryError::Internal(format!("Failed to read page image: {e}")))?;

    let file_name = image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("page.png")
        .to_string();
    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/png")
        .map_err(|e| RefineryError::Internal(e.to_string()))?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("language", language.code());

    let response = client
        .post(endpoint)
        .multipart(form)
        .send()
        .await
        .map_err(|e| RefineryError::OcrEngineUnavailable {
            engine: endpoint.to_string(),
            detail: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RefineryError::OcrFailed {
            page,
            detail: format!("HTTP {status}: {}", body.trim()),
        });
    }

    let parsed: RemoteOcrResponse =
        response
            .json()
            .await
            .map_err(|e| RefineryError::OcrFailed {
                page,
                detail: format!("unexpected response body: {e}"),
            })?;
    Ok(parsed.text)
}
