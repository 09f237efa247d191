//! Preprocessing: turn a staged upload into grayscale page images for OCR.
//!
//! Images are decoded and re-encoded as 8-bit grayscale PNG. PDFs are
//! rasterised page by page through pdfium, longest edge capped at
//! `max_rendered_pixels`, then converted the same way. Output lands in
//! `<work_dir>/pages/page-NNN.png`.
//!
//! pdfium is a blocking C library, so all of this runs inside
//! `spawn_blocking`.

use crate::document::MediaKind;
use crate::error::RefineryError;
use crate::pipeline::input::StagedDocument;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Produce one grayscale PNG per page, in page order.
pub async fn preprocess(
    staged: &StagedDocument,
    max_pixels: u32,
) -> Result<Vec<PathBuf>, RefineryError> {
    let source = staged.path().to_path_buf();
    let out_dir = staged.work_dir().join("pages");
    let kind = staged.kind();

    tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&out_dir)
            .map_err(|e| RefineryError::Internal(format!("Failed to create page dir: {e}")))?;
        match kind {
            MediaKind::Image(_) => prepare_image(&source, &out_dir).map(|page| vec![page]),
            MediaKind::Pdf => rasterise_pdf(&source, &out_dir, max_pixels),
        }
    })
    .await
    .map_err(|e| RefineryError::Internal(format!("Preprocess task panicked: {e}")))?
}

fn page_path(out_dir: &Path, page_num: usize) -> PathBuf {
    out_dir.join(format!("page-{page_num:03}.png"))
}

fn save_grayscale(image: &DynamicImage, out: &Path, page: usize) -> Result<(), RefineryError> {
    image
        .grayscale()
        .save_with_format(out, image::ImageFormat::Png)
        .map_err(|e| RefineryError::RasterisationFailed {
            page,
            detail: format!("could not write {}: {e}", out.display()),
        })
}

fn prepare_image(source: &Path, out_dir: &Path) -> Result<PathBuf, RefineryError> {
    let image = image::open(source).map_err(|e| RefineryError::ImageDecodeFailed {
        path: source.to_path_buf(),
        detail: e.to_string(),
    })?;

    let out = page_path(out_dir, 1);
    save_grayscale(&image, &out, 1)?;
    debug!(
        "Prepared image {}x{} px → {}",
        image.width(),
        image.height(),
        out.display()
    );
    Ok(out)
}

/// Bind pdfium from `PDFIUM_LIB_PATH` if set, otherwise from the system.
pub fn bind_pdfium() -> Result<Pdfium, RefineryError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path)
            .map_err(|e| RefineryError::PdfiumBindingFailed(format!("{path}: {e}")))?,
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| RefineryError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

fn rasterise_pdf(
    source: &Path,
    out_dir: &Path,
    max_pixels: u32,
) -> Result<Vec<PathBuf>, RefineryError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(source, None).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            RefineryError::PasswordRequired {
                path: source.to_path_buf(),
            }
        } else {
            RefineryError::CorruptPdf {
                path: source.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut outputs = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            RefineryError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        let out = page_path(out_dir, page_num);
        save_grayscale(&image, &out, page_num)?;
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        outputs.push(out);
    }

    Ok(outputs)
}
