//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on Tokio worker threads. Extraction moves onto the
//! blocking pool instead.
//!
//! Pages are extracted in order and joined with a blank line; pages without
//! a text layer (scans) contribute nothing.

use crate::error::ConversionError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Extract the text layer of every page of a PDF.
pub async fn extract_pdf_text(
    pdf_path: &Path,
    pdfium_lib_path: Option<&Path>,
) -> Result<String, ConversionError> {
    let path = pdf_path.to_path_buf();
    let lib = pdfium_lib_path.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || extract_blocking(&path, lib.as_deref()))
        .await
        .map_err(|e| ConversionError::Internal(format!("PDF extraction task panicked: {}", e)))?
}

/// Bind to pdfium: an explicit library path wins over the system library.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ConversionError> {
    let bindings = match lib_path {
        Some(dir) if dir.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        }
        Some(file) => Pdfium::bind_to_library(file),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ConversionError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn extract_blocking(pdf_path: &Path, lib_path: Option<&Path>) -> Result<String, ConversionError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            "document is encrypted and requires a password".to_string()
        } else {
            err_str
        };
        ConversionError::UnreadablePdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| ConversionError::UnreadablePdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();

        let text = text.trim();
        debug!("Page {} → {} chars", idx + 1, text.len());
        if !text.is_empty() {
            texts.push(text.to_string());
        }
    }

    Ok(texts.join("\n\n"))
}
