//! Text extraction: the text layer of every page, in page order, via pdfium.
//!
//! pdfium keeps thread-local state and is not safe to drive from async
//! code, so the work runs on a `spawn_blocking` thread.

use crate::error::DigestError;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Extract all visible text from the PDF at `pdf_path`.
///
/// Pages are joined with a newline so the last word of one page never fuses
/// with the first word of the next.
pub async fn extract_text(pdf_path: &Path, password: Option<&str>) -> Result<String, DigestError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_text_blocking(&path, password.as_deref()))
        .await
        .map_err(|e| DigestError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn extract_text_blocking(pdf_path: &Path, password: Option<&str>) -> Result<String, DigestError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| classify_load_error(pdf_path, password, e))?;

    let pages = document.pages();
    info!("Extracting text from {} pages", pages.len());

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page
            .text()
            .map_err(|e| DigestError::TextExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, page_text.len());

        if idx > 0 {
            text.push('\n');
        }
        text.push_str(&page_text);
    }

    info!("Text extraction completed, total length: {}", text.len());
    Ok(text)
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory,
/// then the system library search path.
fn bind_pdfium() -> Result<Pdfium, DigestError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DigestError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn classify_load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> DigestError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            DigestError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            DigestError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        DigestError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    }
}
