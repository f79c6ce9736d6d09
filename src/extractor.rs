//! PDF text extraction with an OCR fallback for image-only documents
//!
//! Direct extraction reads the text layer page by page. When that yields nothing,
//! or fails, the pages are rendered and passed through OCR instead.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use lopdf::Document;

use crate::error::{Error, Result};

/// Recognises the text of every page of a PDF, in page order.
pub trait OcrEngine: Send + Sync {
    fn recognize_pages(&self, pdf_path: &Path) -> Result<Vec<String>>;
}

/// Renders pages with `pdftoppm` (poppler-utils) and reads them with `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    dpi: u32,
    language: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            dpi: 200,
            language: "eng".to_string(),
        }
    }
}

impl TesseractOcr {
    fn render_pages(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_path)
            .arg(out_dir.join("page"))
            .output()
            .map_err(|e| {
                Error::ocr(format!(
                    "could not run pdftoppm ({e}); install poppler-utils"
                ))
            })?;
        if !output.status.success() {
            return Err(Error::ocr(format!(
                "pdftoppm error: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut images: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        // pdftoppm zero-pads page numbers, so lexical order is page order
        images.sort();
        Ok(images)
    }

    fn read_image(&self, image: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| {
                Error::ocr(format!(
                    "could not run tesseract ({e}); install tesseract-ocr"
                ))
            })?;
        if !output.status.success() {
            return Err(Error::ocr(format!(
                "tesseract error on {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_pages(&self, pdf_path: &Path) -> Result<Vec<String>> {
        let scratch = tempfile::Builder::new().prefix("pdf-rag-ocr-").tempdir()?;
        let images = self.render_pages(pdf_path, scratch.path())?;
        if images.is_empty() {
            return Err(Error::ocr("pdftoppm produced no page images"));
        }
        images.iter().map(|image| self.read_image(image)).collect()
    }
}

pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Text of the document at `path`.
    ///
    /// Errors from the text layer are logged and answered with OCR; only an OCR
    /// failure is returned.
    pub fn extract_text(&self, path: &Path) -> Result<String> {
        match extract_text_layer(path) {
            Ok(text) if !text.trim().is_empty() => return Ok(text),
            Ok(_) => tracing::warn!(
                "No text layer in {}, falling back to OCR extraction",
                path.display()
            ),
            Err(e) => tracing::warn!(
                "Text layer extraction failed for {} ({}), falling back to OCR extraction",
                path.display(),
                e
            ),
        }

        let pages = self.ocr.recognize_pages(path)?;
        let text = join_ocr_pages(&pages);
        tracing::debug!(
            "OCR extracted text preview: {}",
            text.chars().take(500).collect::<String>()
        );
        Ok(text)
    }
}

/// Concatenate the non-blank text of every page, in page order.
pub fn extract_text_layer(path: &Path) -> Result<String> {
    let doc = Document::load(path)
        .map_err(|e| Error::extraction(format!("failed to load {}: {}", path.display(), e)))?;

    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        let page_text = doc
            .extract_text(&[*page_number])
            .map_err(|e| Error::extraction(format!("page {page_number}: {e}")))?;
        if !page_text.trim().is_empty() {
            text.push_str(&page_text);
        }
    }
    Ok(text)
}

/// OCR output with a `Page n:` header in front of every page.
pub fn join_ocr_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        text.push_str(&format!("\n\nPage {}:\n", i + 1));
        text.push_str(page);
    }
    text
}
