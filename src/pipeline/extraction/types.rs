use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Document-wide error text returned when a PDF cannot be opened at all.
pub const PDF_OPEN_FAILED_TEXT: &str = "Error extracting text from PDF.";

/// Page text used when a rendered page cannot be decoded for OCR.
pub const PAGE_OCR_FAILED_TEXT: &str = "[OCR failed for this page]";

/// Final text of the image path when the OCR engine itself rejects the image.
pub const IMAGE_ENGINE_FAILED_TEXT: &str = "Error during Tesseract OCR processing.";

/// Final text of the image path once every fallback tier has failed.
pub const IMAGE_ALL_TIERS_FAILED_TEXT: &str =
    "Error extracting text from image after multiple attempts.";

/// Inline marker for a page whose extraction failed (1-based page number).
pub fn page_error_marker(page_number: usize) -> String {
    format!("[Error processing page {page_number}]")
}

/// Kind of uploaded document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    /// Embedded text layer.
    EmbeddedText,
    /// Rasterized, binarized and OCR'd.
    Ocr,
    /// Rendered but the raster could not be decoded; OCR skipped.
    OcrUnavailable,
    /// Extraction failed; the page carries the error marker.
    Failed,
}

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
    pub source: PageSource,
}

/// Overall outcome of an extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExtractionStatus {
    Complete,
    /// Some pages failed; their text is the inline error marker.
    Partial { failed_pages: Vec<usize> },
    /// Nothing usable was produced; `full_text` holds the error text.
    Failed { reason: String },
}

/// Result of text extraction from a single document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub kind: DocumentKind,
    pub pages: Vec<PageExtraction>,
    pub full_text: String,
    pub status: ExtractionStatus,
}

impl ExtractionResult {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when the result carries no text worth analyzing.
    pub fn is_blank(&self) -> bool {
        matches!(self.status, ExtractionStatus::Failed { .. }) || self.full_text.trim().is_empty()
    }
}

/// Raw OCR result from the engine
#[derive(Debug)]
pub struct OcrPageResult {
    pub text: String,
    /// Mean word confidence in 0.0-1.0, when the engine reports one.
    pub confidence: Option<f32>,
}

/// OCR engine abstraction (allows mocking for tests)
///
/// Implementations must enforce `timeout` themselves and report expiry as
/// `ExtractionError::OcrTimeout` rather than blocking past it.
pub trait OcrEngine: Send + Sync {
    fn ocr_image(
        &self,
        image_bytes: &[u8],
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError>;

    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError>;
}

/// Text of one page, or why it could not be read.
pub type PageText = Result<String, ExtractionError>;

/// PDF text layer abstraction
pub trait PdfExtractor: Send + Sync {
    /// Text layer of every page in order. The outer error means the document
    /// could not be opened; inner errors are confined to their page.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<PageText>, ExtractionError>;
}

/// Rasterizes a single PDF page (0-based index) to PNG bytes.
pub trait PdfPageRenderer: Send + Sync {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_marker_is_one_based_literal() {
        assert_eq!(page_error_marker(2), "[Error processing page 2]");
    }

    #[test]
    fn failed_status_counts_as_blank() {
        let result = ExtractionResult {
            kind: DocumentKind::Pdf,
            pages: vec![],
            full_text: PDF_OPEN_FAILED_TEXT.into(),
            status: ExtractionStatus::Failed {
                reason: "bad header".into(),
            },
        };
        assert!(result.is_blank());
    }

    #[test]
    fn whitespace_text_counts_as_blank() {
        let result = ExtractionResult {
            kind: DocumentKind::Image,
            pages: vec![],
            full_text: " \n\t ".into(),
            status: ExtractionStatus::Complete,
        };
        assert!(result.is_blank());
        assert_eq!(result.page_count(), 0);
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let json = serde_json::to_value(ExtractionStatus::Partial {
            failed_pages: vec![2],
        })
        .unwrap();
        assert_eq!(json["state"], "partial");
        assert_eq!(json["failed_pages"][0], 2);
    }
}
