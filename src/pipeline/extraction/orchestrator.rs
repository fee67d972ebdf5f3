use std::path::Path;
use std::time::Duration;

use super::preprocess::{binarize, decode_image, encode_png, load_original, preprocess_image};
use super::types::{
    page_error_marker, DocumentKind, ExtractionResult, ExtractionStatus, PageExtraction,
    PageSource, PageText, PdfExtractor, PdfPageRenderer, IMAGE_ALL_TIERS_FAILED_TEXT,
    IMAGE_ENGINE_FAILED_TEXT, PAGE_OCR_FAILED_TEXT, PDF_OPEN_FAILED_TEXT,
};
use super::{ExtractionError, OcrService};
use crate::config::{IMAGE_OCR_TIMEOUT, PDF_PAGE_OCR_TIMEOUT, PDF_RENDER_DPI};

/// One strategy of the standalone-image fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTier {
    /// Decode, binarize, OCR with the image timeout.
    Preprocessed,
    /// Generic loader, OCR without a deadline. Only after a decode failure.
    Basic,
    /// Generic loader, OCR with the image timeout.
    RawRetry,
}

impl ImageTier {
    /// Tiers in the order they are attempted.
    pub const LADDER: [ImageTier; 3] = [Self::Preprocessed, Self::Basic, Self::RawRetry];

    /// Whether this tier runs given the error that ended the previous attempt.
    fn engages_after(&self, previous: Option<&ExtractionError>) -> bool {
        match (self, previous) {
            (Self::Preprocessed, _) => true,
            (_, None) => false,
            (Self::Basic, Some(err)) => err.is_decode_failure(),
            (Self::RawRetry, Some(err)) => !err.is_engine_failure(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preprocessed => "preprocessed",
            Self::Basic => "basic",
            Self::RawRetry => "raw_retry",
        }
    }
}

/// Text extraction for PDFs and images.
/// Uses trait objects for the PDF collaborators, enabling dependency injection.
pub struct DocumentExtractor {
    ocr: OcrService,
    pdf_extractor: Box<dyn PdfExtractor>,
    pdf_renderer: Option<Box<dyn PdfPageRenderer>>,
    image_timeout: Duration,
    pdf_page_timeout: Duration,
    render_dpi: u32,
}

impl DocumentExtractor {
    pub fn new(ocr: OcrService, pdf_extractor: Box<dyn PdfExtractor>) -> Self {
        Self {
            ocr,
            pdf_extractor,
            pdf_renderer: None,
            image_timeout: IMAGE_OCR_TIMEOUT,
            pdf_page_timeout: PDF_PAGE_OCR_TIMEOUT,
            render_dpi: PDF_RENDER_DPI,
        }
    }

    /// Add a PDF page renderer for per-page OCR of scanned pages.
    pub fn with_pdf_renderer(mut self, renderer: Box<dyn PdfPageRenderer>) -> Self {
        self.pdf_renderer = Some(renderer);
        self
    }

    pub fn with_timeouts(mut self, image: Duration, pdf_page: Duration) -> Self {
        self.image_timeout = image;
        self.pdf_page_timeout = pdf_page;
        self
    }

    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    pub fn has_pdf_renderer(&self) -> bool {
        self.pdf_renderer.is_some()
    }

    /// Extract text from a file on disk. Never fails: problems are reported
    /// through `ExtractionResult::status` and the fixed error texts.
    pub fn extract(&self, path: &Path, kind: DocumentKind) -> ExtractionResult {
        tracing::info!(
            path = %path.display(),
            kind = kind.as_str(),
            "Starting text extraction"
        );

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Cannot read upload");
                let text = match kind {
                    DocumentKind::Pdf => PDF_OPEN_FAILED_TEXT,
                    DocumentKind::Image => IMAGE_ALL_TIERS_FAILED_TEXT,
                };
                return failed(kind, text, e.to_string());
            }
        };

        let result = match kind {
            DocumentKind::Pdf => self.extract_pdf(&bytes),
            DocumentKind::Image => self.extract_image(&bytes),
        };

        tracing::info!(
            path = %path.display(),
            pages = result.page_count(),
            chars = result.full_text.len(),
            status = ?result.status,
            "Text extraction finished"
        );
        result
    }

    /// Per-page extraction with page-level error isolation.
    pub fn extract_pdf(&self, pdf_bytes: &[u8]) -> ExtractionResult {
        let layers = match self.pdf_extractor.extract_pages(pdf_bytes) {
            Ok(layers) => layers,
            Err(e) => {
                tracing::error!(error = %e, "Critical error opening PDF");
                return failed(DocumentKind::Pdf, PDF_OPEN_FAILED_TEXT, e.to_string());
            }
        };

        let mut pages = Vec::with_capacity(layers.len());
        let mut failed_pages = Vec::new();
        let mut full_text = String::new();

        for (index, layer) in layers.into_iter().enumerate() {
            let page_number = index + 1;
            let page = match self.resolve_pdf_page(pdf_bytes, index, layer) {
                Ok((text, source)) => PageExtraction {
                    page_number,
                    text,
                    source,
                },
                Err(e) => {
                    tracing::error!(page = page_number, error = %e, "Error processing PDF page");
                    failed_pages.push(page_number);
                    PageExtraction {
                        page_number,
                        text: page_error_marker(page_number),
                        source: PageSource::Failed,
                    }
                }
            };
            full_text.push_str(&page.text);
            full_text.push('\n');
            pages.push(page);
        }

        let status = if failed_pages.is_empty() {
            ExtractionStatus::Complete
        } else {
            ExtractionStatus::Partial { failed_pages }
        };

        ExtractionResult {
            kind: DocumentKind::Pdf,
            pages,
            full_text: full_text.trim().to_string(),
            status,
        }
    }

    /// Embedded text when present, otherwise render + binarize + OCR.
    fn resolve_pdf_page(
        &self,
        pdf_bytes: &[u8],
        index: usize,
        layer: PageText,
    ) -> Result<(String, PageSource), ExtractionError> {
        let page_number = index + 1;
        let text = layer?;
        if !text.trim().is_empty() {
            return Ok((text, PageSource::EmbeddedText));
        }

        tracing::info!(page = page_number, "No embedded text, attempting OCR");
        let renderer =
            self.pdf_renderer
                .as_deref()
                .ok_or_else(|| ExtractionError::PdfRendering {
                    page: page_number,
                    reason: "no PDF renderer available".into(),
                })?;
        let rendered = renderer.render_page(pdf_bytes, index, self.render_dpi)?;

        let image = match decode_image(&rendered) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "Rendered page could not be decoded for OCR");
                return Ok((PAGE_OCR_FAILED_TEXT.to_string(), PageSource::OcrUnavailable));
            }
        };

        let binary = encode_png(&binarize(&image)?)?;
        let text = self.ocr.recognize(&binary, Some(self.pdf_page_timeout))?;
        tracing::info!(page = page_number, chars = text.len(), "OCR for PDF page complete");
        Ok((text, PageSource::Ocr))
    }

    /// Standalone image OCR through the fallback ladder.
    pub fn extract_image(&self, image_bytes: &[u8]) -> ExtractionResult {
        let mut last_error: Option<ExtractionError> = None;

        for tier in ImageTier::LADDER {
            if !tier.engages_after(last_error.as_ref()) {
                continue;
            }
            if let Some(previous) = last_error.as_ref() {
                tracing::warn!(tier = tier.as_str(), error = %previous, "Falling back to next OCR strategy");
            }

            match self.run_image_tier(tier, image_bytes) {
                Ok(text) => {
                    tracing::info!(tier = tier.as_str(), chars = text.len(), "Image OCR complete");
                    return ExtractionResult {
                        kind: DocumentKind::Image,
                        pages: vec![PageExtraction {
                            page_number: 1,
                            text: text.clone(),
                            source: PageSource::Ocr,
                        }],
                        full_text: text.trim().to_string(),
                        status: ExtractionStatus::Complete,
                    };
                }
                Err(e) if e.is_engine_failure() && tier != ImageTier::RawRetry => {
                    tracing::error!(tier = tier.as_str(), error = %e, "Tesseract error during image OCR");
                    return failed(DocumentKind::Image, IMAGE_ENGINE_FAILED_TEXT, e.to_string());
                }
                Err(e) => last_error = Some(e),
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no OCR strategy ran".into());
        tracing::error!(reason = %reason, "Image OCR failed after multiple attempts");
        failed(DocumentKind::Image, IMAGE_ALL_TIERS_FAILED_TEXT, reason)
    }

    fn run_image_tier(&self, tier: ImageTier, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        match tier {
            ImageTier::Preprocessed => {
                let processed = preprocess_image(image_bytes)?;
                self.ocr.recognize(&processed, Some(self.image_timeout))
            }
            ImageTier::Basic => self.ocr.recognize(&load_original(image_bytes)?, None),
            ImageTier::RawRetry => {
                self.ocr.recognize(&load_original(image_bytes)?, Some(self.image_timeout))
            }
        }
    }
}

fn failed(kind: DocumentKind, text: &str, reason: String) -> ExtractionResult {
    ExtractionResult {
        kind,
        pages: vec![],
        full_text: text.to_string(),
        status: ExtractionStatus::Failed { reason },
    }
}
