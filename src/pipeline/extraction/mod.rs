pub mod types;
pub mod preprocess;
pub mod ocr;
pub mod pdf;
pub mod pdfium;
pub mod orchestrator;

pub use types::*;
pub use preprocess::*;
pub use ocr::*;
pub use pdf::*;
pub use orchestrator::*;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("Image preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR timed out after {}s", .0.as_secs())]
    OcrTimeout(Duration),

    #[error("OCR engine error: {0}")]
    OcrEngine(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },
}

impl ExtractionError {
    /// Errors raised by the OCR engine itself (as opposed to timeouts, decoding
    /// or I/O). These stop the image fallback ladder.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::OcrEngine(_) | Self::OcrInit(_))
    }

    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::ImageDecode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_seconds() {
        let err = ExtractionError::OcrTimeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "OCR timed out after 60s");
    }

    #[test]
    fn engine_failures_are_classified() {
        assert!(ExtractionError::OcrEngine("boom".into()).is_engine_failure());
        assert!(ExtractionError::OcrInit("no tessdata".into()).is_engine_failure());
        assert!(!ExtractionError::OcrTimeout(Duration::from_secs(1)).is_engine_failure());
        assert!(!ExtractionError::ImageDecode("bad".into()).is_engine_failure());
    }

    #[test]
    fn decode_failures_are_classified() {
        assert!(ExtractionError::ImageDecode("bad".into()).is_decode_failure());
        assert!(!ExtractionError::Preprocessing("empty".into()).is_decode_failure());
    }
}
