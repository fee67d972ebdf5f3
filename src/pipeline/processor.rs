//! Document processing orchestrator.
//!
//! Single entry point that drives one analysis request:
//! extract → summarize → score sentiment → (optional) export.
//!
//! Engines are injected at construction so the processor stays fully
//! testable with mock OCR, PDF and summarization backends.

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::export::{export_report, ExportRequest};
use crate::pipeline::engines::Engines;
use crate::pipeline::extraction::{DocumentExtractor, DocumentKind, ExtractionStatus};
use crate::pipeline::intake::StagedUpload;
use crate::pipeline::sentiment::{SentimentAnalyzer, SentimentLabel};
use crate::pipeline::summary::Summarizer;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that stop a request before analysis.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// `document_error` carries the document-wide error text of a failed
    /// extraction; `reason` is the underlying cause, for logs only.
    #[error("Could not extract text from the uploaded file")]
    NoTextExtracted {
        document_error: Option<String>,
        reason: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Saved,
    Failed,
}

/// Outcome of the optional export step.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub format: ExportRequest,
    pub status: ExportStatus,
    /// Artifact name relative to the results directory, when saved.
    pub file: Option<String>,
}

/// Everything produced for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub original_filename: String,
    pub kind: DocumentKind,
    pub page_count: usize,
    pub extraction_status: ExtractionStatus,
    pub extracted_text: String,
    pub summary: String,
    pub sentiment: SentimentLabel,
    pub export: Option<ExportOutcome>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    extractor: DocumentExtractor,
    summarizer: Summarizer,
    sentiment: SentimentAnalyzer,
    results_dir: PathBuf,
}

impl DocumentProcessor {
    pub fn new(
        extractor: DocumentExtractor,
        summarizer: Summarizer,
        sentiment: SentimentAnalyzer,
        results_dir: PathBuf,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            sentiment,
            results_dir,
        }
    }

    pub fn from_engines(engines: Engines, results_dir: PathBuf) -> Self {
        Self::new(
            engines.extractor,
            engines.summarizer,
            engines.sentiment,
            results_dir,
        )
    }

    pub fn summarizer_available(&self) -> bool {
        self.summarizer.is_available()
    }

    pub fn results_dir(&self) -> &std::path::Path {
        &self.results_dir
    }

    /// Full pipeline for a staged upload. Blocking: call from a worker thread.
    ///
    /// The staged file is removed afterwards whatever the outcome.
    pub fn process(
        &self,
        upload: &StagedUpload,
        export: ExportRequest,
    ) -> Result<AnalysisResult, ProcessingError> {
        let result = self.run(upload, export);
        upload.remove();
        result
    }

    fn run(
        &self,
        upload: &StagedUpload,
        export: ExportRequest,
    ) -> Result<AnalysisResult, ProcessingError> {
        let request_id = upload.request_id;

        // Step 1: Extraction
        let extraction = self.extractor.extract(&upload.path, upload.kind);
        if extraction.is_blank() {
            let (document_error, reason) = match &extraction.status {
                ExtractionStatus::Failed { reason } => {
                    (Some(extraction.full_text.clone()), Some(reason.clone()))
                }
                _ => (None, None),
            };
            tracing::warn!(
                request_id = %request_id,
                reason = reason.as_deref().unwrap_or("empty text"),
                "No text extracted"
            );
            return Err(ProcessingError::NoTextExtracted {
                document_error,
                reason,
            });
        }

        // Step 2: Summary
        tracing::info!(request_id = %request_id, "Generating summary");
        let summary = self.summarizer.summarize(&extraction.full_text);

        // Step 3: Sentiment
        tracing::info!(request_id = %request_id, "Analyzing sentiment");
        let sentiment = self.sentiment.analyze(&extraction.full_text);

        // Step 4: Export
        let export = export.extension().map(|ext| {
            let file = format!("{request_id}_{}.{ext}", upload.stem());
            self.export(export, file, &extraction.full_text, &summary, sentiment)
        });

        tracing::info!(
            request_id = %request_id,
            pages = extraction.page_count(),
            sentiment = sentiment.as_str(),
            exported = export.as_ref().map(|e| e.status == ExportStatus::Saved),
            "Document processed"
        );

        Ok(AnalysisResult {
            request_id,
            original_filename: upload.filename.clone(),
            kind: extraction.kind,
            page_count: extraction.page_count(),
            extraction_status: extraction.status,
            extracted_text: extraction.full_text,
            summary,
            sentiment,
            export,
        })
    }

    fn export(
        &self,
        format: ExportRequest,
        file: String,
        text: &str,
        summary: &str,
        sentiment: SentimentLabel,
    ) -> ExportOutcome {
        if let Err(e) = std::fs::create_dir_all(&self.results_dir) {
            tracing::error!(dir = %self.results_dir.display(), error = %e, "Cannot create results directory");
            return ExportOutcome {
                format,
                status: ExportStatus::Failed,
                file: None,
            };
        }

        let path = self.results_dir.join(&file);
        if export_report(format, &path, text, summary, sentiment.as_str()) {
            ExportOutcome {
                format,
                status: ExportStatus::Saved,
                file: Some(file),
            }
        } else {
            ExportOutcome {
                format,
                status: ExportStatus::Failed,
                file: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SummaryConfig;
    use crate::pipeline::extraction::pdf::{build_test_pdf, LopdfTextExtractor, MockPdfExtractor};
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::extraction::{MockOcrEngine, OcrService, PdfExtractor};
    use crate::pipeline::intake::stage_upload;
    use crate::pipeline::sentiment::{PatternScorer, ValenceScorer};
    use crate::pipeline::summary::{MockSummaryBackend, NO_CONTENT_TEXT, SUMMARY_UNAVAILABLE_TEXT};

    fn analyzer() -> SentimentAnalyzer {
        SentimentAnalyzer::new(
            Arc::new(PatternScorer::bundled().unwrap()),
            Some(Arc::new(ValenceScorer::bundled().unwrap())),
        )
    }

    fn processor(
        ocr_text: &str,
        pdf: Box<dyn PdfExtractor>,
        summarizer: Summarizer,
        results_dir: PathBuf,
    ) -> DocumentProcessor {
        let ocr = OcrService::new(Arc::new(MockOcrEngine::new(ocr_text, 0.9)), "eng");
        let extractor = DocumentExtractor::new(ocr, pdf)
            .with_pdf_renderer(Box::new(MockPdfPageRenderer::new(16)));
        DocumentProcessor::new(extractor, summarizer, analyzer(), results_dir)
    }

    fn mock_summarizer() -> Summarizer {
        Summarizer::new(Arc::new(MockSummaryBackend::new()), &SummaryConfig::default())
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([255, 255, 255]));
        let mut cursor = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, image::ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn image_upload_runs_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(
            "This book is excellent and wonderful.",
            Box::new(MockPdfExtractor::new(&[])),
            mock_summarizer(),
            dir.path().join("results"),
        );
        let upload = stage_upload(&dir.path().join("uploads"), "page.png", &png_bytes(), 1 << 20).unwrap();

        let result = proc.process(&upload, ExportRequest::None).unwrap();

        assert_eq!(result.kind, DocumentKind::Image);
        assert_eq!(result.extracted_text, "This book is excellent and wonderful.");
        assert!(result.summary.starts_with("summary of"));
        assert_eq!(result.sentiment, SentimentLabel::Positive);
        assert!(result.export.is_none());
        assert!(!upload.path.exists(), "staged upload must be removed");
    }

    #[test]
    fn pdf_with_corrupt_page_still_analyzed() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = MockPdfExtractor::new(&["Page one text.", "", "Page three text."])
            .with_failing_page(2, "corrupt content stream");
        let proc = processor("", Box::new(pdf), mock_summarizer(), dir.path().join("results"));
        let upload = stage_upload(dir.path(), "book.pdf", b"%PDF-1.4", 1 << 20).unwrap();

        let result = proc.process(&upload, ExportRequest::None).unwrap();

        assert!(result.extracted_text.contains("Page one text."));
        assert!(result.extracted_text.contains("[Error processing page 2]"));
        assert!(result.extracted_text.contains("Page three text."));
        assert_eq!(
            result.extraction_status,
            ExtractionStatus::Partial { failed_pages: vec![2] }
        );
    }

    #[test]
    fn blank_extraction_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(
            "   \n",
            Box::new(MockPdfExtractor::new(&[])),
            mock_summarizer(),
            dir.path().join("results"),
        );
        let upload = stage_upload(dir.path(), "blank.png", &png_bytes(), 1 << 20).unwrap();

        let err = proc.process(&upload, ExportRequest::Docx).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::NoTextExtracted {
                document_error: None,
                reason: None
            }
        ));
        assert!(!upload.path.exists());
        assert!(!dir.path().join("results").exists());
    }

    #[test]
    fn unreadable_pdf_is_rejected_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(
            "",
            Box::new(MockPdfExtractor::unreadable("not a PDF")),
            mock_summarizer(),
            dir.path().join("results"),
        );
        let upload = stage_upload(dir.path(), "broken.pdf", b"garbage", 1 << 20).unwrap();

        let err = proc.process(&upload, ExportRequest::None).unwrap_err();
        match err {
            ProcessingError::NoTextExtracted {
                document_error,
                reason,
            } => {
                assert_eq!(
                    document_error.as_deref(),
                    Some("Error extracting text from PDF.")
                );
                assert!(reason.is_some());
            }
        }
    }

    #[test]
    fn docx_export_lands_in_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let pdf = build_test_pdf(&[Some("A terrible and awful story")]);
        let proc = processor("", Box::new(LopdfTextExtractor), mock_summarizer(), results.clone());
        let upload = stage_upload(dir.path(), "My Book.pdf", &pdf, 1 << 20).unwrap();

        let result = proc.process(&upload, ExportRequest::Docx).unwrap();

        assert_eq!(result.sentiment, SentimentLabel::Negative);
        let export = result.export.unwrap();
        assert_eq!(export.status, ExportStatus::Saved);
        let file = export.file.unwrap();
        assert_eq!(file, format!("{}_My_Book.docx", result.request_id));
        assert!(results.join(&file).exists());
    }

    #[test]
    fn pdf_export_is_named_after_request() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let proc = processor(
            "Plain words on a page.",
            Box::new(MockPdfExtractor::new(&[])),
            mock_summarizer(),
            results.clone(),
        );
        let upload = stage_upload(dir.path(), "scan.jpg", &png_bytes(), 1 << 20).unwrap();

        let result = proc.process(&upload, ExportRequest::Pdf).unwrap();
        let file = result.export.unwrap().file.unwrap();
        assert!(file.ends_with("_scan.pdf"));
        assert!(std::fs::read(results.join(file)).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn export_failure_does_not_fail_request() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the results directory should be.
        let blocker = dir.path().join("results");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let proc = processor(
            "Some words.",
            Box::new(MockPdfExtractor::new(&[])),
            mock_summarizer(),
            blocker,
        );
        let upload = stage_upload(&dir.path().join("uploads"), "a.png", &png_bytes(), 1 << 20).unwrap();

        let result = proc.process(&upload, ExportRequest::Pdf).unwrap();
        let export = result.export.unwrap();
        assert_eq!(export.status, ExportStatus::Failed);
        assert_eq!(export.format, ExportRequest::Pdf);
        assert!(export.file.is_none());
    }

    #[test]
    fn unavailable_summarizer_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let summarizer = Summarizer::unavailable("no endpoint", &SummaryConfig::default());
        let proc = processor(
            "Neutral words.",
            Box::new(MockPdfExtractor::new(&[])),
            summarizer,
            dir.path().join("results"),
        );
        assert!(!proc.summarizer_available());
        let upload = stage_upload(dir.path(), "a.png", &png_bytes(), 1 << 20).unwrap();

        let result = proc.process(&upload, ExportRequest::None).unwrap();
        assert_eq!(result.summary, SUMMARY_UNAVAILABLE_TEXT);
        assert_ne!(result.summary, NO_CONTENT_TEXT);
    }

    #[test]
    fn result_serializes_for_api() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(
            "Good news.",
            Box::new(MockPdfExtractor::new(&[])),
            mock_summarizer(),
            dir.path().join("results"),
        );
        let upload = stage_upload(dir.path(), "a.png", &png_bytes(), 1 << 20).unwrap();
        let result = proc.process(&upload, ExportRequest::None).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["sentiment"], "Positive");
        assert_eq!(json["extraction_status"]["state"], "complete");
        assert!(json["export"].is_null());
    }
}
