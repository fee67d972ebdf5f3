//! Startup construction of every analysis engine.
//!
//! Engines are built once, before the server accepts requests, and shared
//! read-only afterwards. Optional components that fail to come up are
//! recorded in [`EngineReport`] and the pipeline runs degraded.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::{AppConfig, OcrConfig};
use crate::pipeline::extraction::pdfium::PdfiumRenderer;
use crate::pipeline::extraction::{
    DocumentExtractor, LopdfTextExtractor, OcrEngine, OcrService, TesseractCli,
};
use crate::pipeline::sentiment::{SentimentAnalyzer, SentimentError};
use crate::pipeline::summary::{HttpSummaryBackend, Summarizer};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Sentiment analyzer failed to initialize: {0}")]
    Sentiment(#[from] SentimentError),
}

/// Which engines came up, reported by `/health`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EngineReport {
    pub ocr_engine: &'static str,
    /// `false` when the tesseract probe failed; OCR calls will then report
    /// engine errors per page.
    pub ocr_ready: bool,
    pub pdf_renderer: bool,
    pub summarizer: bool,
    pub sentiment_scorers: usize,
}

pub struct Engines {
    pub extractor: DocumentExtractor,
    pub summarizer: Summarizer,
    pub sentiment: SentimentAnalyzer,
    pub report: EngineReport,
}

impl Engines {
    /// Build all engines from configuration.
    ///
    /// Blocking (probes the tesseract binary, loads PDFium, builds a blocking
    /// HTTP client): run it on a blocking thread when inside a runtime.
    pub fn initialize(config: &AppConfig) -> Result<Self, EngineError> {
        let (engine, ocr_engine, ocr_ready) = build_ocr_engine(&config.ocr);
        let ocr = OcrService::new(engine, &config.ocr.language);

        let mut extractor = DocumentExtractor::new(ocr, Box::new(LopdfTextExtractor))
            .with_timeouts(config.ocr.image_timeout, config.ocr.pdf_page_timeout)
            .with_render_dpi(config.ocr.render_dpi);

        match PdfiumRenderer::new() {
            Ok(renderer) => {
                tracing::info!("PDFium renderer loaded");
                extractor = extractor.with_pdf_renderer(Box::new(renderer));
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "PDFium unavailable; PDF pages without a text layer will be marked as failed"
                );
            }
        }
        let pdf_renderer = extractor.has_pdf_renderer();

        let summarizer = match HttpSummaryBackend::new(&config.summary) {
            Ok(backend) => {
                tracing::info!(endpoint = %backend.endpoint(), "Summarization backend configured");
                Summarizer::new(Arc::new(backend), &config.summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Summarization backend unavailable");
                Summarizer::unavailable(&e.to_string(), &config.summary)
            }
        };

        let sentiment = SentimentAnalyzer::initialize(&config.sentiment)?;

        let report = EngineReport {
            ocr_engine,
            ocr_ready,
            pdf_renderer,
            summarizer: summarizer.is_available(),
            sentiment_scorers: if sentiment.has_secondary() { 2 } else { 1 },
        };
        tracing::info!(?report, "Engines initialized");

        Ok(Self {
            extractor,
            summarizer,
            sentiment,
            report,
        })
    }
}

#[cfg(feature = "ocr")]
fn build_ocr_engine(config: &OcrConfig) -> (Arc<dyn OcrEngine>, &'static str, bool) {
    use crate::pipeline::extraction::BundledTesseract;

    if let Some(dir) = &config.tessdata_dir {
        match BundledTesseract::new(dir, &config.language) {
            Ok(engine) => {
                tracing::info!(tessdata = %dir.display(), "Using bundled Tesseract");
                return (Arc::new(engine), "tesseract-bundled", true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Bundled Tesseract unavailable, falling back to CLI");
            }
        }
    }
    build_cli_engine(config)
}

#[cfg(not(feature = "ocr"))]
fn build_ocr_engine(config: &OcrConfig) -> (Arc<dyn OcrEngine>, &'static str, bool) {
    if config.tessdata_dir.is_some() {
        tracing::warn!("DOCVISION_TESSDATA_DIR is set but the `ocr` feature is disabled; using the tesseract CLI");
    }
    build_cli_engine(config)
}

fn build_cli_engine(config: &OcrConfig) -> (Arc<dyn OcrEngine>, &'static str, bool) {
    let cli = TesseractCli::new(config.tesseract_bin.clone(), &config.language);
    let ready = match cli.probe() {
        Ok(version) => {
            tracing::info!(binary = %cli.binary().display(), version = %version, "Tesseract CLI found");
            true
        }
        Err(e) => {
            tracing::error!(binary = %cli.binary().display(), error = %e, "Tesseract CLI not usable");
            false
        }
    };
    (Arc::new(cli), "tesseract-cli", ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn offline_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.data_dir = dir.to_path_buf();
        config.ocr.tesseract_bin = PathBuf::from("/nonexistent/tesseract");
        config.summary.endpoint = String::new();
        config
    }

    #[test]
    fn degraded_engines_still_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let engines = Engines::initialize(&offline_config(dir.path())).unwrap();

        assert_eq!(engines.report.ocr_engine, "tesseract-cli");
        assert!(!engines.report.ocr_ready);
        assert!(!engines.report.summarizer);
        assert!(!engines.summarizer.is_available());
        assert_eq!(engines.report.sentiment_scorers, 2);
    }

    #[test]
    fn broken_valence_lexicon_degrades_to_one_scorer() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.sentiment.valence_lexicon = Some(dir.path().join("missing.tsv"));

        let engines = Engines::initialize(&config).unwrap();
        assert_eq!(engines.report.sentiment_scorers, 1);
    }

    #[test]
    fn configured_endpoint_enables_summarizer() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.summary.endpoint = "http://127.0.0.1:9/summarize".into();

        let engines = Engines::initialize(&config).unwrap();
        assert!(engines.report.summarizer);
    }
}
