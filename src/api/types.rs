//! Shared types for the HTTP layer.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::pipeline::engines::{EngineReport, Engines};
use crate::pipeline::processor::{AnalysisResult, DocumentProcessor};

/// Multipart framing allowance on top of the upload ceiling.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

// ═══════════════════════════════════════════════════════════
// API context: shared state for every handler
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes. Cheap to clone: everything heavy sits
/// behind an `Arc`.
#[derive(Clone)]
pub struct ApiContext {
    pub processor: Arc<DocumentProcessor>,
    pub engines: Arc<EngineReport>,
    pub uploads_dir: PathBuf,
    pub results_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl ApiContext {
    pub fn new(processor: DocumentProcessor, engines: EngineReport, config: &AppConfig) -> Self {
        Self {
            processor: Arc::new(processor),
            engines: Arc::new(engines),
            uploads_dir: config.uploads_dir(),
            results_dir: config.results_dir(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Wire a context from freshly initialized engines.
    pub fn from_engines(engines: Engines, config: &AppConfig) -> Self {
        let report = engines.report.clone();
        let processor = DocumentProcessor::from_engines(engines, config.results_dir());
        Self::new(processor, report, config)
    }

    /// Request body ceiling enforced by the router.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_upload_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engines: EngineReport,
}

/// `POST /api/analyze` response: the analysis plus a download link for the
/// exported report when one was saved.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub download_url: Option<String>,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(result: AnalysisResult) -> Self {
        let download_url = result
            .export
            .as_ref()
            .and_then(|export| export.file.as_ref())
            .map(|file| format!("/download/{file}"));
        Self {
            result,
            download_url,
        }
    }
}
