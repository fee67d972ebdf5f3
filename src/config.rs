use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "DocVision";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind address for the HTTP surface.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Upload ceiling in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;

/// Tesseract language code used for every OCR call.
pub const DEFAULT_OCR_LANG: &str = "eng";

/// OCR deadline for standalone images.
pub const IMAGE_OCR_TIMEOUT: Duration = Duration::from_secs(30);

/// OCR deadline for a rasterized PDF page.
pub const PDF_PAGE_OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Rasterization DPI for PDF pages without a text layer.
pub const PDF_RENDER_DPI: u32 = 300;

/// Token budget per summarization chunk. Chunks are `tokens * 4` characters.
pub const MAX_CHUNK_SIZE_TOKENS: usize = 1024;

/// Summary length bounds passed to the summarization backend.
pub const SUMMARY_MAX_LENGTH: u32 = 150;
pub const SUMMARY_MIN_LENGTH: u32 = 30;

/// Default summarization endpoint (Hugging Face style inference server).
pub const DEFAULT_SUMMARY_URL: &str =
    "http://localhost:8080/models/sshleifer/distilbart-cnn-12-6";

/// Default HTTP timeout for one summarization call.
pub const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 120;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "docvision=info,tower_http=info"
}

/// Get the application data directory
/// ~/DocVision/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(APP_NAME),
        None => PathBuf::from(APP_NAME),
    }
}

/// OCR settings.
#[derive(Debug, Clone, Serialize)]
pub struct OcrConfig {
    pub language: String,
    /// Path to the `tesseract` executable (CLI engine).
    pub tesseract_bin: PathBuf,
    /// Tessdata directory (bundled engine, `ocr` feature).
    pub tessdata_dir: Option<PathBuf>,
    pub image_timeout: Duration,
    pub pdf_page_timeout: Duration,
    pub render_dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_OCR_LANG.to_string(),
            tesseract_bin: PathBuf::from("tesseract"),
            tessdata_dir: None,
            image_timeout: IMAGE_OCR_TIMEOUT,
            pdf_page_timeout: PDF_PAGE_OCR_TIMEOUT,
            render_dpi: PDF_RENDER_DPI,
        }
    }
}

/// Summarization backend settings.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryConfig {
    pub endpoint: String,
    /// Bearer token for hosted inference endpoints. Never serialized.
    #[serde(skip)]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub max_chunk_tokens: usize,
    pub max_length: u32,
    pub min_length: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SUMMARY_URL.to_string(),
            api_token: None,
            timeout_secs: DEFAULT_SUMMARY_TIMEOUT_SECS,
            max_chunk_tokens: MAX_CHUNK_SIZE_TOKENS,
            max_length: SUMMARY_MAX_LENGTH,
            min_length: SUMMARY_MIN_LENGTH,
        }
    }
}

/// Sentiment settings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SentimentConfig {
    /// Optional replacement lexicon for the valence scorer
    /// (`token<TAB>mean valence` per line). The bundled lexicon is used when unset.
    pub valence_lexicon: Option<PathBuf>,
}

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub ocr: OcrConfig,
    pub summary: SummaryConfig,
    pub sentiment: SentimentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_dir: app_data_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            ocr: OcrConfig::default(),
            summary: SummaryConfig::default(),
            sentiment: SentimentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `DOCVISION_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment in production, a map in tests).
    /// Unparseable values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("DOCVISION_BIND") {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => config.bind_addr = addr,
                Err(e) => tracing::warn!(value = %raw, "Ignoring invalid DOCVISION_BIND: {e}"),
            }
        }
        if let Some(dir) = lookup("DOCVISION_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("DOCVISION_MAX_UPLOAD_MB") {
            match raw.parse::<u64>() {
                Ok(mb) if mb > 0 => config.max_upload_bytes = mb * 1024 * 1024,
                _ => tracing::warn!(value = %raw, "Ignoring invalid DOCVISION_MAX_UPLOAD_MB"),
            }
        }
        if let Some(lang) = lookup("DOCVISION_OCR_LANG") {
            if !lang.trim().is_empty() {
                config.ocr.language = lang.trim().to_string();
            }
        }
        if let Some(bin) = lookup("DOCVISION_TESSERACT_BIN") {
            config.ocr.tesseract_bin = PathBuf::from(bin);
        }
        if let Some(dir) = lookup("DOCVISION_TESSDATA_DIR") {
            config.ocr.tessdata_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup("DOCVISION_SUMMARY_URL") {
            config.summary.endpoint = url;
        }
        if let Some(token) = lookup("DOCVISION_SUMMARY_TOKEN") {
            config.summary.api_token = Some(token);
        }
        if let Some(raw) = lookup("DOCVISION_SUMMARY_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.summary.timeout_secs = secs,
                _ => tracing::warn!(
                    value = %raw,
                    "Ignoring invalid DOCVISION_SUMMARY_TIMEOUT_SECS"
                ),
            }
        }
        if let Some(path) = lookup("DOCVISION_VALENCE_LEXICON") {
            config.sentiment.valence_lexicon = Some(PathBuf::from(path));
        }

        config
    }

    /// Directory holding staged uploads (ephemeral, one file per request).
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Directory holding exported reports, served by `/download`.
    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("DocVision"));
    }

    #[test]
    fn defaults_match_constants() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.image_timeout, Duration::from_secs(30));
        assert_eq!(config.ocr.pdf_page_timeout, Duration::from_secs(60));
        assert_eq!(config.ocr.render_dpi, 300);
        assert_eq!(config.summary.max_chunk_tokens, 1024);
        assert_eq!(config.summary.max_length, 150);
        assert_eq!(config.summary.min_length, 30);
    }

    #[test]
    fn env_overrides_apply() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DOCVISION_BIND", "0.0.0.0:8088"),
            ("DOCVISION_DATA_DIR", "/tmp/dv"),
            ("DOCVISION_MAX_UPLOAD_MB", "25"),
            ("DOCVISION_OCR_LANG", "eng+fra"),
            ("DOCVISION_SUMMARY_URL", "http://summarizer:9000/"),
            ("DOCVISION_SUMMARY_TOKEN", "secret"),
        ]));
        assert_eq!(config.bind_addr.port(), 8088);
        assert_eq!(config.uploads_dir(), PathBuf::from("/tmp/dv/uploads"));
        assert_eq!(config.results_dir(), PathBuf::from("/tmp/dv/results"));
        assert_eq!(config.max_upload_mb(), 25);
        assert_eq!(config.ocr.language, "eng+fra");
        assert_eq!(config.summary.endpoint, "http://summarizer:9000/");
        assert_eq!(config.summary.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DOCVISION_BIND", "not an address"),
            ("DOCVISION_MAX_UPLOAD_MB", "0"),
            ("DOCVISION_SUMMARY_TIMEOUT_SECS", "soon"),
            ("DOCVISION_OCR_LANG", "   "),
        ]));
        let defaults = AppConfig::default();
        assert_eq!(config.bind_addr, defaults.bind_addr);
        assert_eq!(config.max_upload_bytes, defaults.max_upload_bytes);
        assert_eq!(config.summary.timeout_secs, DEFAULT_SUMMARY_TIMEOUT_SECS);
        assert_eq!(config.ocr.language, "eng");
    }

    #[test]
    fn api_token_is_not_serialized() {
        let mut config = AppConfig::default();
        config.summary.api_token = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn app_name_is_docvision() {
        assert_eq!(APP_NAME, "DocVision");
    }
}
