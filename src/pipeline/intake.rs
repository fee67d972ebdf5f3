//! Upload intake: filename sanitization, kind detection by extension, size
//! ceiling, and staging to disk under a request-scoped name.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::extraction::DocumentKind;

const MAX_FILENAME_CHARS: usize = 100;
const FALLBACK_FILENAME: &str = "document";

pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif"];

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    TooLarge { size_mb: f64, max_mb: u64 },

    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reduce an uploaded filename to a safe basename.
///
/// Path components are dropped, whitespace becomes `_`, and only ASCII
/// alphanumerics plus `.`, `-`, `_` survive. `..` sequences collapse to a
/// single dot and leading dots are removed. Long names are cut to 100
/// characters, keeping the extension where possible.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);

    let mut clean: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();

    while clean.contains("..") {
        clean = clean.replace("..", ".");
    }
    let clean = clean.trim_start_matches('.').trim_end_matches('.');

    let clean = truncate_keeping_extension(clean, MAX_FILENAME_CHARS);
    if clean.trim_matches('_').is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        clean
    }
}

fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    // Only ASCII survives sanitization, so byte offsets are char offsets.
    match name.rfind('.') {
        Some(dot) if name.len() - dot < max / 2 => {
            let ext = &name[dot..];
            format!("{}{}", &name[..max - ext.len()], ext)
        }
        _ => name[..max].to_string(),
    }
}

/// Lowercased extension without the dot.
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Document kind implied by the filename's extension.
pub fn classify_filename(filename: &str) -> Option<DocumentKind> {
    let ext = extension_of(filename)?;
    if PDF_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(DocumentKind::Image)
    } else {
        None
    }
}

/// An accepted upload written to the staging directory.
#[derive(Debug, Clone, Serialize)]
pub struct StagedUpload {
    pub request_id: Uuid,
    /// Sanitized client filename.
    pub filename: String,
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl StagedUpload {
    /// Filename without its extension, used to name exported reports.
    pub fn stem(&self) -> &str {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(FALLBACK_FILENAME)
    }

    /// Delete the staged file. Failures are logged, never returned.
    pub fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                request_id = %self.request_id,
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged upload"
            );
        }
    }
}

/// Validate an upload and write it to `dir` as `<uuid>_<sanitized name>`.
pub fn stage_upload(
    dir: &Path,
    filename: &str,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<StagedUpload, IntakeError> {
    let filename = sanitize_filename(filename);

    let kind = classify_filename(&filename).ok_or_else(|| {
        IntakeError::Unsupported(extension_of(&filename).unwrap_or_else(|| "none".into()))
    })?;

    if bytes.is_empty() {
        return Err(IntakeError::Empty);
    }
    let size_bytes = bytes.len() as u64;
    if size_bytes > max_bytes {
        return Err(IntakeError::TooLarge {
            size_mb: size_bytes as f64 / (1024.0 * 1024.0),
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    std::fs::create_dir_all(dir)?;
    let request_id = Uuid::new_v4();
    let path = dir.join(format!("{request_id}_{filename}"));
    std::fs::write(&path, bytes)?;

    tracing::info!(
        request_id = %request_id,
        kind = kind.as_str(),
        size_bytes,
        "Staged upload"
    );

    Ok(StagedUpload {
        request_id,
        filename,
        kind,
        path,
        size_bytes,
    })
}
