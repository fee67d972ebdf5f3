//! Exported report retrieval.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// `GET /download/*name`: serve a file from the results directory as an
/// attachment.
///
/// Names with `..` or a leading separator are rejected outright; anything
/// that still resolves outside the results directory (a symlink, say) is
/// forbidden.
pub async fn download(
    State(ctx): State<ApiContext>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
        return Err(ApiError::BadRequest("Invalid file path".into()));
    }

    let file_path = ctx.results_dir.join(&name);
    let canonical = file_path
        .canonicalize()
        .map_err(|_| ApiError::NotFound("File not found".into()))?;
    let results_canonical = ctx
        .results_dir
        .canonicalize()
        .map_err(|_| ApiError::NotFound("File not found".into()))?;
    if !canonical.starts_with(&results_canonical) {
        return Err(ApiError::Forbidden(canonical.display().to_string()));
    }
    if !canonical.is_file() {
        return Err(ApiError::NotFound("File not found".into()));
    }

    let bytes = tokio::fs::read(&canonical)
        .await
        .map_err(|_| ApiError::NotFound("File not found".into()))?;

    let mime = mime_guess::from_path(&canonical)
        .first_or_octet_stream()
        .to_string();
    let filename = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report")
        .replace('"', "");

    tracing::info!(file = %filename, size_bytes = bytes.len(), "Serving export");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .header(header::CACHE_CONTROL, "no-cache")
        .body(axum::body::Body::from(bytes))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Response build failed").into_response()
        }))
}
