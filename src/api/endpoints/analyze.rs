//! Document analysis endpoint.
//!
//! `POST /api/analyze`: multipart upload (`file`, optional `convert`).
//! The file is staged, then the blocking pipeline runs on a worker thread.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{AnalyzeResponse, ApiContext};
use crate::export::ExportRequest;
use crate::pipeline::intake::stage_upload;

pub async fn analyze(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut file: Option<(String, axum::body::Bytes)> = None;
    let mut convert = ExportRequest::None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes));
            }
            "convert" => {
                let value = field.text().await?;
                convert = value
                    .parse()
                    .map_err(|e: crate::export::ExportError| ApiError::BadRequest(e.to_string()))?;
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("No file part in the request".into()))?;
    if filename.trim().is_empty() {
        return Err(ApiError::BadRequest("No file selected".into()));
    }

    tracing::info!(
        filename = %filename,
        size_bytes = bytes.len(),
        convert = convert.as_str(),
        "Analysis requested"
    );

    let result = tokio::task::spawn_blocking(move || {
        let upload = stage_upload(&ctx.uploads_dir, &filename, &bytes, ctx.max_upload_bytes)?;
        ctx.processor
            .process(&upload, convert)
            .map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("analysis task failed: {e}")))??;

    Ok(Json(AnalyzeResponse::from(result)))
}
