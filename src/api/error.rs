//! API error types with structured JSON responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::intake::IntakeError;
use crate::pipeline::processor::ProcessingError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),
    /// Optional document-wide error text from the extractor.
    #[error("Could not extract text from the uploaded file")]
    NoTextExtracted(Option<String>),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::UnsupportedMediaType(ext) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_TYPE",
                format!("File type not allowed: {ext}"),
            ),
            ApiError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "TOO_LARGE",
                detail.clone(),
            ),
            ApiError::NoTextExtracted(document_error) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_TEXT",
                match document_error {
                    Some(text) => format!("Could not extract text from the uploaded file: {text}"),
                    None => "Could not extract text from the uploaded file".to_string(),
                },
            ),
            ApiError::Forbidden(detail) => {
                tracing::warn!(detail, "Forbidden request");
                (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Access denied".to_string(),
                )
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let message = err.to_string();
        match err {
            IntakeError::Empty => ApiError::BadRequest(message),
            IntakeError::TooLarge { .. } => ApiError::PayloadTooLarge(message),
            IntakeError::Unsupported(ext) => ApiError::UnsupportedMediaType(ext),
            IntakeError::Io(e) => ApiError::Internal(format!("staging upload: {e}")),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::NoTextExtracted { document_error, .. } => {
                ApiError::NoTextExtracted(document_error)
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn bad_request_returns_400_with_detail() {
        let response = ApiError::BadRequest("No file part in the request".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["message"], "No file part in the request");
    }

    #[tokio::test]
    async fn intake_errors_map_to_statuses() {
        let unsupported: ApiError = IntakeError::Unsupported("exe".into()).into();
        assert_eq!(
            unsupported.into_response().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );

        let too_large: ApiError = IntakeError::TooLarge {
            size_mb: 12.0,
            max_mb: 10,
        }
        .into();
        assert_eq!(too_large.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);

        let empty: ApiError = IntakeError::Empty.into();
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn no_text_returns_422() {
        let err: ApiError = ProcessingError::NoTextExtracted {
            document_error: None,
            reason: None,
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "NO_TEXT");
        assert_eq!(
            json["error"]["message"],
            "Could not extract text from the uploaded file"
        );
    }

    #[tokio::test]
    async fn failed_extraction_text_is_returned_with_422() {
        let err: ApiError = ProcessingError::NoTextExtracted {
            document_error: Some("Error extracting text from PDF.".into()),
            reason: Some("invalid file header".into()),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let message = json_of(response).await["error"]["message"].clone();
        assert_eq!(
            message,
            "Could not extract text from the uploaded file: Error extracting text from PDF."
        );
        assert!(!message.as_str().unwrap().contains("invalid file header"));
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn forbidden_hides_details() {
        let response = ApiError::Forbidden("/etc/passwd".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "Access denied");
    }
}
