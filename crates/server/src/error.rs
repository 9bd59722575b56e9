// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use docgate_core::StoreError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Store(store_err) => match store_err {
                StoreError::Conflict { job_id } => {
                    tracing::warn!(job_id = %job_id, "Admission conflict: job already processing");
                    (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_details(
                            "Job already processing",
                            format!("Job ID: {}", job_id),
                        ),
                    )
                }
                StoreError::Collision { job_id, dest } => {
                    tracing::warn!(job_id = %job_id, dest = %dest.display(), "Directory collision");
                    (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_details(
                            "Directory name collision",
                            format!("Destination: {}", dest.display()),
                        ),
                    )
                }
                StoreError::NotFound { job_id } => {
                    tracing::warn!(job_id = %job_id, "Job not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Job not found", format!("Job ID: {}", job_id)),
                    )
                }
                StoreError::PermissionDenied { path } => {
                    tracing::error!(path = %path.display(), "Permission denied");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("Permission denied"),
                    )
                }
                StoreError::Io { path, source } => {
                    tracing::error!(path = %path.display(), error = %source, "IO error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("IO error"),
                    )
                }
            },
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::NotFound(msg) => {
                tracing::warn!(message = %msg, "Not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Not found", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
