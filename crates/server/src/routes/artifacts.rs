// crates/server/src/routes/artifacts.rs
//! Artifact and log downloads.
//!
//! Files are streamed from wherever the job's directory currently lives, so
//! a download that races a lifecycle move still serves a consistent file.
//! Without an explicit `?job=`, "latest" resolves through the registry —
//! last completed run first, then the currently processing one — never by
//! scanning directory timestamps.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use docgate_core::is_valid_job_id;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
struct DownloadParams {
    job: Option<String>,
}

/// GET /download/move_log - The latest daily move log.
async fn download_move_log(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let path = state
        .movelog
        .latest_path()
        .ok_or_else(|| ApiError::NotFound("no move log has been written yet".to_string()))?;
    stream_file(&path, "text/plain; charset=utf-8").await
}

/// GET /download/processing_log?job= - A job's processing log.
async fn download_processing_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> ApiResult<Response> {
    let job_id = resolve_job(&state, params.job)?;
    let (_, dir) = state.store.locate(&job_id)?;
    let path = state.store.layout().processing_log(&dir);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!(
            "no processing log for job {}",
            job_id
        )));
    }
    stream_file(&path, "text/plain; charset=utf-8").await
}

/// GET /download/artifact?job= - A job's result artifact.
async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> ApiResult<Response> {
    let job_id = resolve_job(&state, params.job)?;
    let (_, dir) = state.store.locate(&job_id)?;
    let path = state.store.layout().artifact(&dir);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!("no artifact for job {}", job_id)));
    }
    stream_file(&path, XLSX_MIME).await
}

/// An explicit `?job=` wins; otherwise fall back to the last completed run,
/// then the in-flight one.
fn resolve_job(state: &AppState, job: Option<String>) -> Result<String, ApiError> {
    match job {
        Some(id) => {
            if !is_valid_job_id(&id) {
                return Err(ApiError::BadRequest(format!("invalid job id: {:?}", id)));
            }
            Ok(id)
        }
        None => state
            .registry
            .last_completed()
            .or_else(|| state.registry.currently_processing())
            .ok_or_else(|| ApiError::NotFound("no jobs have run yet".to_string())),
    }
}

async fn stream_file(path: &Path, content_type: &str) -> ApiResult<Response> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound(format!("file not found: {}", path.display()))
        } else {
            ApiError::Internal(format!("failed to open {}: {}", path.display(), e))
        }
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.headers_mut() = headers;
    Ok(response)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/download/move_log", get(download_move_log))
        .route("/download/processing_log", get(download_processing_log))
        .route("/download/artifact", get(download_artifact))
}
