// crates/server/src/routes/upload.rs
//! Job admission.
//!
//! `POST /upload` takes a multipart form with a `job_id` text field and one
//! or more `files` parts, takes the execution lock, stores the files in the
//! queued area, moves the directory to processing, and fires the pipeline
//! in the background. In bounded-wait mode the response also carries the
//! run's outcome if it lands within the wait window.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use docgate_core::{is_valid_job_id, JobState, Transition, UploadedFile};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, JobEvent};
use crate::trigger;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct UploadResponse {
    pub job_id: String,
    pub state: JobState,
    /// File names as stored, after sanitization.
    pub files: Vec<String>,
    /// Move-log lines produced by this admission.
    pub move_log: String,
    /// Present only in bounded-wait mode, and only when the run finished
    /// within the wait window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<WaitOutcome>,
}

/// Outcome of a run observed within the bounded wait window.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct WaitOutcome {
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    pub processing_log: String,
}

async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let (job_id, files) = read_form(multipart).await?;
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::BadRequest(format!("invalid job id: {:?}", job_id)));
    }
    if files.is_empty() {
        return Err(ApiError::BadRequest("no files in upload".to_string()));
    }

    // Snapshot the move log first so the response echoes exactly the
    // lines this admission produced.
    let log_checkpoint = state.movelog.checkpoint();

    // The lock is the admission serialization point: of two interleaved
    // admissions for the same id, only the winner ever writes a file, so
    // the losing request cannot smuggle its files into the winning run's
    // directory.
    state.registry.register(&job_id);
    if !state.registry.try_acquire(&job_id) {
        return Err(ApiError::Store(docgate_core::StoreError::Conflict {
            job_id,
        }));
    }

    let saved = match state.store.admit(&job_id, files).await {
        Ok(saved) => saved,
        Err(e) => {
            state.registry.release(&job_id, JobState::Failed);
            return Err(e.into());
        }
    };

    if let Err(e) = state
        .store
        .transition(&job_id, Transition::QueuedToProcessing)
        .await
    {
        state.registry.release(&job_id, JobState::Failed);
        return Err(e.into());
    }

    // Subscribe before spawning so a fast run cannot finish unobserved.
    let events = state
        .config
        .wait_bound
        .map(|bound| (state.events_tx.subscribe(), bound));

    trigger::spawn(Arc::clone(&state), job_id.clone());
    tracing::info!(job_id = %job_id, files = saved.len(), "job admitted");

    let mut response = UploadResponse {
        job_id: job_id.clone(),
        state: JobState::Processing,
        files: saved,
        move_log: String::new(),
        result: None,
    };

    if let Some((rx, bound)) = events {
        if let Some(terminal) = wait_for_terminal(rx, &job_id, bound).await {
            response.state = terminal;
            response.result = Some(collect_outcome(&state, &job_id, terminal).await);
        }
    }

    response.move_log = state.movelog.snapshot_since(&log_checkpoint)?;
    Ok(Json(response))
}

/// Pull the `job_id` field and `files` parts out of the multipart form.
async fn read_form(mut multipart: Multipart) -> ApiResult<(String, Vec<UploadedFile>)> {
    let mut job_id = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("job_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable job_id field: {}", e)))?;
                job_id = Some(value.trim().to_string());
            }
            Some("files") => {
                let name = field.file_name().unwrap_or("unnamed").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable file part: {}", e)))?;
                files.push(UploadedFile {
                    name,
                    data: data.to_vec(),
                });
            }
            _ => {} // unknown fields ignored
        }
    }

    let job_id = job_id.ok_or_else(|| ApiError::BadRequest("missing job_id field".to_string()))?;
    Ok((job_id, files))
}

/// Wait up to `bound` for this job's terminal event. None means the run is
/// still going when the window closes.
async fn wait_for_terminal(
    mut rx: tokio::sync::broadcast::Receiver<JobEvent>,
    job_id: &str,
    bound: std::time::Duration,
) -> Option<JobState> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if event.job_id == job_id && event.state.is_terminal() => {
                    return Some(event.state);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(bound, wait).await.ok().flatten()
}

/// Gather the processing log and artifact path for a finished run.
async fn collect_outcome(state: &AppState, job_id: &str, terminal: JobState) -> WaitOutcome {
    let layout = state.store.layout();
    let (artifact, processing_log) = match state.store.locate(job_id) {
        Ok((_, dir)) => {
            let artifact_path = layout.artifact(&dir);
            let artifact = (terminal == JobState::Completed && artifact_path.exists())
                .then(|| artifact_path.display().to_string());
            let log = tokio::fs::read_to_string(layout.processing_log(&dir))
                .await
                .unwrap_or_default();
            (artifact, log)
        }
        Err(_) => (None, String::new()),
    };
    WaitOutcome {
        state: terminal,
        artifact,
        processing_log,
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload))
}
