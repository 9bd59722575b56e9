// crates/server/src/routes/jobs.rs
//! Job status endpoint — the polling alternative to the WebSocket log
//! channel. Clients can always distinguish "still processing",
//! "completed", and "failed" from here.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use docgate_core::JobState;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct JobStatusResponse {
    pub job_id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// GET /api/jobs/:job_id - Lifecycle snapshot from the registry.
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let record = state
        .registry
        .status(&job_id)
        .ok_or_else(|| ApiError::NotFound(format!("no job with id {}", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id,
        state: record.state,
        created_at: record.created_at,
        started_at: record.started_at,
        completed_at: record.completed_at,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/jobs/{job_id}", get(job_status))
}
