// crates/server/src/routes/mod.rs
//! API route handlers for the docgate server.

pub mod artifacts;
pub mod health;
pub mod jobs;
pub mod logs;
pub mod upload;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health                    - Health check
/// - GET  /api/jobs/:job_id              - Job lifecycle snapshot (polling alternative to the log channel)
/// - POST /upload                        - Admit a batch of files for a job
/// - GET  /ws/logs/:job_id               - WebSocket: live processing-log stream
/// - GET  /download/move_log             - Latest daily move log
/// - GET  /download/processing_log?job=  - Per-job processing log (default: latest)
/// - GET  /download/artifact?job=        - Result artifact (default: latest)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .merge(upload::router())
        .merge(logs::router())
        .merge(artifacts::router())
        .with_state(state)
}
