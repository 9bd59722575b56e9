// crates/server/src/routes/logs.rs
//! WebSocket endpoint streaming a job's processing log.
//!
//! - `WS /ws/logs/:job_id` -- live tail of the per-job processing log

use std::sync::Arc;

use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};

use crate::state::AppState;
use crate::tailer;

/// HTTP upgrade handler. Job existence is checked inside the upgrade
/// callback rather than at handshake time, so a client that connects for a
/// job it just admitted never races the directory creation into a refusal.
async fn ws_logs_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| tailer::stream_job_log(socket, state, job_id))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws/logs/{job_id}", get(ws_logs_handler))
}
