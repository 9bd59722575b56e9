// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::broadcast;

use docgate_core::{JobRegistry, JobState, JobStore, Layout, MoveLog, Pipeline};

use crate::config::RuntimeConfig;

/// Terminal lifecycle event, broadcast to bounded-wait admission callers
/// and to log-channel subscribers so they can send their terminal marker.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: String,
    pub state: JobState,
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Filesystem-backed job directory store.
    pub store: JobStore,
    /// Execution locks and lifecycle records; the single source of truth
    /// for "currently processing".
    pub registry: JobRegistry,
    /// Shared append-only move log.
    pub movelog: Arc<MoveLog>,
    /// The external processing collaborator.
    pub pipeline: Arc<dyn Pipeline>,
    /// Poll interval, pipeline timeout, bounded-wait mode.
    pub config: RuntimeConfig,
    /// Terminal job events. Subscribers that lag simply re-read the log
    /// file — the file is the source of truth, the channel only signals.
    pub events_tx: broadcast::Sender<JobEvent>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(layout: Layout, pipeline: Arc<dyn Pipeline>, config: RuntimeConfig) -> Arc<Self> {
        let movelog = Arc::new(MoveLog::new(layout.move_logs_dir()));
        Arc::new(Self {
            start_time: Instant::now(),
            store: JobStore::new(layout, Arc::clone(&movelog)),
            registry: JobRegistry::new(),
            movelog,
            pipeline,
            config,
            events_tx: broadcast::channel(256).0,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub(crate) fn broadcast(&self, job_id: &str, state: JobState) {
        // Send fails only when no subscriber is listening, which is fine.
        let _ = self.events_tx.send(JobEvent {
            job_id: job_id.to_string(),
            state,
        });
    }
}
