// crates/server/src/trigger.rs
//! Async pipeline trigger.
//!
//! Owns one job's run end to end: start marker, pipeline invocation under
//! the hard timeout, terminal marker, directory transition, and —
//! unconditionally, on every exit path — lock release and the terminal
//! broadcast. Admission never blocks on this; it returns once the run is
//! scheduled.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use docgate_core::{Area, JobState, Transition};

use crate::state::AppState;

/// Schedule the pipeline run for an admitted job.
///
/// The job's directory must already sit in the processing area with the
/// registry lock held.
pub fn spawn(state: Arc<AppState>, job_id: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run_to_completion(&state, &job_id).await;
    })
}

/// Run the pipeline and settle the job. Lock release and the terminal
/// event are guaranteed regardless of how the run ends.
pub async fn run_to_completion(state: &AppState, job_id: &str) {
    let terminal = execute(state, job_id).await;
    state.registry.release(job_id, terminal);
    state.broadcast(job_id, terminal);
    tracing::info!(job_id, state = terminal.as_str(), "job settled");
}

async fn execute(state: &AppState, job_id: &str) -> JobState {
    let layout = state.store.layout();
    let job_dir = layout.job_dir(Area::Processing, job_id);
    let log_path = layout.processing_log(&job_dir);

    append_line(
        &log_path,
        &format!("Started processing at {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ")),
    )
    .await;

    let timeout = state.config.pipeline_timeout;
    let outcome = tokio::time::timeout(timeout, state.pipeline.run(job_id, &job_dir)).await;

    let (terminal, marker) = match outcome {
        Ok(Ok(result)) if result.success => (
            JobState::Completed,
            "Processing completed successfully".to_string(),
        ),
        Ok(Ok(result)) => {
            let reason = result
                .error
                .unwrap_or_else(|| "collaborator reported failure".to_string());
            tracing::warn!(job_id, reason = %reason, "pipeline reported failure");
            (JobState::Failed, format!("Failed: {}", reason))
        }
        Ok(Err(e)) => {
            tracing::warn!(job_id, error = %e, "pipeline error");
            (JobState::Failed, format!("Failed: {}", e))
        }
        // Dropping the run future kills the collaborator process.
        Err(_) => {
            tracing::warn!(job_id, timeout_secs = timeout.as_secs(), "pipeline timed out");
            (
                JobState::Failed,
                format!("Failed: pipeline timed out after {}s", timeout.as_secs()),
            )
        }
    };

    // Terminal marker goes in before the move so it travels with the
    // directory; the log is only ever appended to, never truncated.
    append_line(&log_path, &marker).await;

    let transition = match terminal {
        JobState::Completed => Transition::ProcessingToCompleted,
        _ => Transition::ProcessingToFailed,
    };

    // A previous run of the same job id may still occupy the completed
    // area; only the most recent run is kept.
    if let Err(e) = state.store.evict_completed(job_id).await {
        tracing::warn!(job_id, error = %e, "could not evict previous completed run");
    }

    match state.store.transition(job_id, transition).await {
        Ok(_) => terminal,
        Err(e) => {
            // Fatal to this run: the directory stays in its
            // last-known-consistent location, nothing is deleted.
            tracing::error!(job_id, error = %e, "transition failed after pipeline run");
            JobState::Failed
        }
    }
}

/// Append one line to a log file, creating it if needed. A failed append is
/// logged and swallowed — a marker write must never change the job outcome.
async fn append_line(path: &Path, line: &str) {
    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await
    }
    .await;
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "failed to append log line");
    }
}
