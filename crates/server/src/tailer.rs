// crates/server/src/tailer.rs
//! Per-subscriber log tailer.
//!
//! Each WebSocket subscriber gets its own task and its own read offset over
//! the job's processing log; the file is the single shared source of truth,
//! so a slow subscriber never blocks the pipeline's writes or anyone else.
//! Growth is detected by a bounded-interval poll rather than OS file
//! notification — availability varies, and a two-state check loop is enough
//! at these rates.
//!
//! Subscriber lifecycle: Connecting (send what the log already holds,
//! establishing the offset) → Streaming (push only newly appended bytes,
//! in order) → Closed (terminal marker after the pipeline settles, or the
//! subscriber went away).

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::SinkExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

use docgate_core::{tail, JobState};

use crate::state::AppState;

/// Final frame sent before the channel closes.
fn terminal_marker(state: JobState) -> &'static str {
    match state {
        JobState::Completed => "--- completed ---",
        _ => "--- failed ---",
    }
}

/// Drive one subscriber connection to completion.
pub async fn stream_job_log(mut socket: WebSocket, state: Arc<AppState>, job_id: String) {
    // Subscribe before the initial snapshot so a terminal event can't slip
    // between snapshot and streaming.
    let mut events = state.events_tx.subscribe();

    let Some(path) = resolve_log_path(&state, &job_id) else {
        let _ = socket
            .send(Message::Text(format!("Unknown job: {}", job_id).into()))
            .await;
        let _ = socket.close().await;
        return;
    };

    // The job may be admitted but not yet started; give the tailer an
    // empty file to watch.
    if let Err(e) = tail::ensure_exists(&path).await {
        tracing::warn!(job_id, error = %e, "could not open processing log");
        let _ = socket.close().await;
        return;
    }

    let mut offset = match send_new_bytes(&mut socket, &path, 0).await {
        Some(offset) => offset,
        None => return, // subscriber already gone
    };

    // Already settled? Deliver the snapshot plus marker and close.
    if let Some(record) = state.registry.status(&job_id) {
        if record.state.is_terminal() {
            let _ = socket
                .send(Message::Text(terminal_marker(record.state).into()))
                .await;
            let _ = socket.close().await;
            return;
        }
    }

    let mut interval = tokio::time::interval(state.config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Re-resolve each poll: the directory moves areas when the
                // run settles, the offset stays valid across the rename.
                let Some(path) = resolve_log_path(&state, &job_id) else { continue };
                match send_new_bytes(&mut socket, &path, offset).await {
                    Some(new_offset) => offset = new_offset,
                    None => break,
                }
            }
            event = events.recv() => {
                match event {
                    Ok(e) if e.job_id == job_id && e.state.is_terminal() => {
                        // Drain whatever the run wrote after our last poll.
                        if let Some(path) = resolve_log_path(&state, &job_id) {
                            send_new_bytes(&mut socket, &path, offset).await;
                        }
                        let _ = socket
                            .send(Message::Text(terminal_marker(e.state).into()))
                            .await;
                        break;
                    }
                    Ok(_) => {}
                    // Missed events are fine — the file has everything.
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    // Disconnect stops this subscriber only; the pipeline
                    // run and other subscribers are unaffected.
                    None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket.close().await;
}

/// Current location of the job's processing log, wherever its directory
/// lives right now.
fn resolve_log_path(state: &AppState, job_id: &str) -> Option<PathBuf> {
    let (_, dir) = state.store.locate(job_id).ok()?;
    Some(state.store.layout().processing_log(&dir))
}

/// Push bytes appended past `offset`, returning the new offset, or `None`
/// once the subscriber is gone.
async fn send_new_bytes(socket: &mut WebSocket, path: &PathBuf, offset: u64) -> Option<u64> {
    match tail::read_from(path, offset).await {
        Ok((bytes, new_offset)) => {
            if !bytes.is_empty() {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                if socket.send(Message::Text(text.into())).await.is_err() {
                    return None;
                }
            }
            Some(new_offset)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "tail read failed");
            Some(offset)
        }
    }
}
