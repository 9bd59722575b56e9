// crates/core/src/store.rs
//! Filesystem-backed job directory store.
//!
//! Owns a job's directory while it is queued or processing. Lifecycle moves
//! are single `rename` calls so concurrent readers never observe a
//! partial-move state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StoreError;
use crate::layout::Layout;
use crate::movelog::MoveLog;
use crate::types::{Area, Transition};

/// One uploaded file: name plus contents.
pub struct UploadedFile {
    pub name: String,
    pub data: Vec<u8>,
}

pub struct JobStore {
    layout: Layout,
    movelog: Arc<MoveLog>,
}

impl JobStore {
    pub fn new(layout: Layout, movelog: Arc<MoveLog>) -> Self {
        Self { layout, movelog }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Admit a batch of files for `job_id`.
    ///
    /// Creates `queued/<job_id>/` if absent and writes each file into it,
    /// appending one `Uploaded` move-log event per file. Fails with
    /// `Conflict` if an execution is already in flight (a directory for the
    /// job exists in the processing area).
    pub async fn admit(
        &self,
        job_id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<String>, StoreError> {
        if self.layout.job_dir(Area::Processing, job_id).exists() {
            return Err(StoreError::Conflict {
                job_id: job_id.to_string(),
            });
        }

        let dir = self.layout.job_dir(Area::Queued, job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let mut saved = Vec::with_capacity(files.len());
        for file in files {
            let name = sanitize_file_name(&file.name);
            let path = dir.join(&name);
            tokio::fs::write(&path, &file.data)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            self.movelog
                .append(job_id, &format!("Uploaded {} to queued/{}", name, job_id))?;
            saved.push(name);
        }
        Ok(saved)
    }

    /// Move the job's directory between lifecycle areas.
    ///
    /// A single atomic rename; if the destination already holds a directory
    /// of the same name the store fails with `Collision` rather than
    /// silently overwriting — resolving the collision is the caller's call.
    /// Returns the job directory's new path.
    pub async fn transition(
        &self,
        job_id: &str,
        transition: Transition,
    ) -> Result<PathBuf, StoreError> {
        let src = self.layout.job_dir(transition.src(), job_id);
        if !src.exists() {
            return Err(StoreError::not_found(job_id));
        }
        let dest = self.layout.job_dir(transition.dest(), job_id);
        if dest.exists() {
            return Err(StoreError::Collision {
                job_id: job_id.to_string(),
                dest,
            });
        }

        tokio::fs::rename(&src, &dest)
            .await
            .map_err(|e| StoreError::io(&src, e))?;

        let message = match transition {
            Transition::QueuedToProcessing => "moved to processing",
            Transition::ProcessingToCompleted => "moved to completed",
            Transition::ProcessingToFailed => "moved to completed (run failed)",
        };
        self.movelog.append(job_id, message)?;

        tracing::debug!(job_id, from = transition.src().as_str(), to = transition.dest().as_str(), "job directory moved");
        Ok(dest)
    }

    /// Find the job's directory, checking processing first (the live run),
    /// then completed, then queued.
    pub fn locate(&self, job_id: &str) -> Result<(Area, PathBuf), StoreError> {
        for area in [Area::Processing, Area::Completed, Area::Queued] {
            let dir = self.layout.job_dir(area, job_id);
            if dir.is_dir() {
                return Ok((area, dir));
            }
        }
        Err(StoreError::not_found(job_id))
    }

    /// Remove a stale completed directory so a re-run of the same job id
    /// can land there. An explicit caller decision (logged), never done by
    /// `transition` itself.
    pub async fn evict_completed(&self, job_id: &str) -> Result<(), StoreError> {
        let dir = self.layout.job_dir(Area::Completed, job_id);
        if dir.exists() {
            tracing::info!(job_id, "replacing previous completed run");
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }
}

/// Strip any path components from an uploaded file name.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if base.is_empty() || base == ".." {
        "unnamed".to_string()
    } else {
        base
    }
}
