// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the filesystem-backed job store and move log.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job already processing: {job_id}")]
    Conflict { job_id: String },

    #[error("Destination already exists for job {job_id}: {dest}")]
    Collision { job_id: String, dest: PathBuf },

    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound {
            job_id: job_id.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors from the external pipeline collaborator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline reported failure: {message}")]
    Collaborator { message: String },

    #[error("Pipeline timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
