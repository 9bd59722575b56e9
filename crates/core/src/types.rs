// crates/core/src/types.rs
//! Shared types for the job lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied job identifier (one admitted batch of files).
pub type JobId = String;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry tracking one job's lifecycle timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn queued() -> Self {
        Self {
            state: JobState::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Logical area a job directory lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Queued,
    Processing,
    Completed,
}

impl Area {
    pub fn as_str(self) -> &'static str {
        match self {
            Area::Queued => "queued",
            Area::Processing => "processing",
            Area::Completed => "completed",
        }
    }
}

/// Directory move between areas. Failed runs keep their directory in the
/// completed area so partial output stays retrievable; the registry records
/// the Failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    QueuedToProcessing,
    ProcessingToCompleted,
    ProcessingToFailed,
}

impl Transition {
    pub fn src(self) -> Area {
        match self {
            Transition::QueuedToProcessing => Area::Queued,
            Transition::ProcessingToCompleted | Transition::ProcessingToFailed => Area::Processing,
        }
    }

    pub fn dest(self) -> Area {
        match self {
            Transition::QueuedToProcessing => Area::Processing,
            Transition::ProcessingToCompleted | Transition::ProcessingToFailed => Area::Completed,
        }
    }
}

/// Validate a caller-supplied job id before it becomes a directory name.
///
/// Rejects empty ids, path separators, `..`, and anything that is not
/// ASCII alphanumeric / `-` / `_` / `.`.
pub fn is_valid_job_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 128 || id == "." || id == ".." {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
