// crates/core/src/registry.rs
//! In-memory job registry and per-job execution lock.
//!
//! The single source of truth for "is this job currently processing" —
//! a directory's location alone is not sufficient evidence, since it may
//! exist mid-move. Uses `std::sync::Mutex` (not `tokio::sync::Mutex`)
//! because no lock is ever held across an `.await` point.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::types::{JobRecord, JobState};

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, JobRecord>,
    last_completed: Option<String>,
}

/// Registry enforcing at-most-one-active-run per job id, plus the explicit
/// `last_completed` pointer that "latest" artifact lookups resolve through
/// (no filesystem mtime scanning).
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Record a freshly admitted job as Queued.
    ///
    /// Leaves an existing Processing entry untouched — the in-flight run
    /// owns the record until it releases.
    pub fn register(&self, job_id: &str) {
        let mut inner = self.lock();
        match inner.jobs.get(job_id) {
            Some(record) if record.state == JobState::Processing => {}
            _ => {
                inner.jobs.insert(job_id.to_string(), JobRecord::queued());
            }
        }
    }

    /// Take the execution lock for `job_id`.
    ///
    /// Returns false if a Processing entry already exists; the caller must
    /// then answer with a conflict rather than blocking.
    pub fn try_acquire(&self, job_id: &str) -> bool {
        let mut inner = self.lock();
        let record = inner
            .jobs
            .entry(job_id.to_string())
            .or_insert_with(JobRecord::queued);
        if record.state == JobState::Processing {
            return false;
        }
        record.state = JobState::Processing;
        record.started_at = Some(Utc::now());
        record.completed_at = None;
        true
    }

    /// Release the lock unconditionally, recording the terminal state.
    ///
    /// Updates `last_completed` transactionally when the run succeeded.
    pub fn release(&self, job_id: &str, terminal: JobState) {
        debug_assert!(terminal.is_terminal());
        let mut inner = self.lock();
        if let Some(record) = inner.jobs.get_mut(job_id) {
            record.state = terminal;
            record.completed_at = Some(Utc::now());
        }
        if terminal == JobState::Completed {
            inner.last_completed = Some(job_id.to_string());
        }
    }

    pub fn status(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().jobs.get(job_id).cloned()
    }

    /// Most recently completed job id, if any run has completed.
    pub fn last_completed(&self) -> Option<String> {
        self.lock().last_completed.clone()
    }

    /// The currently processing job id, if one exists. With single-flight
    /// per id and single-active-job operation this is at most one entry;
    /// under true cross-job concurrency an arbitrary one is returned.
    pub fn currently_processing(&self) -> Option<String> {
        self.lock()
            .jobs
            .iter()
            .find(|(_, r)| r.state == JobState::Processing)
            .map(|(id, _)| id.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
