// crates/core/src/movelog.rs
//! Shared append-only move log.
//!
//! Every admission and completion transition across all jobs lands here as
//! one line, in insertion order, never reordered or compacted. One file per
//! UTC day, named `YYYYMMDD.log`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::StoreError;

/// One move-log record. Rendered as a single text line:
/// `<timestamp> [<job_id>] <message>`.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: chrono::DateTime<Utc>,
    pub job_id: String,
    pub message: String,
}

impl LogEvent {
    pub fn now(job_id: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            job_id: job_id.to_string(),
            message: message.to_string(),
        }
    }

    fn render(&self) -> String {
        format!(
            "{} [{}] {}\n",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.job_id,
            self.message
        )
    }
}

/// A point in the move log: the daily file it was taken against and the
/// byte length at that moment.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub path: PathBuf,
    pub offset: u64,
}

/// Append-only writer over daily move-log files.
///
/// Appends are serialized by an internal mutex so events from concurrent
/// jobs keep their real order. Readers (admission snapshots, downloads) go
/// straight to the file — the log itself is the shared source of truth.
pub struct MoveLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl MoveLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of today's log file (created lazily on first append).
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", Utc::now().format("%Y%m%d")))
    }

    /// Append one event line: `<timestamp> [<job_id>] <message>`.
    pub fn append(&self, job_id: &str, message: &str) -> Result<(), StoreError> {
        let path = self.current_path();
        let line = LogEvent::now(job_id, message).render();

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    /// Mark the current end of the log. The checkpoint pins the file it
    /// was taken against, so an offset from just before UTC midnight is
    /// never misapplied to the next day's file.
    pub fn checkpoint(&self) -> Checkpoint {
        let path = self.current_path();
        let offset = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Checkpoint { path, offset }
    }

    /// Everything appended since `checkpoint`. When the day rolled over in
    /// between, this is the tail of the checkpoint's file plus the whole
    /// current file.
    pub fn snapshot_since(&self, checkpoint: &Checkpoint) -> Result<String, StoreError> {
        let mut out = read_tail(&checkpoint.path, checkpoint.offset)?;
        let current = self.current_path();
        if current != checkpoint.path {
            out.push_str(&read_tail(&current, 0)?);
        }
        Ok(out)
    }

    /// Contents of today's file from `offset` to EOF, plus the new offset.
    pub fn snapshot_from(&self, offset: u64) -> Result<(String, u64), StoreError> {
        let path = self.current_path();
        let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Ok((read_tail(&path, offset)?, len))
    }

    /// Newest daily log file, if any exist.
    ///
    /// File names sort lexicographically by date, so the maximum name is the
    /// most recent day.
    pub fn latest_path(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.dir).ok()?;
        entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("log")
            })
            .max()
    }
}

/// Contents of `path` from `offset` to EOF. A missing file reads as empty.
fn read_tail(path: &PathBuf, offset: u64) -> Result<String, StoreError> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    let len = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
    if len <= offset {
        return Ok(String::new());
    }
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StoreError::io(path, e))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .map_err(|e| StoreError::io(path, e))?;
    Ok(buf)
}
