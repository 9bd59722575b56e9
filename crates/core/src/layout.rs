// crates/core/src/layout.rs
//! Filesystem layout contract: three sibling lifecycle areas plus the
//! shared move-log directory.
//!
//! ```text
//! <root>/queued/<job_id>/...          uploaded files
//! <root>/processing/<job_id>/...      in-flight run
//! <root>/completed/<job_id>/...       finished run (artifact + log)
//! <root>/queued/move_logs/<YYYYMMDD>.log
//! <job dir>/processing_log.log
//! <job dir>/<artifact name>
//! ```

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::types::Area;

/// File name of the per-job processing log produced by the pipeline.
pub const PROCESSING_LOG_NAME: &str = "processing_log.log";

/// Resolves every path the job store and artifact server touch.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    artifact_name: String,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, artifact_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            artifact_name: artifact_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    pub fn area_dir(&self, area: Area) -> PathBuf {
        self.root.join(area.as_str())
    }

    pub fn job_dir(&self, area: Area, job_id: &str) -> PathBuf {
        self.area_dir(area).join(job_id)
    }

    /// Daily move-log directory. Lives under the queued area, mirroring the
    /// upload side where admission events originate.
    pub fn move_logs_dir(&self) -> PathBuf {
        self.area_dir(Area::Queued).join("move_logs")
    }

    pub fn processing_log(&self, job_dir: &Path) -> PathBuf {
        job_dir.join(PROCESSING_LOG_NAME)
    }

    pub fn artifact(&self, job_dir: &Path) -> PathBuf {
        job_dir.join(&self.artifact_name)
    }

    /// Create all lifecycle areas and the move-log directory.
    ///
    /// Called once at startup; idempotent.
    pub fn ensure(&self) -> Result<(), StoreError> {
        for dir in [
            self.area_dir(Area::Queued),
            self.area_dir(Area::Processing),
            self.area_dir(Area::Completed),
            self.move_logs_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }
}
