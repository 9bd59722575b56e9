// crates/core/src/pipeline.rs
//! External pipeline collaborator boundary.
//!
//! The trigger hands the collaborator a job directory and expects back a
//! machine-readable outcome: a success flag, the processing log it wrote,
//! and the path of the produced artifact. `CommandPipeline` is the
//! production implementation — it spawns a configured external command and
//! relays its output into the per-job processing log as it arrives, so live
//! subscribers see progress line by line.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::error::PipelineError;
use crate::layout::PROCESSING_LOG_NAME;

/// Declared outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub success: bool,
    pub log_path: PathBuf,
    pub artifact_path: Option<PathBuf>,
    pub error: Option<String>,
}

pub type PipelineFuture<'a> =
    Pin<Box<dyn Future<Output = Result<PipelineResult, PipelineError>> + Send + 'a>>;

/// The processing collaborator. Implementations must tolerate being
/// cancelled mid-run (the trigger enforces a hard timeout by dropping the
/// future).
pub trait Pipeline: Send + Sync + 'static {
    fn run<'a>(&'a self, job_id: &'a str, job_dir: &'a Path) -> PipelineFuture<'a>;
}

/// Final stdout line the collaborator must emit.
#[derive(Debug, Deserialize)]
struct WireResult {
    success: bool,
    #[serde(default)]
    artifact: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Runs an external command as the pipeline.
///
/// Invocation: `<program> <args...> <job_id> <job_dir>`. Stdout and stderr
/// are appended to the job's `processing_log.log` as they arrive; the last
/// stdout line must be a JSON `WireResult`. The child is killed if the run
/// future is dropped (timeout or shutdown).
pub struct CommandPipeline {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    async fn run_inner(
        &self,
        job_id: &str,
        job_dir: &Path,
    ) -> Result<PipelineResult, PipelineError> {
        let log_path = job_dir.join(PROCESSING_LOG_NAME);
        let log_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .map_err(|e| PipelineError::io(&log_path, e))?;
        let log_file = Arc::new(Mutex::new(log_file));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(job_id)
            .arg(job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::io(&self.program, e))?;

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        // Relay stderr into the log concurrently with stdout.
        let stderr_log = Arc::clone(&log_file);
        let stderr_path = log_path.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut file = stderr_log.lock().await;
                if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
                    tracing::warn!(path = %stderr_path.display(), error = %e, "failed to relay stderr line");
                    break;
                }
                let _ = file.flush().await;
            }
        });

        let mut last_line: Option<String> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| PipelineError::io(&log_path, e))?
        {
            {
                let mut file = log_file.lock().await;
                file.write_all(format!("{}\n", line).as_bytes())
                    .await
                    .map_err(|e| PipelineError::io(&log_path, e))?;
                file.flush().await.map_err(|e| PipelineError::io(&log_path, e))?;
            }
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| PipelineError::io(&self.program, e))?;
        let _ = stderr_task.await;

        if !status.success() {
            return Err(PipelineError::collaborator(format!(
                "collaborator exited with {}",
                status
            )));
        }

        let last = last_line.ok_or_else(|| {
            PipelineError::collaborator("collaborator produced no output")
        })?;
        let wire: WireResult = serde_json::from_str(&last).map_err(|_| {
            PipelineError::collaborator("collaborator did not end with a machine-readable result")
        })?;

        let artifact_path = wire.artifact.map(|a| {
            let p = PathBuf::from(a);
            if p.is_absolute() {
                p
            } else {
                job_dir.join(p)
            }
        });

        Ok(PipelineResult {
            success: wire.success,
            log_path,
            artifact_path,
            error: wire.error,
        })
    }
}

impl Pipeline for CommandPipeline {
    fn run<'a>(&'a self, job_id: &'a str, job_dir: &'a Path) -> PipelineFuture<'a> {
        Box::pin(self.run_inner(job_id, job_dir))
    }
}
