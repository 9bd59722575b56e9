// crates/server/src/config.rs
//! Server configuration: CLI flags with env fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// docgate — job admission and log-streaming server.
#[derive(Debug, Clone, Parser)]
#[command(name = "docgate", version)]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "DOCGATE_PORT", default_value_t = 47311)]
    pub port: u16,

    /// Data root holding the queued/processing/completed areas.
    #[arg(long, env = "DOCGATE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// External pipeline command, invoked as `<cmd> <job_id> <job_dir>`.
    #[arg(long, env = "DOCGATE_PIPELINE_CMD")]
    pub pipeline_cmd: PathBuf,

    /// Extra arguments passed to the pipeline command before the job args.
    #[arg(long = "pipeline-arg", env = "DOCGATE_PIPELINE_ARGS", value_delimiter = ' ')]
    pub pipeline_args: Vec<String>,

    /// Hard timeout for one pipeline run, in seconds.
    #[arg(long, env = "DOCGATE_PIPELINE_TIMEOUT_SECS", default_value_t = 600)]
    pub pipeline_timeout_secs: u64,

    /// Log-tail poll interval per subscriber, in milliseconds.
    /// Lower is snappier, higher is cheaper.
    #[arg(long, env = "DOCGATE_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Bounded-wait compatibility mode: seconds the admission response
    /// waits for the pipeline before returning without a result.
    /// 0 means fire-and-forget (recommended).
    #[arg(long, env = "DOCGATE_WAIT_SECS", default_value_t = 0)]
    pub wait_secs: u64,

    /// File name of the result artifact inside each job directory.
    #[arg(long, env = "DOCGATE_ARTIFACT_NAME", default_value = "result.xlsx")]
    pub artifact_name: String,
}

impl Config {
    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_bound(&self) -> Option<Duration> {
        (self.wait_secs > 0).then(|| Duration::from_secs(self.wait_secs))
    }
}

/// Runtime knobs the handlers need, detached from the CLI surface so tests
/// can build them directly.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub pipeline_timeout: Duration,
    pub poll_interval: Duration,
    pub wait_bound: Option<Duration>,
}

impl From<&Config> for RuntimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            pipeline_timeout: config.pipeline_timeout(),
            poll_interval: config.poll_interval(),
            wait_bound: config.wait_bound(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pipeline_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_millis(500),
            wait_bound: None,
        }
    }
}
