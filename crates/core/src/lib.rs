// crates/core/src/lib.rs
//! docgate-core — filesystem-backed job lifecycle.
//!
//! A job is one admitted batch of files identified by a caller-supplied
//! key. Its directory moves through three sibling areas
//! (queued → processing → completed) under a single data root. This crate
//! owns that lifecycle: the directory store and its atomic moves, the
//! in-memory registry enforcing single-flight per job id, the shared
//! append-only move log, offset-based log tailing primitives, and the
//! external pipeline collaborator boundary. HTTP lives in `docgate-server`.

pub mod error;
pub mod layout;
pub mod movelog;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod tail;
pub mod types;

pub use error::{PipelineError, StoreError};
pub use layout::{Layout, PROCESSING_LOG_NAME};
pub use movelog::{Checkpoint, LogEvent, MoveLog};
pub use pipeline::{CommandPipeline, Pipeline, PipelineFuture, PipelineResult};
pub use registry::JobRegistry;
pub use store::{JobStore, UploadedFile};
pub use types::{is_valid_job_id, Area, JobId, JobRecord, JobState, Transition};
