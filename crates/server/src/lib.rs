// crates/server/src/lib.rs
//! Docgate server library.
//!
//! This crate provides the Axum-based HTTP server for docgate: job
//! admission over multipart upload, directory-per-job lifecycle on disk,
//! async pipeline triggering, live processing-log streaming over
//! WebSocket, and artifact downloads.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod tailer;
pub mod trigger;

pub use config::{Config, RuntimeConfig};
pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, job status, upload, log streaming, downloads)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use docgate_core::{
        Layout, Pipeline, PipelineFuture, PipelineResult, PROCESSING_LOG_NAME,
    };

    const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

    /// Pipeline double that writes a log line and an artifact, then
    /// optionally waits on a gate before returning.
    struct StubPipeline {
        succeed: bool,
        gate: Option<tokio_util::sync::CancellationToken>,
    }

    impl StubPipeline {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                succeed: true,
                gate: None,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                succeed: false,
                gate: None,
            })
        }

        fn gated(gate: tokio_util::sync::CancellationToken) -> Arc<Self> {
            Arc::new(Self {
                succeed: true,
                gate: Some(gate),
            })
        }
    }

    impl Pipeline for StubPipeline {
        fn run<'a>(&'a self, _job_id: &'a str, job_dir: &'a Path) -> PipelineFuture<'a> {
            Box::pin(async move {
                if let Some(gate) = &self.gate {
                    gate.cancelled().await;
                }
                let log_path = job_dir.join(PROCESSING_LOG_NAME);
                let mut log = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_path)
                    .await
                    .unwrap();
                tokio::io::AsyncWriteExt::write_all(&mut log, b"Processed: a.pdf\n")
                    .await
                    .unwrap();
                let artifact_path = if self.succeed {
                    let p = job_dir.join("result.xlsx");
                    tokio::fs::write(&p, "spreadsheet").await.unwrap();
                    Some(p)
                } else {
                    None
                };
                Ok(PipelineResult {
                    success: self.succeed,
                    log_path,
                    artifact_path,
                    error: (!self.succeed).then(|| "input unreadable".to_string()),
                })
            })
        }
    }

    struct TestApp {
        _tmp: tempfile::TempDir,
        root: std::path::PathBuf,
        state: Arc<AppState>,
        app: Router,
    }

    fn test_app_with(pipeline: Arc<dyn Pipeline>, config: RuntimeConfig) -> TestApp {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let layout = Layout::new(&root, "result.xlsx");
        layout.ensure().unwrap();
        let state = AppState::new(layout, pipeline, config);
        let app = create_app(Arc::clone(&state));
        TestApp {
            _tmp: tmp,
            root,
            state,
            app,
        }
    }

    fn test_app(pipeline: Arc<dyn Pipeline>) -> TestApp {
        test_app_with(pipeline, RuntimeConfig::default())
    }

    /// Build a multipart body with a job_id field and the given files.
    fn multipart_body(job_id: &str, files: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"job_id\"\r\n\r\n{job_id}\r\n"
            )
            .as_bytes(),
        );
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post_upload(app: Router, job_id: &str, files: &[(&str, &str)]) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/upload")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(job_id, files)))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap();
        (status, json)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    /// Poll the registry until the job reaches a terminal state.
    async fn wait_settled(state: &AppState, job_id: &str) {
        for _ in 0..200 {
            if let Some(record) = state.registry.status(job_id) {
                if record.state.is_terminal() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never settled", job_id);
    }

    // ========================================================================
    // Health Endpoint Tests
    // ========================================================================

    #[tokio::test]
    async fn test_health_endpoint() {
        let tapp = test_app(StubPipeline::ok());
        let (status, body) = get(tapp.app, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["uptime_secs"].is_number());
        assert!(json["active_job"].is_null());
        assert!(json["last_completed"].is_null());
    }

    #[tokio::test]
    async fn test_health_reports_pipeline_activity() {
        let gate = tokio_util::sync::CancellationToken::new();
        let tapp = test_app(StubPipeline::gated(gate.clone()));
        post_upload(tapp.app.clone(), "J1", &[("a.pdf", "x")]).await;

        let (_, body) = get(tapp.app.clone(), "/api/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["active_job"], "J1");

        gate.cancel();
        wait_settled(&tapp.state, "J1").await;

        let (_, body) = get(tapp.app, "/api/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["active_job"].is_null());
        assert_eq!(json["last_completed"], "J1");
    }

    // ========================================================================
    // Admission Tests
    // ========================================================================

    #[tokio::test]
    async fn test_upload_admits_and_runs_to_completion() {
        let tapp = test_app(StubPipeline::ok());
        let (status, json) =
            post_upload(tapp.app.clone(), "ACME-001", &[("a.pdf", "pdf bytes")]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["job_id"], "ACME-001");
        assert_eq!(json["state"], "processing");
        assert_eq!(json["files"][0], "a.pdf");
        // Move log echoes this admission's events
        let move_log = json["move_log"].as_str().unwrap();
        assert!(move_log.contains("Uploaded a.pdf to queued/ACME-001"));
        assert!(move_log.contains("moved to processing"));

        wait_settled(&tapp.state, "ACME-001").await;
        assert!(tapp.root.join("completed/ACME-001/result.xlsx").exists());
        assert!(tapp.root.join("completed/ACME-001/a.pdf").exists());

        // Status endpoint agrees
        let (status, body) = get(tapp.app, "/api/jobs/ACME-001").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "completed");
    }

    #[tokio::test]
    async fn test_upload_multiple_files() {
        let tapp = test_app(StubPipeline::ok());
        let (status, json) = post_upload(
            tapp.app,
            "J1",
            &[("a.pdf", "aaa"), ("b.pdf", "bbb"), ("c.pdf", "ccc")],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["files"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_upload_rejects_invalid_job_id() {
        let tapp = test_app(StubPipeline::ok());
        let (status, json) = post_upload(tapp.app, "../escape", &[("a.pdf", "x")]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Bad request");
        assert!(!tapp.root.join("queued/../escape").exists());
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file_list() {
        let tapp = test_app(StubPipeline::ok());
        let (status, _json) = post_upload(tapp.app, "J1", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_missing_job_id_field() {
        let tapp = test_app(StubPipeline::ok());
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"a.pdf\"\r\n\r\nx\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );
        let response = tapp
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/upload")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_conflict_while_processing() {
        let gate = tokio_util::sync::CancellationToken::new();
        let tapp = test_app(StubPipeline::gated(gate.clone()));

        let (status, _) = post_upload(tapp.app.clone(), "J1", &[("a.pdf", "x")]).await;
        assert_eq!(status, StatusCode::OK);

        // Same id while the first run is gated: admission refused
        let (status, json) = post_upload(tapp.app.clone(), "J1", &[("b.pdf", "y")]).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "Job already processing");

        // A different id is unaffected — but it queues behind the same
        // gate, so just check admission succeeds
        let (status, _) = post_upload(tapp.app.clone(), "J2", &[("c.pdf", "z")]).await;
        assert_eq!(status, StatusCode::OK);

        gate.cancel();
        wait_settled(&tapp.state, "J1").await;

        // After settling, the same id is admissible again
        let (status, _) = post_upload(tapp.app, "J1", &[("d.pdf", "w")]).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_racing_admissions_never_merge_files() {
        let gate = tokio_util::sync::CancellationToken::new();
        let tapp = test_app(StubPipeline::gated(gate.clone()));

        // Two admissions of the same id in flight at once: exactly one
        // takes the lock, and the loser must not have written anything.
        let (r1, r2) = tokio::join!(
            post_upload(tapp.app.clone(), "J1", &[("a.pdf", "first")]),
            post_upload(tapp.app.clone(), "J1", &[("b.pdf", "second")]),
        );

        let mut statuses = [r1.0, r2.0];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

        let winner = if r1.0 == StatusCode::OK { &r1.1 } else { &r2.1 };
        let winner_file = winner["files"][0].as_str().unwrap();
        let loser_file = if winner_file == "a.pdf" { "b.pdf" } else { "a.pdf" };

        // The winning run's directory holds only the winner's upload
        let job_dir = tapp.root.join("processing/J1");
        assert!(job_dir.join(winner_file).exists());
        assert!(!job_dir.join(loser_file).exists());
        assert!(!tapp.root.join("queued/J1").exists());

        gate.cancel();
        wait_settled(&tapp.state, "J1").await;
        let completed = tapp.root.join("completed/J1");
        assert!(completed.join(winner_file).exists());
        assert!(!completed.join(loser_file).exists());
    }

    #[tokio::test]
    async fn test_failed_run_preserves_partial_output() {
        let tapp = test_app(StubPipeline::failing());
        let (status, _) = post_upload(tapp.app.clone(), "J1", &[("a.pdf", "x")]).await;
        assert_eq!(status, StatusCode::OK);

        wait_settled(&tapp.state, "J1").await;
        assert_eq!(
            tapp.state.registry.status("J1").unwrap().state,
            docgate_core::JobState::Failed
        );
        // Inputs and log retrievable from the completed area, no artifact
        assert!(tapp.root.join("completed/J1/a.pdf").exists());
        assert!(tapp.root.join("completed/J1").join(PROCESSING_LOG_NAME).exists());
        assert!(!tapp.root.join("completed/J1/result.xlsx").exists());
    }

    // ========================================================================
    // Bounded-Wait Mode Tests
    // ========================================================================

    #[tokio::test]
    async fn test_bounded_wait_returns_result() {
        let config = RuntimeConfig {
            wait_bound: Some(Duration::from_secs(5)),
            ..RuntimeConfig::default()
        };
        let tapp = test_app_with(StubPipeline::ok(), config);

        let (status, json) = post_upload(tapp.app, "J1", &[("a.pdf", "x")]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "completed");
        let result = &json["result"];
        assert_eq!(result["state"], "completed");
        assert!(result["artifact"].as_str().unwrap().contains("result.xlsx"));
        assert!(result["processing_log"]
            .as_str()
            .unwrap()
            .contains("Processed: a.pdf"));
    }

    #[tokio::test]
    async fn test_bounded_wait_window_closes_on_slow_run() {
        let gate = tokio_util::sync::CancellationToken::new();
        let config = RuntimeConfig {
            wait_bound: Some(Duration::from_millis(100)),
            ..RuntimeConfig::default()
        };
        let tapp = test_app_with(StubPipeline::gated(gate.clone()), config);

        let (status, json) = post_upload(tapp.app, "J1", &[("a.pdf", "x")]).await;
        // Window closed with the run still going: processing, no result
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "processing");
        assert!(json.get("result").is_none());

        gate.cancel();
        wait_settled(&tapp.state, "J1").await;
    }

    // ========================================================================
    // Download Tests
    // ========================================================================

    #[tokio::test]
    async fn test_download_artifact_defaults_to_latest() {
        let tapp = test_app(StubPipeline::ok());
        post_upload(tapp.app.clone(), "J1", &[("a.pdf", "x")]).await;
        wait_settled(&tapp.state, "J1").await;

        let (status, body) = get(tapp.app.clone(), "/download/artifact").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "spreadsheet");

        // Explicit job id works too
        let (status, _) = get(tapp.app.clone(), "/download/artifact?job=J1").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get(tapp.app, "/download/artifact?job=missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_processing_log() {
        let tapp = test_app(StubPipeline::ok());
        post_upload(tapp.app.clone(), "J1", &[("a.pdf", "x")]).await;
        wait_settled(&tapp.state, "J1").await;

        let (status, body) = get(tapp.app, "/download/processing_log?job=J1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Processed: a.pdf"));
    }

    #[tokio::test]
    async fn test_download_move_log() {
        let tapp = test_app(StubPipeline::ok());

        // Before any admission there is nothing to download
        let (status, _) = get(tapp.app.clone(), "/download/move_log").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        post_upload(tapp.app.clone(), "J1", &[("a.pdf", "x")]).await;
        wait_settled(&tapp.state, "J1").await;

        let (status, body) = get(tapp.app, "/download/move_log").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Uploaded a.pdf to queued/J1"));
        assert!(body.contains("moved to completed"));
    }

    #[tokio::test]
    async fn test_downloads_with_no_history_are_404() {
        let tapp = test_app(StubPipeline::ok());
        let (status, _) = get(tapp.app.clone(), "/download/artifact").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(tapp.app, "/download/processing_log").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ========================================================================
    // Job Status Tests
    // ========================================================================

    #[tokio::test]
    async fn test_job_status_unknown_is_404() {
        let tapp = test_app(StubPipeline::ok());
        let (status, body) = get(tapp.app, "/api/jobs/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Not found");
    }
}
