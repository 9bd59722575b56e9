// crates/server/src/main.rs
//! Docgate server binary.
//!
//! Parses configuration, prepares the data root, wires the external
//! pipeline command, and serves the Axum app.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use docgate_core::{CommandPipeline, Layout};
use docgate_server::{create_app, AppState, Config, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    eprintln!("\ndocgate v{}\n", env!("CARGO_PKG_VERSION"));

    let layout = Layout::new(&config.data_dir, &config.artifact_name);
    layout
        .ensure()
        .with_context(|| format!("preparing data root {}", config.data_dir.display()))?;

    let pipeline = Arc::new(CommandPipeline::new(
        &config.pipeline_cmd,
        config.pipeline_args.clone(),
    ));

    let state = AppState::new(layout, pipeline, RuntimeConfig::from(&config));
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        pipeline_cmd = %config.pipeline_cmd.display(),
        "docgate listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
