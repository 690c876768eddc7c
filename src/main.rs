//! voxsplit server
//!
//! Binary entry point: parses CLI arguments, initializes tracing, warms the
//! process-wide scheduler and cache, and starts the HTTP server.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxsplit::{api, AppState, Config};

/// voxsplit - speaker diarization and separation service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Path to the ONNX segmentation model
    #[arg(long, value_name = "FILE")]
    segmentation_model: Option<PathBuf>,

    /// Path to the source-separation worker script
    #[arg(long, value_name = "FILE")]
    separation_script: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("voxsplit={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("voxsplit starting...");

    // Assemble configuration from defaults + CLI overrides
    let mut config = Config::default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model) = args.segmentation_model {
        config.segmentation_model = model;
    }
    if let Some(script) = args.separation_script {
        config.separation_script = script;
    }

    // Construct the process-wide scheduler and cache up front so their
    // background tasks (reaper, sweep) start with the server rather than on
    // the first request.
    let scheduler = voxsplit::scheduler::scheduler();
    voxsplit::cache::result_cache();
    info!(
        max_concurrent = scheduler.status().max_concurrent,
        max_queue_size = scheduler.status().max_queue_size,
        "Scheduler ready"
    );

    // Log scheduler lifecycle events for observability
    let mut events = scheduler.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::debug!(task_id = %event.task_id(), event = ?event, "scheduler event");
        }
    });

    let state = AppState::new(config);
    api::server::run(state).await?;

    Ok(())
}
