use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use teslad::config::LoggingConfig;
use teslad::device::vehicle_devices;
use teslad::device::VehicleData;
use teslad::Config;
use teslad::Controller;
use teslad::Engine;
use teslad::SnapshotController;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Expose vehicle readings and controls as polled devices
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "teslad.toml")]
    config: PathBuf,

    /// Poll every device once, print the state as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_tracing(&config.logging);

    tracing::info!("teslad starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let controller = Arc::new(SnapshotController::new(
        config.controller.update_interval(),
    ));
    let shared: Arc<dyn Controller> = controller.clone();
    let (mut engine, handle) = Engine::new(config.engine.poll_interval());

    for path in &config.controller.snapshots {
        let document = SnapshotController::read_document(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let data = VehicleData::from_json(&document)
            .with_context(|| format!("Invalid snapshot {}", path.display()))?;
        controller.insert(document)?;

        for device in vehicle_devices(&data, &shared)? {
            engine.register_device(device);
        }
    }

    if args.once {
        engine.poll().await;
        let state = engine.state_snapshot();
        println!("{}", serde_json::to_string_pretty(&*state)?);
        return Ok(());
    }

    let engine_task = tokio::spawn(engine.run());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = config.api.listen.map(|addr| {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = teslad::api::serve(addr, handle, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        })
    });

    tracing::info!("All vehicles loaded, entering main loop");
    tracing::info!("Press Ctrl+C to exit");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    // Stopping the API drops its engine handle; dropping ours ends the engine loop
    let _ = shutdown_tx.send(());
    if let Some(task) = api_task {
        task.await.context("HTTP API task panicked")?;
    }
    drop(handle);
    engine_task.await.context("Engine task panicked")?;

    tracing::info!("teslad shutdown complete");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let targets = logging.overrides.iter().fold(
        Targets::new().with_default(LevelFilter::from(logging.level)),
        |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
    );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(targets)
        .init();
}
