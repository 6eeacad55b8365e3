//! # Game Runtime
//!
//! Runs the scripted combat encounter on the gameplay event bus and prints a
//! JSON statistics summary.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GAMEBUS_FRAMES` | `120` | Frames to simulate |
//! | `GAMEBUS_SEED` | `24301` | Combat script seed |
//! | `GAMEBUS_STRATEGY` | `priority` | `fifo`, `priority` or `deadline` |
//! | `GAMEBUS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//!
//! See `BusConfig::from_env` and `TelemetryConfig::from_env` for the rest.

use anyhow::{Context, Result};
use bus_telemetry::{init_telemetry, TelemetryConfig};
use game_runtime::{GameRuntime, RuntimeConfig};
use gameplay_bus::BusConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::for_service("game-runtime");
    let metrics = init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let bus_config = BusConfig::from_env("GameRuntime");
    info!(
        bus = %bus_config.name,
        strategy = ?bus_config.processing_strategy,
        queue = bus_config.max_queue_size,
        frame_budget_us = bus_config.max_processing_time_per_frame_us,
        "Starting game runtime"
    );

    let drain_workers = bus_config.worker_thread_count.max(1);

    let mut runtime = GameRuntime::new(bus_config, RuntimeConfig::from_env(), metrics)?;
    runtime.run().context("Frame loop failed")?;

    // Whatever the last frame's budget left behind
    if runtime.bus().total_queue_depth() > 0 {
        let report = runtime
            .bus()
            .process_async(drain_workers)
            .context("Failed to start drain workers")?
            .join()
            .await
            .context("Drain workers failed")?;
        info!(
            workers = report.workers.len(),
            processed = report.total_processed(),
            failed = report.total_failed(),
            "Drained leftover events"
        );
    }

    let summary = runtime.summary();

    let json = serde_json::to_string_pretty(&summary).context("Failed to encode summary")?;
    println!("{json}");

    runtime.shutdown();
    Ok(())
}
