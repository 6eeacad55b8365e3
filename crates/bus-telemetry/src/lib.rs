//! # Bus Telemetry
//!
//! Observability for the gameplay event bus.
//!
//! ## Components
//!
//! - **Logging**: `tracing` subscriber with env filter, human or JSON output
//! - **Metrics**: Prometheus gauges mirroring [`gameplay_bus::BusStats`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bus_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let metrics = init_telemetry(&TelemetryConfig::from_env())?;
//! // once per frame
//! if let Some(metrics) = &metrics {
//!     metrics.observe(&bus.stats());
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GAMEBUS_SERVICE_NAME` | `gameplay-bus` | Service name in logs |
//! | `GAMEBUS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `GAMEBUS_JSON_LOGS` | `false` | JSON log lines |
//! | `GAMEBUS_METRICS` | `true` | Register Prometheus gauges |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    encode_metrics, observe_bus_stats, register_metrics, MetricsHandle, ACTIVE_SUBSCRIBERS,
    DEADLINES_MISSED, EVENTS_DROPPED, EVENTS_FAILED, EVENTS_PROCESSED, EVENTS_PUBLISHED,
    EVENTS_RETRIED, LATENCY_AVERAGE, LATENCY_PEAK, PROCESSING_TIME, QUEUE_DEPTH,
    QUEUE_DEPTH_PEAK, REGISTRATIONS_REJECTED, REGISTRY, SUBSCRIPTIONS_REJECTED, SUCCESS_RATE,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and, when enabled, register the bus gauges.
///
/// Returns `None` for the metrics handle when `metrics_enabled` is off.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<MetricsHandle>, TelemetryError> {
    init_logging(config)?;
    if config.metrics_enabled {
        register_metrics().map(Some)
    } else {
        tracing::debug!("Prometheus metrics disabled");
        Ok(None)
    }
}
