//! Prometheus gauges mirroring the bus statistics.
//!
//! All metrics follow the naming convention: `gamebus_<metric>[_<unit>]`
//!
//! Statistics are cumulative on the bus but can be reset at runtime, so
//! every value is exported as a gauge and overwritten from the latest
//! [`BusStats`] snapshot rather than incremented.

use gameplay_bus::BusStats;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // THROUGHPUT
    // =========================================================================

    pub static ref EVENTS_PUBLISHED: IntGauge = IntGauge::new(
        "gamebus_events_published",
        "Events accepted into the queue since the last stats reset"
    ).expect("metric creation failed");

    pub static ref EVENTS_PROCESSED: IntGauge = IntGauge::new(
        "gamebus_events_processed",
        "Events fully delivered to every eligible subscriber"
    ).expect("metric creation failed");

    pub static ref EVENTS_DROPPED: IntGauge = IntGauge::new(
        "gamebus_events_dropped",
        "Events rejected on a full queue or batch, or whose retry found no room"
    ).expect("metric creation failed");

    pub static ref EVENTS_FAILED: IntGauge = IntGauge::new(
        "gamebus_events_failed",
        "Events that could not be delivered"
    ).expect("metric creation failed");

    pub static ref EVENTS_RETRIED: IntGauge = IntGauge::new(
        "gamebus_events_retried",
        "Failed dispatch attempts that were requeued"
    ).expect("metric creation failed");

    pub static ref DEADLINES_MISSED: IntGauge = IntGauge::new(
        "gamebus_deadlines_missed",
        "Events dropped because their deadline passed before dispatch"
    ).expect("metric creation failed");

    // =========================================================================
    // CAPACITY
    // =========================================================================

    pub static ref SUBSCRIPTIONS_REJECTED: IntGauge = IntGauge::new(
        "gamebus_subscriptions_rejected",
        "Subscribe calls refused because the table was full"
    ).expect("metric creation failed");

    pub static ref REGISTRATIONS_REJECTED: IntGauge = IntGauge::new(
        "gamebus_registrations_rejected",
        "Type registrations refused because the registry was full"
    ).expect("metric creation failed");

    pub static ref QUEUE_DEPTH: IntGauge = IntGauge::new(
        "gamebus_queue_depth",
        "Events currently waiting across all priority buckets"
    ).expect("metric creation failed");

    pub static ref QUEUE_DEPTH_PEAK: IntGauge = IntGauge::new(
        "gamebus_queue_depth_peak",
        "Highest queue depth observed"
    ).expect("metric creation failed");

    pub static ref ACTIVE_SUBSCRIBERS: IntGauge = IntGauge::new(
        "gamebus_active_subscribers",
        "Live subscriptions"
    ).expect("metric creation failed");

    // =========================================================================
    // TIMING
    // =========================================================================

    pub static ref PROCESSING_TIME: IntGauge = IntGauge::new(
        "gamebus_processing_time_us",
        "Total wall time of dispatch attempts, selection through outcome"
    ).expect("metric creation failed");

    pub static ref LATENCY_AVERAGE: Gauge = Gauge::new(
        "gamebus_latency_average_us",
        "Mean publish-to-dispatch latency"
    ).expect("metric creation failed");

    pub static ref LATENCY_PEAK: Gauge = Gauge::new(
        "gamebus_latency_peak_us",
        "Largest publish-to-dispatch latency"
    ).expect("metric creation failed");

    pub static ref SUCCESS_RATE: Gauge = Gauge::new(
        "gamebus_success_rate",
        "Processed events as a fraction of finished (processed or failed) events"
    ).expect("metric creation failed");
}

/// Handle returned once the gauges are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

impl MetricsHandle {
    /// Copy a statistics snapshot into the gauges.
    pub fn observe(&self, stats: &BusStats) {
        observe_bus_stats(stats);
    }

    /// Current metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        encode_metrics()
    }
}

/// Register all bus gauges with [`REGISTRY`].
///
/// Calling it again is harmless: already-registered gauges are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENTS_PROCESSED.clone()),
        Box::new(EVENTS_DROPPED.clone()),
        Box::new(EVENTS_FAILED.clone()),
        Box::new(EVENTS_RETRIED.clone()),
        Box::new(DEADLINES_MISSED.clone()),
        Box::new(SUBSCRIPTIONS_REJECTED.clone()),
        Box::new(REGISTRATIONS_REJECTED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(QUEUE_DEPTH_PEAK.clone()),
        Box::new(ACTIVE_SUBSCRIBERS.clone()),
        Box::new(PROCESSING_TIME.clone()),
        Box::new(LATENCY_AVERAGE.clone()),
        Box::new(LATENCY_PEAK.clone()),
        Box::new(SUCCESS_RATE.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Overwrite every gauge from `stats`.
pub fn observe_bus_stats(stats: &BusStats) {
    EVENTS_PUBLISHED.set(saturating_i64(stats.events_published));
    EVENTS_PROCESSED.set(saturating_i64(stats.events_processed));
    EVENTS_DROPPED.set(saturating_i64(stats.events_dropped));
    EVENTS_FAILED.set(saturating_i64(stats.events_failed));
    EVENTS_RETRIED.set(saturating_i64(stats.events_retried));
    DEADLINES_MISSED.set(saturating_i64(stats.deadlines_missed));
    SUBSCRIPTIONS_REJECTED.set(saturating_i64(stats.subscriptions_rejected));
    REGISTRATIONS_REJECTED.set(saturating_i64(stats.registrations_rejected));
    QUEUE_DEPTH.set(i64::from(stats.current_queue_depth));
    QUEUE_DEPTH_PEAK.set(i64::from(stats.max_queue_depth_reached));
    ACTIVE_SUBSCRIBERS.set(i64::from(stats.active_subscribers));
    PROCESSING_TIME.set(saturating_i64(stats.total_processing_time_us));
    LATENCY_AVERAGE.set(stats.average_latency_us);
    LATENCY_PEAK.set(stats.peak_latency_us);
    SUCCESS_RATE.set(stats.success_rate());
}

/// Encode the registry in Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_is_ok() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_observe_and_encode() {
        let handle = register_metrics().unwrap();
        let stats = BusStats {
            events_published: 10,
            events_processed: 7,
            events_failed: 3,
            current_queue_depth: 3,
            peak_latency_us: 42.5,
            ..BusStats::default()
        };
        handle.observe(&stats);

        assert_eq!(EVENTS_PUBLISHED.get(), 10);
        assert_eq!(QUEUE_DEPTH.get(), 3);
        assert!((SUCCESS_RATE.get() - 0.7).abs() < f64::EPSILON);

        let text = handle.encode().unwrap();
        assert!(text.contains("gamebus_events_published"));
        assert!(text.contains("gamebus_latency_peak_us 42.5"));
    }

    #[test]
    fn test_saturating_conversion() {
        assert_eq!(saturating_i64(u64::MAX), i64::MAX);
        assert_eq!(saturating_i64(5), 5);
    }
}
