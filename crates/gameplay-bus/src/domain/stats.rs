//! # Bus Statistics
//!
//! Running counters and latency aggregation. Lives under the bus lock, so
//! plain integers suffice; callers get copies via [`BusStats`].

use serde::{Deserialize, Serialize};

/// Snapshot of bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BusStats {
    pub events_published: u64,
    pub events_processed: u64,
    /// Rejected for capacity, or unable to be requeued for a retry.
    pub events_dropped: u64,
    /// Retries exhausted or deadline missed.
    pub events_failed: u64,
    /// Failed attempts that were put back in the queue.
    pub events_retried: u64,
    pub deadlines_missed: u64,
    pub subscriptions_rejected: u64,
    pub registrations_rejected: u64,
    pub total_processing_time_us: u64,
    pub current_queue_depth: u32,
    pub max_queue_depth_reached: u32,
    pub average_latency_us: f64,
    pub peak_latency_us: f64,
    /// Always the live subscription count.
    pub active_subscribers: u32,
}

impl BusStats {
    /// Share of dispatched events that ended processed rather than failed.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let finished = self.events_processed + self.events_failed;
        if finished == 0 {
            return 1.0;
        }
        self.events_processed as f64 / finished as f64
    }
}

/// Mutable collector behind [`BusStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    stats: BusStats,
    latency_samples: u64,
}

impl StatsCollector {
    pub fn on_published(&mut self, count: u64, depth_after: usize) {
        self.stats.events_published += count;
        self.observe_depth(depth_after);
    }

    pub fn on_dropped(&mut self) {
        self.stats.events_dropped += 1;
    }

    pub fn on_dropped_many(&mut self, count: u64) {
        self.stats.events_dropped += count;
    }

    pub fn on_retried(&mut self) {
        self.stats.events_retried += 1;
    }

    pub fn on_failed(&mut self) {
        self.stats.events_failed += 1;
    }

    pub fn on_deadline_missed(&mut self) {
        self.stats.deadlines_missed += 1;
        self.stats.events_failed += 1;
    }

    pub fn on_subscription_rejected(&mut self) {
        self.stats.subscriptions_rejected += 1;
    }

    pub fn on_registration_rejected(&mut self) {
        self.stats.registrations_rejected += 1;
    }

    pub fn on_processed(&mut self) {
        self.stats.events_processed += 1;
    }

    pub fn add_processing_time(&mut self, elapsed_us: u64) {
        self.stats.total_processing_time_us += elapsed_us;
    }

    /// Fold a publish-to-completion latency into the running mean and peak.
    pub fn record_latency(&mut self, latency_us: u64) {
        let latency = latency_us as f64;
        self.latency_samples += 1;
        let n = self.latency_samples as f64;
        self.stats.average_latency_us += (latency - self.stats.average_latency_us) / n;
        if latency > self.stats.peak_latency_us {
            self.stats.peak_latency_us = latency;
        }
    }

    pub fn observe_depth(&mut self, depth: usize) {
        let depth = u32::try_from(depth).unwrap_or(u32::MAX);
        self.stats.current_queue_depth = depth;
        if depth > self.stats.max_queue_depth_reached {
            self.stats.max_queue_depth_reached = depth;
        }
    }

    /// Zero everything. The live counts are filled in by [`Self::snapshot`].
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self, queue_depth: usize, live_subscriptions: usize) -> BusStats {
        BusStats {
            current_queue_depth: u32::try_from(queue_depth).unwrap_or(u32::MAX),
            active_subscribers: u32::try_from(live_subscriptions).unwrap_or(u32::MAX),
            ..self.stats
        }
    }
}
