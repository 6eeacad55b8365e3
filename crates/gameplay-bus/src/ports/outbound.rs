//! Outbound (driven) ports for the event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Microsecond clock used for timestamps, deadlines, rate windows and
/// time budgets.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Microseconds since an arbitrary fixed origin. Never decreases.
    fn now_us(&self) -> u64;
}

/// Default monotonic clock, measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now_us(&self) -> u64 {
        // +1 so that a freshly started clock never reports 0, which reads as
        // "no deadline" when used as one.
        u64::try_from(self.origin.elapsed().as_micros())
            .unwrap_or(u64::MAX)
            .saturating_add(1)
    }
}

/// Hand-driven clock for tests and deterministic simulations.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    time: AtomicU64,
}

impl ManualTimeSource {
    #[must_use]
    pub fn new(initial_us: u64) -> Self {
        Self {
            time: AtomicU64::new(initial_us),
        }
    }

    pub fn advance(&self, us: u64) {
        self.time.fetch_add(us, Ordering::SeqCst);
    }

    pub fn set(&self, us: u64) {
        self.time.store(us, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_us(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }
}
