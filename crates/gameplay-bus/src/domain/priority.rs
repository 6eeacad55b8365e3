//! # Priority Levels and Processing Strategies
//!
//! Five ordered urgency levels, one FIFO bucket each. Lower discriminant means
//! more urgent: `Critical` is drained before `Background` under the
//! `Priority` strategy.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of priority buckets.
pub const PRIORITY_COUNT: usize = 5;

/// Event urgency.
///
/// Ordering follows urgency: `Critical < High < Normal < Low < Background`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Priority {
    /// Must be processed immediately.
    Critical = 0,
    /// Processed before normal traffic.
    High = 1,
    /// Standard gameplay traffic.
    #[default]
    Normal = 2,
    /// Processed when the queue is light.
    Low = 3,
    /// Processed during idle time.
    Background = 4,
}

impl Priority {
    /// All levels, most urgent first.
    pub const ALL: [Priority; PRIORITY_COUNT] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Background,
    ];

    /// Bucket index of this level.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// True when `self` is at least as urgent as `min`.
    ///
    /// A subscription with `min_priority = Normal` accepts Critical, High and
    /// Normal events and skips Low and Background ones.
    #[must_use]
    pub fn meets(self, min: Priority) -> bool {
        self <= min
    }

    /// Human-readable label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Background => "background",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = BusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::ALL
            .get(value as usize)
            .copied()
            .ok_or(BusError::InvalidPriority(value))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the dispatcher picks the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// Globally oldest sequence number first, regardless of bucket.
    Fifo,
    /// Most urgent non-empty bucket first, FIFO inside a bucket.
    #[default]
    Priority,
    /// Earliest deadline first; events without a deadline sort last,
    /// ties broken by sequence number.
    Deadline,
}

impl std::str::FromStr for ProcessingStrategy {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "priority" => Ok(Self::Priority),
            "deadline" => Ok(Self::Deadline),
            other => Err(BusError::InvalidConfig(format!(
                "unknown processing strategy '{other}'"
            ))),
        }
    }
}
