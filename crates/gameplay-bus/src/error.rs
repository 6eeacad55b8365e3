//! Error types for the gameplay event bus.
//!
//! Three kinds of failure reach callers:
//!
//! - **Validation**: the request is malformed; nothing was changed.
//! - **Capacity**: a bounded structure is full; the matching drop counter was
//!   incremented and the caller is expected to back off.
//! - **Runtime**: async draining could not be started or a worker died.
//!
//! Subscriber callbacks that fail are never surfaced here: the dispatcher
//! retries them and eventually counts the event as failed.

use crate::domain::{EventTypeId, SubscriptionId};
use thiserror::Error;

/// Errors returned by bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Event bus not initialized")]
    NotInitialized,

    #[error("Invalid event priority: {0}")]
    InvalidPriority(u8),

    #[error("Invalid payload for event type {type_id:#06x}: {reason}")]
    InvalidPayload { type_id: EventTypeId, reason: String },

    #[error("Batch is empty")]
    EmptyBatch,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Subscription {0} not found")]
    UnknownSubscription(SubscriptionId),

    #[error("Replay window {start}..{end} outside history of {len} events")]
    ReplayOutOfRange { start: usize, end: usize, len: usize },

    #[error("Event queue full at {capacity} events")]
    QueueFull { capacity: usize },

    #[error("Insufficient queue capacity: {requested} requested, {available} available")]
    BatchTooLarge { requested: usize, available: usize },

    #[error("Subscriber table full at {limit} subscriptions")]
    SubscriberTableFull { limit: usize },

    #[error("Event type registry full at {limit} entries")]
    RegistryFull { limit: usize },

    #[error("No tokio runtime available for async draining")]
    NoAsyncRuntime,

    #[error("Drain worker failed: {0}")]
    WorkerFailed(String),
}

impl BusError {
    /// True for errors caused by a full bounded structure.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::QueueFull { .. }
                | Self::BatchTooLarge { .. }
                | Self::SubscriberTableFull { .. }
                | Self::RegistryFull { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BusError::QueueFull { capacity: 4096 };
        assert!(err.to_string().contains("4096"));

        let err = BusError::InvalidPayload {
            type_id: 0x0201,
            reason: "damage must be finite".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x0201"));
        assert!(msg.contains("finite"));
    }

    #[test]
    fn test_capacity_classification() {
        assert!(BusError::QueueFull { capacity: 1 }.is_capacity());
        assert!(BusError::RegistryFull { limit: 512 }.is_capacity());
        assert!(!BusError::NotInitialized.is_capacity());
        assert!(!BusError::EmptyBatch.is_capacity());
    }
}
