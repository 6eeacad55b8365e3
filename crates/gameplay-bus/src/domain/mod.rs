//! # Domain Layer - Gameplay Event Bus
//!
//! Pure data structures: no locking, no clocks, no handler invocation.
//!
//! ## Components
//!
//! - `event`: Event value, well-known type ids, payload validation
//! - `payload`: Fixed-capacity tagged payload variants
//! - `priority`: Priority levels and processing strategies
//! - `queue`: Five-bucket priority queue set
//! - `subscription`: Subscription table with rate-limit windows
//! - `registry`: Type id → debug name table
//! - `stats`: Counters and latency aggregation
//! - `replay`: Circular replay history
//! - `config`: Bus configuration

pub mod config;
pub mod event;
pub mod payload;
pub mod priority;
pub mod queue;
pub mod registry;
pub mod replay;
pub mod stats;
pub mod subscription;

pub use config::*;
pub use event::*;
pub use payload::*;
pub use priority::*;
pub use queue::PriorityQueueSet;
pub use registry::{Registration, TypeRegistry, UNKNOWN_EVENT_TYPE};
pub use replay::ReplayRecorder;
pub use stats::BusStats;
pub use subscription::{
    Admission, Candidate, SubscriptionId, SubscriptionOptions, SubscriptionStats,
    SubscriptionTable, RATE_WINDOW_US,
};
