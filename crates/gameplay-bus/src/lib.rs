//! # Gameplay Bus - In-Process Event Bus for Gameplay Systems
//!
//! Publish/subscribe backbone that decouples combat, progression, loot, UI
//! and world generation from one another.
//!
//! ## Architecture Rules
//!
//! - Gameplay systems talk to each other through the bus only
//! - Publishing is fire-and-forget: the publisher never learns the fate of
//!   an individual event
//! - One bus handle is created at startup and passed to every system
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐  publish()   ┌───────────────────────────┐
//! │   Combat     │ ───────────→ │ CRITICAL │ HIGH │ NORMAL  │
//! └──────────────┘              │ LOW      │ BACKGROUND     │
//!                               └─────────────┬─────────────┘
//!                                             │ process_sync() / process_frame()
//!                                             ▼
//!                               ┌───────────────────────────┐
//!                               │ subscriptions for type    │
//!                               │ priority → predicate →    │
//!                               │ rate limit → handler      │
//!                               └───────────────────────────┘
//!                                             │ any handler false
//!                                             ▼
//!                                   retry at bucket front, then drop
//! ```
//!
//! ## Module Structure
//!
//! - `domain/` - events, payloads, queue set, subscription table, registry,
//!   statistics, replay recorder, configuration
//! - `ports/` - handler capability, publisher/subscriber traits, clock
//! - `service/` - bus facade, dispatcher, async drain workers

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::{
    event_types, validate_payload, BusConfig, BusStats, DispatchState, Event, EventDraft,
    EventTypeId, Payload, PayloadKind, Priority, ProcessingStrategy, Registration,
    SubscriptionId, SubscriptionOptions, SubscriptionStats, UNKNOWN_EVENT_TYPE,
};
pub use error::BusError;
pub use ports::{
    EventHandler, EventPredicate, EventPublisher, EventSubscriber, ManualTimeSource,
    MonotonicTimeSource, TimeSource,
};
pub use service::{DrainHandle, DrainReport, EventBus, WorkerReport};

/// Maximum concurrently live subscriptions.
pub const MAX_EVENT_SUBSCRIBERS: usize = 256;

/// Default queue capacity across all priority buckets.
pub const MAX_EVENT_QUEUE_SIZE: usize = 4096;

/// Type registry capacity.
pub const MAX_EVENT_TYPES: usize = 512;

/// Largest payload, in bytes.
pub const MAX_EVENT_PAYLOAD_SIZE: usize = 512;

/// Bus and type names are stored in this many bytes including a terminator,
/// so at most `BUS_NAME_MAX - 1` bytes of text survive.
pub const BUS_NAME_MAX: usize = 64;

/// Capacity of an event's source name.
pub const SOURCE_NAME_MAX: usize = 32;

/// Dispatch attempts before an event is dropped as failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub const DEFAULT_REPLAY_HISTORY_DEPTH: usize = 1000;
