//! # Game Runtime
//!
//! Headless host for the gameplay event bus.
//!
//! ## Startup Sequence
//!
//! 1. Load telemetry configuration and install logging
//! 2. Register Prometheus gauges (unless disabled)
//! 3. Build the bus configuration from the environment and initialize the bus
//! 4. Attach the gameplay bridges
//! 5. Run the frame loop, then print a stats summary and shut down
//!
//! ## Modules
//!
//! - `bridges/` - gameplay systems that only talk through the bus
//! - `script` - seeded combat encounter feeding the frame loop
//! - `runtime` - frame loop, run summary

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bridges;
pub mod runtime;
pub mod script;

pub use bridges::{
    CombatProgressionBridge, Notification, NotificationKind, PlayerProgress, ProgressionRules,
    UiNotificationBridge,
};
pub use runtime::{FrameReport, GameRuntime, RunSummary, RuntimeConfig};
pub use script::{CombatScript, ScriptRules};
