//! # Gameplay Bridges
//!
//! Systems that only talk through the bus. Each bridge subscribes to the
//! events it reacts to and publishes its results back onto the bus.
//!
//! ```text
//! Combat ──DAMAGE_DEALT(killing blow)──→ CombatProgressionBridge
//!                                              │ XP_GAINED
//!                                              ▼
//!                                        CombatProgressionBridge
//!                                              │ LEVEL_UP
//!                                              ▼
//! Combat ──CRITICAL_HIT──────────────→ UiNotificationBridge (rate limited)
//! ```

pub mod combat_progression;
pub mod ui_notification;

pub use combat_progression::{CombatProgressionBridge, PlayerProgress, ProgressionRules};
pub use ui_notification::{Notification, NotificationKind, UiNotificationBridge};

/// System id of the progression bridge.
pub const PROGRESSION_SYSTEM_ID: u32 = 300;

/// System id of the UI notification bridge.
pub const UI_SYSTEM_ID: u32 = 900;
