//! Progression and combat → on-screen toasts.
//!
//! Toasts are rate limited per subscription so a burst of critical hits does
//! not flood the screen. Skipped events are not failures; the bus just does
//! not call the handler for them.

use gameplay_bus::{
    event_types, BusError, Event, EventSubscriber, Payload, SubscriptionId, SubscriptionOptions,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use super::UI_SYSTEM_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    LevelUp,
    CriticalHit,
}

/// One toast shown to the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
    /// Publish time of the triggering event
    pub timestamp_us: u64,
}

#[derive(Debug)]
struct Log {
    entries: VecDeque<Notification>,
    capacity: usize,
    shown: u64,
}

/// Turns `LEVEL_UP` and `CRITICAL_HIT` into a bounded toast log.
#[derive(Debug, Clone)]
pub struct UiNotificationBridge {
    log: Arc<Mutex<Log>>,
    per_second: u32,
}

impl UiNotificationBridge {
    /// Keep the last `capacity` toasts, at most `per_second` per event type.
    #[must_use]
    pub fn new(capacity: usize, per_second: u32) -> Self {
        Self {
            log: Arc::new(Mutex::new(Log {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                shown: 0,
            })),
            per_second,
        }
    }

    /// Subscribe to level-ups and critical hits, both rate limited.
    pub fn attach<S: EventSubscriber>(&self, bus: &S) -> Result<Vec<SubscriptionId>, BusError> {
        [event_types::LEVEL_UP, event_types::CRITICAL_HIT]
            .into_iter()
            .map(|type_id| {
                let this = self.clone();
                bus.subscribe_with(
                    type_id,
                    UI_SYSTEM_ID,
                    Arc::new(move |e: &Event| this.on_event(e)),
                    SubscriptionOptions::new().with_rate_limit(self.per_second),
                )
            })
            .collect()
    }

    /// Render a toast for `event`. Never fails.
    pub fn on_event(&self, event: &Event) -> bool {
        let notification = match (event.type_id, event.payload) {
            (event_types::LEVEL_UP, Payload::LevelUp(p)) => Notification {
                kind: NotificationKind::LevelUp,
                text: format!("Player {} reached level {}", p.player_id, p.new_level),
                timestamp_us: event.timestamp_us,
            },
            (event_types::CRITICAL_HIT, Payload::Damage(p)) => Notification {
                kind: NotificationKind::CriticalHit,
                text: format!("Critical hit! {:.0} damage", p.damage_amount),
                timestamp_us: event.timestamp_us,
            },
            _ => {
                debug!(event_type = event.type_id, "No toast for event");
                return true;
            }
        };

        info!(kind = ?notification.kind, text = %notification.text, "Toast");
        let mut log = self.log.lock();
        if log.capacity == 0 {
            return true;
        }
        if log.entries.len() == log.capacity {
            log.entries.pop_front();
        }
        log.entries.push_back(notification);
        log.shown += 1;
        true
    }

    /// Logged toasts, oldest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().entries.iter().cloned().collect()
    }

    /// Toasts shown since creation, including evicted ones.
    #[must_use]
    pub fn shown(&self) -> u64 {
        self.log.lock().shown
    }
}
