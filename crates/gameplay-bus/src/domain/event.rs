//! # Events
//!
//! The value carried through the bus. Once published, an event is owned by
//! exactly one priority bucket (or by the dispatcher while it is being
//! delivered); publishers never see it again.

use super::payload::{Payload, PayloadKind};
use super::priority::Priority;
use crate::error::BusError;
use crate::SOURCE_NAME_MAX;

/// Identifier of an event type. Ranges are grouped by subsystem.
pub type EventTypeId = u32;

/// Well-known gameplay event types.
pub mod event_types {
    use super::EventTypeId;

    // Core system events
    pub const ENTITY_CREATED: EventTypeId = 0x0001;
    pub const ENTITY_DESTROYED: EventTypeId = 0x0002;
    pub const ENTITY_MODIFIED: EventTypeId = 0x0003;

    // Player events
    pub const PLAYER_MOVED: EventTypeId = 0x0101;
    pub const PLAYER_ATTACKED: EventTypeId = 0x0102;
    pub const PLAYER_EQUIPPED: EventTypeId = 0x0103;
    pub const PLAYER_SKILLED: EventTypeId = 0x0104;

    // Combat events
    pub const DAMAGE_DEALT: EventTypeId = 0x0201;
    pub const DAMAGE_TAKEN: EventTypeId = 0x0202;
    pub const CRITICAL_HIT: EventTypeId = 0x0203;
    pub const STATUS_APPLIED: EventTypeId = 0x0204;

    // Progression events
    pub const XP_GAINED: EventTypeId = 0x0301;
    pub const LEVEL_UP: EventTypeId = 0x0302;
    pub const SKILL_UNLOCKED: EventTypeId = 0x0303;
    pub const MASTERY_INCREASED: EventTypeId = 0x0304;

    // Economy events
    pub const ITEM_DROPPED: EventTypeId = 0x0401;
    pub const ITEM_PICKED_UP: EventTypeId = 0x0402;
    pub const TRADE_COMPLETED: EventTypeId = 0x0403;
    pub const CURRENCY_CHANGED: EventTypeId = 0x0404;

    // World events
    pub const AREA_ENTERED: EventTypeId = 0x0501;
    pub const AREA_EXITED: EventTypeId = 0x0502;
    pub const RESOURCE_SPAWNED: EventTypeId = 0x0503;
    pub const STRUCTURE_GENERATED: EventTypeId = 0x0504;

    // System events
    pub const CONFIG_RELOADED: EventTypeId = 0x0601;
    pub const SAVE_COMPLETED: EventTypeId = 0x0602;
    pub const ERROR_OCCURRED: EventTypeId = 0x0603;
    pub const PERFORMANCE_ALERT: EventTypeId = 0x0604;

    /// Every well-known type with its registry name, in id order.
    pub const WELL_KNOWN: [(EventTypeId, &str); 27] = [
        (ENTITY_CREATED, "ENTITY_CREATED"),
        (ENTITY_DESTROYED, "ENTITY_DESTROYED"),
        (ENTITY_MODIFIED, "ENTITY_MODIFIED"),
        (PLAYER_MOVED, "PLAYER_MOVED"),
        (PLAYER_ATTACKED, "PLAYER_ATTACKED"),
        (PLAYER_EQUIPPED, "PLAYER_EQUIPPED"),
        (PLAYER_SKILLED, "PLAYER_SKILLED"),
        (DAMAGE_DEALT, "DAMAGE_DEALT"),
        (DAMAGE_TAKEN, "DAMAGE_TAKEN"),
        (CRITICAL_HIT, "CRITICAL_HIT"),
        (STATUS_APPLIED, "STATUS_APPLIED"),
        (XP_GAINED, "XP_GAINED"),
        (LEVEL_UP, "LEVEL_UP"),
        (SKILL_UNLOCKED, "SKILL_UNLOCKED"),
        (MASTERY_INCREASED, "MASTERY_INCREASED"),
        (ITEM_DROPPED, "ITEM_DROPPED"),
        (ITEM_PICKED_UP, "ITEM_PICKED_UP"),
        (TRADE_COMPLETED, "TRADE_COMPLETED"),
        (CURRENCY_CHANGED, "CURRENCY_CHANGED"),
        (AREA_ENTERED, "AREA_ENTERED"),
        (AREA_EXITED, "AREA_EXITED"),
        (RESOURCE_SPAWNED, "RESOURCE_SPAWNED"),
        (STRUCTURE_GENERATED, "STRUCTURE_GENERATED"),
        (CONFIG_RELOADED, "CONFIG_RELOADED"),
        (SAVE_COMPLETED, "SAVE_COMPLETED"),
        (ERROR_OCCURRED, "ERROR_OCCURRED"),
        (PERFORMANCE_ALERT, "PERFORMANCE_ALERT"),
    ];
}

/// Payload kind a well-known event type carries, if it has a structured one.
///
/// Types without a structured layout (and custom ids) return `None`.
#[must_use]
pub fn expected_payload_kind(type_id: EventTypeId) -> Option<PayloadKind> {
    use event_types::*;
    let kind = match type_id {
        ENTITY_CREATED | ENTITY_DESTROYED | ENTITY_MODIFIED => PayloadKind::Entity,
        PLAYER_MOVED => PayloadKind::PlayerMoved,
        PLAYER_ATTACKED => PayloadKind::PlayerAttacked,
        PLAYER_EQUIPPED => PayloadKind::PlayerEquipped,
        DAMAGE_DEALT | DAMAGE_TAKEN | CRITICAL_HIT => PayloadKind::Damage,
        XP_GAINED => PayloadKind::XpGained,
        LEVEL_UP => PayloadKind::LevelUp,
        ITEM_DROPPED => PayloadKind::ItemDropped,
        ITEM_PICKED_UP => PayloadKind::ItemPickedUp,
        AREA_ENTERED | AREA_EXITED => PayloadKind::AreaTransition,
        CONFIG_RELOADED => PayloadKind::ConfigReloaded,
        SAVE_COMPLETED => PayloadKind::SaveCompleted,
        ERROR_OCCURRED => PayloadKind::ErrorOccurred,
        _ => return None,
    };
    Some(kind)
}

/// Validate a payload against the event type it is published under.
///
/// Well-known types accept their structured kind or a raw encoding. Custom
/// ids accept anything. Floating-point fields must be finite.
///
/// # Errors
///
/// `InvalidPayload` describing the mismatch.
pub fn validate_payload(type_id: EventTypeId, payload: &Payload) -> Result<(), BusError> {
    let kind = payload.kind();
    if let Some(expected) = expected_payload_kind(type_id) {
        if kind != expected && kind != PayloadKind::Raw {
            return Err(BusError::InvalidPayload {
                type_id,
                reason: format!("expected {expected:?} payload, got {kind:?}"),
            });
        }
    }
    payload
        .check_values()
        .map_err(|reason| BusError::InvalidPayload {
            type_id,
            reason: reason.to_string(),
        })
}

/// Short fixed-capacity name of the publishing system.
pub type SourceName = super::payload::FixedStr<SOURCE_NAME_MAX>;

/// Where an event is in its dispatch life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Waiting in its priority bucket.
    #[default]
    Queued,
    /// Owned by the dispatcher, subscribers being invoked.
    Dispatching,
    /// Failed an attempt and was put back at the front of its bucket.
    Retry,
    /// All subscribers accepted it.
    Done,
    /// Retries exhausted, deadline missed or no room to requeue.
    Dropped,
}

/// A published event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub type_id: EventTypeId,
    pub priority: Priority,
    pub payload: Payload,
    pub source_system_id: u32,
    pub source_name: SourceName,
    /// Capture time on the bus clock.
    pub timestamp_us: u64,
    /// Globally increasing across all published events.
    pub sequence_number: u64,
    /// 0 means no deadline.
    pub deadline_us: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub state: DispatchState,
}

impl Event {
    /// True when the event carries a deadline.
    #[must_use]
    pub fn has_deadline(&self) -> bool {
        self.deadline_us != 0
    }

    /// Deadline used for earliest-deadline-first ordering.
    ///
    /// Events without a deadline sort after every event that has one.
    #[must_use]
    pub fn effective_deadline(&self) -> u64 {
        if self.has_deadline() {
            self.deadline_us
        } else {
            u64::MAX
        }
    }

    /// True when the deadline exists and `now_us` is past it.
    #[must_use]
    pub fn is_expired(&self, now_us: u64) -> bool {
        self.has_deadline() && now_us > self.deadline_us
    }

    /// True once the event has reached a terminal state.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        matches!(self.state, DispatchState::Done | DispatchState::Dropped)
    }
}

/// Caller-side description of an event, used by batch publishing.
///
/// Sequence number, timestamp and retry bookkeeping are assigned by the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub type_id: EventTypeId,
    pub payload: Payload,
    pub priority: Priority,
    pub source_system_id: u32,
    pub source_name: SourceName,
    pub deadline_us: u64,
}

impl EventDraft {
    /// Draft with `Normal` priority, no source and no deadline.
    #[must_use]
    pub fn new(type_id: EventTypeId, payload: Payload) -> Self {
        Self {
            type_id,
            payload,
            priority: Priority::Normal,
            source_system_id: 0,
            source_name: SourceName::default(),
            deadline_us: 0,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_source(mut self, system_id: u32, name: &str) -> Self {
        self.source_system_id = system_id;
        self.source_name = SourceName::new(name);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline_us: u64) -> Self {
        self.deadline_us = deadline_us;
        self
    }
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            type_id: event.type_id,
            payload: event.payload,
            priority: event.priority,
            source_system_id: event.source_system_id,
            source_name: event.source_name,
            deadline_us: event.deadline_us,
        }
    }
}
