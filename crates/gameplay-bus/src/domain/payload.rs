//! # Event Payloads
//!
//! A payload is a tagged variant sized to its largest case (the 512-byte raw
//! buffer). Every variant is `Copy` and stores text in fixed-capacity inline
//! buffers, so queueing an event never allocates.

use crate::error::BusError;
use crate::MAX_EVENT_PAYLOAD_SIZE;
use std::fmt;

/// Fixed-capacity UTF-8 string stored inline.
///
/// Input longer than `N` bytes is truncated on a character boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedStr<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedStr<N> {
    /// Build from `s`, truncating to at most `N` bytes.
    #[must_use]
    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; N];
        bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
        Self { bytes, len: end }
    }

    /// Borrow the stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// Stored length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes this buffer holds.
    #[must_use]
    pub const fn capacity() -> usize {
        N
    }
}

impl<const N: usize> Default for FixedStr<N> {
    fn default() -> Self {
        Self {
            bytes: [0u8; N],
            len: 0,
        }
    }
}

impl<const N: usize> fmt::Debug for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for FixedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> From<&str> for FixedStr<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque bytes for custom event encodings.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawPayload {
    data: [u8; MAX_EVENT_PAYLOAD_SIZE],
    len: u16,
}

impl RawPayload {
    /// Copy `bytes` into a raw payload.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `bytes` exceeds the payload capacity.
    pub fn new(bytes: &[u8]) -> Result<Self, BusError> {
        if bytes.len() > MAX_EVENT_PAYLOAD_SIZE {
            return Err(BusError::InvalidArgument(format!(
                "raw payload of {} bytes exceeds {} byte limit",
                bytes.len(),
                MAX_EVENT_PAYLOAD_SIZE
            )));
        }
        let mut data = [0u8; MAX_EVENT_PAYLOAD_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            data,
            len: bytes.len() as u16,
        })
    }

    /// The stored bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPayload")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Default for RawPayload {
    fn default() -> Self {
        Self {
            data: [0u8; MAX_EVENT_PAYLOAD_SIZE],
            len: 0,
        }
    }
}

// =============================================================================
// PAYLOAD CASES
// =============================================================================

/// Entity lifecycle (created / destroyed / modified).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntityPayload {
    pub entity_id: u32,
    pub entity_type: u32,
    /// Handle into the owning system's storage.
    pub entity_handle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerMovedPayload {
    pub x: f32,
    pub y: f32,
    pub prev_x: f32,
    pub prev_y: f32,
    pub area_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerAttackedPayload {
    pub target_entity_id: u32,
    pub weapon_id: u32,
    pub skill_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerEquippedPayload {
    pub item_id: u32,
    pub slot_type: u8,
    pub slot_index: u8,
    /// `false` means the item was unequipped.
    pub equipped: bool,
}

/// Damage dealt, damage taken and critical hits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamagePayload {
    pub source_entity_id: u32,
    pub target_entity_id: u32,
    pub damage_amount: f32,
    pub damage_type: u32,
    pub is_critical: bool,
    /// Set when this hit killed the target.
    pub is_killing_blow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XpGainedPayload {
    pub player_id: u32,
    pub xp_amount: u32,
    /// Monster, quest, crafting...
    pub source_type: u32,
    pub source_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelUpPayload {
    pub player_id: u32,
    pub old_level: u8,
    pub new_level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ItemDroppedPayload {
    pub item_id: u32,
    pub x: f32,
    pub y: f32,
    pub area_id: u32,
    pub source_entity_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ItemPickedUpPayload {
    pub item_id: u32,
    pub player_id: u32,
    pub auto_pickup: bool,
}

/// Area entered / exited.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AreaTransitionPayload {
    pub area_id: u32,
    pub player_id: u32,
    pub previous_area_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfigReloadedPayload {
    pub config_file: FixedStr<64>,
    pub success: bool,
    pub error_message: FixedStr<128>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SaveCompletedPayload {
    pub save_file: FixedStr<64>,
    pub success: bool,
    pub save_time_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorOccurredPayload {
    pub error_code: u32,
    pub system_id: u32,
    pub error_message: FixedStr<128>,
    pub function_name: FixedStr<64>,
}

/// Discriminant of a [`Payload`], used for type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Entity,
    PlayerMoved,
    PlayerAttacked,
    PlayerEquipped,
    Damage,
    XpGained,
    LevelUp,
    ItemDropped,
    ItemPickedUp,
    AreaTransition,
    ConfigReloaded,
    SaveCompleted,
    ErrorOccurred,
    Raw,
}

/// Data carried by an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Entity(EntityPayload),
    PlayerMoved(PlayerMovedPayload),
    PlayerAttacked(PlayerAttackedPayload),
    PlayerEquipped(PlayerEquippedPayload),
    Damage(DamagePayload),
    XpGained(XpGainedPayload),
    LevelUp(LevelUpPayload),
    ItemDropped(ItemDroppedPayload),
    ItemPickedUp(ItemPickedUpPayload),
    AreaTransition(AreaTransitionPayload),
    ConfigReloaded(ConfigReloadedPayload),
    SaveCompleted(SaveCompletedPayload),
    ErrorOccurred(ErrorOccurredPayload),
    Raw(RawPayload),
}

impl Payload {
    /// The case this payload holds.
    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Entity(_) => PayloadKind::Entity,
            Self::PlayerMoved(_) => PayloadKind::PlayerMoved,
            Self::PlayerAttacked(_) => PayloadKind::PlayerAttacked,
            Self::PlayerEquipped(_) => PayloadKind::PlayerEquipped,
            Self::Damage(_) => PayloadKind::Damage,
            Self::XpGained(_) => PayloadKind::XpGained,
            Self::LevelUp(_) => PayloadKind::LevelUp,
            Self::ItemDropped(_) => PayloadKind::ItemDropped,
            Self::ItemPickedUp(_) => PayloadKind::ItemPickedUp,
            Self::AreaTransition(_) => PayloadKind::AreaTransition,
            Self::ConfigReloaded(_) => PayloadKind::ConfigReloaded,
            Self::SaveCompleted(_) => PayloadKind::SaveCompleted,
            Self::ErrorOccurred(_) => PayloadKind::ErrorOccurred,
            Self::Raw(_) => PayloadKind::Raw,
        }
    }

    /// Build a raw payload from bytes.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `bytes` exceeds the payload capacity.
    pub fn raw(bytes: &[u8]) -> Result<Self, BusError> {
        RawPayload::new(bytes).map(Self::Raw)
    }

    /// Check internal consistency (finite floats).
    ///
    /// Returns the reason on failure.
    pub fn check_values(&self) -> Result<(), &'static str> {
        let finite = match self {
            Self::PlayerMoved(p) => [p.x, p.y, p.prev_x, p.prev_y]
                .iter()
                .all(|v| v.is_finite()),
            Self::Damage(p) => p.damage_amount.is_finite(),
            Self::ItemDropped(p) => p.x.is_finite() && p.y.is_finite(),
            Self::SaveCompleted(p) => p.save_time_seconds.is_finite(),
            _ => true,
        };
        if finite {
            Ok(())
        } else {
            Err("floating-point fields must be finite")
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::Raw(RawPayload::default())
    }
}
