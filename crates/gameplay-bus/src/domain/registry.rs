//! # Event Type Registry
//!
//! Maps type ids to debug names. The first registration for an id wins.

use super::event::{event_types, EventTypeId};
use crate::error::BusError;
use crate::{BUS_NAME_MAX, MAX_EVENT_TYPES};
use std::collections::HashMap;

/// Name returned for ids that were never registered.
pub const UNKNOWN_EVENT_TYPE: &str = "UNKNOWN_EVENT_TYPE";

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The id was new and now carries the given name.
    Added,
    /// The id already had a name; it was kept.
    AlreadyRegistered,
}

/// Bounded id → name table.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    names: HashMap<EventTypeId, String>,
    capacity: usize,
}

impl TypeRegistry {
    /// Empty registry with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENT_TYPES)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: HashMap::with_capacity(capacity.min(MAX_EVENT_TYPES)),
            capacity,
        }
    }

    /// Registry pre-seeded with the well-known gameplay types.
    #[must_use]
    pub fn seeded() -> Self {
        let mut registry = Self::new();
        for (id, name) in event_types::WELL_KNOWN {
            registry.names.insert(id, name.to_string());
        }
        registry
    }

    /// Register `name` for `id`.
    ///
    /// Names longer than the limit are truncated on a character boundary.
    ///
    /// # Errors
    ///
    /// `RegistryFull` when `id` is new and the table is at capacity.
    pub fn register(&mut self, id: EventTypeId, name: &str) -> Result<Registration, BusError> {
        if self.names.contains_key(&id) {
            return Ok(Registration::AlreadyRegistered);
        }
        if self.names.len() >= self.capacity {
            return Err(BusError::RegistryFull {
                limit: self.capacity,
            });
        }
        self.names.insert(id, truncate_name(name).to_string());
        Ok(Registration::Added)
    }

    /// Registered name or [`UNKNOWN_EVENT_TYPE`].
    #[must_use]
    pub fn name(&self, id: EventTypeId) -> &str {
        self.names
            .get(&id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_EVENT_TYPE)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Longest prefix of `name` that fits a registry entry.
pub(crate) fn truncate_name(name: &str) -> &str {
    let mut end = name.len().min(BUS_NAME_MAX - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
