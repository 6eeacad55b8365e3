//! # Subscription Table
//!
//! Per-event-type subscription lists in registration order, bounded to
//! [`MAX_EVENT_SUBSCRIBERS`](crate::MAX_EVENT_SUBSCRIBERS) live entries.
//!
//! The dispatcher never holds a borrow into the table while a handler runs.
//! It takes a [`Candidate`] snapshot (id, handler, predicate), releases the
//! lock, and comes back by id to consume rate-limit budget and record
//! analytics. A subscription removed in between is simply skipped.

use super::event::{Event, EventTypeId};
use super::priority::Priority;
use crate::error::BusError;
use crate::ports::inbound::{EventHandler, EventPredicate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Length of the rate-limit window.
pub const RATE_WINDOW_US: u64 = 1_000_000;

/// Subscription handle. `0` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    /// The reserved invalid id.
    pub const INVALID: Self = Self(0);

    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Filtering knobs for a subscription.
#[derive(Clone)]
pub struct SubscriptionOptions {
    /// Events less urgent than this are skipped. `Background` accepts all.
    pub min_priority: Priority,
    /// Skip events for which this returns `false`.
    pub predicate: Option<EventPredicate>,
    /// Handler invocations per second; 0 is unlimited.
    pub rate_limit_per_second: u32,
}

impl SubscriptionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            min_priority: Priority::Background,
            predicate: None,
            rate_limit_per_second: 0,
        }
    }

    #[must_use]
    pub fn with_min_priority(mut self, min: Priority) -> Self {
        self.min_priority = min;
        self
    }

    #[must_use]
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limit_per_second = per_second;
        self
    }
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionOptions")
            .field("min_priority", &self.min_priority)
            .field("has_predicate", &self.predicate.is_some())
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .finish()
    }
}

/// Per-subscription analytics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStats {
    pub total_callbacks: u64,
    pub total_processing_time_us: u64,
    pub last_processing_time_us: u64,
    pub last_callback_time_us: u64,
    /// Invocations skipped because the rate limit was exhausted.
    pub rate_limited: u64,
}

/// Rolling one-second invocation window.
#[derive(Debug, Clone, Copy, Default)]
struct RateWindow {
    window_start_us: u64,
    count: u32,
}

impl RateWindow {
    /// Take one slot if available.
    fn try_consume(&mut self, limit: u32, now_us: u64) -> bool {
        if limit == 0 {
            return true;
        }
        if self.count == 0 || now_us.saturating_sub(self.window_start_us) >= RATE_WINDOW_US {
            self.window_start_us = now_us;
            self.count = 0;
        }
        if self.count >= limit {
            return false;
        }
        self.count += 1;
        true
    }
}

struct Subscription {
    id: SubscriptionId,
    subscriber_system_id: u32,
    handler: Arc<dyn EventHandler>,
    options: SubscriptionOptions,
    window: RateWindow,
    stats: SubscriptionStats,
    active: bool,
}

/// What the dispatcher needs to run one subscriber outside the lock.
#[derive(Clone)]
pub struct Candidate {
    pub id: SubscriptionId,
    pub handler: Arc<dyn EventHandler>,
    pub predicate: Option<EventPredicate>,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate").field("id", &self.id).finish()
    }
}

/// Result of asking for rate-limit budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    RateLimited,
    /// Unsubscribed or paused since the candidate snapshot was taken.
    Gone,
}

pub struct SubscriptionTable {
    by_type: HashMap<EventTypeId, Vec<Subscription>>,
    type_of: HashMap<SubscriptionId, EventTypeId>,
    next_id: u32,
    limit: usize,
}

impl SubscriptionTable {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            by_type: HashMap::new(),
            type_of: HashMap::new(),
            next_id: 1,
            limit,
        }
    }

    /// Live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.type_of.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_of.is_empty()
    }

    /// Add a subscription at the end of its type's list.
    ///
    /// # Errors
    ///
    /// `SubscriberTableFull` when the live count is at the limit.
    pub fn insert(
        &mut self,
        event_type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: Arc<dyn EventHandler>,
        options: SubscriptionOptions,
    ) -> Result<SubscriptionId, BusError> {
        if self.len() >= self.limit {
            return Err(BusError::SubscriberTableFull { limit: self.limit });
        }
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.by_type
            .entry(event_type_id)
            .or_default()
            .push(Subscription {
                id,
                subscriber_system_id,
                handler,
                options,
                window: RateWindow::default(),
                stats: SubscriptionStats::default(),
                active: true,
            });
        self.type_of.insert(id, event_type_id);
        Ok(id)
    }

    /// Remove one subscription. `false` if it does not exist.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(type_id) = self.type_of.remove(&id) else {
            return false;
        };
        if let Some(list) = self.by_type.get_mut(&type_id) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                self.by_type.remove(&type_id);
            }
        }
        true
    }

    /// Remove every subscription created by `system_id`. Returns the count.
    pub fn remove_system(&mut self, system_id: u32) -> usize {
        let type_of = &mut self.type_of;
        let mut removed = 0;
        self.by_type.retain(|_, list| {
            list.retain(|s| {
                let keep = s.subscriber_system_id != system_id;
                if !keep {
                    type_of.remove(&s.id);
                    removed += 1;
                }
                keep
            });
            !list.is_empty()
        });
        removed
    }

    /// Pause or resume a subscription. `false` if it does not exist.
    pub fn set_active(&mut self, id: SubscriptionId, active: bool) -> bool {
        match self.get_mut(id) {
            Some(sub) => {
                sub.active = active;
                true
            }
            None => false,
        }
    }

    /// Active subscriptions for `type_id` whose minimum priority `priority`
    /// meets, in registration order.
    #[must_use]
    pub fn candidates(&self, type_id: EventTypeId, priority: Priority) -> Vec<Candidate> {
        self.by_type
            .get(&type_id)
            .map(|list| {
                list.iter()
                    .filter(|s| s.active && priority.meets(s.options.min_priority))
                    .map(|s| Candidate {
                        id: s.id,
                        handler: Arc::clone(&s.handler),
                        predicate: s.options.predicate.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Consume one slot of the subscription's rate-limit window.
    pub fn admit(&mut self, id: SubscriptionId, now_us: u64) -> Admission {
        let Some(sub) = self.get_mut(id) else {
            return Admission::Gone;
        };
        if !sub.active {
            return Admission::Gone;
        }
        if sub.window.try_consume(sub.options.rate_limit_per_second, now_us) {
            Admission::Admitted
        } else {
            sub.stats.rate_limited += 1;
            Admission::RateLimited
        }
    }

    /// Fold one handler invocation into the subscription's analytics.
    pub fn record_callback(&mut self, id: SubscriptionId, elapsed_us: u64, finished_at_us: u64) {
        if let Some(sub) = self.get_mut(id) {
            sub.stats.total_callbacks += 1;
            sub.stats.total_processing_time_us += elapsed_us;
            sub.stats.last_processing_time_us = elapsed_us;
            sub.stats.last_callback_time_us = finished_at_us;
        }
    }

    #[must_use]
    pub fn stats(&self, id: SubscriptionId) -> Option<SubscriptionStats> {
        self.get(id).map(|s| s.stats)
    }

    fn get(&self, id: SubscriptionId) -> Option<&Subscription> {
        let type_id = self.type_of.get(&id)?;
        self.by_type.get(type_id)?.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: SubscriptionId) -> Option<&mut Subscription> {
        let type_id = self.type_of.get(&id)?;
        self.by_type.get_mut(type_id)?.iter_mut().find(|s| s.id == id)
    }
}

impl fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTable")
            .field("live", &self.len())
            .field("types", &self.by_type.len())
            .field("limit", &self.limit)
            .finish()
    }
}
