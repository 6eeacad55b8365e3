//! # Inbound Ports
//!
//! What gameplay systems program against.
//!
//! | Trait | Role |
//! |-------|------|
//! | `EventHandler` | Capability a subscriber hands to the bus |
//! | `EventPublisher` | Publishing half of the bus API |
//! | `EventSubscriber` | Subscription half of the bus API |
//!
//! Bridges take `impl EventPublisher` rather than a concrete bus so they can be
//! driven by a recording fake in tests.

use crate::domain::{
    Event, EventDraft, EventTypeId, Payload, Priority, SubscriptionId, SubscriptionOptions,
};
use crate::error::BusError;
use std::sync::Arc;

/// Something that reacts to delivered events.
///
/// Returning `false` marks the delivery attempt as failed; the bus will retry
/// the event (at the front of its bucket) until its retries run out.
///
/// Handlers run outside the bus lock and may publish or subscribe.
///
/// Any `Fn(&Event) -> bool + Send + Sync` closure is a handler, with captured
/// state standing in for per-subscriber context.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event) -> bool;
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    fn handle(&self, event: &Event) -> bool {
        self(event)
    }
}

/// Filter evaluated before a handler is invoked.
pub type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Publishing API.
pub trait EventPublisher: Send + Sync {
    /// Queue an event. Returns its sequence number.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `InvalidPayload`: payload does not fit the type
    /// - `QueueFull`: at capacity (counted as dropped)
    fn publish(
        &self,
        type_id: EventTypeId,
        payload: Payload,
        priority: Priority,
        source_system_id: u32,
        source_name: &str,
    ) -> Result<u64, BusError>;

    /// [`Self::publish`] with an absolute deadline on the bus clock.
    fn publish_with_deadline(
        &self,
        type_id: EventTypeId,
        payload: Payload,
        priority: Priority,
        source_system_id: u32,
        source_name: &str,
        deadline_us: u64,
    ) -> Result<u64, BusError>;

    /// Queue every draft or none. Returns how many were queued.
    ///
    /// # Errors
    /// - `EmptyBatch`
    /// - `BatchTooLarge`: not enough room for the whole batch
    fn publish_batch(&self, drafts: &[EventDraft]) -> Result<usize, BusError>;

    /// Current bus clock, for computing deadlines.
    fn now_us(&self) -> u64;
}

/// Subscription API.
pub trait EventSubscriber: Send + Sync {
    /// Register `handler` for `type_id`.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `SubscriberTableFull` (counted as rejected)
    fn subscribe_with(
        &self,
        type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: Arc<dyn EventHandler>,
        options: SubscriptionOptions,
    ) -> Result<SubscriptionId, BusError>;

    /// Remove one subscription. `true` exactly once per id.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Remove every subscription created by `system_id`. Returns the count.
    fn unsubscribe_system(&self, system_id: u32) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        seen: AtomicUsize,
    }

    impl EventHandler for Counting {
        fn handle(&self, _event: &Event) -> bool {
            self.seen.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_struct_and_closure_handlers_share_a_trait() {
        let counting = Arc::new(Counting {
            seen: AtomicUsize::new(0),
        });
        let handlers: Vec<Arc<dyn EventHandler>> = vec![
            counting.clone(),
            Arc::new(|e: &Event| e.type_id == 7),
        ];

        let event = crate::test_support::event(7, Priority::Normal, 1);
        assert!(handlers.iter().all(|h| h.handle(&event)));
        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
    }
}
