//! # Event Bus Facade
//!
//! [`EventBus`] owns the configuration, queue set, subscription table, type
//! registry, statistics and replay recorder behind one `parking_lot::Mutex`.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──init(config)──→ [INITIALIZED] ──shutdown()──→ [UNINITIALIZED]
//!                            │    ↑
//!                            └────┘ init(config) again: implicit reset
//! ```
//!
//! Handles are cheap to clone and all clones share one bus. Pass a handle to
//! each gameplay system at startup; there is no global instance.
//!
//! ## Thread Safety
//!
//! The lock is held only for queue, table, registry and stats access. Handlers
//! and predicates always run with the lock released, so they may publish,
//! subscribe or unsubscribe from inside a callback.

use super::dispatcher;
use crate::domain::{
    validate_payload, BusConfig, BusStats, DispatchState, Event, EventDraft, EventTypeId, Payload,
    Priority, PriorityQueueSet, Registration, ReplayRecorder, SubscriptionId, SubscriptionOptions,
    SubscriptionStats, SubscriptionTable, TypeRegistry, UNKNOWN_EVENT_TYPE,
};
use crate::domain::stats::StatsCollector;
use crate::error::BusError;
use crate::ports::{
    EventHandler, EventPublisher, EventSubscriber, MonotonicTimeSource, TimeSource,
};
use crate::MAX_EVENT_SUBSCRIBERS;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything that exists only between `init` and `shutdown`.
pub(crate) struct BusState {
    pub config: BusConfig,
    pub queues: PriorityQueueSet,
    pub subscriptions: SubscriptionTable,
    pub registry: TypeRegistry,
    pub stats: StatsCollector,
    /// Allocated only when recording was enabled at init with a non-zero depth.
    pub replay: Option<ReplayRecorder>,
    pub next_sequence: u64,
    /// Distinguishes one init from the next so that an event taken out by the
    /// dispatcher is never written back into a bus that was re-initialized.
    pub generation: u64,
}

impl BusState {
    fn new(config: BusConfig, generation: u64) -> Self {
        let replay = config
            .wants_replay_buffer()
            .then(|| ReplayRecorder::new(config.replay_history_depth));
        Self {
            queues: PriorityQueueSet::new(config.max_queue_size),
            subscriptions: SubscriptionTable::new(MAX_EVENT_SUBSCRIBERS),
            registry: TypeRegistry::seeded(),
            stats: StatsCollector::default(),
            replay,
            next_sequence: 1,
            generation,
            config,
        }
    }

    /// Build an event from `draft` and append it to its bucket.
    ///
    /// Payload validation is the caller's job.
    fn enqueue(&mut self, draft: &EventDraft, now_us: u64, record: bool) -> Result<u64, BusError> {
        if self.queues.remaining() == 0 {
            return Err(BusError::QueueFull {
                capacity: self.queues.capacity(),
            });
        }
        let sequence_number = self.next_sequence;
        let event = Event {
            type_id: draft.type_id,
            priority: draft.priority,
            payload: draft.payload,
            source_system_id: draft.source_system_id,
            source_name: draft.source_name,
            timestamp_us: now_us,
            sequence_number,
            deadline_us: draft.deadline_us,
            retry_count: 0,
            max_retries: self.config.max_retries,
            state: DispatchState::Queued,
        };
        if record {
            if let Some(replay) = self.replay.as_mut() {
                replay.record(&event);
            }
        }
        self.queues.push_back(event)?;
        self.next_sequence += 1;
        Ok(sequence_number)
    }

    /// Queue a whole batch or nothing.
    fn enqueue_all(
        &mut self,
        drafts: &[EventDraft],
        now_us: u64,
        record: bool,
    ) -> Result<usize, BusError> {
        let available = self.queues.remaining();
        if drafts.len() > available {
            self.stats.on_dropped_many(drafts.len() as u64);
            return Err(BusError::BatchTooLarge {
                requested: drafts.len(),
                available,
            });
        }
        for draft in drafts {
            self.enqueue(draft, now_us, record)?;
        }
        self.stats
            .on_published(drafts.len() as u64, self.queues.len());
        Ok(drafts.len())
    }

    pub fn snapshot_stats(&self) -> BusStats {
        self.stats
            .snapshot(self.queues.len(), self.subscriptions.len())
    }
}

pub(crate) struct Shared {
    pub state: Mutex<Option<BusState>>,
    pub clock: Arc<dyn TimeSource>,
    generations: AtomicU64,
}

impl Shared {
    /// Run `f` against the live state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut BusState) -> R) -> Result<R, BusError> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(BusError::NotInitialized)?;
        Ok(f(state))
    }

    pub fn now_us(&self) -> u64 {
        self.clock.now_us()
    }
}

/// Handle to an in-process gameplay event bus.
#[derive(Clone)]
pub struct EventBus {
    pub(crate) shared: Arc<Shared>,
}

impl EventBus {
    /// Uninitialized bus on the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(MonotonicTimeSource::new()))
    }

    /// Uninitialized bus on a caller-supplied clock.
    #[must_use]
    pub fn with_time_source(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(None),
                clock,
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// New bus initialized with `config`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `config` fails validation.
    pub fn with_config(config: BusConfig) -> Result<Self, BusError> {
        let bus = Self::new();
        bus.init(config)?;
        Ok(bus)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Initialize, or reset and re-initialize, the bus.
    ///
    /// Any queued events, subscriptions, statistics and replay history from a
    /// previous init are discarded. Sequence numbers and subscription ids
    /// restart at 1.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `config` fails validation; the bus is left as it was.
    pub fn init(&self, config: BusConfig) -> Result<(), BusError> {
        config.validate()?;
        if config.enable_persistence {
            warn!(bus = %config.name, "Event persistence is not supported; flag ignored");
        }

        let generation = self.shared.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let name = config.name.clone();
        let strategy = config.processing_strategy;
        let capacity = config.max_queue_size;
        let replay_depth = config
            .wants_replay_buffer()
            .then_some(config.replay_history_depth);

        let previous = self
            .shared
            .state
            .lock()
            .replace(BusState::new(config, generation));

        if let Some(old) = previous {
            info!(
                bus = %old.config.name,
                discarded_events = old.queues.len(),
                discarded_subscriptions = old.subscriptions.len(),
                "Event bus re-initialized; previous state discarded"
            );
        }
        info!(
            bus = %name,
            ?strategy,
            capacity,
            ?replay_depth,
            "Event bus initialized"
        );
        Ok(())
    }

    /// Tear the bus down. Returns how many queued events were never processed.
    pub fn shutdown(&self) -> usize {
        let Some(mut state) = self.shared.state.lock().take() else {
            return 0;
        };
        let unprocessed = state.queues.clear();
        if unprocessed > 0 {
            warn!(
                bus = %state.config.name,
                unprocessed,
                "Event bus shut down with unprocessed events"
            );
        }
        info!(bus = %state.config.name, "Event bus shut down");
        unprocessed
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.shared.state.lock().is_some()
    }

    /// Current bus clock in microseconds.
    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.shared.now_us()
    }

    // =========================================================================
    // PUBLISHING
    // =========================================================================

    /// Queue an event. Returns its sequence number.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `InvalidPayload`: nothing is changed
    /// - `QueueFull`: counted in `events_dropped`
    pub fn publish(
        &self,
        type_id: EventTypeId,
        payload: Payload,
        priority: Priority,
        source_system_id: u32,
        source_name: &str,
    ) -> Result<u64, BusError> {
        self.publish_draft(
            EventDraft::new(type_id, payload)
                .with_priority(priority)
                .with_source(source_system_id, source_name),
        )
    }

    /// [`Self::publish`] with an absolute deadline on the bus clock. Only the
    /// `Deadline` strategy looks at it.
    pub fn publish_with_deadline(
        &self,
        type_id: EventTypeId,
        payload: Payload,
        priority: Priority,
        source_system_id: u32,
        source_name: &str,
        deadline_us: u64,
    ) -> Result<u64, BusError> {
        self.publish_draft(
            EventDraft::new(type_id, payload)
                .with_priority(priority)
                .with_source(source_system_id, source_name)
                .with_deadline(deadline_us),
        )
    }

    /// Queue a prepared draft. Returns its sequence number.
    pub fn publish_draft(&self, draft: EventDraft) -> Result<u64, BusError> {
        validate_payload(draft.type_id, &draft.payload)?;
        let now = self.now_us();

        self.shared.with_state(|state| {
            match state.enqueue(&draft, now, true) {
                Ok(sequence) => {
                    state.stats.on_published(1, state.queues.len());
                    debug!(
                        event_type = state.registry.name(draft.type_id),
                        sequence,
                        priority = %draft.priority,
                        source = draft.source_system_id,
                        "Published event"
                    );
                    Ok(sequence)
                }
                Err(e) => {
                    state.stats.on_dropped();
                    warn!(
                        event_type = state.registry.name(draft.type_id),
                        capacity = state.queues.capacity(),
                        "Event queue full, event dropped"
                    );
                    Err(e)
                }
            }
        })?
    }

    /// Queue every draft or none.
    ///
    /// # Errors
    /// - `EmptyBatch`
    /// - `InvalidPayload`: first offending draft; nothing is queued
    /// - `BatchTooLarge`: not enough room; the whole batch counts as dropped
    pub fn publish_batch(&self, drafts: &[EventDraft]) -> Result<usize, BusError> {
        if drafts.is_empty() {
            return Err(BusError::EmptyBatch);
        }
        for draft in drafts {
            validate_payload(draft.type_id, &draft.payload)?;
        }
        let now = self.now_us();

        let queued = self
            .shared
            .with_state(|state| state.enqueue_all(drafts, now, true))??;
        debug!(count = queued, "Published event batch");
        Ok(queued)
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Deliver every event of `type_id` to `handler`.
    pub fn subscribe<H>(
        &self,
        type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: H,
    ) -> Result<SubscriptionId, BusError>
    where
        H: EventHandler + 'static,
    {
        self.subscribe_with(
            type_id,
            subscriber_system_id,
            Arc::new(handler),
            SubscriptionOptions::new(),
        )
    }

    /// Deliver only events for which `predicate` holds.
    pub fn subscribe_conditional<H, P>(
        &self,
        type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: H,
        predicate: P,
    ) -> Result<SubscriptionId, BusError>
    where
        H: EventHandler + 'static,
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(
            type_id,
            subscriber_system_id,
            Arc::new(handler),
            SubscriptionOptions::new().with_predicate(predicate),
        )
    }

    /// Invoke `handler` at most `per_second` times in any one-second window.
    /// Events over the limit are skipped for this subscriber, not failed.
    pub fn subscribe_rate_limited<H>(
        &self,
        type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: H,
        per_second: u32,
    ) -> Result<SubscriptionId, BusError>
    where
        H: EventHandler + 'static,
    {
        self.subscribe_with(
            type_id,
            subscriber_system_id,
            Arc::new(handler),
            SubscriptionOptions::new().with_rate_limit(per_second),
        )
    }

    /// Subscribe with full control over filtering.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `SubscriberTableFull`: counted in `subscriptions_rejected`
    pub fn subscribe_with(
        &self,
        type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: Arc<dyn EventHandler>,
        options: SubscriptionOptions,
    ) -> Result<SubscriptionId, BusError> {
        self.shared.with_state(|state| {
            let rate_limit = options.rate_limit_per_second;
            match state
                .subscriptions
                .insert(type_id, subscriber_system_id, handler, options)
            {
                Ok(id) => {
                    debug!(
                        subscription = %id,
                        event_type = state.registry.name(type_id),
                        subscriber = subscriber_system_id,
                        rate_limit,
                        "Subscribed"
                    );
                    Ok(id)
                }
                Err(e) => {
                    state.stats.on_subscription_rejected();
                    warn!(
                        event_type = state.registry.name(type_id),
                        subscriber = subscriber_system_id,
                        "Subscription table full"
                    );
                    Err(e)
                }
            }
        })?
    }

    /// Remove one subscription. `true` exactly once per id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self
            .shared
            .with_state(|state| state.subscriptions.remove(id))
            .unwrap_or(false);
        if removed {
            debug!(subscription = %id, "Unsubscribed");
        }
        removed
    }

    /// Remove every subscription created by `system_id`. Returns the count.
    pub fn unsubscribe_system(&self, system_id: u32) -> usize {
        let removed = self
            .shared
            .with_state(|state| state.subscriptions.remove_system(system_id))
            .unwrap_or(0);
        debug!(subscriber = system_id, removed, "Unsubscribed system");
        removed
    }

    /// Pause or resume a subscription without losing its analytics.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `UnknownSubscription`
    pub fn set_subscription_active(
        &self,
        id: SubscriptionId,
        active: bool,
    ) -> Result<(), BusError> {
        let found = self
            .shared
            .with_state(|state| state.subscriptions.set_active(id, active))?;
        if found {
            Ok(())
        } else {
            Err(BusError::UnknownSubscription(id))
        }
    }

    /// Analytics for one subscription.
    #[must_use]
    pub fn subscription_stats(&self, id: SubscriptionId) -> Option<SubscriptionStats> {
        self.shared
            .with_state(|state| state.subscriptions.stats(id))
            .ok()
            .flatten()
    }

    // =========================================================================
    // PROCESSING
    // =========================================================================

    /// Dispatch up to `max_events` events within `time_budget_us` (0 for no
    /// budget). Returns how many were processed successfully.
    ///
    /// Every dequeue counts against `max_events`, including retries and
    /// deadline drops. The budget is checked between events.
    pub fn process_sync(&self, max_events: u32, time_budget_us: u64) -> u32 {
        dispatcher::drain(&self.shared, max_events, time_budget_us, None)
    }

    /// Like [`Self::process_sync`] but only for one bucket, with no event cap.
    pub fn process_priority(&self, priority: Priority, time_budget_us: u64) -> u32 {
        dispatcher::drain(&self.shared, u32::MAX, time_budget_us, Some(priority))
    }

    /// One frame's worth of processing, using the configured frame budget.
    pub fn process_frame(&self) -> u32 {
        let budget = self
            .shared
            .with_state(|state| state.config.max_processing_time_per_frame_us)
            .unwrap_or(0);
        self.process_sync(u32::MAX, budget)
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Counter snapshot. All zero when uninitialized.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.shared
            .with_state(|state| state.snapshot_stats())
            .unwrap_or_default()
    }

    /// Zero the counters. The subscriber count keeps tracking live subscriptions.
    pub fn reset_stats(&self) {
        if self
            .shared
            .with_state(|state| state.stats.reset())
            .is_ok()
        {
            info!("Event bus statistics reset");
        }
    }

    #[must_use]
    pub fn queue_depth(&self, priority: Priority) -> usize {
        self.shared
            .with_state(|state| state.queues.depth(priority))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn total_queue_depth(&self) -> usize {
        self.shared
            .with_state(|state| state.queues.len())
            .unwrap_or(0)
    }

    /// True once the queue holds at least 90% of its capacity.
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.shared
            .with_state(|state| state.queues.len() * 10 >= state.config.max_queue_size * 9)
            .unwrap_or(false)
    }

    // =========================================================================
    // TYPE REGISTRY
    // =========================================================================

    /// Give `type_id` a debug name. The first name registered for an id is kept.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `RegistryFull`: counted in `registrations_rejected`
    pub fn register_type(&self, type_id: EventTypeId, name: &str) -> Result<Registration, BusError> {
        self.shared.with_state(|state| {
            match state.registry.register(type_id, name) {
                Ok(Registration::AlreadyRegistered) => {
                    debug!(
                        type_id,
                        kept = state.registry.name(type_id),
                        ignored = name,
                        "Event type already registered"
                    );
                    Ok(Registration::AlreadyRegistered)
                }
                Ok(added) => {
                    debug!(type_id, name, "Registered event type");
                    Ok(added)
                }
                Err(e) => {
                    state.stats.on_registration_rejected();
                    warn!(type_id, name, "Event type registry full");
                    Err(e)
                }
            }
        })?
    }

    /// Registered name for `type_id`, or `UNKNOWN_EVENT_TYPE`.
    #[must_use]
    pub fn type_name(&self, type_id: EventTypeId) -> String {
        self.shared
            .with_state(|state| state.registry.name(type_id).to_string())
            .unwrap_or_else(|_| UNKNOWN_EVENT_TYPE.to_string())
    }

    // =========================================================================
    // REPLAY
    // =========================================================================

    /// Toggle capture into the replay history. History is kept either way.
    ///
    /// Returns `false` (and changes nothing) when no replay buffer was
    /// allocated at init.
    pub fn set_replay_recording(&self, enabled: bool) -> bool {
        let applied = self
            .shared
            .with_state(|state| match state.replay.as_mut() {
                Some(replay) => {
                    replay.set_recording(enabled);
                    true
                }
                None => false,
            })
            .unwrap_or(false);
        if applied {
            info!(enabled, "Replay recording toggled");
        }
        applied
    }

    /// True while published events are being captured into history.
    #[must_use]
    pub fn replay_recording(&self) -> bool {
        self.shared
            .with_state(|state| {
                state
                    .replay
                    .as_ref()
                    .is_some_and(ReplayRecorder::is_recording)
            })
            .unwrap_or(false)
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn replay_history(&self) -> Vec<Event> {
        self.shared
            .with_state(|state| {
                state
                    .replay
                    .as_ref()
                    .map(ReplayRecorder::snapshot)
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Republish history entries `[start, start + count)` as fresh events.
    ///
    /// Replayed events get new sequence numbers and timestamps, are queued
    /// all-or-nothing and are not recorded again.
    ///
    /// # Errors
    /// - `NotInitialized`
    /// - `ReplayOutOfRange`
    /// - `BatchTooLarge`
    pub fn replay_events(&self, start: usize, count: usize) -> Result<usize, BusError> {
        if count == 0 {
            return Ok(0);
        }
        let now = self.now_us();
        let replayed = self.shared.with_state(|state| {
            let len = state.replay.as_ref().map_or(0, ReplayRecorder::len);
            let window = state
                .replay
                .as_ref()
                .and_then(|replay| replay.window(start, count))
                .ok_or(BusError::ReplayOutOfRange {
                    start,
                    end: start.saturating_add(count),
                    len,
                })?;
            let drafts: Vec<EventDraft> = window.iter().map(EventDraft::from).collect();
            state.enqueue_all(&drafts, now, false)
        })??;
        info!(start, count = replayed, "Replayed events from history");
        Ok(replayed)
    }

    pub fn clear_replay_history(&self) {
        let _ = self.shared.with_state(|state| {
            if let Some(replay) = state.replay.as_mut() {
                replay.clear();
            }
        });
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    /// Defaults for a bus called `name`.
    #[must_use]
    pub fn create_default_config(name: &str) -> BusConfig {
        BusConfig::new(name)
    }

    /// Hot-swap the settings that are safe to change on a live bus: processing
    /// strategy, frame budget and analytics. Everything else in `config` is
    /// ignored and needs a re-init.
    ///
    /// # Errors
    /// - `NotInitialized`
    pub fn update_config(&self, config: &BusConfig) -> Result<(), BusError> {
        self.shared.with_state(|state| {
            state.config.processing_strategy = config.processing_strategy;
            state.config.max_processing_time_per_frame_us =
                config.max_processing_time_per_frame_us;
            state.config.enable_analytics = config.enable_analytics;
        })?;
        info!(
            strategy = ?config.processing_strategy,
            frame_budget_us = config.max_processing_time_per_frame_us,
            analytics = config.enable_analytics,
            "Event bus configuration updated"
        );
        Ok(())
    }

    /// Active configuration, `None` when uninitialized.
    #[must_use]
    pub fn config(&self) -> Option<BusConfig> {
        self.shared.with_state(|state| state.config.clone()).ok()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.shared.state.lock();
        match guard.as_ref() {
            Some(state) => f
                .debug_struct("EventBus")
                .field("name", &state.config.name)
                .field("queued", &state.queues.len())
                .field("subscriptions", &state.subscriptions.len())
                .finish(),
            None => f.debug_struct("EventBus").field("initialized", &false).finish(),
        }
    }
}

impl EventPublisher for EventBus {
    fn publish(
        &self,
        type_id: EventTypeId,
        payload: Payload,
        priority: Priority,
        source_system_id: u32,
        source_name: &str,
    ) -> Result<u64, BusError> {
        EventBus::publish(self, type_id, payload, priority, source_system_id, source_name)
    }

    fn publish_with_deadline(
        &self,
        type_id: EventTypeId,
        payload: Payload,
        priority: Priority,
        source_system_id: u32,
        source_name: &str,
        deadline_us: u64,
    ) -> Result<u64, BusError> {
        EventBus::publish_with_deadline(
            self,
            type_id,
            payload,
            priority,
            source_system_id,
            source_name,
            deadline_us,
        )
    }

    fn publish_batch(&self, drafts: &[EventDraft]) -> Result<usize, BusError> {
        EventBus::publish_batch(self, drafts)
    }

    fn now_us(&self) -> u64 {
        EventBus::now_us(self)
    }
}

impl EventSubscriber for EventBus {
    fn subscribe_with(
        &self,
        type_id: EventTypeId,
        subscriber_system_id: u32,
        handler: Arc<dyn EventHandler>,
        options: SubscriptionOptions,
    ) -> Result<SubscriptionId, BusError> {
        EventBus::subscribe_with(self, type_id, subscriber_system_id, handler, options)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        EventBus::unsubscribe(self, id)
    }

    fn unsubscribe_system(&self, system_id: u32) -> usize {
        EventBus::unsubscribe_system(self, system_id)
    }
}
