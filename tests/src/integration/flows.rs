//! # Bus Integration Flows
//!
//! Exercises the public `gameplay_bus` API the way gameplay systems use it:
//! several publishers and subscribers sharing one bus handle, with a manual
//! clock wherever time matters.
//!
//! ## Flows Tested:
//!
//! 1. **Ordering**: priority buckets drain CRITICAL first, FIFO inside a bucket
//! 2. **Rate limiting**: skipped deliveries still complete the event
//! 3. **Retry**: a failing subscriber is retried, then the event is dropped
//! 4. **Capacity**: queue overload, batch all-or-nothing, system unsubscribe
//! 5. **Replay**: bounded history and republishing
//! 6. **Async drain**: tokio workers empty the queue

#[cfg(test)]
mod tests {
    use gameplay_bus::{
        event_types, BusConfig, BusError, Event, EventBus, EventDraft, ManualTimeSource, Payload,
        Priority, ProcessingStrategy, Registration, SubscriptionOptions, UNKNOWN_EVENT_TYPE,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const CUSTOM_EVENT: u32 = 0x9000;

    fn bus_with_clock(config: BusConfig) -> (EventBus, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(10_000));
        let bus = EventBus::with_time_source(clock.clone());
        bus.init(config).unwrap();
        (bus, clock)
    }

    fn tagged(tag: u8) -> Payload {
        Payload::raw(&[tag]).unwrap()
    }

    fn tag_of(event: &Event) -> u8 {
        match event.payload {
            Payload::Raw(raw) => raw.as_bytes()[0],
            _ => u8::MAX,
        }
    }

    /// Subscribe a recorder of payload tags on `type_id`.
    fn record_tags(bus: &EventBus, type_id: u32) -> Arc<Mutex<Vec<u8>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(type_id, 50, move |e: &Event| {
            sink.lock().push(tag_of(e));
            true
        })
        .unwrap();
        seen
    }

    // =============================================================================
    // ORDERING
    // =============================================================================

    #[test]
    fn test_priority_then_fifo_order() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Ordering"));
        let seen = record_tags(&bus, CUSTOM_EVENT);

        let plan = [
            (Priority::Low, 1),
            (Priority::Critical, 2),
            (Priority::Normal, 3),
            (Priority::Critical, 4),
            (Priority::Background, 5),
            (Priority::High, 6),
        ];
        for (priority, tag) in plan {
            bus.publish(CUSTOM_EVENT, tagged(tag), priority, 1, "order")
                .unwrap();
        }

        assert_eq!(bus.process_sync(u32::MAX, 0), 6);
        assert_eq!(*seen.lock(), vec![2, 4, 6, 3, 1, 5]);
    }

    #[test]
    fn test_fifo_strategy_ignores_priority() {
        let (bus, _clock) = bus_with_clock(
            BusConfig::new("Fifo").with_strategy(ProcessingStrategy::Fifo),
        );
        let seen = record_tags(&bus, CUSTOM_EVENT);

        bus.publish(CUSTOM_EVENT, tagged(1), Priority::Background, 1, "t")
            .unwrap();
        bus.publish(CUSTOM_EVENT, tagged(2), Priority::Critical, 1, "t")
            .unwrap();
        bus.publish(CUSTOM_EVENT, tagged(3), Priority::Normal, 1, "t")
            .unwrap();

        bus.process_sync(u32::MAX, 0);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_deadline_strategy_drops_expired() {
        let (bus, clock) = bus_with_clock(
            BusConfig::new("Deadline").with_strategy(ProcessingStrategy::Deadline),
        );
        let seen = record_tags(&bus, CUSTOM_EVENT);
        let now = bus.now_us();

        bus.publish_with_deadline(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t", now + 500)
            .unwrap();
        bus.publish_with_deadline(CUSTOM_EVENT, tagged(2), Priority::Normal, 1, "t", now + 100)
            .unwrap();
        bus.publish_with_deadline(CUSTOM_EVENT, tagged(3), Priority::Normal, 1, "t", now + 5_000)
            .unwrap();

        clock.advance(1_000);
        assert_eq!(bus.process_sync(u32::MAX, 0), 1);
        assert_eq!(*seen.lock(), vec![3]);

        let stats = bus.stats();
        assert_eq!(stats.deadlines_missed, 2);
        assert_eq!(stats.events_failed, 2);
    }

    // =============================================================================
    // SUBSCRIPTION FILTERS
    // =============================================================================

    #[test]
    fn test_rate_limit_skips_without_failing() {
        let (bus, clock) = bus_with_clock(BusConfig::new("RateLimit"));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        bus.subscribe_rate_limited(
            CUSTOM_EVENT,
            7,
            move |_: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            },
            2,
        )
        .unwrap();

        for tag in 0..5 {
            bus.publish(CUSTOM_EVENT, tagged(tag), Priority::Normal, 1, "t")
                .unwrap();
        }
        assert_eq!(bus.process_sync(u32::MAX, 0), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(bus.stats().events_processed, 5);
        assert_eq!(bus.stats().events_failed, 0);

        clock.advance(1_000_000);
        bus.publish(CUSTOM_EVENT, tagged(9), Priority::Normal, 1, "t")
            .unwrap();
        bus.process_sync(u32::MAX, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_min_priority_and_predicate() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Filters"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe_with(
            CUSTOM_EVENT,
            3,
            Arc::new(move |e: &Event| {
                sink.lock().push(tag_of(e));
                true
            }),
            SubscriptionOptions::new()
                .with_min_priority(Priority::High)
                .with_predicate(|e: &Event| tag_of(e) % 2 == 0),
        )
        .unwrap();

        bus.publish(CUSTOM_EVENT, tagged(2), Priority::Critical, 1, "t")
            .unwrap();
        bus.publish(CUSTOM_EVENT, tagged(3), Priority::High, 1, "t")
            .unwrap();
        bus.publish(CUSTOM_EVENT, tagged(4), Priority::Normal, 1, "t")
            .unwrap();
        bus.publish(CUSTOM_EVENT, tagged(6), Priority::High, 1, "t")
            .unwrap();

        assert_eq!(bus.process_sync(u32::MAX, 0), 4);
        assert_eq!(*seen.lock(), vec![2, 6]);
    }

    // =============================================================================
    // RETRY
    // =============================================================================

    #[test]
    fn test_failing_subscriber_retried_then_dropped() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Retry"));
        let good = record_tags(&bus, CUSTOM_EVENT);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        bus.subscribe(CUSTOM_EVENT, 60, move |_: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        })
        .unwrap();

        bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
            .unwrap();
        assert_eq!(bus.process_sync(u32::MAX, 0), 0);

        // every attempt reaches both subscribers
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(*good.lock(), vec![1, 1, 1]);

        let stats = bus.stats();
        assert_eq!(stats.events_retried, 2);
        assert_eq!(stats.events_failed, 1);
        assert_eq!(stats.events_processed, 0);
        assert_eq!(bus.total_queue_depth(), 0);
    }

    #[test]
    fn test_retry_goes_ahead_of_newer_events() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("RetryFront"));
        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = order.clone();
        let first_try = Arc::new(AtomicUsize::new(0));
        bus.subscribe(CUSTOM_EVENT, 1, move |e: &Event| {
            let tag = tag_of(e);
            sink.lock().push(tag);
            // tag 1 fails once
            !(tag == 1 && first_try.fetch_add(1, Ordering::SeqCst) == 0)
        })
        .unwrap();

        bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
            .unwrap();
        bus.publish(CUSTOM_EVENT, tagged(2), Priority::Normal, 1, "t")
            .unwrap();

        assert_eq!(bus.process_sync(u32::MAX, 0), 2);
        assert_eq!(*order.lock(), vec![1, 1, 2]);
    }

    // =============================================================================
    // CAPACITY
    // =============================================================================

    #[test]
    fn test_overload_and_full_queue() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Overload").with_max_queue_size(10));
        for tag in 0..8 {
            bus.publish(CUSTOM_EVENT, tagged(tag), Priority::Normal, 1, "t")
                .unwrap();
        }
        assert!(!bus.is_overloaded());
        bus.publish(CUSTOM_EVENT, tagged(8), Priority::Normal, 1, "t")
            .unwrap();
        assert!(bus.is_overloaded());
        bus.publish(CUSTOM_EVENT, tagged(9), Priority::Normal, 1, "t")
            .unwrap();

        let err = bus
            .publish(CUSTOM_EVENT, tagged(10), Priority::Normal, 1, "t")
            .unwrap_err();
        assert!(matches!(err, BusError::QueueFull { capacity: 10 }));
        assert!(err.is_capacity());

        let stats = bus.stats();
        assert_eq!(stats.events_published, 10);
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(stats.max_queue_depth_reached, 10);
    }

    #[test]
    fn test_batch_all_or_nothing() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Batch").with_max_queue_size(4));
        let drafts: Vec<EventDraft> = (0..3)
            .map(|tag| EventDraft::new(CUSTOM_EVENT, tagged(tag)).with_source(1, "batch"))
            .collect();

        assert_eq!(bus.publish_batch(&drafts).unwrap(), 3);
        assert!(matches!(
            bus.publish_batch(&drafts),
            Err(BusError::BatchTooLarge {
                requested: 3,
                available: 1
            })
        ));
        assert_eq!(bus.total_queue_depth(), 3);
        assert!(matches!(bus.publish_batch(&[]), Err(BusError::EmptyBatch)));
    }

    #[test]
    fn test_unsubscribe_system_removes_all() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Unsubscribe"));
        for type_id in [event_types::LEVEL_UP, event_types::XP_GAINED, CUSTOM_EVENT] {
            bus.subscribe(type_id, 42, |_: &Event| true).unwrap();
        }
        let keep = bus.subscribe(CUSTOM_EVENT, 43, |_: &Event| true).unwrap();

        assert_eq!(bus.unsubscribe_system(42), 3);
        assert_eq!(bus.unsubscribe_system(42), 0);
        assert_eq!(bus.stats().active_subscribers, 1);
        assert!(bus.unsubscribe(keep));
        assert!(!bus.unsubscribe(keep));
    }

    #[test]
    fn test_reset_stats_keeps_subscribers() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Reset"));
        bus.subscribe(CUSTOM_EVENT, 1, |_: &Event| true).unwrap();
        bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
            .unwrap();
        bus.process_sync(u32::MAX, 0);

        bus.reset_stats();
        let stats = bus.stats();
        assert_eq!(stats.events_published, 0);
        assert_eq!(stats.events_processed, 0);
        assert_eq!(stats.active_subscribers, 1);
    }

    // =============================================================================
    // REGISTRY & LIFECYCLE
    // =============================================================================

    #[test]
    fn test_registry_first_name_wins() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Registry"));
        assert_eq!(bus.type_name(event_types::LEVEL_UP), "LEVEL_UP");
        assert_eq!(bus.type_name(CUSTOM_EVENT), UNKNOWN_EVENT_TYPE);

        assert_eq!(
            bus.register_type(CUSTOM_EVENT, "QUEST_DONE").unwrap(),
            Registration::Added
        );
        assert_eq!(
            bus.register_type(CUSTOM_EVENT, "OTHER").unwrap(),
            Registration::AlreadyRegistered
        );
        assert_eq!(bus.type_name(CUSTOM_EVENT), "QUEST_DONE");
    }

    #[test]
    fn test_shutdown_and_reinit() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Lifecycle"));
        bus.subscribe(CUSTOM_EVENT, 1, |_: &Event| true).unwrap();
        bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
            .unwrap();

        assert_eq!(bus.shutdown(), 1);
        assert!(!bus.is_initialized());
        assert!(matches!(
            bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t"),
            Err(BusError::NotInitialized)
        ));
        assert_eq!(bus.process_sync(u32::MAX, 0), 0);

        bus.init(BusConfig::new("Lifecycle")).unwrap();
        assert_eq!(
            bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
                .unwrap(),
            1
        );
        assert_eq!(bus.stats().active_subscribers, 0);
    }

    #[test]
    fn test_mismatched_payload_rejected() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Payload"));
        let err = bus
            .publish(
                event_types::LEVEL_UP,
                Payload::XpGained(Default::default()),
                Priority::Normal,
                1,
                "t",
            )
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidPayload { .. }));
        assert_eq!(bus.stats().events_published, 0);
        assert_eq!(bus.total_queue_depth(), 0);
    }

    // =============================================================================
    // REPLAY
    // =============================================================================

    #[test]
    fn test_replay_history_bounded_and_republished() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("Replay").with_replay(true, 5));
        for tag in 0..8 {
            bus.publish(CUSTOM_EVENT, tagged(tag), Priority::Normal, 1, "t")
                .unwrap();
        }
        bus.process_sync(u32::MAX, 0);

        let history = bus.replay_history();
        assert_eq!(history.len(), 5);
        assert_eq!(
            history.iter().map(tag_of).collect::<Vec<_>>(),
            vec![3, 4, 5, 6, 7]
        );

        let seen = record_tags(&bus, CUSTOM_EVENT);
        assert_eq!(bus.replay_events(1, 2).unwrap(), 2);
        bus.process_sync(u32::MAX, 0);
        assert_eq!(*seen.lock(), vec![4, 5]);

        // replays are not recorded again
        assert_eq!(bus.replay_history().len(), 5);
        assert!(matches!(
            bus.replay_events(4, 2),
            Err(BusError::ReplayOutOfRange { .. })
        ));
        assert_eq!(bus.replay_events(9, 0).unwrap(), 0);
    }

    #[test]
    fn test_replay_disabled_has_no_buffer() {
        let (bus, _clock) = bus_with_clock(BusConfig::new("NoReplay").with_replay(false, 5));
        bus.publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
            .unwrap();
        assert!(bus.replay_history().is_empty());
        assert!(!bus.set_replay_recording(true));
    }

    // =============================================================================
    // ASYNC DRAIN
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_async_drain_processes_everything() {
        let bus = EventBus::with_config(BusConfig::new("Async").with_workers(3)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        bus.subscribe(CUSTOM_EVENT, 1, move |_: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        for i in 0..500u32 {
            let priority = Priority::ALL[(i % 5) as usize];
            bus.publish(CUSTOM_EVENT, tagged(1), priority, 1, "t")
                .unwrap();
        }

        let report = bus.process_async(0).unwrap().join().await.unwrap();
        assert_eq!(report.workers.len(), 3);
        assert_eq!(report.total_processed(), 500);
        assert_eq!(calls.load(Ordering::SeqCst), 500);
        assert_eq!(bus.total_queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_async_drain_with_concurrent_publisher() {
        let bus = EventBus::with_config(BusConfig::new("AsyncPublish")).unwrap();
        bus.subscribe(CUSTOM_EVENT, 1, |_: &Event| true).unwrap();

        let publisher = bus.clone();
        let producer = tokio::spawn(async move {
            for _ in 0..100 {
                publisher
                    .publish(CUSTOM_EVENT, tagged(1), Priority::Normal, 1, "t")
                    .unwrap();
                tokio::task::yield_now().await;
            }
        });
        producer.await.unwrap();

        let report = bus.process_async(2).unwrap().join().await.unwrap();
        assert_eq!(report.total_processed(), 100);
    }
}
