//! # End-to-End Runtime Flows
//!
//! The gameplay bridges and the frame loop running on a live bus, with bus
//! statistics exported through `bus-telemetry`.
//!
//! ## Flow Tested:
//!
//! ```text
//! Combat ──DAMAGE_DEALT──→ Progression ──XP_GAINED──→ Progression ──LEVEL_UP──→ UI
//! ```

#[cfg(test)]
mod tests {
    use bus_telemetry::{encode_metrics, register_metrics};
    use game_runtime::bridges::{PROGRESSION_SYSTEM_ID, UI_SYSTEM_ID};
    use game_runtime::{
        CombatProgressionBridge, GameRuntime, NotificationKind, ProgressionRules,
        RuntimeConfig, UiNotificationBridge,
    };
    use gameplay_bus::domain::DamagePayload;
    use gameplay_bus::{event_types, BusConfig, Event, EventBus, Payload, Priority};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn killing_blow(player: u32, victim: u32) -> Payload {
        Payload::Damage(DamagePayload {
            source_entity_id: player,
            target_entity_id: victim,
            damage_amount: 99.0,
            is_killing_blow: true,
            ..DamagePayload::default()
        })
    }

    #[test]
    fn test_kill_to_level_up_toast() {
        let bus = EventBus::with_config(BusConfig::new("E2E")).unwrap();
        let progression = CombatProgressionBridge::new(
            bus.clone(),
            ProgressionRules {
                xp_per_kill: 50,
                xp_per_level: 100,
                max_level: 10,
            },
        );
        progression.attach(&bus).unwrap();
        let ui = UiNotificationBridge::new(8, 10);
        ui.attach(&bus).unwrap();

        let level_ups = Arc::new(AtomicUsize::new(0));
        let counter = level_ups.clone();
        bus.subscribe(event_types::LEVEL_UP, 77, move |_: &Event| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        for victim in 0..4 {
            bus.publish(
                event_types::DAMAGE_DEALT,
                killing_blow(1, victim),
                Priority::High,
                100,
                "combat",
            )
            .unwrap();
        }
        bus.process_sync(u32::MAX, 0);

        // 200 XP: levels 2 and 3
        let player = progression.progress(1);
        assert_eq!(player.xp, 200);
        assert_eq!(player.level, 3);
        assert_eq!(level_ups.load(Ordering::SeqCst), 2);

        let toasts = ui.notifications();
        assert_eq!(toasts.len(), 2);
        assert!(toasts.iter().all(|t| t.kind == NotificationKind::LevelUp));
        assert_eq!(toasts[1].text, "Player 1 reached level 3");

        let stats = bus.stats();
        assert_eq!(stats.events_published, 4 + 4 + 2);
        assert_eq!(stats.events_failed, 0);
    }

    #[test]
    fn test_detaching_bridges_stops_the_chain() {
        let bus = EventBus::with_config(BusConfig::new("Detach")).unwrap();
        let progression = CombatProgressionBridge::new(bus.clone(), ProgressionRules::default());
        progression.attach(&bus).unwrap();
        let ui = UiNotificationBridge::new(8, 10);
        ui.attach(&bus).unwrap();

        assert_eq!(bus.unsubscribe_system(PROGRESSION_SYSTEM_ID), 2);
        assert_eq!(bus.unsubscribe_system(UI_SYSTEM_ID), 2);

        bus.publish(
            event_types::DAMAGE_DEALT,
            killing_blow(1, 5),
            Priority::High,
            100,
            "combat",
        )
        .unwrap();
        bus.process_sync(u32::MAX, 0);

        assert_eq!(progression.progress(1).xp, 0);
        assert_eq!(bus.stats().events_published, 1);
    }

    #[test]
    fn test_runtime_exports_metrics() {
        let metrics = register_metrics().unwrap();
        let mut runtime = GameRuntime::new(
            BusConfig::new("MetricsRun").with_frame_budget_us(0),
            RuntimeConfig {
                frames: 60,
                seed: 99,
            },
            Some(metrics),
        )
        .unwrap();

        runtime.run().unwrap();
        let summary = runtime.summary();
        assert_eq!(summary.frames, 60);
        assert_eq!(summary.stats.events_published, summary.stats.events_processed);
        assert_eq!(runtime.bus().total_queue_depth(), 0);

        let text = encode_metrics().unwrap();
        assert!(text.contains(&format!(
            "gamebus_events_published {}",
            summary.stats.events_published
        )));
        assert!(text.contains("gamebus_queue_depth 0"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["bus"], "MetricsRun");
        assert_eq!(runtime.shutdown(), 0);
    }

    #[test]
    fn test_runtime_is_deterministic_per_seed() {
        let run = |seed| {
            let mut runtime = GameRuntime::new(
                BusConfig::new("Seeded").with_frame_budget_us(0),
                RuntimeConfig { frames: 40, seed },
                None,
            )
            .unwrap();
            runtime.run().unwrap();
            let summary = runtime.summary();
            (summary.kills, summary.player_xp, summary.stats.events_published)
        };
        assert_eq!(run(5), run(5));
    }
}
