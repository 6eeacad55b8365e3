//! Combat → progression.
//!
//! Killing blows award experience; experience crossing a level threshold
//! raises the player's level. Both steps travel over the bus, so the XP
//! award is itself an event that other systems (quests, UI) can observe.

use gameplay_bus::domain::{DamagePayload, LevelUpPayload, XpGainedPayload};
use gameplay_bus::{
    event_types, BusError, Event, EventPublisher, EventSubscriber, Payload, Priority,
    SubscriptionId, SubscriptionOptions,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::PROGRESSION_SYSTEM_ID;

const SOURCE_NAME: &str = "progression";

/// XP source type for kills.
pub const XP_SOURCE_KILL: u32 = 1;

/// Tunables for experience and levelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionRules {
    /// Experience granted per killing blow
    pub xp_per_kill: u32,
    /// Experience needed per level
    pub xp_per_level: u32,
    pub max_level: u8,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            xp_per_kill: 40,
            xp_per_level: 100,
            max_level: 60,
        }
    }
}

impl ProgressionRules {
    /// Level reached with `xp` total experience. Levels start at 1.
    #[must_use]
    pub fn level_for(&self, xp: u64) -> u8 {
        let per_level = u64::from(self.xp_per_level.max(1));
        let level = 1 + xp / per_level;
        u8::try_from(level)
            .unwrap_or(u8::MAX)
            .min(self.max_level.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerProgress {
    pub xp: u64,
    pub level: u8,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self { xp: 0, level: 1 }
    }
}

struct Inner<P> {
    publisher: P,
    rules: ProgressionRules,
    players: Mutex<HashMap<u32, PlayerProgress>>,
}

/// Awards XP on kills and publishes level-ups.
pub struct CombatProgressionBridge<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for CombatProgressionBridge<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: EventPublisher + 'static> CombatProgressionBridge<P> {
    pub fn new(publisher: P, rules: ProgressionRules) -> Self {
        Self {
            inner: Arc::new(Inner {
                publisher,
                rules,
                players: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to killing-blow damage and XP awards.
    ///
    /// # Errors
    ///
    /// Propagates the first subscription failure. Subscriptions made before
    /// the failure stay registered under [`PROGRESSION_SYSTEM_ID`].
    pub fn attach<S: EventSubscriber>(&self, bus: &S) -> Result<Vec<SubscriptionId>, BusError> {
        let on_damage = self.clone();
        let damage = bus.subscribe_with(
            event_types::DAMAGE_DEALT,
            PROGRESSION_SYSTEM_ID,
            Arc::new(move |e: &Event| on_damage.on_damage(e)),
            SubscriptionOptions::new().with_predicate(is_killing_blow),
        )?;

        let on_xp = self.clone();
        let xp = bus.subscribe_with(
            event_types::XP_GAINED,
            PROGRESSION_SYSTEM_ID,
            Arc::new(move |e: &Event| on_xp.on_xp_gained(e)),
            SubscriptionOptions::new(),
        )?;

        info!(?damage, ?xp, "Combat progression bridge attached");
        Ok(vec![damage, xp])
    }

    /// Award XP to the attacker of a killing blow.
    ///
    /// Returns `false` when the award could not be published, so the bus
    /// retries the damage event.
    pub fn on_damage(&self, event: &Event) -> bool {
        let Payload::Damage(damage) = event.payload else {
            debug!(seq = event.sequence_number, "Ignoring non-structured damage");
            return true;
        };
        if !damage.is_killing_blow {
            return true;
        }

        let award = XpGainedPayload {
            player_id: damage.source_entity_id,
            xp_amount: self.inner.rules.xp_per_kill,
            source_type: XP_SOURCE_KILL,
            source_id: damage.target_entity_id,
        };
        match self.inner.publisher.publish(
            event_types::XP_GAINED,
            Payload::XpGained(award),
            Priority::Normal,
            PROGRESSION_SYSTEM_ID,
            SOURCE_NAME,
        ) {
            Ok(_) => {
                debug!(
                    player = award.player_id,
                    xp = award.xp_amount,
                    victim = award.source_id,
                    "XP awarded"
                );
                true
            }
            Err(e) => {
                warn!(player = award.player_id, error = %e, "Failed to publish XP award");
                false
            }
        }
    }

    /// Apply an XP award and publish `LEVEL_UP` when the level changes.
    ///
    /// Progress is committed only after the level-up is published, so a
    /// retried delivery never counts the same award twice.
    pub fn on_xp_gained(&self, event: &Event) -> bool {
        let Payload::XpGained(award) = event.payload else {
            return true;
        };

        let mut players = self.inner.players.lock();
        let current = players.get(&award.player_id).copied().unwrap_or_default();
        let xp = current.xp.saturating_add(u64::from(award.xp_amount));
        let level = self.inner.rules.level_for(xp);

        if level > current.level {
            let payload = LevelUpPayload {
                player_id: award.player_id,
                old_level: current.level,
                new_level: level,
            };
            if let Err(e) = self.inner.publisher.publish(
                event_types::LEVEL_UP,
                Payload::LevelUp(payload),
                Priority::High,
                PROGRESSION_SYSTEM_ID,
                SOURCE_NAME,
            ) {
                warn!(player = award.player_id, error = %e, "Failed to publish level up");
                return false;
            }
            info!(
                player = award.player_id,
                old_level = current.level,
                new_level = level,
                "Level up"
            );
        }

        players.insert(award.player_id, PlayerProgress { xp, level });
        true
    }

    /// Progress of `player_id`, level 1 with no XP if never seen.
    #[must_use]
    pub fn progress(&self, player_id: u32) -> PlayerProgress {
        self.inner
            .players
            .lock()
            .get(&player_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn publisher(&self) -> &P {
        &self.inner.publisher
    }
}

fn is_killing_blow(event: &Event) -> bool {
    matches!(
        event.payload,
        Payload::Damage(DamagePayload {
            is_killing_blow: true,
            ..
        })
    )
}
