//! Scripted combat encounter.
//!
//! A single player fights an endless line of enemies. Every frame the player
//! swings once; damage rolls, crits and kills come from a seeded RNG so a run
//! is reproducible for a given seed.

use gameplay_bus::domain::{
    DamagePayload, EntityPayload, PlayerAttackedPayload, PlayerMovedPayload,
};
use gameplay_bus::{event_types, EventDraft, Payload, Priority};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// System id the script publishes as.
pub const COMBAT_SYSTEM_ID: u32 = 100;

const SOURCE_NAME: &str = "combat";
const ENEMY_TYPE: u32 = 2;
const FIRST_ENEMY_ID: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptRules {
    pub player_id: u32,
    pub enemy_health: f32,
    pub min_damage: f32,
    pub max_damage: f32,
    /// Probability of a critical hit, 0.0..=1.0
    pub crit_chance: f64,
    pub crit_multiplier: f32,
    /// Move every this many frames, 0 to never move
    pub move_every: u32,
}

impl Default for ScriptRules {
    fn default() -> Self {
        Self {
            player_id: 1,
            enemy_health: 60.0,
            min_damage: 8.0,
            max_damage: 24.0,
            crit_chance: 0.2,
            crit_multiplier: 2.0,
            move_every: 10,
        }
    }
}

/// Generates one frame of combat events at a time.
#[derive(Debug)]
pub struct CombatScript {
    rules: ScriptRules,
    rng: StdRng,
    enemy_id: u32,
    enemy_health: f32,
    position: (f32, f32),
    kills: u32,
}

impl CombatScript {
    #[must_use]
    pub fn new(rules: ScriptRules, seed: u64) -> Self {
        Self {
            rules,
            rng: StdRng::seed_from_u64(seed),
            enemy_id: FIRST_ENEMY_ID,
            enemy_health: rules.enemy_health,
            position: (0.0, 0.0),
            kills: 0,
        }
    }

    #[must_use]
    pub fn kills(&self) -> u32 {
        self.kills
    }

    /// Events for `frame`, in publish order.
    pub fn frame_events(&mut self, frame: u32) -> Vec<EventDraft> {
        let rules = self.rules;
        let mut events = Vec::with_capacity(5);

        if rules.move_every > 0 && frame % rules.move_every == 0 {
            let prev = self.position;
            self.position = (prev.0 + 1.0, prev.1 + self.rng.gen_range(-1.0..=1.0));
            events.push(
                self.draft(
                    event_types::PLAYER_MOVED,
                    Payload::PlayerMoved(PlayerMovedPayload {
                        x: self.position.0,
                        y: self.position.1,
                        prev_x: prev.0,
                        prev_y: prev.1,
                        area_id: 1,
                    }),
                )
                .with_priority(Priority::Background),
            );
        }

        events.push(self.draft(
            event_types::PLAYER_ATTACKED,
            Payload::PlayerAttacked(PlayerAttackedPayload {
                target_entity_id: self.enemy_id,
                weapon_id: 1,
                skill_id: 0,
            }),
        ));

        let is_critical = self.rng.gen_bool(rules.crit_chance.clamp(0.0, 1.0));
        let mut amount = self.rng.gen_range(rules.min_damage..=rules.max_damage);
        if is_critical {
            amount *= rules.crit_multiplier;
        }
        self.enemy_health -= amount;
        let is_killing_blow = self.enemy_health <= 0.0;

        let damage = DamagePayload {
            source_entity_id: rules.player_id,
            target_entity_id: self.enemy_id,
            damage_amount: amount,
            damage_type: 0,
            is_critical,
            is_killing_blow,
        };
        events.push(
            self.draft(event_types::DAMAGE_DEALT, Payload::Damage(damage))
                .with_priority(Priority::High),
        );
        if is_critical {
            events.push(self.draft(event_types::CRITICAL_HIT, Payload::Damage(damage)));
        }

        if is_killing_blow {
            events.push(
                self.draft(
                    event_types::ENTITY_DESTROYED,
                    Payload::Entity(EntityPayload {
                        entity_id: self.enemy_id,
                        entity_type: ENEMY_TYPE,
                        entity_handle: u64::from(self.enemy_id),
                    }),
                )
                .with_priority(Priority::Low),
            );
            self.kills += 1;
            self.enemy_id += 1;
            self.enemy_health = rules.enemy_health;
        }

        events
    }

    fn draft(&self, type_id: u32, payload: Payload) -> EventDraft {
        EventDraft::new(type_id, payload).with_source(COMBAT_SYSTEM_ID, SOURCE_NAME)
    }
}
