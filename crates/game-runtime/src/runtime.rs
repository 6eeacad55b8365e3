//! Frame loop hosting the bus and its bridges.

use anyhow::{Context, Result};
use bus_telemetry::MetricsHandle;
use gameplay_bus::{BusConfig, BusError, BusStats, EventBus};
use serde::Serialize;
use std::env;
use tracing::{debug, info, warn};

use crate::bridges::{
    CombatProgressionBridge, PlayerProgress, ProgressionRules, UiNotificationBridge,
};
use crate::script::{CombatScript, ScriptRules};

pub const DEFAULT_FRAMES: u32 = 120;
pub const DEFAULT_SEED: u64 = 0x5EED;
pub const TOAST_LOG_CAPACITY: usize = 32;
pub const TOASTS_PER_SECOND: u32 = 3;

/// Loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Number of simulated frames
    pub frames: u32,
    /// Seed of the combat script
    pub seed: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            seed: DEFAULT_SEED,
        }
    }
}

impl RuntimeConfig {
    /// Read `GAMEBUS_FRAMES` and `GAMEBUS_SEED`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            frames: lookup("GAMEBUS_FRAMES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.frames),
            seed: lookup("GAMEBUS_SEED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.seed),
        }
    }
}

/// Outcome of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u32,
    pub published: usize,
    pub processed: u32,
    pub overloaded: bool,
    /// The bus had no room for this frame's events
    pub backpressured: bool,
}

/// End-of-run summary, printed as JSON by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub bus: String,
    pub frames: u32,
    pub kills: u32,
    pub player_xp: u64,
    pub player_level: u8,
    pub toasts_shown: u64,
    pub overloaded_frames: u32,
    pub backpressured_frames: u32,
    pub stats: BusStats,
}

/// Bus, bridges and script wired together.
pub struct GameRuntime {
    bus: EventBus,
    progression: CombatProgressionBridge<EventBus>,
    ui: UiNotificationBridge,
    script: CombatScript,
    script_rules: ScriptRules,
    metrics: Option<MetricsHandle>,
    config: RuntimeConfig,
    frame: u32,
    overloaded_frames: u32,
    backpressured_frames: u32,
}

impl GameRuntime {
    /// Initialize the bus with `bus_config` and attach every bridge.
    pub fn new(
        bus_config: BusConfig,
        config: RuntimeConfig,
        metrics: Option<MetricsHandle>,
    ) -> Result<Self> {
        let bus = EventBus::with_config(bus_config).context("Failed to initialize event bus")?;
        Self::with_bus(bus, config, metrics)
    }

    /// Attach every bridge to an already initialized bus.
    pub fn with_bus(
        bus: EventBus,
        config: RuntimeConfig,
        metrics: Option<MetricsHandle>,
    ) -> Result<Self> {
        let progression = CombatProgressionBridge::new(bus.clone(), ProgressionRules::default());
        progression
            .attach(&bus)
            .context("Failed to attach combat progression bridge")?;

        let ui = UiNotificationBridge::new(TOAST_LOG_CAPACITY, TOASTS_PER_SECOND);
        ui.attach(&bus)
            .context("Failed to attach UI notification bridge")?;

        let script_rules = ScriptRules::default();
        Ok(Self {
            script: CombatScript::new(script_rules, config.seed),
            script_rules,
            bus,
            progression,
            ui,
            metrics,
            config,
            frame: 0,
            overloaded_frames: 0,
            backpressured_frames: 0,
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn ui(&self) -> &UiNotificationBridge {
        &self.ui
    }

    /// Progress of the scripted player.
    pub fn player(&self) -> PlayerProgress {
        self.progression.progress(self.script_rules.player_id)
    }

    /// Publish this frame's script and process one frame's worth of events.
    ///
    /// A full queue skips the frame's events and the frame still processes;
    /// any other publish error ends the run.
    pub fn run_frame(&mut self) -> Result<FrameReport> {
        let frame = self.frame;
        let drafts = self.script.frame_events(frame);
        let mut backpressured = false;
        let published = match self.bus.publish_batch(&drafts) {
            Ok(count) => count,
            Err(BusError::EmptyBatch) => 0,
            Err(e) if e.is_capacity() => {
                backpressured = true;
                self.backpressured_frames += 1;
                warn!(frame, events = drafts.len(), error = %e, "Frame events skipped");
                0
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to publish frame {frame} events"))
            }
        };

        let processed = self.bus.process_frame();
        let overloaded = self.bus.is_overloaded();
        if overloaded {
            self.overloaded_frames += 1;
            warn!(
                frame,
                depth = self.bus.total_queue_depth(),
                "Event bus overloaded"
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe(&self.bus.stats());
        }

        debug!(frame, published, processed, "Frame complete");
        self.frame += 1;
        Ok(FrameReport {
            frame,
            published,
            processed,
            overloaded,
            backpressured,
        })
    }

    /// Run every configured frame. See [`Self::summary`] for the outcome.
    pub fn run(&mut self) -> Result<()> {
        info!(frames = self.config.frames, seed = self.config.seed, "Starting frame loop");
        for _ in 0..self.config.frames {
            self.run_frame()?;
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        let player = self.player();
        RunSummary {
            bus: self
                .bus
                .config()
                .map(|c| c.name)
                .unwrap_or_default(),
            frames: self.frame,
            kills: self.script.kills(),
            player_xp: player.xp,
            player_level: player.level,
            toasts_shown: self.ui.shown(),
            overloaded_frames: self.overloaded_frames,
            backpressured_frames: self.backpressured_frames,
            stats: self.bus.stats(),
        }
    }

    /// Shut the bus down. Returns how many events were still queued.
    pub fn shutdown(self) -> usize {
        let unprocessed = self.bus.shutdown();
        info!(unprocessed, "Game runtime stopped");
        unprocessed
    }
}
