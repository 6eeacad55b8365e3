//! Event bus configuration and validation
//!
//! # Example
//!
//! ```
//! use gameplay_bus::{BusConfig, ProcessingStrategy};
//!
//! let config = BusConfig::new("CombatBus")
//!     .with_strategy(ProcessingStrategy::Fifo)
//!     .with_max_queue_size(1024);
//! assert!(config.validate().is_ok());
//! ```

use super::priority::ProcessingStrategy;
use super::registry::truncate_name;
use crate::error::BusError;
use crate::{DEFAULT_MAX_RETRIES, DEFAULT_REPLAY_HISTORY_DEPTH, MAX_EVENT_QUEUE_SIZE};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Name used when none is given.
pub const DEFAULT_BUS_NAME: &str = "DefaultEventBus";

/// Largest accepted queue capacity.
pub const MAX_QUEUE_SIZE_LIMIT: usize = 1_048_576;

/// Largest accepted replay history depth.
pub const MAX_REPLAY_HISTORY_DEPTH: usize = MAX_QUEUE_SIZE_LIMIT;

/// Largest accepted worker count.
pub const MAX_WORKER_COUNT: u32 = 64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub name: String,
    pub processing_strategy: ProcessingStrategy,
    pub max_queue_size: usize,
    /// Budget for [`process_frame`](crate::EventBus::process_frame); 0 is unlimited.
    pub max_processing_time_per_frame_us: u64,
    /// Default worker count for async draining.
    pub worker_thread_count: u32,
    /// Accepted but has no effect.
    pub enable_persistence: bool,
    pub enable_analytics: bool,
    pub enable_replay_recording: bool,
    pub replay_history_depth: usize,
    /// Dispatch attempts before an event is dropped.
    pub max_retries: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BUS_NAME.to_string(),
            processing_strategy: ProcessingStrategy::Priority,
            max_queue_size: MAX_EVENT_QUEUE_SIZE,
            max_processing_time_per_frame_us: 5_000, // 5ms of a 16ms frame
            worker_thread_count: 0,
            enable_persistence: false,
            enable_analytics: true,
            enable_replay_recording: true,
            replay_history_depth: DEFAULT_REPLAY_HISTORY_DEPTH,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl BusConfig {
    /// Default configuration with the given name. An empty name falls back to
    /// [`DEFAULT_BUS_NAME`]; long names are truncated.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() {
            DEFAULT_BUS_NAME
        } else {
            truncate_name(name)
        };
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `GAMEBUS_*` environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GAMEBUS_STRATEGY`: fifo | priority | deadline
    /// - `GAMEBUS_MAX_QUEUE_SIZE`
    /// - `GAMEBUS_FRAME_BUDGET_US`
    /// - `GAMEBUS_WORKERS`
    /// - `GAMEBUS_ANALYTICS`: true/false
    /// - `GAMEBUS_REPLAY`: true/false
    /// - `GAMEBUS_REPLAY_DEPTH`
    /// - `GAMEBUS_MAX_RETRIES`
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env(name: &str) -> Self {
        Self::from_lookup(name, |key| env::var(key).ok())
    }

    /// [`Self::from_env`] with an arbitrary variable source.
    #[must_use]
    pub fn from_lookup<F>(name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(name);

        if let Some(v) = lookup("GAMEBUS_STRATEGY") {
            match v.parse() {
                Ok(strategy) => config.processing_strategy = strategy,
                Err(e) => warn!(value = %v, error = %e, "Ignoring GAMEBUS_STRATEGY"),
            }
        }
        overlay_parsed(&lookup, "GAMEBUS_MAX_QUEUE_SIZE", &mut config.max_queue_size);
        overlay_parsed(
            &lookup,
            "GAMEBUS_FRAME_BUDGET_US",
            &mut config.max_processing_time_per_frame_us,
        );
        overlay_parsed(&lookup, "GAMEBUS_WORKERS", &mut config.worker_thread_count);
        overlay_parsed(
            &lookup,
            "GAMEBUS_REPLAY_DEPTH",
            &mut config.replay_history_depth,
        );
        overlay_parsed(&lookup, "GAMEBUS_MAX_RETRIES", &mut config.max_retries);
        overlay_flag(&lookup, "GAMEBUS_ANALYTICS", &mut config.enable_analytics);
        overlay_flag(&lookup, "GAMEBUS_REPLAY", &mut config.enable_replay_recording);

        config
    }

    /// Check bounds.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.max_queue_size == 0 {
            return Err(BusError::InvalidConfig(
                "max_queue_size cannot be 0".to_string(),
            ));
        }
        if self.max_queue_size > MAX_QUEUE_SIZE_LIMIT {
            return Err(BusError::InvalidConfig(format!(
                "max_queue_size {} exceeds {}",
                self.max_queue_size, MAX_QUEUE_SIZE_LIMIT
            )));
        }
        if self.replay_history_depth > MAX_REPLAY_HISTORY_DEPTH {
            return Err(BusError::InvalidConfig(format!(
                "replay_history_depth {} exceeds {}",
                self.replay_history_depth, MAX_REPLAY_HISTORY_DEPTH
            )));
        }
        if self.worker_thread_count > MAX_WORKER_COUNT {
            return Err(BusError::InvalidConfig(format!(
                "worker_thread_count {} exceeds {}",
                self.worker_thread_count, MAX_WORKER_COUNT
            )));
        }
        if self.max_retries == 0 {
            return Err(BusError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// True when init should allocate a replay buffer.
    #[must_use]
    pub fn wants_replay_buffer(&self) -> bool {
        self.enable_replay_recording && self.replay_history_depth > 0
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: ProcessingStrategy) -> Self {
        self.processing_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    #[must_use]
    pub fn with_frame_budget_us(mut self, budget_us: u64) -> Self {
        self.max_processing_time_per_frame_us = budget_us;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: u32) -> Self {
        self.worker_thread_count = workers;
        self
    }

    #[must_use]
    pub fn with_analytics(mut self, enabled: bool) -> Self {
        self.enable_analytics = enabled;
        self
    }

    #[must_use]
    pub fn with_replay(mut self, enabled: bool, depth: usize) -> Self {
        self.enable_replay_recording = enabled;
        self.replay_history_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

fn overlay_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(v) = lookup(key) {
        match v.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %v, "Ignoring unparseable bus setting"),
        }
    }
}

fn overlay_flag<F>(lookup: &F, key: &str, target: &mut bool)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(key) {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *target = true,
            "0" | "false" | "no" | "off" => *target = false,
            _ => warn!(key, value = %v, "Ignoring unparseable bus flag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BUS_NAME_MAX;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.name, "DefaultEventBus");
        assert_eq!(config.processing_strategy, ProcessingStrategy::Priority);
        assert_eq!(config.max_queue_size, 4096);
        assert_eq!(config.max_processing_time_per_frame_us, 5000);
        assert!(config.enable_analytics);
        assert!(config.enable_replay_recording);
        assert!(!config.enable_persistence);
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replay_depth_bounded() {
        let huge = BusConfig::default().with_replay(true, usize::MAX / 2);
        assert!(matches!(huge.validate(), Err(BusError::InvalidConfig(_))));
        assert!(crate::EventBus::with_config(huge).is_err());

        let limit = BusConfig::default().with_replay(true, MAX_REPLAY_HISTORY_DEPTH);
        assert!(limit.validate().is_ok());
        assert!(crate::EventBus::with_config(limit).is_ok());
    }

    #[test]
    fn test_new_names() {
        assert_eq!(BusConfig::new("").name, DEFAULT_BUS_NAME);
        assert_eq!(BusConfig::new("Loot").name, "Loot");
        assert_eq!(BusConfig::new(&"n".repeat(100)).name.len(), BUS_NAME_MAX - 1);
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        assert!(BusConfig::default().with_max_queue_size(0).validate().is_err());
        assert!(BusConfig::default()
            .with_max_queue_size(MAX_QUEUE_SIZE_LIMIT + 1)
            .validate()
            .is_err());
        assert!(BusConfig::default().with_workers(65).validate().is_err());
        assert!(BusConfig::default().with_max_retries(0).validate().is_err());
        assert!(BusConfig::default().with_workers(64).validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overlays() {
        let vars: HashMap<&str, &str> = [
            ("GAMEBUS_STRATEGY", "deadline"),
            ("GAMEBUS_MAX_QUEUE_SIZE", "128"),
            ("GAMEBUS_ANALYTICS", "off"),
            ("GAMEBUS_WORKERS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = BusConfig::from_lookup("Env", |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.name, "Env");
        assert_eq!(config.processing_strategy, ProcessingStrategy::Deadline);
        assert_eq!(config.max_queue_size, 128);
        assert!(!config.enable_analytics);
        assert_eq!(config.worker_thread_count, 0);
    }

    #[test]
    fn test_replay_buffer_needs_depth() {
        assert!(BusConfig::default().wants_replay_buffer());
        assert!(!BusConfig::default().with_replay(true, 0).wants_replay_buffer());
        assert!(!BusConfig::default().with_replay(false, 10).wants_replay_buffer());
    }

    #[test]
    fn test_serde_roundtrip_fills_defaults() {
        let config: BusConfig =
            serde_json::from_str(r#"{"name":"Ui","processing_strategy":"fifo"}"#).unwrap();
        assert_eq!(config.processing_strategy, ProcessingStrategy::Fifo);
        assert_eq!(config.max_queue_size, 4096);
    }
}
