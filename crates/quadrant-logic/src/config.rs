//! Simulation configuration: tuning inputs with defaults and validation.
//!
//! Defaults mirror the shipped game: a 5% trigger chance every 5 seconds,
//! a 6.10 unit stopping range, and a 50 unit wander radius with 15 units of
//! jitter. The navigation retry bound is fixed and lives in
//! [`crate::constants::MAX_NAVIGATION_ATTEMPTS`].

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_STOPPING_RANGE;
use crate::steering::WanderBounds;

/// Tuning inputs for one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Build the waypoint graph as directed instead of undirected.
    pub directed_graph: bool,
    /// Chance on a 0–100 scale that a clock tick fires an event for an agent.
    pub trigger_chance: f32,
    /// Seconds between clock-event ticks.
    pub event_interval_rate: f32,
    /// Remaining distance at or below which an agent has arrived.
    pub stopping_range: f32,
    pub wander_radius: f32,
    pub wander_jitter: f32,
    /// Seconds a pending call rings before the caller hangs up.
    pub pending_call_wait: f32,
    /// Seconds an agent recovers from a mishap before another can hit it.
    pub mishap_recovery: f32,
    /// Health removed by one mishap.
    pub mishap_damage: f32,
    /// Hold range in seconds for the paying-respects ritual.
    pub respects_hold: RangeInclusive<f32>,
    /// Seed for the simulation RNG.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            directed_graph: false,
            trigger_chance: 5.0,
            event_interval_rate: 5.0,
            stopping_range: DEFAULT_STOPPING_RANGE,
            wander_radius: 50.0,
            wander_jitter: 15.0,
            pending_call_wait: 30.0,
            mishap_recovery: 20.0,
            mishap_damage: 10.0,
            respects_hold: 5.0..=30.0,
            seed: 0,
        }
    }
}

/// A configuration value outside its allowed range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("trigger chance {0} is outside 0..=100")]
    TriggerChance(f32),
    #[error("event interval rate must be positive, got {0}")]
    EventInterval(f32),
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("respects hold range {start}..={end} is empty")]
    RespectsHold { start: f32, end: f32 },
}

impl SimConfig {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.trigger_chance) {
            return Err(ConfigError::TriggerChance(self.trigger_chance));
        }
        if !(self.event_interval_rate > 0.0) {
            return Err(ConfigError::EventInterval(self.event_interval_rate));
        }

        let non_negative = [
            ("stopping_range", self.stopping_range),
            ("wander_radius", self.wander_radius),
            ("wander_jitter", self.wander_jitter),
            ("pending_call_wait", self.pending_call_wait),
            ("mishap_recovery", self.mishap_recovery),
            ("mishap_damage", self.mishap_damage),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::Negative { field, value });
            }
        }

        let (start, end) = (*self.respects_hold.start(), *self.respects_hold.end());
        if !(start >= 0.0) || start > end {
            return Err(ConfigError::RespectsHold { start, end });
        }
        Ok(())
    }

    pub fn wander_bounds(&self) -> WanderBounds {
        WanderBounds {
            radius: self.wander_radius,
            jitter: self.wander_jitter,
        }
    }
}
