//! Agent components: identity, behavior state, quadrant assignment, health,
//! event markers, and the motion capability.

use std::collections::BTreeMap;

use hecs::Entity;
use quadrant_logic::geometry::Vec3;
use quadrant_logic::graph::WaypointKey;
use serde::{Deserialize, Serialize};

use crate::ids::AgentId;
use crate::motion::MotionExecutor;
use crate::systems::TimerId;

/// Identity of a colonist tracked by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
}

/// Behavior state machine states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Idle,
    Wandering,
    Seeking,
    Fleeing,
    Frozen,
    /// Terminal. Nothing transitions out.
    Dead,
}

impl BehaviorState {
    pub fn is_dead(self) -> bool {
        self == BehaviorState::Dead
    }

    /// States that own an in-flight motion intent.
    pub fn is_moving(self) -> bool {
        matches!(
            self,
            BehaviorState::Wandering | BehaviorState::Seeking | BehaviorState::Fleeing
        )
    }
}

/// Per-agent behavior controller state.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub state: BehaviorState,
    /// Cooldown governor: while set, the agent does not start wandering.
    pub cool_down: bool,
    /// A timed cooldown reset is outstanding; arrival must not clear it early.
    pub hold_pending: bool,
    pub chase_target: Option<Entity>,
    /// An arrival wait is outstanding for the current motion intent.
    pub awaiting_arrival: bool,
}

/// Which waypoint the agent is in and which one it wanders around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantAssignment {
    /// Updated by every accepted navigation request.
    pub current: Option<WaypointKey>,
    /// Anchor for wander targets.
    pub anchor: Option<WaypointKey>,
}

/// Wander bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WanderState {
    pub last_target: Option<Vec3>,
    pub wanders_started: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
}

impl Health {
    pub fn new(current: f32) -> Self {
        Self { current }
    }

    /// Remove `amount`, flooring at zero. Returns the new value.
    pub fn damage(&mut self, amount: f32) -> f32 {
        self.current = (self.current - amount.max(0.0)).max(0.0);
        self.current
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }
}

/// Occurrence counts per event category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMarkers {
    feed: BTreeMap<String, u32>,
}

impl EventMarkers {
    /// Count one occurrence, creating the category at 1. Returns the new count.
    pub fn record(&mut self, category: &str) -> u32 {
        let count = self.feed.entry(category.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// `None` if the category never fired.
    pub fn count(&self, category: &str) -> Option<u32> {
        self.feed.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.feed.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Idempotency flags keyed by event category (e.g. "in a pending call").
///
/// A raised flag may carry the timer that will resolve it, so whoever lowers
/// the flag early can cancel that timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEvents {
    flags: BTreeMap<String, Option<TimerId>>,
}

impl ActiveEvents {
    pub fn is_active(&self, category: &str) -> bool {
        self.flags.contains_key(category)
    }

    /// Returns `false` if the flag was already set.
    pub fn set(&mut self, category: &str) -> bool {
        if self.flags.contains_key(category) {
            return false;
        }
        self.flags.insert(category.to_string(), None);
        true
    }

    /// Attach the resolution timer to a raised flag. Ignored if the flag is down.
    pub fn set_resolution(&mut self, category: &str, timer: TimerId) {
        if let Some(slot) = self.flags.get_mut(category) {
            *slot = Some(timer);
        }
    }

    pub fn resolution(&self, category: &str) -> Option<TimerId> {
        self.flags.get(category).copied().flatten()
    }

    /// Returns `false` if the flag was not set.
    pub fn clear(&mut self, category: &str) -> bool {
        self.flags.remove(category).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// The agent's motion executor.
pub struct Motion(pub Box<dyn MotionExecutor>);

impl Motion {
    pub fn new(executor: impl MotionExecutor + 'static) -> Self {
        Self(Box::new(executor))
    }
}

impl std::fmt::Debug for Motion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motion")
            .field("position", &self.0.position())
            .field("remaining", &self.0.remaining_distance())
            .finish()
    }
}
