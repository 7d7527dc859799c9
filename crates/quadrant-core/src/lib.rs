//! Quadrant Core - agent navigation and timed event simulation
//!
//! Colonists move through a graph of waypoints ("quadrants") whose edges can
//! be blocked and reopened on a timer, while a clock periodically rolls
//! probability-gated events (pending calls, mishaps) against each of them.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Agents (colonists)
//! - **Components**: Pure data attached to agents (Behavior, Health, EventMarkers, etc.)
//! - **Systems**: Navigation, behavior and clock events, all driven by one timer queue
//!
//! Physical motion is delegated to a [`motion::MotionExecutor`] per agent; the
//! engine only issues intents and watches the remaining distance.
//!
//! # Example
//!
//! ```rust,no_run
//! use quadrant_core::prelude::*;
//! use quadrant_core::motion::KinematicMotion;
//! use quadrant_logic::level::LevelData;
//!
//! let level = LevelData::default();
//! let mut sim = Simulation::new(&level, SimConfig::default()).unwrap();
//! sim.spawn_agent(AgentSpawn::new("Ada", KinematicMotion::new(Vec3::ZERO, 3.5)));
//!
//! loop {
//!     sim.update(1.0 / 60.0); // 60 FPS
//! }
//! ```

pub mod components;
pub mod engine;
pub mod error;
pub mod ids;
pub mod motion;
pub mod systems;

pub use error::SimError;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{AgentSpawn, FrameReport, Simulation};
    pub use crate::error::SimError;
    pub use crate::ids::{AgentId, IdAllocator};
    pub use crate::systems::{Notification, QuadrantMapper};
    pub use quadrant_logic::config::SimConfig;
    pub use quadrant_logic::geometry::Vec3;
    pub use quadrant_logic::graph::WaypointKey;
}
