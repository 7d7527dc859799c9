//! Component definitions for the ECS simulation.
//!
//! Components are plain data attached to agent entities.
//! Behavior lives in systems.

mod agent;
mod waypoint;

pub use agent::*;
pub use waypoint::*;
