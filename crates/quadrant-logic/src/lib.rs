//! Pure quadrant logic for the colony simulation.
//!
//! This crate contains the parts of the simulation that need no ECS world,
//! timer queue, or motion executor. Functions take plain data and return
//! results, which keeps them unit-testable and reusable by the engine, the
//! headless harness, and any future front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Simulation configuration with defaults and validation |
//! | [`constants`] | Fixed tuning values (retry bound, stopping range, categories) |
//! | [`geometry`] | `Vec3` world positions and planar helpers |
//! | [`graph`] | Waypoint graph store with toggleable edge traversability |
//! | [`level`] | Static level data (waypoints, edges, camera lanes) |
//! | [`pathfinding`] | BFS routes over currently traversable edges |
//! | [`steering`] | Wander targets, flee mirroring, arrival predicate |

pub mod config;
pub mod constants;
pub mod geometry;
pub mod graph;
pub mod level;
pub mod pathfinding;
pub mod steering;
