//! Waypoint (quadrant) data and the transient events that occupy them.

use quadrant_logic::geometry::Vec3;
use quadrant_logic::graph::WaypointKey;
use quadrant_logic::level::WaypointSpec;
use serde::{Deserialize, Serialize};

/// What a waypoint event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaypointEventKind {
    /// Something dangerous that agents passing through should avoid.
    Hazard,
    /// An item agents can pick up.
    Pickup,
}

/// Transient payload attached to a waypoint. Shared read access only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointEvent {
    pub kind: WaypointEventKind,
    pub label: String,
}

impl WaypointEvent {
    pub fn hazard(label: impl Into<String>) -> Self {
        Self {
            kind: WaypointEventKind::Hazard,
            label: label.into(),
        }
    }

    pub fn pickup(label: impl Into<String>) -> Self {
        Self {
            kind: WaypointEventKind::Pickup,
            label: label.into(),
        }
    }
}

/// A graph node with a world position and at most one active event.
///
/// Outgoing edges live in the graph store, keyed by this waypoint's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub key: WaypointKey,
    pub position: Vec3,
    pub camera_lane: Option<u32>,
    pub event: Option<WaypointEvent>,
}

impl From<&WaypointSpec> for Waypoint {
    fn from(spec: &WaypointSpec) -> Self {
        Self {
            key: spec.key,
            position: spec.position,
            camera_lane: spec.camera_lane,
            event: None,
        }
    }
}
