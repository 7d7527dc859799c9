//! Static level data: waypoint positions, edge descriptors, camera lanes.
//!
//! Loaded once before the graph is built and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::graph::{AdjacencyMap, EdgeDescriptor, GraphError, WaypointKey};

/// One waypoint as authored in the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointSpec {
    pub key: WaypointKey,
    pub position: Vec3,
    /// Camera lane whose UI layout is associated with this waypoint.
    #[serde(default)]
    pub camera_lane: Option<u32>,
}

/// Immutable level description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    pub waypoints: Vec<WaypointSpec>,
    pub edges: Vec<EdgeDescriptor>,
}

impl LevelData {
    /// Build the graph store for this level.
    pub fn build_graph(&self, directed: bool) -> Result<AdjacencyMap, GraphError> {
        AdjacencyMap::build(self.waypoints.iter().map(|w| w.key), &self.edges, directed)
    }

    pub fn waypoint(&self, key: WaypointKey) -> Option<&WaypointSpec> {
        self.waypoints.iter().find(|w| w.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_graph_from_level() {
        let level = LevelData {
            waypoints: vec![
                WaypointSpec {
                    key: 0,
                    position: Vec3::ZERO,
                    camera_lane: Some(0),
                },
                WaypointSpec {
                    key: 1,
                    position: Vec3::new(10.0, 0.0, 0.0),
                    camera_lane: None,
                },
            ],
            edges: vec![EdgeDescriptor::new(0, 1)],
        };
        let graph = level.build_graph(false).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.is_traversable(1, 0));
        assert_eq!(level.waypoint(1).map(|w| w.position.x), Some(10.0));
    }

    #[test]
    fn test_bad_edge_fails_build() {
        let level = LevelData {
            waypoints: vec![],
            edges: vec![EdgeDescriptor::new(0, 1)],
        };
        assert!(level.build_graph(true).is_err());
    }
}
