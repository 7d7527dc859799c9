//! Route finding over the waypoint graph.
//!
//! Breadth-first search that only follows edges which are traversable at
//! the moment of the query. Disabled quadrants simply vanish from the
//! search, so callers can tell whether a target is still reachable.

use std::collections::{HashSet, VecDeque};

use crate::graph::{AdjacencyMap, WaypointKey};

/// Find a hop-minimal route from `from` to `to`.
///
/// The returned list starts with the first waypoint after `from` and ends
/// with `to`. Returns an empty vec if `from == to` and `None` if `to` is
/// unknown or unreachable over traversable edges.
pub fn find_route(graph: &AdjacencyMap, from: WaypointKey, to: WaypointKey) -> Option<Vec<WaypointKey>> {
    if !graph.contains(from) || !graph.contains(to) {
        return None;
    }
    if from == to {
        return Some(vec![]);
    }

    let mut visited = HashSet::new();
    let mut queue: VecDeque<(WaypointKey, Vec<WaypointKey>)> = VecDeque::new();
    visited.insert(from);
    queue.push_back((from, vec![]));

    while let Some((current, path)) = queue.pop_front() {
        for next in graph.neighbors(current) {
            if next == to {
                let mut result = path;
                result.push(next);
                return Some(result);
            }
            if visited.insert(next) {
                let mut new_path = path.clone();
                new_path.push(next);
                queue.push_back((next, new_path));
            }
        }
    }

    None
}

/// Whether any traversable route connects the two waypoints.
pub fn is_reachable(graph: &AdjacencyMap, from: WaypointKey, to: WaypointKey) -> bool {
    find_route(graph, from, to).is_some()
}
