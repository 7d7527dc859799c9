//! Waypoint graph store with toggleable edge traversability.
//!
//! `AdjacencyMap` owns the node set and the edge set built once from static
//! level data. Topology never changes after construction; the only mutable
//! property of an edge is whether it can currently be traversed.
//!
//! In undirected mode a descriptor `(a, b)` produces a single shared edge
//! listed as outgoing from both ends, so disabling `a → b` disables `b → a`.
//!
//! Every `disable_outgoing` call places one hold on each outgoing edge and
//! returns the set it holds. `enable_outgoing` releases only the holds in
//! the set it is given, and an edge becomes traversable again once its last
//! hold is released. Overlapping disables therefore never reopen an edge
//! that another, still-active disable is holding down.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer key identifying a waypoint (quadrant).
pub type WaypointKey = u32;

/// Index of an edge inside its `AdjacencyMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// A connection between two waypoints as it appears in level data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    pub from: WaypointKey,
    pub to: WaypointKey,
}

impl EdgeDescriptor {
    pub fn new(from: WaypointKey, to: WaypointKey) -> Self {
        Self { from, to }
    }
}

/// A built edge. `from`/`to` are ordered for directed graphs and merely
/// the descriptor order for undirected ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: WaypointKey,
    pub to: WaypointKey,
    /// Disables currently holding this edge down.
    pub holds: u32,
    /// `true` exactly when `holds` is zero.
    pub traversable: bool,
}

impl Edge {
    fn hold(&mut self) {
        self.holds += 1;
        self.traversable = false;
    }

    /// Drop one hold. Returns `true` if that reopened the edge.
    fn release(&mut self) -> bool {
        if self.holds == 0 {
            return false;
        }
        self.holds -= 1;
        self.traversable = self.holds == 0;
        self.traversable
    }
}

/// Malformed static level data. Fatal at graph build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("edge {from} -> {to} references undefined waypoint {missing}")]
    UndefinedWaypoint {
        from: WaypointKey,
        to: WaypointKey,
        missing: WaypointKey,
    },
    #[error("edge {0} -> {0} is a self-loop")]
    SelfLoop(WaypointKey),
    #[error("edge {from} -> {to} is declared more than once")]
    DuplicateEdge { from: WaypointKey, to: WaypointKey },
    #[error("waypoint {0} is declared more than once")]
    DuplicateWaypoint(WaypointKey),
    #[error("level declares {0} edges, more than an edge id can index")]
    TooManyEdges(usize),
}

fn edge_id(index: usize) -> Result<EdgeId, GraphError> {
    u32::try_from(index)
        .map(EdgeId)
        .map_err(|_| GraphError::TooManyEdges(index.saturating_add(1)))
}

/// Edges held down by one `disable_outgoing` call.
///
/// Hand this back to `enable_outgoing` exactly once to undo that operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledEdges {
    edges: Vec<EdgeId>,
}

impl DisabledEdges {
    pub fn iter(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, id: EdgeId) -> bool {
        self.edges.binary_search(&id).is_ok()
    }
}

/// Node set plus edge set with per-edge traversability bits.
#[derive(Debug, Clone)]
pub struct AdjacencyMap {
    directed: bool,
    nodes: BTreeSet<WaypointKey>,
    edges: Vec<Edge>,
    /// waypoint → (neighbor → edge)
    outgoing: BTreeMap<WaypointKey, BTreeMap<WaypointKey, EdgeId>>,
}

impl AdjacencyMap {
    /// Build the graph from a node list and edge descriptors.
    ///
    /// Every edge endpoint must be in `nodes`; self-loops and repeated
    /// edges are rejected. In undirected mode `(a, b)` and `(b, a)` are the
    /// same edge.
    pub fn build(
        nodes: impl IntoIterator<Item = WaypointKey>,
        descriptors: &[EdgeDescriptor],
        directed: bool,
    ) -> Result<Self, GraphError> {
        let mut node_set = BTreeSet::new();
        for key in nodes {
            if !node_set.insert(key) {
                return Err(GraphError::DuplicateWaypoint(key));
            }
        }

        let mut outgoing: BTreeMap<WaypointKey, BTreeMap<WaypointKey, EdgeId>> =
            node_set.iter().map(|&k| (k, BTreeMap::new())).collect();
        let mut edges = Vec::with_capacity(descriptors.len());

        for d in descriptors {
            for endpoint in [d.from, d.to] {
                if !node_set.contains(&endpoint) {
                    return Err(GraphError::UndefinedWaypoint {
                        from: d.from,
                        to: d.to,
                        missing: endpoint,
                    });
                }
            }
            if d.from == d.to {
                return Err(GraphError::SelfLoop(d.from));
            }

            let taken = outgoing
                .get(&d.from)
                .is_some_and(|out| out.contains_key(&d.to));
            if taken {
                return Err(GraphError::DuplicateEdge { from: d.from, to: d.to });
            }

            let id = edge_id(edges.len())?;
            edges.push(Edge {
                id,
                from: d.from,
                to: d.to,
                holds: 0,
                traversable: true,
            });
            outgoing.entry(d.from).or_default().insert(d.to, id);
            if !directed {
                outgoing.entry(d.to).or_default().insert(d.from, id);
            }
        }

        Ok(Self {
            directed,
            nodes: node_set,
            edges,
            outgoing,
        })
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn contains(&self, key: WaypointKey) -> bool {
        self.nodes.contains(&key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Waypoint keys in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = WaypointKey> + '_ {
        self.nodes.iter().copied()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize)
    }

    /// Edge connecting `a` to `b`, honoring direction in directed mode.
    pub fn edge_between(&self, a: WaypointKey, b: WaypointKey) -> Option<&Edge> {
        let id = *self.outgoing.get(&a)?.get(&b)?;
        self.edge(id)
    }

    /// Outgoing `(neighbor, edge)` pairs of a waypoint, blocked ones included.
    pub fn outgoing(&self, key: WaypointKey) -> impl Iterator<Item = (WaypointKey, &Edge)> + '_ {
        self.outgoing
            .get(&key)
            .into_iter()
            .flat_map(|out| out.iter())
            .filter_map(|(&neighbor, &id)| self.edge(id).map(|e| (neighbor, e)))
    }

    /// Neighbors reachable from `key` over a currently traversable edge.
    pub fn neighbors(&self, key: WaypointKey) -> impl Iterator<Item = WaypointKey> + '_ {
        self.outgoing(key)
            .filter(|(_, e)| e.traversable)
            .map(|(n, _)| n)
    }

    /// Whether `a → b` exists and is currently traversable.
    pub fn is_traversable(&self, a: WaypointKey, b: WaypointKey) -> bool {
        self.edge_between(a, b).is_some_and(|e| e.traversable)
    }

    /// Place a hold on every outgoing edge of `key` and return the held set.
    ///
    /// An edge that is already blocked gains another hold but stays blocked,
    /// so disabling twice changes nothing a caller can traverse.
    pub fn disable_outgoing(&mut self, key: WaypointKey) -> DisabledEdges {
        let mut held: Vec<EdgeId> = self
            .outgoing
            .get(&key)
            .map(|out| out.values().copied().collect())
            .unwrap_or_default();
        held.retain(|id| match self.edges.get_mut(id.0 as usize) {
            Some(edge) => {
                edge.hold();
                true
            }
            None => false,
        });
        held.sort_unstable();
        DisabledEdges { edges: held }
    }

    /// Release the holds in `disabled` on edges outgoing from `key`.
    ///
    /// Returns how many edges became traversable. An edge still held by
    /// another disable stays blocked.
    pub fn enable_outgoing(&mut self, key: WaypointKey, disabled: &DisabledEdges) -> usize {
        let Some(out) = self.outgoing.get(&key) else {
            return 0;
        };
        let mut restored = 0;
        for id in out.values() {
            if !disabled.contains(*id) {
                continue;
            }
            if self.edges.get_mut(id.0 as usize).is_some_and(Edge::release) {
                restored += 1;
            }
        }
        restored
    }

    /// Number of edges currently blocked.
    pub fn blocked_count(&self) -> usize {
        self.edges.iter().filter(|e| !e.traversable).count()
    }
}

/// Dense traversability snapshot of an `AdjacencyMap`.
///
/// Rows and columns follow ascending waypoint key order. Useful for
/// reporting and for comparing graph states before and after toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyMatrix {
    keys: Vec<WaypointKey>,
    cells: Vec<bool>,
}

impl AdjacencyMatrix {
    pub fn from_map(map: &AdjacencyMap) -> Self {
        let keys: Vec<WaypointKey> = map.nodes().collect();
        let n = keys.len();
        let mut cells = vec![false; n * n];
        for (row, &a) in keys.iter().enumerate() {
            for (col, &b) in keys.iter().enumerate() {
                cells[row * n + col] = map.is_traversable(a, b);
            }
        }
        Self { keys, cells }
    }

    pub fn keys(&self) -> &[WaypointKey] {
        &self.keys
    }

    pub fn is_traversable(&self, a: WaypointKey, b: WaypointKey) -> bool {
        let (Ok(row), Ok(col)) = (self.keys.binary_search(&a), self.keys.binary_search(&b)) else {
            return false;
        };
        self.cells[row * self.keys.len() + col]
    }

    /// Number of traversable directed pairs.
    pub fn traversable_pairs(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}
