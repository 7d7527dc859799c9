//! Navigation system - the quadrant mapper
//!
//! Owns the waypoint graph and the waypoints themselves. Graph toggles and
//! waypoint-event changes can run immediately or after a delay through the
//! scheduler; a temporary disable schedules its own re-enable carrying the
//! edge set it holds. Edges count their holds, so overlapping disables never
//! release each other's edges and a permanent disable keeps its hold forever.
//!
//! Agent movement goes through `navigate_to`, which retries a rejected
//! motion intent up to `MAX_NAVIGATION_ATTEMPTS` times within one step.

use std::collections::BTreeMap;
use std::time::Duration;

use hecs::{Entity, World};
use quadrant_logic::constants::MAX_NAVIGATION_ATTEMPTS;
use quadrant_logic::geometry::Vec3;
use quadrant_logic::graph::{AdjacencyMap, AdjacencyMatrix, DisabledEdges, Edge, GraphError, WaypointKey};
use quadrant_logic::level::LevelData;
use quadrant_logic::pathfinding;

use super::behavior;
use super::scheduler::{Scheduler, Task};
use crate::components::{Behavior, QuadrantAssignment, Waypoint, WaypointEvent};

/// Delayed graph work.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphTask {
    /// Disable every outgoing edge; unless `permanent`, re-enable the same
    /// edges `delay` later.
    DisableQuadrant {
        waypoint: WaypointKey,
        delay: Duration,
        permanent: bool,
    },
    EnableQuadrant {
        waypoint: WaypointKey,
        edges: DisabledEdges,
    },
    AttachEvent {
        waypoint: WaypointKey,
        event: WaypointEvent,
    },
    DetachEvent {
        waypoint: WaypointKey,
    },
}

/// Navigation coordinator over the waypoint graph.
#[derive(Debug, Clone)]
pub struct QuadrantMapper {
    graph: AdjacencyMap,
    waypoints: BTreeMap<WaypointKey, Waypoint>,
}

impl QuadrantMapper {
    pub fn from_level(level: &LevelData, directed: bool) -> Result<Self, GraphError> {
        let graph = level.build_graph(directed)?;
        let waypoints = level
            .waypoints
            .iter()
            .map(|spec| (spec.key, Waypoint::from(spec)))
            .collect();
        log::info!(
            "built {} graph: {} waypoints, {} edges",
            if directed { "directed" } else { "undirected" },
            graph.node_count(),
            graph.edge_count()
        );
        Ok(Self { graph, waypoints })
    }

    pub fn graph(&self) -> &AdjacencyMap {
        &self.graph
    }

    /// Dense traversability snapshot of the current graph.
    pub fn matrix(&self) -> AdjacencyMatrix {
        AdjacencyMatrix::from_map(&self.graph)
    }

    pub fn waypoint(&self, key: WaypointKey) -> Option<&Waypoint> {
        self.waypoints.get(&key)
    }

    pub fn waypoints(&self) -> impl Iterator<Item = &Waypoint> + '_ {
        self.waypoints.values()
    }

    pub fn position_of(&self, key: WaypointKey) -> Option<Vec3> {
        self.waypoints.get(&key).map(|w| w.position)
    }

    pub fn event_at(&self, key: WaypointKey) -> Option<&WaypointEvent> {
        self.waypoints.get(&key).and_then(|w| w.event.as_ref())
    }

    pub fn camera_lane(&self, key: WaypointKey) -> Option<u32> {
        self.waypoints.get(&key).and_then(|w| w.camera_lane)
    }

    pub fn is_traversable(&self, a: WaypointKey, b: WaypointKey) -> bool {
        self.graph.is_traversable(a, b)
    }

    pub fn outgoing(&self, key: WaypointKey) -> impl Iterator<Item = (WaypointKey, &Edge)> + '_ {
        self.graph.outgoing(key)
    }

    /// Shortest hop route over currently traversable edges.
    pub fn route(&self, from: WaypointKey, to: WaypointKey) -> Option<Vec<WaypointKey>> {
        pathfinding::find_route(&self.graph, from, to)
    }

    fn known(&self, key: WaypointKey, op: &str) -> bool {
        let known = self.waypoints.contains_key(&key);
        if !known {
            log::warn!("{}: unknown waypoint {}", op, key);
        }
        known
    }

    // ---- immediate operations ----

    pub fn disable_quadrant(&mut self, key: WaypointKey) -> DisabledEdges {
        let edges = self.graph.disable_outgoing(key);
        log::info!("quadrant {} disabled ({} edges held)", key, edges.len());
        edges
    }

    pub fn enable_quadrant(&mut self, key: WaypointKey, edges: &DisabledEdges) -> usize {
        let restored = self.graph.enable_outgoing(key, edges);
        log::info!("quadrant {} released ({} edges reopened)", key, restored);
        restored
    }

    /// Set the waypoint's event, returning the one it replaced.
    pub fn attach_event(&mut self, key: WaypointKey, event: WaypointEvent) -> Option<WaypointEvent> {
        let waypoint = self.waypoints.get_mut(&key)?;
        log::info!("event '{}' attached to waypoint {}", event.label, key);
        waypoint.event.replace(event)
    }

    pub fn detach_event(&mut self, key: WaypointKey) -> Option<WaypointEvent> {
        let removed = self.waypoints.get_mut(&key)?.event.take();
        if let Some(event) = &removed {
            log::info!("event '{}' detached from waypoint {}", event.label, key);
        }
        removed
    }

    // ---- scheduled operations ----

    pub fn schedule_disable_quadrant(
        &self,
        scheduler: &mut Scheduler,
        key: WaypointKey,
        delay: Duration,
        permanent: bool,
    ) -> bool {
        if !self.known(key, "disable quadrant") {
            return false;
        }
        scheduler.schedule(
            delay,
            Task::Graph(GraphTask::DisableQuadrant { waypoint: key, delay, permanent }),
        );
        true
    }

    pub fn schedule_enable_quadrant(
        &self,
        scheduler: &mut Scheduler,
        key: WaypointKey,
        edges: DisabledEdges,
        delay: Duration,
    ) -> bool {
        if !self.known(key, "enable quadrant") {
            return false;
        }
        scheduler.schedule(delay, Task::Graph(GraphTask::EnableQuadrant { waypoint: key, edges }));
        true
    }

    pub fn schedule_attach_event(
        &self,
        scheduler: &mut Scheduler,
        key: WaypointKey,
        event: WaypointEvent,
        delay: Duration,
    ) -> bool {
        if !self.known(key, "attach event") {
            return false;
        }
        scheduler.schedule(delay, Task::Graph(GraphTask::AttachEvent { waypoint: key, event }));
        true
    }

    pub fn schedule_detach_event(&self, scheduler: &mut Scheduler, key: WaypointKey, delay: Duration) -> bool {
        if !self.known(key, "detach event") {
            return false;
        }
        scheduler.schedule(delay, Task::Graph(GraphTask::DetachEvent { waypoint: key }));
        true
    }

    /// Handle a fired graph timer.
    pub fn run_task(&mut self, scheduler: &mut Scheduler, task: GraphTask) {
        match task {
            GraphTask::DisableQuadrant { waypoint, delay, permanent } => {
                let edges = self.disable_quadrant(waypoint);
                if !permanent {
                    self.schedule_enable_quadrant(scheduler, waypoint, edges, delay);
                }
            }
            GraphTask::EnableQuadrant { waypoint, edges } => {
                self.enable_quadrant(waypoint, &edges);
            }
            GraphTask::AttachEvent { waypoint, event } => {
                self.attach_event(waypoint, event);
            }
            GraphTask::DetachEvent { waypoint } => {
                self.detach_event(waypoint);
            }
        }
    }

    // ---- agent navigation ----

    /// Send `agent` toward waypoint `key`, retrying a rejected intent.
    ///
    /// On the first accepted attempt the agent's current quadrant becomes
    /// `key`, before it has actually arrived.
    pub fn navigate_to(&self, world: &mut World, agent: Entity, key: WaypointKey) -> bool {
        let Some(target) = self.position_of(key) else {
            log::warn!("navigate {:?}: unknown waypoint {}", agent, key);
            return false;
        };
        match world.get::<&Behavior>(agent) {
            Ok(b) if !b.state.is_dead() => {}
            Ok(_) => return false,
            Err(_) => {
                log::warn!("navigate: unknown agent {:?}", agent);
                return false;
            }
        }

        for attempt in 1..=MAX_NAVIGATION_ATTEMPTS {
            if behavior::seek(world, agent, target) {
                if let Ok(assignment) = world.query_one_mut::<&mut QuadrantAssignment>(agent) {
                    assignment.current = Some(key);
                }
                log::debug!("{:?} heading to quadrant {} (attempt {})", agent, key, attempt);
                return true;
            }
            log::debug!("{:?} intent to quadrant {} rejected (attempt {})", agent, key, attempt);
        }

        log::warn!(
            "{:?} gave up on quadrant {} after {} attempts",
            agent,
            key,
            MAX_NAVIGATION_ATTEMPTS
        );
        false
    }

    /// Make `key` the waypoint the agent wanders around.
    pub fn assign_quadrant(&self, world: &mut World, agent: Entity, key: WaypointKey) -> bool {
        if !self.known(key, "assign quadrant") {
            return false;
        }
        let Ok((behavior, assignment)) =
            world.query_one_mut::<(&Behavior, &mut QuadrantAssignment)>(agent)
        else {
            return false;
        };
        if behavior.state.is_dead() {
            return false;
        }
        assignment.anchor = Some(key);
        true
    }

    /// Flee away from waypoint `key`.
    pub fn evade_quadrant(&self, world: &mut World, agent: Entity, key: WaypointKey) -> bool {
        match self.position_of(key) {
            Some(threat) => behavior::flee(world, agent, threat),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Agent, Motion, WanderState};
    use crate::ids::AgentId;
    use crate::motion::{MotionProbe, ScriptedMotion};
    use crate::systems::scheduler::seconds;
    use quadrant_logic::graph::EdgeDescriptor;
    use quadrant_logic::level::WaypointSpec;

    fn line_level() -> LevelData {
        LevelData {
            waypoints: (0..3)
                .map(|key| WaypointSpec {
                    key,
                    position: Vec3::new(key as f32 * 20.0, 0.0, 0.0),
                    camera_lane: Some(key % 2),
                })
                .collect(),
            edges: vec![EdgeDescriptor::new(0, 1), EdgeDescriptor::new(1, 2)],
        }
    }

    fn spawn(world: &mut World, reject_first: u32) -> (Entity, MotionProbe) {
        let (motion, probe) = ScriptedMotion::new(reject_first);
        let entity = world.spawn((
            Agent { id: AgentId(1), name: "Bo".into() },
            Behavior::default(),
            QuadrantAssignment { current: Some(0), anchor: Some(0) },
            WanderState::default(),
            Motion::new(motion),
        ));
        (entity, probe)
    }

    fn run_due(mapper: &mut QuadrantMapper, scheduler: &mut Scheduler, until: Duration) {
        while let Some(task) = scheduler.pop_due(until) {
            if let Task::Graph(task) = task {
                mapper.run_task(scheduler, task);
            }
        }
    }

    #[test]
    fn test_temporary_disable_reenables_after_same_delay() {
        let mut mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();

        assert!(mapper.schedule_disable_quadrant(&mut scheduler, 1, seconds(3.0), false));
        run_due(&mut mapper, &mut scheduler, seconds(2.9));
        assert!(mapper.is_traversable(0, 1));

        run_due(&mut mapper, &mut scheduler, seconds(3.0));
        assert!(!mapper.is_traversable(0, 1));
        assert!(!mapper.is_traversable(1, 2));
        assert_eq!(mapper.route(0, 2), None);
        assert_eq!(scheduler.next_due(), Some(seconds(6.0)));

        run_due(&mut mapper, &mut scheduler, seconds(6.0));
        assert!(mapper.is_traversable(0, 1));
        assert!(mapper.is_traversable(1, 2));
        assert_eq!(mapper.route(0, 2), Some(vec![1, 2]));
    }

    #[test]
    fn test_permanent_disable_never_reenables() {
        let mut mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();

        mapper.schedule_disable_quadrant(&mut scheduler, 2, seconds(1.0), true);
        run_due(&mut mapper, &mut scheduler, seconds(100.0));
        assert!(!mapper.is_traversable(1, 2));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_overlapping_disables_do_not_cross_enable() {
        let mut mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();

        // long hold on 0's edges, short hold on 1's edges; (0,1) is shared
        mapper.schedule_disable_quadrant(&mut scheduler, 0, seconds(1.0), false);
        run_due(&mut mapper, &mut scheduler, seconds(1.0));
        mapper.schedule_disable_quadrant(&mut scheduler, 1, seconds(0.25), false);

        run_due(&mut mapper, &mut scheduler, seconds(1.25));
        assert!(!mapper.is_traversable(1, 2));
        run_due(&mut mapper, &mut scheduler, seconds(1.5));
        assert!(mapper.is_traversable(1, 2));
        assert!(!mapper.is_traversable(0, 1));

        run_due(&mut mapper, &mut scheduler, seconds(2.0));
        assert!(mapper.is_traversable(0, 1));
    }

    #[test]
    fn test_permanent_disable_survives_earlier_temporary_release() {
        let mut mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();

        mapper.schedule_disable_quadrant(&mut scheduler, 1, seconds(2.0), false);
        mapper.schedule_disable_quadrant(&mut scheduler, 1, seconds(3.0), true);

        // temporary release fires at t=4 while the permanent hold is in place
        run_due(&mut mapper, &mut scheduler, seconds(5.0));
        assert!(!mapper.is_traversable(0, 1));
        assert!(!mapper.is_traversable(1, 2));
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(mapper.route(0, 2), None);
    }

    #[test]
    fn test_later_temporary_disable_outlasts_earlier_release() {
        let mut mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();

        // 0 holds (0,1) over [1, 2]; 1 holds (0,1) and (1,2) over [1.5, 3]
        mapper.schedule_disable_quadrant(&mut scheduler, 0, seconds(1.0), false);
        mapper.schedule_disable_quadrant(&mut scheduler, 1, seconds(1.5), false);

        run_due(&mut mapper, &mut scheduler, seconds(2.0));
        assert!(!mapper.is_traversable(0, 1));
        run_due(&mut mapper, &mut scheduler, seconds(2.9));
        assert!(!mapper.is_traversable(0, 1));
        assert!(!mapper.is_traversable(1, 2));
        run_due(&mut mapper, &mut scheduler, seconds(3.0));
        assert!(mapper.is_traversable(0, 1));
        assert!(mapper.is_traversable(1, 2));
    }

    #[test]
    fn test_attach_is_last_write_wins() {
        let mut mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();

        mapper.schedule_attach_event(&mut scheduler, 1, WaypointEvent::hazard("fire"), seconds(1.0));
        mapper.schedule_attach_event(&mut scheduler, 1, WaypointEvent::pickup("medkit"), seconds(2.0));
        mapper.schedule_detach_event(&mut scheduler, 1, seconds(3.0));

        run_due(&mut mapper, &mut scheduler, seconds(1.0));
        assert_eq!(mapper.event_at(1).map(|e| e.label.as_str()), Some("fire"));
        run_due(&mut mapper, &mut scheduler, seconds(2.0));
        assert_eq!(mapper.event_at(1), Some(&WaypointEvent::pickup("medkit")));
        run_due(&mut mapper, &mut scheduler, seconds(3.0));
        assert_eq!(mapper.event_at(1), None);
    }

    #[test]
    fn test_unknown_waypoint_is_refused() {
        let mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut scheduler = Scheduler::new();
        assert!(!mapper.schedule_disable_quadrant(&mut scheduler, 9, seconds(1.0), false));
        assert!(!mapper.schedule_detach_event(&mut scheduler, 9, seconds(1.0)));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_navigate_retries_until_accepted() {
        let mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut world = World::new();
        let (agent, probe) = spawn(&mut world, 3);

        assert!(mapper.navigate_to(&mut world, agent, 2));
        assert_eq!(probe.attempts(), 4);
        assert_eq!(world.get::<&QuadrantAssignment>(agent).unwrap().current, Some(2));
        assert_eq!(probe.snapshot().destination, Some(Vec3::new(40.0, 0.0, 0.0)));
    }

    #[test]
    fn test_navigate_gives_up_after_bound() {
        let mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut world = World::new();
        let (agent, probe) = spawn(&mut world, 1000);

        assert!(!mapper.navigate_to(&mut world, agent, 2));
        assert_eq!(probe.attempts(), MAX_NAVIGATION_ATTEMPTS);
        assert_eq!(world.get::<&QuadrantAssignment>(agent).unwrap().current, Some(0));
    }

    #[test]
    fn test_assign_and_evade() {
        let mapper = QuadrantMapper::from_level(&line_level(), false).unwrap();
        let mut world = World::new();
        let (agent, probe) = spawn(&mut world, 0);

        assert!(mapper.assign_quadrant(&mut world, agent, 2));
        assert_eq!(world.get::<&QuadrantAssignment>(agent).unwrap().anchor, Some(2));
        assert!(!mapper.assign_quadrant(&mut world, agent, 7));

        // agent sits at the origin, waypoint 1 is at x = 20
        assert!(mapper.evade_quadrant(&mut world, agent, 1));
        assert_eq!(probe.snapshot().destination, Some(Vec3::new(-20.0, 0.0, 0.0)));
        assert_eq!(mapper.camera_lane(1), Some(1));
    }
}
