//! Simulation engine - owns the world, the quadrant graph and every timer

use std::time::Duration;

use hecs::{Entity, World};
use quadrant_logic::config::SimConfig;
use quadrant_logic::constants::{categories, DEFAULT_HEALTH};
use quadrant_logic::geometry::Vec3;
use quadrant_logic::graph::{DisabledEdges, WaypointKey};
use quadrant_logic::level::LevelData;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::components::*;
use crate::error::SimError;
use crate::ids::{AgentId, IdAllocator};
use crate::motion::MotionExecutor;
use crate::systems::behavior;
use crate::systems::*;

/// Everything needed to put one agent into the world.
#[derive(Debug)]
pub struct AgentSpawn {
    pub name: String,
    pub quadrant: Option<WaypointKey>,
    pub health: f32,
    pub motion: Motion,
}

impl AgentSpawn {
    pub fn new(name: impl Into<String>, executor: impl MotionExecutor + 'static) -> Self {
        Self {
            name: name.into(),
            quadrant: None,
            health: DEFAULT_HEALTH,
            motion: Motion::new(executor),
        }
    }

    /// Start in (and wander around) waypoint `key`.
    pub fn in_quadrant(mut self, key: WaypointKey) -> Self {
        self.quadrant = Some(key);
        self
    }

    pub fn with_health(mut self, health: f32) -> Self {
        self.health = health;
        self
    }
}

/// What one `update` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub timers_fired: u32,
    pub clock_ticks: u32,
    pub events_applied: u32,
    pub arrivals: u32,
    pub wanders_started: u32,
    pub deaths: u32,
    pub notifications: u32,
}

/// Main simulation context
pub struct Simulation {
    /// ECS world containing all agents
    pub world: World,
    mapper: QuadrantMapper,
    scheduler: Scheduler,
    notifier: Notifier,
    clock: ClockEventController,
    ids: IdAllocator,
    rng: ChaCha8Rng,
    config: SimConfig,
    next_clock_tick: Duration,
    time_scale: f32,
}

impl Simulation {
    /// Validate `config`, build the graph from `level` and start at t = 0.
    pub fn new(level: &LevelData, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mapper = QuadrantMapper::from_level(level, config.directed_graph)?;
        let clock = ClockEventController::with_defaults(&config);
        let mut sim = Self {
            world: World::new(),
            mapper,
            scheduler: Scheduler::new(),
            notifier: Notifier::new(),
            clock,
            ids: IdAllocator::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            next_clock_tick: Duration::ZERO,
            time_scale: 1.0,
        };
        sim.next_clock_tick = sim.clock_interval();
        Ok(sim)
    }

    /// Continue id allocation from an existing allocator.
    pub fn with_id_allocator(mut self, ids: IdAllocator) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the clock-event registry.
    pub fn with_clock(mut self, clock: ClockEventController) -> Self {
        self.clock = clock;
        self
    }

    fn clock_interval(&self) -> Duration {
        seconds(self.config.event_interval_rate).max(Duration::from_millis(1))
    }

    pub fn spawn_agent(&mut self, spawn: AgentSpawn) -> Entity {
        let id = self.ids.allocate();
        let quadrant = spawn.quadrant.filter(|key| {
            let known = self.mapper.waypoint(*key).is_some();
            if !known {
                log::warn!("agent {} spawned in unknown quadrant {}", id, key);
            }
            known
        });
        log::debug!("spawned {} {}", id, spawn.name);
        self.world.spawn((
            Agent { id, name: spawn.name },
            Behavior::default(),
            QuadrantAssignment {
                current: quadrant,
                anchor: quadrant,
            },
            WanderState::default(),
            Health::new(spawn.health),
            EventMarkers::default(),
            ActiveEvents::default(),
            spawn.motion,
        ))
    }

    /// Update the simulation by delta_seconds
    ///
    /// Executors advance first. Timers and clock ticks due within the frame
    /// then run in time order (timers first on a tie), followed by the
    /// behavior pass, death bookkeeping and notification delivery.
    pub fn update(&mut self, delta_seconds: f32) -> FrameReport {
        let mut report = FrameReport::default();
        let delta = if delta_seconds.is_finite() {
            (delta_seconds * self.time_scale).max(0.0)
        } else {
            0.0
        };

        for (_, motion) in self.world.query_mut::<&mut Motion>() {
            motion.0.advance(delta);
        }

        let end = self.scheduler.now() + seconds(delta);
        loop {
            let timer = self.scheduler.next_due().filter(|at| *at <= end);
            let tick = Some(self.next_clock_tick).filter(|at| *at <= end);
            match (timer, tick) {
                (None, None) => break,
                (Some(at), Some(tick_at)) if tick_at < at => self.run_clock_tick(tick_at, &mut report),
                (Some(_), _) => self.fire_next_timer(end, &mut report),
                (None, Some(tick_at)) => self.run_clock_tick(tick_at, &mut report),
            }
        }
        self.scheduler.advance_to(end);

        let behavior = behavior_system(&mut self.world, &self.mapper, &self.config, &mut self.rng);
        report.arrivals = behavior.arrivals;
        report.wanders_started = behavior.wanders_started;

        report.deaths = self.reap_deaths();
        report.notifications = self.notifier.flush() as u32;
        report
    }

    fn fire_next_timer(&mut self, end: Duration, report: &mut FrameReport) {
        let Some(task) = self.scheduler.pop_due(end) else {
            return;
        };
        log::debug!("t={:.2}s timer fired: {:?}", self.scheduler.now().as_secs_f32(), task);
        report.timers_fired += 1;
        match task {
            Task::Graph(task) => self.mapper.run_task(&mut self.scheduler, task),
            Task::Behavior(task) => behavior::run_task(&mut self.world, task),
            Task::ResolveEvent { agent, category } => {
                self.clock
                    .resolve(&mut self.world, &mut self.scheduler, &mut self.notifier, agent, category)
            }
        }
    }

    fn run_clock_tick(&mut self, at: Duration, report: &mut FrameReport) {
        self.scheduler.advance_to(at);
        let tick = self.clock.on_event_clock_update(
            &mut self.world,
            &mut self.scheduler,
            &mut self.notifier,
            &mut self.rng,
        );
        report.clock_ticks += 1;
        report.events_applied += tick.applied;
        self.next_clock_tick += self.clock_interval();
    }

    /// Kill every living agent whose health ran out.
    fn reap_deaths(&mut self) -> u32 {
        let depleted: Vec<Entity> = self
            .world
            .query_mut::<(&Health, &Behavior)>()
            .into_iter()
            .filter(|(_, (health, behavior))| health.is_depleted() && !behavior.state.is_dead())
            .map(|(entity, _)| entity)
            .collect();
        depleted.into_iter().filter(|&agent| self.kill(agent)).count() as u32
    }

    // ---- graph and waypoint events ----

    pub fn mapper(&self) -> &QuadrantMapper {
        &self.mapper
    }

    /// Disable a quadrant after `delay` seconds; temporary disables lift
    /// themselves after the same delay.
    pub fn disable_quadrant(&mut self, key: WaypointKey, delay: f32, permanent: bool) -> bool {
        self.mapper
            .schedule_disable_quadrant(&mut self.scheduler, key, seconds(delay), permanent)
    }

    pub fn enable_quadrant(&mut self, key: WaypointKey, edges: DisabledEdges, delay: f32) -> bool {
        self.mapper
            .schedule_enable_quadrant(&mut self.scheduler, key, edges, seconds(delay))
    }

    pub fn attach_event(&mut self, key: WaypointKey, event: WaypointEvent, delay: f32) -> bool {
        self.mapper
            .schedule_attach_event(&mut self.scheduler, key, event, seconds(delay))
    }

    pub fn detach_event(&mut self, key: WaypointKey, delay: f32) -> bool {
        self.mapper
            .schedule_detach_event(&mut self.scheduler, key, seconds(delay))
    }

    pub fn is_traversable(&self, a: WaypointKey, b: WaypointKey) -> bool {
        self.mapper.is_traversable(a, b)
    }

    pub fn route(&self, from: WaypointKey, to: WaypointKey) -> Option<Vec<WaypointKey>> {
        self.mapper.route(from, to)
    }

    // ---- agent control ----

    pub fn navigate_to(&mut self, agent: Entity, key: WaypointKey) -> bool {
        self.mapper.navigate_to(&mut self.world, agent, key)
    }

    pub fn assign_quadrant(&mut self, agent: Entity, key: WaypointKey) -> bool {
        self.mapper.assign_quadrant(&mut self.world, agent, key)
    }

    pub fn evade_quadrant(&mut self, agent: Entity, key: WaypointKey) -> bool {
        self.mapper.evade_quadrant(&mut self.world, agent, key)
    }

    pub fn seek(&mut self, agent: Entity, point: Vec3) -> bool {
        behavior::seek(&mut self.world, agent, point)
    }

    pub fn flee(&mut self, agent: Entity, threat: Vec3) -> bool {
        behavior::flee(&mut self.world, agent, threat)
    }

    pub fn freeze(&mut self, agent: Entity) -> bool {
        behavior::freeze(&mut self.world, &mut self.scheduler, agent)
    }

    pub fn schedule_resume(&mut self, agent: Entity, delay: f32) -> bool {
        behavior::schedule_resume(&self.world, &mut self.scheduler, agent, seconds(delay))
    }

    pub fn pay_respects(&mut self, agent: Entity, point: Vec3) -> bool {
        let accepted = behavior::pay_respects(
            &mut self.world,
            &mut self.scheduler,
            agent,
            point,
            self.config.respects_hold.clone(),
            &mut self.rng,
        );
        if !accepted {
            return false;
        }
        if let Ok(a) = self.world.get::<&Agent>(agent) {
            self.notifier.queue(Notification::new(
                categories::PAYING_RESPECTS,
                Some(a.id),
                format!("{} is paying respects", a.name),
            ));
        }
        true
    }

    pub fn set_chase_target(&mut self, agent: Entity, target: Option<Entity>) -> bool {
        behavior::set_chase_target(&mut self.world, agent, target)
    }

    /// Remove health; an agent brought to zero dies immediately.
    pub fn damage(&mut self, agent: Entity, amount: f32) -> Option<f32> {
        if !self.is_alive(agent) {
            return None;
        }
        let remaining = self.world.query_one_mut::<&mut Health>(agent).ok()?.damage(amount);
        if remaining <= 0.0 {
            self.kill(agent);
        }
        Some(remaining)
    }

    /// External death trigger. Returns `false` if the agent was already dead.
    pub fn kill(&mut self, agent: Entity) -> bool {
        if !behavior::die(&mut self.world, &mut self.scheduler, agent) {
            return false;
        }
        let (id, name) = match self.world.get::<&Agent>(agent) {
            Ok(a) => (a.id, a.name.clone()),
            Err(_) => return true,
        };
        log::info!("{} {} died", id, name);
        self.notifier.queue(Notification::new(
            categories::COLONIST_DIED,
            Some(id),
            format!("{} has died", name),
        ));
        true
    }

    // ---- clock events ----

    /// Apply the event registered for `category` right now, outside the tick.
    pub fn trigger_event(&mut self, agent: Entity, category: &str) -> bool {
        self.clock.apply_category(
            &mut self.world,
            &mut self.scheduler,
            &mut self.notifier,
            agent,
            category,
        )
    }

    pub fn answer_pending_call(&mut self, agent: Entity) -> bool {
        answer_pending_call(&mut self.world, &mut self.scheduler, agent)
    }

    pub fn event_count(&self, agent: Entity, category: &str) -> Option<u32> {
        self.world.get::<&EventMarkers>(agent).ok()?.count(category)
    }

    pub fn is_event_active(&self, agent: Entity, category: &str) -> bool {
        self.world
            .get::<&ActiveEvents>(agent)
            .is_ok_and(|active| active.is_active(category))
    }

    // ---- listeners ----

    pub fn subscribe(&mut self, listener: impl FnMut(&Notification) + 'static) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    // ---- queries ----

    pub fn agent_id(&self, agent: Entity) -> Option<AgentId> {
        self.world.get::<&Agent>(agent).ok().map(|a| a.id)
    }

    pub fn find_agent(&self, id: AgentId) -> Option<Entity> {
        self.world
            .query::<&Agent>()
            .iter()
            .find(|(_, agent)| agent.id == id)
            .map(|(entity, _)| entity)
    }

    pub fn behavior_state(&self, agent: Entity) -> Option<BehaviorState> {
        self.world.get::<&Behavior>(agent).ok().map(|b| b.state)
    }

    pub fn current_quadrant(&self, agent: Entity) -> Option<WaypointKey> {
        self.world
            .get::<&QuadrantAssignment>(agent)
            .ok()
            .and_then(|q| q.current)
    }

    pub fn health(&self, agent: Entity) -> Option<f32> {
        self.world.get::<&Health>(agent).ok().map(|h| h.current)
    }

    pub fn is_alive(&self, agent: Entity) -> bool {
        self.behavior_state(agent).is_some_and(|s| !s.is_dead())
    }

    /// Living agents in id order.
    pub fn living_agents(&self) -> Vec<Entity> {
        let mut living: Vec<(AgentId, Entity)> = self
            .world
            .query::<(&Agent, &Behavior)>()
            .iter()
            .filter(|(_, (_, b))| !b.state.is_dead())
            .map(|(entity, (agent, _))| (agent.id, entity))
            .collect();
        living.sort_by_key(|(id, _)| *id);
        living.into_iter().map(|(_, entity)| entity).collect()
    }

    pub fn agent_count(&self) -> usize {
        self.world.query::<&Agent>().iter().count()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Seconds since the simulation started.
    pub fn sim_time(&self) -> f64 {
        self.scheduler.now().as_secs_f64()
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("agents", &self.agent_count())
            .field("sim_time", &self.sim_time())
            .field("pending_timers", &self.scheduler.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{KinematicMotion, ScriptedMotion};
    use quadrant_logic::graph::EdgeDescriptor;
    use quadrant_logic::level::WaypointSpec;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn level() -> LevelData {
        LevelData {
            waypoints: vec![
                WaypointSpec { key: 0, position: Vec3::new(0.0, 0.0, 0.0), camera_lane: None },
                WaypointSpec { key: 1, position: Vec3::new(30.0, 0.0, 0.0), camera_lane: None },
                WaypointSpec { key: 2, position: Vec3::new(60.0, 0.0, 0.0), camera_lane: None },
            ],
            edges: vec![EdgeDescriptor::new(0, 1), EdgeDescriptor::new(1, 2)],
        }
    }

    fn quiet() -> SimConfig {
        SimConfig {
            trigger_chance: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_simulation_creation() {
        let sim = Simulation::new(&level(), SimConfig::default()).unwrap();
        assert_eq!(sim.agent_count(), 0);
        assert_eq!(sim.sim_time(), 0.0);
    }

    #[test]
    fn test_rejects_bad_level_and_config() {
        let mut bad = level();
        bad.edges.push(EdgeDescriptor::new(2, 9));
        assert!(matches!(
            Simulation::new(&bad, SimConfig::default()),
            Err(SimError::Configuration(_))
        ));

        let config = SimConfig {
            trigger_chance: 150.0,
            ..Default::default()
        };
        assert!(matches!(Simulation::new(&level(), config), Err(SimError::Config(_))));
    }

    #[test]
    fn test_ids_come_from_allocator() {
        let mut sim = Simulation::new(&level(), quiet())
            .unwrap()
            .with_id_allocator(IdAllocator::starting_at(10));
        let a = sim.spawn_agent(AgentSpawn::new("A", KinematicMotion::new(Vec3::ZERO, 1.0)));
        let b = sim.spawn_agent(AgentSpawn::new("B", KinematicMotion::new(Vec3::ZERO, 1.0)));
        assert_eq!(sim.agent_id(a), Some(AgentId(10)));
        assert_eq!(sim.find_agent(AgentId(11)), Some(b));
    }

    #[test]
    fn test_update_advances_time() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        for _ in 0..60 {
            sim.update(1.0);
        }
        assert!((sim.sim_time() - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_time_scale() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        sim.set_time_scale(2.0);
        sim.update(1.0);
        assert!((sim.sim_time() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_clock_ticks_once_per_interval() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        let ticks: u32 = (0..100).map(|_| sim.update(0.5).clock_ticks).sum();
        // 50 seconds at one tick every 5 seconds
        assert_eq!(ticks, 10);
    }

    #[test]
    fn test_agents_wander_and_arrive() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        let agent = sim.spawn_agent(
            AgentSpawn::new("Walker", KinematicMotion::new(Vec3::ZERO, 20.0)).in_quadrant(0),
        );
        let first = sim.update(0.1);
        assert_eq!(first.wanders_started, 1);
        assert_eq!(sim.behavior_state(agent), Some(BehaviorState::Wandering));

        let arrivals: u32 = (0..200).map(|_| sim.update(0.1).arrivals).sum();
        assert!(arrivals > 0);
    }

    #[test]
    fn test_lethal_damage_kills_and_notifies() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sim.subscribe(move |n| sink.borrow_mut().push(n.category.clone()));

        let (motion, _probe) = ScriptedMotion::new(0);
        let agent = sim.spawn_agent(AgentSpawn::new("Cas", motion).with_health(15.0));
        assert_eq!(sim.damage(agent, 10.0), Some(5.0));
        assert_eq!(sim.damage(agent, 10.0), Some(0.0));
        assert!(!sim.is_alive(agent));
        assert_eq!(sim.damage(agent, 10.0), None);
        assert!(!sim.navigate_to(agent, 1));
        assert!(!sim.assign_quadrant(agent, 1));
        assert!(sim.living_agents().is_empty());

        sim.update(0.1);
        assert_eq!(*seen.borrow(), vec![categories::COLONIST_DIED.to_string()]);
    }

    #[test]
    fn test_freeze_keeps_pending_call_resolution() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        let (motion, _probe) = ScriptedMotion::new(0);
        let agent = sim.spawn_agent(AgentSpawn::new("Dee", motion));

        assert!(sim.trigger_event(agent, categories::PENDING_CALLS));
        assert!(sim.freeze(agent));
        sim.update(sim.config().pending_call_wait);

        assert!(!sim.is_event_active(agent, categories::PENDING_CALLS));
        assert_eq!(sim.event_count(agent, categories::MISSED_CALLS), Some(1));
    }

    #[test]
    fn test_answered_call_leaves_next_call_ringing() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        let (motion, _probe) = ScriptedMotion::new(0);
        let agent = sim.spawn_agent(AgentSpawn::new("Eve", motion));

        assert!(sim.trigger_event(agent, categories::PENDING_CALLS));
        sim.update(5.0);
        assert!(sim.answer_pending_call(agent));
        sim.update(5.0);
        assert!(sim.trigger_event(agent, categories::PENDING_CALLS));

        // t=31: past the answered call's deadline, inside the new call's
        sim.update(21.0);
        assert!(sim.is_event_active(agent, categories::PENDING_CALLS));
        assert_eq!(sim.event_count(agent, categories::MISSED_CALLS), None);

        // t=40: the new call hangs up after its full wait
        sim.update(9.0);
        assert!(!sim.is_event_active(agent, categories::PENDING_CALLS));
        assert_eq!(sim.event_count(agent, categories::MISSED_CALLS), Some(1));
    }

    #[test]
    fn test_paying_respects_announced_only_for_living() {
        let mut sim = Simulation::new(&level(), quiet()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        sim.subscribe(move |n| sink.borrow_mut().push(n.category.clone()));

        let (motion, _probe) = ScriptedMotion::new(0);
        let mourner = sim.spawn_agent(AgentSpawn::new("Fay", motion));
        let (motion, _probe) = ScriptedMotion::new(0);
        let ghost = sim.spawn_agent(AgentSpawn::new("Gil", motion));
        assert!(sim.kill(ghost));
        sim.update(0.1);
        seen.borrow_mut().clear();

        assert!(!sim.pay_respects(ghost, Vec3::new(30.0, 0.0, 0.0)));
        sim.update(0.1);
        assert!(seen.borrow().is_empty());

        assert!(sim.pay_respects(mourner, Vec3::new(30.0, 0.0, 0.0)));
        sim.update(0.1);
        assert_eq!(*seen.borrow(), vec![categories::PAYING_RESPECTS.to_string()]);
    }
}
