//! Clock events - probability-gated state changes applied on a fixed tick
//!
//! Every tick, each living agent rolls `U[0, 100)`. A roll under the trigger
//! chance picks one registered event and tries to apply it. Each event
//! category doubles as an idempotency flag held on the agent: while the flag
//! is set the same event cannot apply again. A successful application
//! records a marker, raises the flag, notifies listeners and schedules the
//! event's companion resolution, which lowers the flag later. The flag keeps
//! that timer's id; lowering the flag any other way cancels the timer, so a
//! stale resolution can never land on a later application.

use std::time::Duration;

use hecs::{Entity, World};
use quadrant_logic::config::SimConfig;
use quadrant_logic::constants::categories;
use rand::Rng;

use super::notify::{Notification, Notifier};
use super::scheduler::{seconds, Scheduler, Task};
use crate::components::{ActiveEvents, Agent, Behavior, EventMarkers, Health};

/// The slice of agent state a clock event may touch.
pub struct EventTarget<'a> {
    pub entity: Entity,
    pub agent: &'a Agent,
    markers: &'a mut EventMarkers,
    health: Option<&'a mut Health>,
    notifier: &'a mut Notifier,
}

impl EventTarget<'_> {
    /// Count one occurrence of `category` on the agent.
    pub fn record_marker(&mut self, category: &str) -> u32 {
        self.markers.record(category)
    }

    pub fn notify(&mut self, category: &str, message: impl Into<String>) {
        self.notifier
            .queue(Notification::new(category, Some(self.agent.id), message));
    }

    /// Remove health. `None` if the agent has no health to lose.
    pub fn damage(&mut self, amount: f32) -> Option<f32> {
        self.health.as_deref_mut().map(|h| h.damage(amount))
    }
}

/// A category of periodically attempted event.
pub trait ClockEvent: Send + Sync {
    /// Category name, used for markers, the idempotency flag and notifications.
    fn category(&self) -> &'static str;

    fn message(&self, agent: &Agent) -> String;

    /// Event-specific effect. `false` means nothing happened and the
    /// occurrence is not recorded.
    fn apply(&self, _target: &mut EventTarget<'_>) -> bool {
        true
    }

    /// Delay before the companion resolution runs. `None` keeps the flag
    /// raised until something else clears it.
    fn resolution_delay(&self) -> Option<Duration>;

    /// Secondary consequences when the resolution fires with the flag still
    /// raised. The flag itself is lowered by the controller.
    fn resolve(&self, _target: &mut EventTarget<'_>) {}
}

/// An incoming call. Unanswered calls hang up after `wait` and count as
/// missed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingCallEvent {
    pub wait: Duration,
}

impl ClockEvent for PendingCallEvent {
    fn category(&self) -> &'static str {
        categories::PENDING_CALLS
    }

    fn message(&self, agent: &Agent) -> String {
        format!("{} has a call waiting", agent.name)
    }

    fn resolution_delay(&self) -> Option<Duration> {
        Some(self.wait)
    }

    fn resolve(&self, target: &mut EventTarget<'_>) {
        target.record_marker(categories::MISSED_CALLS);
        let message = format!("{} missed a call", target.agent.name);
        target.notify(categories::MISSED_CALLS, message);
    }
}

/// An accident that costs health. The agent is immune while recovering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MishapEvent {
    pub damage: f32,
    pub recovery: Duration,
}

impl ClockEvent for MishapEvent {
    fn category(&self) -> &'static str {
        categories::MISHAPS
    }

    fn message(&self, agent: &Agent) -> String {
        format!("{} had a mishap", agent.name)
    }

    fn apply(&self, target: &mut EventTarget<'_>) -> bool {
        target.damage(self.damage).is_some()
    }

    fn resolution_delay(&self) -> Option<Duration> {
        Some(self.recovery)
    }
}

/// Outcome of one clock tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Living agents that rolled.
    pub eligible: u32,
    /// Rolls under the trigger chance.
    pub triggered: u32,
    /// Events that took effect.
    pub applied: u32,
}

/// Registry of clock events plus the trigger chance.
pub struct ClockEventController {
    events: Vec<Box<dyn ClockEvent>>,
    trigger_chance: f32,
}

impl ClockEventController {
    pub fn new(trigger_chance: f32) -> Self {
        Self {
            events: Vec::new(),
            trigger_chance,
        }
    }

    /// Pending calls and mishaps, tuned from `config`.
    pub fn with_defaults(config: &SimConfig) -> Self {
        let mut controller = Self::new(config.trigger_chance);
        controller.register(PendingCallEvent {
            wait: seconds(config.pending_call_wait),
        });
        controller.register(MishapEvent {
            damage: config.mishap_damage,
            recovery: seconds(config.mishap_recovery),
        });
        controller
    }

    pub fn register(&mut self, event: impl ClockEvent + 'static) {
        self.events.push(Box::new(event));
    }

    pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.events.iter().map(|e| e.category())
    }

    pub fn trigger_chance(&self) -> f32 {
        self.trigger_chance
    }

    fn event(&self, category: &str) -> Option<&dyn ClockEvent> {
        self.events
            .iter()
            .find(|e| e.category() == category)
            .map(|e| e.as_ref())
    }

    /// Run one clock tick over every living agent, in agent-id order.
    pub fn on_event_clock_update(
        &self,
        world: &mut World,
        scheduler: &mut Scheduler,
        notifier: &mut Notifier,
        rng: &mut impl Rng,
    ) -> TickReport {
        let mut report = TickReport::default();

        let mut agents: Vec<_> = world
            .query_mut::<(&Agent, &Behavior)>()
            .into_iter()
            .filter(|(_, (_, behavior))| !behavior.state.is_dead())
            .map(|(entity, (agent, _))| (agent.id, entity))
            .collect();
        agents.sort_by_key(|(id, _)| *id);

        for (_, entity) in agents {
            report.eligible += 1;
            let roll: f32 = rng.gen_range(0.0..100.0);
            if roll >= self.trigger_chance || self.events.is_empty() {
                continue;
            }
            report.triggered += 1;

            let index = rng.gen_range(0..self.events.len());
            if self.apply_to(world, scheduler, notifier, entity, self.events[index].as_ref()) {
                report.applied += 1;
            }
        }
        report
    }

    /// Try to apply `event` to one agent.
    ///
    /// Returns `false` with no state change if the agent is dead, lacks
    /// event state, already has the category's flag raised, or the event
    /// declines.
    pub fn apply_to(
        &self,
        world: &mut World,
        scheduler: &mut Scheduler,
        notifier: &mut Notifier,
        entity: Entity,
        event: &dyn ClockEvent,
    ) -> bool {
        let Ok((agent, behavior, markers, active, health)) = world.query_one_mut::<(
            &Agent,
            &Behavior,
            &mut EventMarkers,
            &mut ActiveEvents,
            Option<&mut Health>,
        )>(entity) else {
            return false;
        };
        if behavior.state.is_dead() {
            return false;
        }
        let category = event.category();
        if active.is_active(category) {
            log::debug!("{} already in {}, skipped", agent.id, category);
            return false;
        }

        let mut target = EventTarget {
            entity,
            agent,
            markers,
            health,
            notifier,
        };
        if !event.apply(&mut target) {
            return false;
        }
        let count = target.record_marker(category);
        target.notify(category, event.message(agent));
        active.set(category);

        if let Some(delay) = event.resolution_delay() {
            let timer = scheduler.schedule(delay, Task::ResolveEvent { agent: entity, category });
            active.set_resolution(category, timer);
        }
        log::info!("{} applied to {} {} (count {})", category, agent.name, agent.id, count);
        true
    }

    /// Apply the registered event for `category`, if any.
    pub fn apply_category(
        &self,
        world: &mut World,
        scheduler: &mut Scheduler,
        notifier: &mut Notifier,
        entity: Entity,
        category: &str,
    ) -> bool {
        match self.event(category) {
            Some(event) => self.apply_to(world, scheduler, notifier, entity, event),
            None => false,
        }
    }

    /// Companion resolution. A no-op if the flag was already lowered.
    ///
    /// Called early, it also cancels the resolution timer still queued.
    pub fn resolve(
        &self,
        world: &mut World,
        scheduler: &mut Scheduler,
        notifier: &mut Notifier,
        entity: Entity,
        category: &str,
    ) {
        let Ok((agent, markers, active, health)) = world.query_one_mut::<(
            &Agent,
            &mut EventMarkers,
            &mut ActiveEvents,
            Option<&mut Health>,
        )>(entity) else {
            return;
        };
        let timer = active.resolution(category);
        if !active.clear(category) {
            return;
        }
        if let Some(timer) = timer {
            scheduler.cancel(timer);
        }
        log::debug!("{} resolved for {}", category, agent.id);
        if let Some(event) = self.event(category) {
            let mut target = EventTarget {
                entity,
                agent,
                markers,
                health,
                notifier,
            };
            event.resolve(&mut target);
        }
    }
}

impl std::fmt::Debug for ClockEventController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockEventController")
            .field("events", &self.categories().collect::<Vec<_>>())
            .field("trigger_chance", &self.trigger_chance)
            .finish()
    }
}

/// Pick up a ringing call and cancel its hang-up.
pub fn answer_pending_call(world: &mut World, scheduler: &mut Scheduler, entity: Entity) -> bool {
    let Ok(active) = world.query_one_mut::<&mut ActiveEvents>(entity) else {
        return false;
    };
    let hang_up = active.resolution(categories::PENDING_CALLS);
    if !active.clear(categories::PENDING_CALLS) {
        return false;
    }
    if let Some(timer) = hang_up {
        scheduler.cancel(timer);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::BehaviorState;
    use crate::ids::AgentId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spawn(world: &mut World, id: u32) -> Entity {
        world.spawn((
            Agent { id: AgentId(id), name: format!("Colonist {id}") },
            Behavior::default(),
            EventMarkers::default(),
            ActiveEvents::default(),
            Health::new(100.0),
        ))
    }

    fn calls_only(chance: f32) -> ClockEventController {
        let mut controller = ClockEventController::new(chance);
        controller.register(PendingCallEvent { wait: seconds(30.0) });
        controller
    }

    fn markers(world: &World, entity: Entity, category: &str) -> Option<u32> {
        world.get::<&EventMarkers>(entity).unwrap().count(category)
    }

    #[test]
    fn test_certain_trigger_is_guarded() {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let agent = spawn(&mut world, 0);
        let clock = calls_only(100.0);

        assert_eq!(markers(&world, agent, categories::PENDING_CALLS), None);
        let first = clock.on_event_clock_update(&mut world, &mut scheduler, &mut notifier, &mut rng);
        assert_eq!(first.applied, 1);
        assert_eq!(markers(&world, agent, categories::PENDING_CALLS), Some(1));
        assert!(world.get::<&ActiveEvents>(agent).unwrap().is_active(categories::PENDING_CALLS));

        let second = clock.on_event_clock_update(&mut world, &mut scheduler, &mut notifier, &mut rng);
        assert_eq!(second.triggered, 1);
        assert_eq!(second.applied, 0);
        assert_eq!(markers(&world, agent, categories::PENDING_CALLS), Some(1));
        assert_eq!(notifier.pending(), 1);
    }

    #[test]
    fn test_zero_chance_never_fires() {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for id in 0..20 {
            spawn(&mut world, id);
        }
        let clock = calls_only(0.0);
        for _ in 0..50 {
            let report = clock.on_event_clock_update(&mut world, &mut scheduler, &mut notifier, &mut rng);
            assert_eq!(report.eligible, 20);
            assert_eq!(report.triggered, 0);
        }
    }

    #[test]
    fn test_dead_agents_are_not_eligible() {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let alive = spawn(&mut world, 0);
        let dead = spawn(&mut world, 1);
        world.get::<&mut Behavior>(dead).unwrap().state = BehaviorState::Dead;

        let report = calls_only(100.0).on_event_clock_update(&mut world, &mut scheduler, &mut notifier, &mut rng);
        assert_eq!(report.eligible, 1);
        assert_eq!(markers(&world, alive, categories::PENDING_CALLS), Some(1));
        assert_eq!(markers(&world, dead, categories::PENDING_CALLS), None);
    }

    #[test]
    fn test_unanswered_call_is_missed() {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let agent = spawn(&mut world, 0);
        let clock = calls_only(100.0);

        assert!(clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::PENDING_CALLS));
        let Some(Task::ResolveEvent { category, .. }) = scheduler.pop_due(seconds(30.0)) else {
            panic!("hang-up not scheduled");
        };
        clock.resolve(&mut world, &mut scheduler, &mut notifier, agent, category);

        assert_eq!(markers(&world, agent, categories::MISSED_CALLS), Some(1));
        assert!(world.get::<&ActiveEvents>(agent).unwrap().is_empty());
    }

    #[test]
    fn test_answered_call_resolves_quietly() {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let agent = spawn(&mut world, 0);
        let clock = calls_only(100.0);

        clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::PENDING_CALLS);
        assert!(answer_pending_call(&mut world, &mut scheduler, agent));
        assert!(!answer_pending_call(&mut world, &mut scheduler, agent));
        assert_eq!(scheduler.pending(), 0);
        clock.resolve(&mut world, &mut scheduler, &mut notifier, agent, categories::PENDING_CALLS);

        assert_eq!(markers(&world, agent, categories::MISSED_CALLS), None);
        assert_eq!(notifier.pending(), 1);
    }

    #[test]
    fn test_answered_call_hang_up_spares_next_call() {
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let agent = spawn(&mut world, 0);
        let clock = calls_only(100.0);

        // ring at t=0, answer at t=5, ring again at t=10
        assert!(clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::PENDING_CALLS));
        scheduler.advance_to(seconds(5.0));
        assert!(answer_pending_call(&mut world, &mut scheduler, agent));
        scheduler.advance_to(seconds(10.0));
        assert!(clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::PENDING_CALLS));

        // the first call's deadline passes without touching the second call
        assert_eq!(scheduler.pop_due(seconds(31.0)), None);
        assert!(world.get::<&ActiveEvents>(agent).unwrap().is_active(categories::PENDING_CALLS));
        assert_eq!(markers(&world, agent, categories::MISSED_CALLS), None);

        let Some(Task::ResolveEvent { category, .. }) = scheduler.pop_due(seconds(40.0)) else {
            panic!("second hang-up not scheduled");
        };
        clock.resolve(&mut world, &mut scheduler, &mut notifier, agent, category);
        assert_eq!(markers(&world, agent, categories::MISSED_CALLS), Some(1));
    }

    #[test]
    fn test_early_resolve_cancels_queued_timer() {
        let config = SimConfig::default();
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let agent = spawn(&mut world, 0);
        let clock = ClockEventController::with_defaults(&config);

        clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::MISHAPS);
        assert_eq!(scheduler.pending(), 1);
        clock.resolve(&mut world, &mut scheduler, &mut notifier, agent, categories::MISHAPS);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_mishap_damages_and_guards() {
        let config = SimConfig::default();
        let mut world = World::new();
        let mut scheduler = Scheduler::new();
        let mut notifier = Notifier::new();
        let agent = spawn(&mut world, 0);
        let clock = ClockEventController::with_defaults(&config);

        assert!(clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::MISHAPS));
        assert!(!clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::MISHAPS));
        assert_eq!(world.get::<&Health>(agent).unwrap().current, 90.0);

        clock.resolve(&mut world, &mut scheduler, &mut notifier, agent, categories::MISHAPS);
        assert!(clock.apply_category(&mut world, &mut scheduler, &mut notifier, agent, categories::MISHAPS));
        assert_eq!(markers(&world, agent, categories::MISHAPS), Some(2));
    }
}
