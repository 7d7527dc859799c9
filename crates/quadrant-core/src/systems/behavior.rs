//! Behavior system - per-agent state machine driving motion intents
//!
//! States: Idle, Wandering, Seeking, Fleeing, Frozen, Dead. Every accepted
//! motion intent raises the cooldown governor; arrival lowers it again
//! unless a timed hold (paying respects) is outstanding. Idle agents with no
//! chase target and a clear governor start wandering around their anchor.

use std::ops::RangeInclusive;
use std::time::Duration;

use hecs::{Entity, World};
use quadrant_logic::config::SimConfig;
use quadrant_logic::geometry::Vec3;
use quadrant_logic::steering::{self, WanderBounds};
use rand::Rng;

use super::navigation::QuadrantMapper;
use super::scheduler::{seconds, Owner, Scheduler, Task};
use crate::components::{Behavior, BehaviorState, Motion, QuadrantAssignment, WanderState};

/// Timed behavior waits, owned by the agent and cancelled when it freezes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorTask {
    /// Lower the cooldown governor.
    ResetCooldown(Entity),
    /// Clear the path, restart the executor and drop the governor.
    Resume(Entity),
}

impl BehaviorTask {
    pub fn agent(&self) -> Entity {
        match *self {
            BehaviorTask::ResetCooldown(agent) | BehaviorTask::Resume(agent) => agent,
        }
    }
}

/// Issue a motion intent toward `point` and enter `state` if it is accepted.
///
/// Refuses dead agents and agents off the navigable surface without
/// touching the executor.
pub fn issue_intent(world: &mut World, agent: Entity, point: Vec3, state: BehaviorState) -> bool {
    let Ok((behavior, motion)) = world.query_one_mut::<(&mut Behavior, &mut Motion)>(agent) else {
        return false;
    };
    if behavior.state.is_dead() || !motion.0.is_on_navigable_surface() {
        return false;
    }
    if !motion.0.set_destination(point) {
        return false;
    }
    motion.0.resume();
    behavior.state = state;
    behavior.cool_down = true;
    behavior.awaiting_arrival = true;
    true
}

/// Pursue a stationary position.
pub fn seek(world: &mut World, agent: Entity, point: Vec3) -> bool {
    issue_intent(world, agent, point, BehaviorState::Seeking)
}

/// Run directly away from `threat`, as far as the agent currently is from it.
pub fn flee(world: &mut World, agent: Entity, threat: Vec3) -> bool {
    let Ok(motion) = world.query_one_mut::<&Motion>(agent) else {
        return false;
    };
    let destination = steering::flee_destination(motion.0.position(), threat);
    issue_intent(world, agent, destination, BehaviorState::Fleeing)
}

/// Pick a new wander target around the agent's anchor and head for it.
///
/// An agent off the navigable surface is first warped to a point near the
/// anchor. Agents without an anchor wander around where they stand.
pub fn start_wander(
    world: &mut World,
    mapper: &QuadrantMapper,
    agent: Entity,
    bounds: WanderBounds,
    rng: &mut impl Rng,
) -> bool {
    let target = {
        let Ok((behavior, motion, assignment)) =
            world.query_one_mut::<(&Behavior, &mut Motion, &QuadrantAssignment)>(agent)
        else {
            return false;
        };
        if behavior.state.is_dead() {
            return false;
        }
        let anchor = assignment
            .anchor
            .or(assignment.current)
            .and_then(|key| mapper.position_of(key))
            .unwrap_or_else(|| motion.0.position());

        if !motion.0.is_on_navigable_surface() {
            let landing = steering::recovery_point(anchor, bounds.radius, rng);
            log::debug!("warping off-surface agent to {:?}", landing);
            motion.0.warp(landing);
        }
        steering::wander_target(anchor, motion.0.position().y, bounds, rng)
    };

    if !issue_intent(world, agent, target, BehaviorState::Wandering) {
        return false;
    }
    if let Ok(wander) = world.query_one_mut::<&mut WanderState>(agent) {
        wander.last_target = Some(target);
        wander.wanders_started += 1;
    }
    true
}

/// Halt all behavior: cancel the agent's timed waits, stop the executor,
/// clear its path and raise the governor.
pub fn freeze(world: &mut World, scheduler: &mut Scheduler, agent: Entity) -> bool {
    let Ok((behavior, motion)) = world.query_one_mut::<(&mut Behavior, &mut Motion)>(agent) else {
        return false;
    };
    if behavior.state.is_dead() {
        return false;
    }
    let cancelled = scheduler.cancel_owner(Owner::Behavior(agent));
    motion.0.stop();
    motion.0.reset_path();
    behavior.state = BehaviorState::Frozen;
    behavior.cool_down = true;
    behavior.hold_pending = false;
    behavior.awaiting_arrival = false;
    log::debug!("froze {:?}, cancelled {} timed waits", agent, cancelled);
    true
}

/// Terminal transition. Returns `false` if the agent was already dead.
pub fn die(world: &mut World, scheduler: &mut Scheduler, agent: Entity) -> bool {
    let Ok((behavior, motion)) = world.query_one_mut::<(&mut Behavior, &mut Motion)>(agent) else {
        return false;
    };
    if behavior.state.is_dead() {
        return false;
    }
    scheduler.cancel_owner(Owner::Behavior(agent));
    scheduler.cancel_owner(Owner::Events(agent));
    motion.0.stop();
    motion.0.reset_path();
    behavior.state = BehaviorState::Dead;
    behavior.cool_down = true;
    behavior.hold_pending = false;
    behavior.awaiting_arrival = false;
    behavior.chase_target = None;
    true
}

/// Walk to `point` and hold there for a random time drawn from `hold`
/// before the governor drops.
pub fn pay_respects(
    world: &mut World,
    scheduler: &mut Scheduler,
    agent: Entity,
    point: Vec3,
    hold: RangeInclusive<f32>,
    rng: &mut impl Rng,
) -> bool {
    match world.query_one_mut::<&mut Behavior>(agent) {
        Ok(behavior) if !behavior.state.is_dead() => {
            behavior.cool_down = true;
            behavior.hold_pending = true;
        }
        _ => return false,
    }
    let accepted = seek(world, agent, point);
    let wait = rng.gen_range(hold);
    scheduler.schedule(seconds(wait), Task::Behavior(BehaviorTask::ResetCooldown(agent)));
    log::debug!("{:?} paying respects, holding {:.1}s", agent, wait);
    accepted
}

/// Resume a stopped agent after `delay`.
pub fn schedule_resume(world: &World, scheduler: &mut Scheduler, agent: Entity, delay: Duration) -> bool {
    let alive = world
        .get::<&Behavior>(agent)
        .is_ok_and(|b| !b.state.is_dead());
    if alive {
        scheduler.schedule(delay, Task::Behavior(BehaviorTask::Resume(agent)));
    }
    alive
}

pub fn set_chase_target(world: &mut World, agent: Entity, target: Option<Entity>) -> bool {
    match world.query_one_mut::<&mut Behavior>(agent) {
        Ok(behavior) if !behavior.state.is_dead() => {
            behavior.chase_target = target;
            true
        }
        _ => false,
    }
}

/// Handle a fired behavior timer.
pub fn run_task(world: &mut World, task: BehaviorTask) {
    let agent = task.agent();
    let Ok((behavior, motion)) = world.query_one_mut::<(&mut Behavior, &mut Motion)>(agent) else {
        return;
    };
    if behavior.state.is_dead() {
        return;
    }
    match task {
        BehaviorTask::ResetCooldown(_) => {
            behavior.cool_down = false;
            behavior.hold_pending = false;
        }
        BehaviorTask::Resume(_) => {
            motion.0.reset_path();
            motion.0.resume();
            behavior.cool_down = false;
            behavior.hold_pending = false;
            behavior.awaiting_arrival = false;
            if behavior.state == BehaviorState::Frozen {
                behavior.state = BehaviorState::Idle;
            }
        }
    }
}

/// What one behavior pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorReport {
    pub arrivals: u32,
    pub wanders_started: u32,
}

/// Observe arrivals and start wandering for idle agents.
///
/// Agents are visited in entity order so runs are reproducible.
pub fn behavior_system(
    world: &mut World,
    mapper: &QuadrantMapper,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> BehaviorReport {
    let mut report = BehaviorReport::default();
    let bounds = config.wander_bounds();

    let mut agents: Vec<Entity> = world
        .query_mut::<(&Behavior, &Motion)>()
        .into_iter()
        .map(|(entity, _)| entity)
        .collect();
    agents.sort_by_key(|e| e.to_bits());

    for agent in agents {
        let Ok((behavior, motion)) = world.query_one_mut::<(&mut Behavior, &Motion)>(agent) else {
            continue;
        };

        if behavior.awaiting_arrival && behavior.state.is_moving() {
            let arrived = motion.0.is_on_navigable_surface()
                && steering::has_arrived(motion.0.remaining_distance(), config.stopping_range);
            if !arrived {
                continue;
            }
            report.arrivals += 1;
            behavior.awaiting_arrival = false;
            if !behavior.hold_pending {
                behavior.cool_down = false;
            }
            let rewander = behavior.state == BehaviorState::Wandering
                && behavior.chase_target.is_none()
                && !behavior.cool_down;
            behavior.state = BehaviorState::Idle;
            if rewander && start_wander(world, mapper, agent, bounds, rng) {
                report.wanders_started += 1;
            }
        } else if behavior.state == BehaviorState::Idle
            && !behavior.cool_down
            && behavior.chase_target.is_none()
            && start_wander(world, mapper, agent, bounds, rng)
        {
            report.wanders_started += 1;
        }
    }
    report
}
