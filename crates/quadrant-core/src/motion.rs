//! Motion executor boundary.
//!
//! The engine never moves an agent itself. It issues motion intents through
//! [`MotionExecutor`] and reads back remaining distance to detect arrival.
//! Path planning lives entirely behind this trait.
//!
//! Two executors ship with the crate: [`KinematicMotion`], a straight-line
//! mover for headless runs, and [`ScriptedMotion`], which rejects a fixed
//! number of intents and exposes a probe so harnesses can observe calls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quadrant_logic::geometry::Vec3;

/// Per-agent motion capability, resolved once when the agent is spawned.
pub trait MotionExecutor: Send + Sync {
    /// Ask the executor to head for `point`. `false` means the intent was
    /// declined immediately.
    fn set_destination(&mut self, point: Vec3) -> bool;

    /// Distance left along the current path. Zero when there is no path.
    fn remaining_distance(&self) -> f32;

    fn is_on_navigable_surface(&self) -> bool;

    /// Halt in place, keeping the current path.
    fn stop(&mut self);

    /// Clear a previous `stop`.
    fn resume(&mut self);

    fn reset_path(&mut self);

    /// Teleport to `point`, dropping any path.
    fn warp(&mut self, point: Vec3);

    fn position(&self) -> Vec3;

    /// Advance internal motion by one frame. Executors driven by an
    /// external engine can ignore this.
    fn advance(&mut self, _delta_seconds: f32) {}
}

/// Straight-line executor moving at constant speed.
#[derive(Debug, Clone)]
pub struct KinematicMotion {
    position: Vec3,
    destination: Option<Vec3>,
    speed: f32,
    stopped: bool,
    on_surface: bool,
}

impl KinematicMotion {
    pub fn new(position: Vec3, speed: f32) -> Self {
        Self {
            position,
            destination: None,
            speed,
            stopped: false,
            on_surface: true,
        }
    }

    /// Start off the navigable surface (declines intents until warped).
    pub fn off_surface(mut self) -> Self {
        self.on_surface = false;
        self
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl MotionExecutor for KinematicMotion {
    fn set_destination(&mut self, point: Vec3) -> bool {
        if !self.on_surface {
            return false;
        }
        self.destination = Some(point);
        true
    }

    fn remaining_distance(&self) -> f32 {
        self.destination
            .map(|d| self.position.distance(&d))
            .unwrap_or(0.0)
    }

    fn is_on_navigable_surface(&self) -> bool {
        self.on_surface
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn resume(&mut self) {
        self.stopped = false;
    }

    fn reset_path(&mut self) {
        self.destination = None;
    }

    fn warp(&mut self, point: Vec3) {
        self.position = point;
        self.destination = None;
        self.on_surface = true;
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn advance(&mut self, delta_seconds: f32) {
        if self.stopped {
            return;
        }
        if let Some(target) = self.destination {
            self.position = self.position.step_toward(target, self.speed * delta_seconds);
        }
    }
}

/// Observable state of a [`ScriptedMotion`].
#[derive(Debug, Clone, Default)]
pub struct ScriptState {
    /// Every `set_destination` call, accepted or not.
    pub attempts: u32,
    pub rejections_left: u32,
    pub remaining: f32,
    pub on_surface: bool,
    pub stopped: bool,
    pub destination: Option<Vec3>,
    pub position: Vec3,
    pub stops: u32,
    pub path_resets: u32,
    pub warps: u32,
}

/// Executor that declines its first N intents and never moves on its own.
///
/// Remaining distance is whatever the probe last set, which lets a harness
/// decide exactly when an agent "arrives".
#[derive(Debug, Clone)]
pub struct ScriptedMotion {
    state: Arc<Mutex<ScriptState>>,
}

/// Shared handle onto a [`ScriptedMotion`]'s state.
#[derive(Debug, Clone)]
pub struct MotionProbe {
    state: Arc<Mutex<ScriptState>>,
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedMotion {
    pub fn new(reject_first: u32) -> (Self, MotionProbe) {
        let state = Arc::new(Mutex::new(ScriptState {
            rejections_left: reject_first,
            on_surface: true,
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MotionProbe { state },
        )
    }
}

impl MotionProbe {
    pub fn snapshot(&self) -> ScriptState {
        lock(&self.state).clone()
    }

    pub fn attempts(&self) -> u32 {
        lock(&self.state).attempts
    }

    pub fn set_remaining(&self, remaining: f32) {
        lock(&self.state).remaining = remaining;
    }

    pub fn set_on_surface(&self, on_surface: bool) {
        lock(&self.state).on_surface = on_surface;
    }

    pub fn set_rejections(&self, count: u32) {
        lock(&self.state).rejections_left = count;
    }
}

impl MotionExecutor for ScriptedMotion {
    fn set_destination(&mut self, point: Vec3) -> bool {
        let mut s = lock(&self.state);
        s.attempts += 1;
        if s.rejections_left > 0 {
            s.rejections_left -= 1;
            return false;
        }
        s.destination = Some(point);
        true
    }

    fn remaining_distance(&self) -> f32 {
        lock(&self.state).remaining
    }

    fn is_on_navigable_surface(&self) -> bool {
        lock(&self.state).on_surface
    }

    fn stop(&mut self) {
        let mut s = lock(&self.state);
        s.stopped = true;
        s.stops += 1;
    }

    fn resume(&mut self) {
        lock(&self.state).stopped = false;
    }

    fn reset_path(&mut self) {
        let mut s = lock(&self.state);
        s.destination = None;
        s.path_resets += 1;
    }

    fn warp(&mut self, point: Vec3) {
        let mut s = lock(&self.state);
        s.position = point;
        s.destination = None;
        s.on_surface = true;
        s.warps += 1;
    }

    fn position(&self) -> Vec3 {
        lock(&self.state).position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinematic_reaches_destination() {
        let mut m = KinematicMotion::new(Vec3::ZERO, 2.0);
        assert!(m.set_destination(Vec3::new(4.0, 0.0, 0.0)));
        m.advance(1.0);
        assert!((m.remaining_distance() - 2.0).abs() < 1e-5);
        m.advance(5.0);
        assert_eq!(m.position(), Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(m.remaining_distance(), 0.0);
    }

    #[test]
    fn test_kinematic_stopped_holds_position() {
        let mut m = KinematicMotion::new(Vec3::ZERO, 1.0);
        m.set_destination(Vec3::new(10.0, 0.0, 0.0));
        m.stop();
        m.advance(3.0);
        assert_eq!(m.position(), Vec3::ZERO);
        m.resume();
        m.advance(3.0);
        assert!((m.position().x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_off_surface_declines_until_warped() {
        let mut m = KinematicMotion::new(Vec3::ZERO, 1.0).off_surface();
        assert!(!m.set_destination(Vec3::new(1.0, 0.0, 0.0)));
        m.warp(Vec3::new(5.0, 0.0, 5.0));
        assert!(m.is_on_navigable_surface());
        assert!(m.set_destination(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_scripted_rejects_then_accepts() {
        let (mut m, probe) = ScriptedMotion::new(2);
        assert!(!m.set_destination(Vec3::ZERO));
        assert!(!m.set_destination(Vec3::ZERO));
        assert!(m.set_destination(Vec3::ZERO));
        assert_eq!(probe.attempts(), 3);
        assert_eq!(probe.snapshot().destination, Some(Vec3::ZERO));
    }
}
