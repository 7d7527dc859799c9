//! Pure steering math: wander targets, flee points, arrival test.
//!
//! Wander algorithm:
//! 1. Start from the anchor waypoint's position on the X/Z plane
//! 2. Offset X and Z independently by `U(-radius, radius)`
//! 3. Add a random jitter magnitude `U[0, jitter)` to both axes
//! 4. Keep the agent's current height so the target stays on its floor

use rand::Rng;

use crate::geometry::Vec3;

/// Parameters bounding a wander target around an anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderBounds {
    pub radius: f32,
    pub jitter: f32,
}

/// Pick a wander target near `anchor`, keeping `current_height`.
pub fn wander_target(anchor: Vec3, current_height: f32, bounds: WanderBounds, rng: &mut impl Rng) -> Vec3 {
    let offset_x = sample_symmetric(rng, bounds.radius);
    let offset_z = sample_symmetric(rng, bounds.radius);
    let jitter = if bounds.jitter > 0.0 {
        rng.gen_range(0.0..bounds.jitter)
    } else {
        0.0
    };

    Vec3::new(
        anchor.x - offset_x + jitter,
        current_height,
        anchor.z - offset_z + jitter,
    )
}

/// Random point within `radius` of `center` on the X/Z plane, used to put
/// an agent back on the navigable surface before wandering.
pub fn recovery_point(center: Vec3, radius: f32, rng: &mut impl Rng) -> Vec3 {
    Vec3::new(
        center.x + sample_symmetric(rng, radius),
        center.y,
        center.z + sample_symmetric(rng, radius),
    )
}

fn sample_symmetric(rng: &mut impl Rng, radius: f32) -> f32 {
    if radius > 0.0 {
        rng.gen_range(-radius..radius)
    } else {
        0.0
    }
}

/// Destination that leads directly away from `threat`.
///
/// The threat is mirrored through the agent's position, so the agent runs
/// the same distance it currently keeps from the threat, in the opposite
/// direction.
pub fn flee_destination(position: Vec3, threat: Vec3) -> Vec3 {
    threat.mirrored_through(position)
}

/// Arrival predicate. Inclusive: exactly `stopping_range` counts as arrived.
pub fn has_arrived(remaining_distance: f32, stopping_range: f32) -> bool {
    remaining_distance <= stopping_range
}
