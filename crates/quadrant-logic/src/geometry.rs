//! World-space geometry for waypoints and agents.
//!
//! The level is laid out on the X/Z plane with Y as height, so planar
//! helpers ignore Y and keep the caller's height.

use serde::{Deserialize, Serialize};

/// 3D position vector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        (*self - *other).length()
    }

    /// Distance on the X/Z plane only.
    pub fn planar_distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Copy of this vector with the height replaced.
    pub fn with_y(self, y: f32) -> Self {
        Self { y, ..self }
    }

    /// Point reflected through `center`: `center - (self - center)`.
    pub fn mirrored_through(self, center: Self) -> Self {
        center - (self - center)
    }

    /// Move toward `target` by at most `max_step`, landing exactly on it
    /// when closer than the step.
    pub fn step_toward(self, target: Self, max_step: f32) -> Self {
        let diff = target - self;
        let distance = diff.length();
        if distance <= max_step || distance <= f32::EPSILON {
            return target;
        }
        self + diff * (max_step / distance)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_through_center() {
        let agent = Vec3::new(2.0, 1.0, 3.0);
        let threat = Vec3::new(5.0, 1.0, 3.0);
        // threat mirrored through the agent lands on the far side
        assert_eq!(threat.mirrored_through(agent), Vec3::new(-1.0, 1.0, 3.0));
    }

    #[test]
    fn test_step_toward_clamps_to_target() {
        let start = Vec3::ZERO;
        let target = Vec3::new(3.0, 0.0, 4.0);
        assert_eq!(start.step_toward(target, 10.0), target);

        let partial = start.step_toward(target, 2.5);
        assert!((partial.length() - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Vec3::new(0.0, 100.0, 0.0);
        let b = Vec3::new(3.0, -7.0, 4.0);
        assert!((a.planar_distance(&b) - 5.0).abs() < 1e-5);
    }
}
