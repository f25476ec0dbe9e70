//! # Location
//!
//! Rotation, translation and uniform scale of an emitter or particle.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// World placement with uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for Location {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Location {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Local point to world.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.translation + self.rotation * (p * self.scale)
    }

    /// World point to local.
    pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        let local = self.rotation.inverse() * (p - self.translation);
        if self.scale != 0.0 {
            local / self.scale
        } else {
            local
        }
    }

    /// Emission axis (local Z).
    pub fn axis(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// True when both locations differ by less than the given tolerances.
    /// Rotation is compared through the quaternion components.
    pub fn is_equivalent(&self, other: &Location, epsilon: f32, scale_epsilon: f32) -> bool {
        let dq = if self.rotation.dot(other.rotation) < 0.0 {
            -other.rotation
        } else {
            other.rotation
        };
        (self.translation - other.translation).abs().max_element() <= epsilon
            && (self.rotation.xyz() - dq.xyz()).abs().max_element() <= epsilon
            && (self.rotation.w - dq.w).abs() <= epsilon
            && (self.scale - other.scale).abs() <= scale_epsilon
    }

    /// Blend between two locations: positions and scale linearly,
    /// rotation along the shortest arc.
    pub fn interpolate(a: &Location, b: &Location, t: f32) -> Location {
        Location {
            translation: a.translation.lerp(b.translation, t),
            rotation: a.rotation.slerp(b.rotation, t),
            scale: a.scale + (b.scale - a.scale) * t,
        }
    }
}
