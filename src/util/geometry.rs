//! # Geometry
//!
//! Axis-aligned boxes, planes and tri-state flags.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::transform::Location;

/// Axis-aligned bounding box.
///
/// A "reset" box has `min = +inf` and `max = -inf` so that the first
/// `add` collapses it onto a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::RESET
    }
}

impl Aabb {
    /// Empty box
    pub const RESET: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of a single point
    pub fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Box symmetric around the origin
    pub fn centered(half_extents: Vec3) -> Self {
        Self {
            min: -half_extents,
            max: half_extents,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::RESET;
    }

    pub fn is_reset(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Grow to include a point
    pub fn add(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include another box
    pub fn add_box(&mut self, other: &Aabb) {
        if !other.is_reset() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Grow by `v` on every side
    pub fn expand(&mut self, v: Vec3) {
        if !self.is_reset() {
            self.min -= v;
            self.max += v;
        }
    }

    /// Minkowski sum with another box.
    pub fn augment(&mut self, other: &Aabb) {
        if !other.is_reset() {
            self.min += other.min;
            self.max += other.max;
        }
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.min += offset;
        self.max += offset;
    }

    pub fn scaled(&self, s: f32) -> Aabb {
        let a = self.min * s;
        let b = self.max * s;
        Aabb::new(a.min(b), a.max(b))
    }

    pub fn size(&self) -> Vec3 {
        if self.is_reset() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> Vec3 {
        if self.is_reset() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Largest absolute coordinate of either corner.
    pub fn max_abs_component(&self) -> f32 {
        self.min.abs().max_element().max(self.max.abs().max_element())
    }

    /// Bounds of this box after rotating, scaling and moving it.
    pub fn transformed(&self, loc: &Location) -> Aabb {
        if self.is_reset() {
            return *self;
        }
        let center = loc.transform_point(self.center());
        let half = self.size() * 0.5 * loc.scale;
        let extent = rotated_extent(loc.rotation, half);
        Aabb::new(center - extent, center + extent)
    }
}

/// Half extents of a rotated box, in world axes.
fn rotated_extent(rotation: Quat, half: Vec3) -> Vec3 {
    let m = glam::Mat3::from_quat(rotation);
    Vec3::new(
        m.x_axis.x.abs() * half.x + m.y_axis.x.abs() * half.y + m.z_axis.x.abs() * half.z,
        m.x_axis.y.abs() * half.x + m.y_axis.y.abs() * half.y + m.z_axis.y.abs() * half.z,
        m.x_axis.z.abs() * half.x + m.y_axis.z.abs() * half.y + m.z_axis.z.abs() * half.z,
    )
}

/// Plane `n . p = d`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Horizontal water surface at height `z`, normal pointing up.
    pub fn horizontal(z: f32) -> Self {
        Self {
            normal: Vec3::Z,
            d: z,
        }
    }

    /// Signed distance, positive on the normal side.
    pub fn dist_from_plane(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.d
    }
}

/// Three-valued flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trinary {
    False,
    True,
    #[default]
    Unknown,
}

impl Trinary {
    pub fn from_range(all_true: bool, all_false: bool) -> Self {
        if all_true {
            Trinary::True
        } else if all_false {
            Trinary::False
        } else {
            Trinary::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_and_add() {
        let mut bb = Aabb::RESET;
        assert!(bb.is_reset());
        assert_eq!(bb.size(), Vec3::ZERO);

        bb.add(Vec3::new(1.0, 2.0, 3.0));
        bb.add(Vec3::new(-1.0, 0.0, 5.0));
        assert_eq!(bb.min, Vec3::new(-1.0, 0.0, 3.0));
        assert_eq!(bb.max, Vec3::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn test_augment() {
        let mut bb = Aabb::centered(Vec3::ONE);
        bb.augment(&Aabb::new(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(bb.min, Vec3::splat(-1.0));
        assert_eq!(bb.max, Vec3::new(5.0, 1.0, 1.0));
    }

    #[test]
    fn test_transformed_rotation() {
        let bb = Aabb::centered(Vec3::new(2.0, 1.0, 1.0));
        let loc = Location::new(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            1.0,
        );
        let t = bb.transformed(&loc);
        assert!((t.size() - Vec3::new(2.0, 4.0, 2.0)).length() < 1e-4);
        assert!((t.center() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::horizontal(2.0);
        assert_eq!(plane.dist_from_plane(Vec3::new(0.0, 0.0, 5.0)), 3.0);
        assert_eq!(plane.dist_from_plane(Vec3::ZERO), -2.0);
    }
}
