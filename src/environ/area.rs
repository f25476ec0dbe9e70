//! # Non-Uniform Areas
//!
//! Cached records of physics areas whose force varies with position.
//! Box and sphere areas are evaluated locally in unit-shape space; any
//! other geometry goes back to the physics engine on every sample.

use std::sync::atomic::{AtomicI32, Ordering};

use glam::{Quat, Vec3};

use super::physics::{AreaGeometry, AreaId, OwnerId, PhysArea, PhysicsWorld};
use super::{EnvironFlags, PhysForces};
use crate::util::{div_min, Aabb};

/// Tolerance when checking whether an area moved since it was cached
const GEOMETRY_TOLERANCE: f32 = 1e-3;

/// Unit shape of a fast-evaluable area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitShape {
    /// Chebyshev distance
    Box,
    /// Euclidean distance
    Sphere,
}

/// World to unit-shape space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTransform {
    pub center: Vec3,
    pub inv_rotation: Quat,
    pub inv_extents: Vec3,
}

impl UnitTransform {
    pub fn new(center: Vec3, rotation: Quat, extents: Vec3) -> Self {
        let inv = |e: f32| if e != 0.0 { 1.0 / e } else { 0.0 };
        Self {
            center,
            inv_rotation: rotation.inverse(),
            inv_extents: Vec3::new(inv(extents.x), inv(extents.y), inv(extents.z)),
        }
    }

    pub fn apply(&self, pos: Vec3) -> Vec3 {
        (self.inv_rotation * (pos - self.center)) * self.inv_extents
    }
}

/// How an area's force is evaluated
#[derive(Debug, Clone, PartialEq)]
pub enum AreaEval {
    FastEvaluable {
        to_unit: UnitTransform,
        shape: UnitShape,
        /// `1 / (1 - falloff0)`
        falloff_scale: f32,
        radial: bool,
    },
    /// Live physics query per sample
    ExactOnly,
}

/// Cached non-uniform area.
#[derive(Debug)]
pub struct NonUniformArea {
    pub id: AreaId,
    /// Forces this area contributes
    pub flags: EnvironFlags,
    /// World bounds; water areas reach down to `-inf`
    pub bounds: Aabb,
    /// Bounds as reported, for change detection
    source_bounds: Aabb,
    center: Vec3,
    pub outdoor_only: bool,
    pub owner: Option<OwnerId>,
    /// Full-strength forces
    pub forces: PhysForces,
    pub eval: AreaEval,
    locks: AtomicI32,
}

impl NonUniformArea {
    pub fn from_phys(area: &PhysArea, flags: EnvironFlags) -> Self {
        let mut bounds = area.bounds;
        if flags.contains(EnvironFlags::WATER) {
            bounds.min.z = f32::NEG_INFINITY;
        }

        let falloff_scale = div_min(1.0, 1.0 - area.falloff0, f32::MAX);
        let fast = |extents: Vec3, shape: UnitShape| AreaEval::FastEvaluable {
            to_unit: UnitTransform::new(area.center, area.rotation, extents * area.scale),
            shape,
            falloff_scale,
            radial: area.radial,
        };
        let eval = match area.geometry {
            AreaGeometry::Box { half_extents } => fast(half_extents, UnitShape::Box),
            AreaGeometry::Sphere { radius } => fast(Vec3::splat(radius), UnitShape::Sphere),
            AreaGeometry::Other => {
                log::trace!("Area {} has no fast evaluation, sampling live", area.id);
                AreaEval::ExactOnly
            }
        };

        Self {
            id: area.id,
            flags,
            bounds,
            source_bounds: area.bounds,
            center: area.center,
            outdoor_only: area.outdoor_only,
            owner: area.foreign_owner,
            forces: area.forces(),
            eval,
            locks: AtomicI32::new(0),
        }
    }

    pub fn is_exact_only(&self) -> bool {
        matches!(self.eval, AreaEval::ExactOnly)
    }

    /// True when `area` still has the geometry this record was built from.
    pub fn matches_geometry(&self, area: &PhysArea) -> bool {
        let close = |a: Vec3, b: Vec3| (a - b).abs().max_element() <= GEOMETRY_TOLERANCE;
        close(self.source_bounds.min, area.bounds.min)
            && close(self.source_bounds.max, area.bounds.max)
            && close(self.center, area.center)
    }

    /// Pin the area for a live query.
    pub fn lock(&self) -> AreaLock<'_> {
        self.locks.fetch_add(1, Ordering::AcqRel);
        AreaLock { area: self }
    }

    pub fn lock_count(&self) -> i32 {
        self.locks.load(Ordering::Acquire)
    }

    /// Normalized distance from the center, or `None` without fast evaluation.
    pub fn unit_distance(&self, pos: Vec3) -> Option<f32> {
        match &self.eval {
            AreaEval::FastEvaluable { to_unit, shape, .. } => {
                let local = to_unit.apply(pos);
                Some(match shape {
                    UnitShape::Box => local.abs().max_element(),
                    UnitShape::Sphere => local.length(),
                })
            }
            AreaEval::ExactOnly => None,
        }
    }

    /// Falloff strength at a point; `None` outside the shape or without
    /// fast evaluation.
    pub fn falloff_strength(&self, pos: Vec3) -> Option<f32> {
        let falloff_scale = match &self.eval {
            AreaEval::FastEvaluable { falloff_scale, .. } => *falloff_scale,
            AreaEval::ExactOnly => return None,
        };
        let dist = self.unit_distance(pos)?;
        if dist > 1.0 {
            return None;
        }
        Some(((1.0 - dist) * falloff_scale).min(1.0))
    }

    /// Add this area's contribution at `pos` to `forces`.
    pub fn get_forces(
        &self,
        forces: &mut PhysForces,
        pos: Vec3,
        flags: EnvironFlags,
        world: Option<&dyn PhysicsWorld>,
    ) {
        let flags = flags & self.flags;
        if flags.is_empty() || !self.bounds.contains(pos) {
            return;
        }

        if flags.contains(EnvironFlags::WATER) {
            if let Some(plane) = self.forces.water {
                forces.merge_water(plane, Some(pos));
            }
        }

        let flags = flags - EnvironFlags::WATER;
        if flags.is_empty() {
            return;
        }

        match &self.eval {
            AreaEval::FastEvaluable { radial, .. } => {
                let Some(strength) = self.falloff_strength(pos) else {
                    return;
                };
                if *radial {
                    let offset = pos - self.center;
                    // normalize_or_zero leaves the center itself force-free
                    let dir = offset.normalize_or_zero();
                    if flags.contains(EnvironFlags::GRAVITY) {
                        forces.accel += dir * (self.forces.accel.length() * strength);
                    }
                    if flags.contains(EnvironFlags::WIND) {
                        forces.wind += dir * (self.forces.wind.length() * strength);
                    }
                } else {
                    if flags.contains(EnvironFlags::GRAVITY) {
                        forces.accel += self.forces.accel * strength;
                    }
                    if flags.contains(EnvironFlags::WIND) {
                        forces.wind += self.forces.wind * strength;
                    }
                }
            }
            AreaEval::ExactOnly => {
                let Some(world) = world else {
                    return;
                };
                let _lock = self.lock();
                if let Some(sample) = world.sample_area(self.id, pos) {
                    forces.add(&sample, flags);
                }
            }
        }
    }
}

/// Holds an area pinned while it is queried live.
#[derive(Debug)]
pub struct AreaLock<'a> {
    area: &'a NonUniformArea,
}

impl Drop for AreaLock<'_> {
    fn drop(&mut self) {
        self.area.locks.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::physics::AreaMedium;
    use crate::util::Plane;

    fn sphere_area(falloff0: f32) -> PhysArea {
        PhysArea {
            id: 7,
            bounds: Aabb::centered(Vec3::splat(2.0)),
            center: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
            geometry: AreaGeometry::Sphere { radius: 2.0 },
            is_uniform: false,
            outdoor_only: false,
            gravity: Vec3::new(0.0, 0.0, -4.0),
            medium: None,
            falloff0,
            radial: false,
            foreign_owner: None,
        }
    }

    #[test]
    fn test_sphere_falloff() {
        let area = NonUniformArea::from_phys(&sphere_area(0.2), EnvironFlags::GRAVITY);
        assert_eq!(area.falloff_strength(Vec3::ZERO), Some(1.0));
        let edge = area.falloff_strength(Vec3::new(2.0, 0.0, 0.0)).unwrap();
        assert!(edge.abs() < 1e-6);
        assert_eq!(area.falloff_strength(Vec3::new(3.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_box_uses_chebyshev() {
        let mut phys = sphere_area(0.0);
        phys.geometry = AreaGeometry::Box {
            half_extents: Vec3::splat(2.0),
        };
        let area = NonUniformArea::from_phys(&phys, EnvironFlags::GRAVITY);
        let d = area.unit_distance(Vec3::new(1.9, 1.9, 1.9)).unwrap();
        assert!((d - 0.95).abs() < 1e-5);
    }

    #[test]
    fn test_radial_direction() {
        let mut phys = sphere_area(0.0);
        phys.radial = true;
        let area = NonUniformArea::from_phys(&phys, EnvironFlags::GRAVITY);

        let mut forces = PhysForces::default();
        area.get_forces(&mut forces, Vec3::new(1.0, 0.0, 0.0), EnvironFlags::GRAVITY, None);
        assert!(forces.accel.x > 0.0);
        assert!(forces.accel.y.abs() < 1e-6 && forces.accel.z.abs() < 1e-6);

        let mut at_center = PhysForces::default();
        area.get_forces(&mut at_center, Vec3::ZERO, EnvironFlags::GRAVITY, None);
        assert_eq!(at_center.accel, Vec3::ZERO);
    }

    #[test]
    fn test_water_bounds_extend_down() {
        let mut phys = sphere_area(0.0);
        phys.gravity = Vec3::ZERO;
        phys.medium = Some(AreaMedium::Water {
            plane: Plane::horizontal(1.0),
            flow: Vec3::ZERO,
        });
        let area = NonUniformArea::from_phys(&phys, EnvironFlags::WATER);
        assert_eq!(area.bounds.min.z, f32::NEG_INFINITY);

        let mut forces = PhysForces::default();
        area.get_forces(&mut forces, Vec3::new(0.0, 0.0, -100.0), EnvironFlags::WATER, None);
        assert_eq!(forces.water, Some(Plane::horizontal(1.0)));
    }

    #[test]
    fn test_lock_guard() {
        let mut phys = sphere_area(0.0);
        phys.geometry = AreaGeometry::Other;
        let area = NonUniformArea::from_phys(&phys, EnvironFlags::GRAVITY);
        assert!(area.is_exact_only());
        {
            let _a = area.lock();
            let _b = area.lock();
            assert_eq!(area.lock_count(), 2);
        }
        assert_eq!(area.lock_count(), 0);
    }
}
