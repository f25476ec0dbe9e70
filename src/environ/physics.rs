//! # Physics Interface
//!
//! What the emission core needs from a physics engine: a read side for
//! area iteration, force sampling and ray casts, and a write side for
//! the force areas emitters generate.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{EnvironFlags, PhysForces};
use crate::params::ForceMode;
use crate::util::{Aabb, Location, Plane};

/// Physics area handle
pub type AreaId = u64;

/// Identity of an emitter that owns generated force areas
pub type OwnerId = u64;

/// Physical entity handle for targeted ray casts
pub type EntityId = u64;

/// Local geometry of a physics area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AreaGeometry {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Anything else (meshes, splines, cylinders)
    Other,
}

/// Buoyancy medium of an area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AreaMedium {
    Water { plane: Plane, flow: Vec3 },
    Air { flow: Vec3 },
}

/// Physics area as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysArea {
    pub id: AreaId,
    /// World bounds
    pub bounds: Aabb,
    /// Area frame
    pub center: Vec3,
    pub rotation: Quat,
    pub scale: f32,
    pub geometry: AreaGeometry,
    /// Same force everywhere inside
    pub is_uniform: bool,
    /// Ignored for indoor queries
    pub outdoor_only: bool,
    /// Gravity inside the area. For radial areas only its length is
    /// used, pushing outward from the center.
    pub gravity: Vec3,
    pub medium: Option<AreaMedium>,
    /// Normalized distance where falloff begins
    pub falloff0: f32,
    pub radial: bool,
    /// Emitter that generated this area, if any
    pub foreign_owner: Option<OwnerId>,
}

impl PhysArea {
    /// Uniform area with the given gravity, spanning `bounds`
    pub fn uniform(id: AreaId, bounds: Aabb, gravity: Vec3) -> Self {
        Self {
            id,
            bounds,
            center: bounds.center(),
            rotation: Quat::IDENTITY,
            scale: 1.0,
            geometry: AreaGeometry::Box {
                half_extents: bounds.size() * 0.5,
            },
            is_uniform: true,
            outdoor_only: false,
            gravity,
            medium: None,
            falloff0: 0.0,
            radial: false,
            foreign_owner: None,
        }
    }

    /// Which environment forces this area affects.
    pub fn affected_flags(&self) -> EnvironFlags {
        let mut flags = EnvironFlags::empty();
        if self.gravity != Vec3::ZERO {
            flags |= EnvironFlags::GRAVITY;
        }
        match self.medium {
            Some(AreaMedium::Water { flow, .. }) => {
                flags |= EnvironFlags::WATER;
                if flow != Vec3::ZERO {
                    flags |= EnvironFlags::WIND;
                }
            }
            Some(AreaMedium::Air { flow }) if flow != Vec3::ZERO => {
                flags |= EnvironFlags::WIND;
            }
            _ => {}
        }
        flags
    }

    /// Forces inside the area at full strength.
    pub fn forces(&self) -> PhysForces {
        let (wind, water) = match self.medium {
            Some(AreaMedium::Water { plane, flow }) => (flow, Some(plane)),
            Some(AreaMedium::Air { flow }) => (flow, None),
            None => (Vec3::ZERO, None),
        };
        PhysForces {
            accel: self.gravity,
            wind,
            water,
        }
    }
}

/// Ray cast result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the ray start
    pub dist: f32,
    pub pos: Vec3,
    pub normal: Vec3,
    pub surface_id: u32,
}

/// Read side of the physics engine.
pub trait PhysicsWorld: Send + Sync {
    /// Extent of the simulated world
    fn bounds(&self) -> Aabb;

    /// Forces that apply everywhere (global gravity and wind)
    fn global_forces(&self) -> PhysForces;

    /// Visit every area. Areas must not change during the iteration.
    fn for_each_area(&self, visit: &mut dyn FnMut(&PhysArea));

    /// Exact forces of one area at a point, `None` outside it.
    fn sample_area(&self, id: AreaId, pos: Vec3) -> Option<PhysForces>;

    /// Cast against terrain; `dir` spans the whole ray.
    fn ray_terrain(&self, start: Vec3, dir: Vec3) -> Option<RayHit>;

    /// Cast against static and/or dynamic entities selected by `flags`.
    fn ray_world(&self, start: Vec3, dir: Vec3, flags: EnvironFlags) -> Option<RayHit>;

    /// Cast against a single entity.
    fn ray_entity(&self, entity: EntityId, start: Vec3, dir: Vec3) -> Option<RayHit>;
}

/// Box-shaped force area generated by an emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceAreaDesc {
    /// Area frame; `scale` is the box radius
    pub location: Location,
    /// Full-strength region, in unit space
    pub inner: Aabb,
    /// Falloff region, in unit space
    pub outer: Aabb,
    pub mode: ForceMode,
    /// Gravity for [`ForceMode::Gravity`], flow velocity for [`ForceMode::Wind`]
    pub force: Vec3,
    /// Ambient water plane passed through by wind areas
    pub water: Option<Plane>,
    pub owner: OwnerId,
}

/// Write side of the physics engine.
pub trait ForceAreaHost {
    fn create_force_area(&mut self, desc: &ForceAreaDesc) -> Option<AreaId>;
    fn update_force_area(&mut self, id: AreaId, desc: &ForceAreaDesc);
    fn release_area(&mut self, id: AreaId);
}
