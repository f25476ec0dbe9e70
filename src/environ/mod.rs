//! # Physics Environment
//!
//! Cached snapshot of the forces acting on particles: a uniform aggregate
//! (gravity, wind, water plane) plus the non-uniform areas overlapping a
//! region of interest.

pub mod area;
pub mod collision;
pub mod physics;
pub mod shared;

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use area::{AreaEval, AreaLock, NonUniformArea, UnitShape, UnitTransform};
pub use collision::{physics_collision, CollisionHit};
pub use physics::{
    AreaGeometry, AreaId, AreaMedium, EntityId, ForceAreaDesc, ForceAreaHost, OwnerId, PhysArea,
    PhysicsWorld, RayHit,
};
pub use shared::SharedEnviron;

use crate::error::EmissionError;
use crate::util::{Aabb, Plane, Trinary};

bitflags! {
    /// Environment requirements and capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EnvironFlags: u32 {
        const GRAVITY         = 1 << 0;
        const WIND            = 1 << 1;
        const WATER           = 1 << 2;
        const COLLIDE_TERRAIN = 1 << 3;
        const COLLIDE_STATIC  = 1 << 4;
        const COLLIDE_DYNAMIC = 1 << 5;
        /// Snapshot is in sync with the physics areas
        const LOADED          = 1 << 16;

        const PHYS_FORCES = Self::GRAVITY.bits() | Self::WIND.bits() | Self::WATER.bits();
        const COLLIDE_ANY = Self::COLLIDE_TERRAIN.bits() | Self::COLLIDE_STATIC.bits() | Self::COLLIDE_DYNAMIC.bits();
    }
}

/// Forces at a point or over a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysForces {
    /// Gravity
    pub accel: Vec3,
    /// Wind velocity
    pub wind: Vec3,
    /// Water surface, if any
    pub water: Option<Plane>,
}

impl PhysForces {
    /// Keep only the components selected by `flags`.
    pub fn masked(mut self, flags: EnvironFlags) -> Self {
        if !flags.contains(EnvironFlags::GRAVITY) {
            self.accel = Vec3::ZERO;
        }
        if !flags.contains(EnvironFlags::WIND) {
            self.wind = Vec3::ZERO;
        }
        if !flags.contains(EnvironFlags::WATER) {
            self.water = None;
        }
        self
    }

    /// Accumulate the components selected by `flags`.
    pub fn add(&mut self, other: &PhysForces, flags: EnvironFlags) {
        if flags.contains(EnvironFlags::GRAVITY) {
            self.accel += other.accel;
        }
        if flags.contains(EnvironFlags::WIND) {
            self.wind += other.wind;
        }
        if flags.contains(EnvironFlags::WATER) {
            if let Some(plane) = other.water {
                self.merge_water(plane, None);
            }
        }
    }

    /// Keep the higher of two water surfaces, measured at `at` when given.
    pub fn merge_water(&mut self, plane: Plane, at: Option<Vec3>) {
        let higher = match (self.water, at) {
            (None, _) => true,
            (Some(cur), Some(p)) => plane.dist_from_plane(p) < cur.dist_from_plane(p),
            (Some(cur), None) => plane.d > cur.d,
        };
        if higher {
            self.water = Some(plane);
        }
    }
}

/// Physics environment snapshot.
#[derive(Clone, Default)]
pub struct PhysEnviron {
    /// Aggregate of uniform areas
    pub uniform: PhysForces,
    /// Forces present in the uniform aggregate
    pub uniform_flags: EnvironFlags,
    /// Forces contributed by non-uniform areas, plus [`EnvironFlags::LOADED`]
    pub non_uniform_flags: EnvironFlags,
    /// Forces that need a live physics query per sample
    pub non_cached_flags: EnvironFlags,
    pub underwater: Trinary,
    areas: Vec<Arc<NonUniformArea>>,
    world: Option<Arc<dyn PhysicsWorld>>,
}

impl fmt::Debug for PhysEnviron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysEnviron")
            .field("uniform", &self.uniform)
            .field("uniform_flags", &self.uniform_flags)
            .field("non_uniform_flags", &self.non_uniform_flags)
            .field("non_cached_flags", &self.non_cached_flags)
            .field("underwater", &self.underwater)
            .field("areas", &self.areas.len())
            .finish()
    }
}

impl PhysEnviron {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot with fixed uniform forces and no areas, already current.
    pub fn with_uniform(forces: PhysForces) -> Self {
        let mut env = Self {
            uniform: forces,
            non_uniform_flags: EnvironFlags::LOADED,
            ..Default::default()
        };
        env.uniform_flags = env.present_uniform_flags();
        env.underwater = if forces.water.is_some() {
            Trinary::Unknown
        } else {
            Trinary::False
        };
        env
    }

    fn present_uniform_flags(&self) -> EnvironFlags {
        let mut flags = EnvironFlags::empty();
        if self.uniform.accel != Vec3::ZERO {
            flags |= EnvironFlags::GRAVITY;
        }
        if self.uniform.wind != Vec3::ZERO {
            flags |= EnvironFlags::WIND;
        }
        if self.uniform.water.is_some() {
            flags |= EnvironFlags::WATER;
        }
        flags
    }

    fn clear(&mut self) {
        self.uniform = PhysForces::default();
        self.uniform_flags = EnvironFlags::empty();
        self.non_uniform_flags = EnvironFlags::empty();
        self.non_cached_flags = EnvironFlags::empty();
        self.underwater = Trinary::Unknown;
        self.areas.clear();
    }

    /// True until an area change invalidates the snapshot.
    pub fn is_current(&self) -> bool {
        self.non_uniform_flags.contains(EnvironFlags::LOADED)
    }

    /// Area-change event.
    pub fn invalidate(&mut self) {
        self.non_uniform_flags.remove(EnvironFlags::LOADED);
    }

    pub fn areas(&self) -> &[Arc<NonUniformArea>] {
        &self.areas
    }

    /// Any non-uniform area affecting the selected forces
    pub fn has_non_uniform(&self, flags: EnvironFlags) -> bool {
        self.non_uniform_flags.intersects(flags & EnvironFlags::PHYS_FORCES)
    }

    /// Rebuild from every area in the world.
    ///
    /// Non-uniform areas from the previous snapshot are reused when their
    /// identity, flags and geometry match. The caller must keep the
    /// world's areas unchanged for the duration.
    pub fn query_world(
        &mut self,
        world: &Arc<dyn PhysicsWorld>,
        flag_mask: EnvironFlags,
        include_non_uniform: bool,
    ) {
        let previous = std::mem::take(&mut self.areas);
        self.clear();
        self.non_uniform_flags = EnvironFlags::LOADED;
        self.world = Some(Arc::clone(world));

        let world_bounds = world.bounds();
        self.uniform = world.global_forces().masked(flag_mask);
        self.uniform_flags = self.present_uniform_flags();

        let mut reused = 0usize;
        world.for_each_area(&mut |area: &PhysArea| {
            let affected = area.affected_flags() & flag_mask;
            if affected.is_empty() || !area.bounds.overlaps(&world_bounds) {
                return;
            }

            if area.is_uniform {
                self.uniform.add(&area.forces(), affected);
                self.uniform_flags |= affected;
            } else if include_non_uniform {
                let cached = previous
                    .iter()
                    .find(|old| old.id == area.id && old.flags == affected && old.matches_geometry(area))
                    .cloned();
                let record = match cached {
                    Some(old) => {
                        reused += 1;
                        old
                    }
                    None => Arc::new(NonUniformArea::from_phys(area, affected)),
                };
                self.non_uniform_flags |= affected;
                if record.is_exact_only() {
                    self.non_cached_flags |= affected;
                }
                self.areas.push(record);
            }
        });

        self.underwater = if self.uniform.water.is_some() || self.non_uniform_flags.contains(EnvironFlags::WATER) {
            Trinary::Unknown
        } else {
            Trinary::False
        };

        log::debug!(
            "Environment queried: {} non-uniform areas ({} reused), uniform {:?}",
            self.areas.len(),
            reused,
            self.uniform_flags
        );
    }

    /// Narrow a world snapshot down to the areas overlapping `bb`.
    ///
    /// Indoor regions drop outdoor-only areas and the global wind. Areas
    /// owned by `skip_owner` are left out.
    pub fn query_region(
        &mut self,
        source: &PhysEnviron,
        bb: &Aabb,
        indoors: bool,
        flag_mask: EnvironFlags,
        include_non_uniform: bool,
        skip_owner: Option<OwnerId>,
    ) {
        self.clear();
        self.non_uniform_flags = EnvironFlags::LOADED;
        self.world = source.world.clone();

        self.uniform = source.uniform.masked(flag_mask);
        if indoors {
            self.uniform.wind = Vec3::ZERO;
        }
        self.uniform_flags = self.present_uniform_flags();

        self.underwater = match self.uniform.water {
            Some(plane) => {
                let (lo, hi) = plane_range(&plane, bb);
                Trinary::from_range(hi < 0.0, lo > 0.0)
            }
            None => Trinary::False,
        };

        if !include_non_uniform {
            return;
        }

        for area in &source.areas {
            let affected = area.flags & flag_mask;
            if affected.is_empty() || !area.bounds.overlaps(bb) {
                continue;
            }
            if indoors && area.outdoor_only {
                continue;
            }
            if skip_owner.is_some() && area.owner == skip_owner {
                continue;
            }
            if affected.contains(EnvironFlags::WATER) && self.underwater == Trinary::False {
                self.underwater = Trinary::Unknown;
            }
            self.non_uniform_flags |= affected;
            if area.is_exact_only() {
                self.non_cached_flags |= affected;
            }
            self.areas.push(Arc::clone(area));
        }
    }

    /// Forces at a point.
    ///
    /// Sampling non-uniform forces requires a current snapshot.
    pub fn get_forces(&self, pos: Vec3, flags: EnvironFlags) -> PhysForces {
        let mut forces = self.uniform;
        if self.has_non_uniform(flags) {
            debug_assert!(self.is_current(), "sampling non-uniform forces from a stale snapshot");
            for area in &self.areas {
                if area.flags.intersects(flags) {
                    area.get_forces(&mut forces, pos, flags, self.world.as_deref());
                }
            }
        }
        forces
    }

    /// [`PhysEnviron::get_forces`] that reports staleness instead of asserting.
    pub fn checked_forces(&self, pos: Vec3, flags: EnvironFlags) -> Result<PhysForces, EmissionError> {
        if self.has_non_uniform(flags) && !self.is_current() {
            return Err(EmissionError::StaleEnvironment);
        }
        Ok(self.get_forces(pos, flags))
    }
}

/// Signed distance range of a box from a plane.
fn plane_range(plane: &Plane, bb: &Aabb) -> (f32, f32) {
    let center = plane.dist_from_plane(bb.center());
    let half = bb.size() * 0.5;
    let extent = (plane.normal * half).abs();
    let reach = extent.x + extent.y + extent.z;
    (center - reach, center + reach)
}
