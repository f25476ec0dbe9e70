//! # Collision
//!
//! Sphere sweep against terrain and entities.

use glam::Vec3;

use super::physics::{EntityId, PhysicsWorld, RayHit};
use super::EnvironFlags;

/// First contact of a swept sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionHit {
    /// Sphere center at contact
    pub pos: Vec3,
    pub normal: Vec3,
    pub surface_id: u32,
    /// Hit terrain rather than an entity
    pub terrain: bool,
    /// Fraction of the `start..end` segment travelled, `[0, 1]`
    pub dist: f32,
}

/// Sweep a sphere of `radius` from `start` to `end`.
///
/// Terrain is tested first when requested and no entity is targeted.
/// With `test_entity`, only that entity is tested; otherwise the world
/// ray covers the static and dynamic entity types selected in `flags`.
pub fn physics_collision(
    world: &dyn PhysicsWorld,
    start: Vec3,
    end: Vec3,
    radius: f32,
    flags: EnvironFlags,
    test_entity: Option<EntityId>,
) -> Option<CollisionHit> {
    let travel = end - start;
    let len = travel.length();
    if len <= 0.0 {
        return None;
    }
    let dir = travel / len;
    let ray = dir * (len + radius);

    let mut best: Option<(RayHit, bool)> = None;

    if flags.contains(EnvironFlags::COLLIDE_TERRAIN) && test_entity.is_none() {
        if let Some(hit) = world.ray_terrain(start, ray) {
            best = Some((hit, true));
        }
    }

    let entity_hit = match test_entity {
        Some(entity) => world.ray_entity(entity, start, ray),
        None => {
            let entity_flags = flags & (EnvironFlags::COLLIDE_STATIC | EnvironFlags::COLLIDE_DYNAMIC);
            if entity_flags.is_empty() {
                None
            } else {
                world.ray_world(start, ray, entity_flags)
            }
        }
    };
    if let Some(hit) = entity_hit {
        if best.map_or(true, |(b, _)| hit.dist < b.dist) {
            best = Some((hit, false));
        }
    }

    best.map(|(hit, terrain)| CollisionHit {
        pos: hit.pos + hit.normal * radius,
        normal: hit.normal,
        surface_id: hit.surface_id,
        terrain,
        dist: ((hit.dist - radius) / len).clamp(0.0, 1.0),
    })
}
