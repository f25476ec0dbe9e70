//! # Test Fixtures
//!
//! Mock physics world and force host shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use glam::Vec3;
use parking_lot::RwLock;

use particle_core::emitter::SubEmitter;
use particle_core::environ::{AreaId, EntityId, ForceAreaDesc, PhysArea, RayHit};
use particle_core::params::{EffectParams, VarEParam};
use particle_core::*;

pub const GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.8);

/// Flat terrain at `ground_z` plus a list of areas
pub struct MockWorld {
    pub bounds: Aabb,
    pub global: PhysForces,
    pub areas: RwLock<Vec<PhysArea>>,
    pub ground_z: f32,
    pub samples: AtomicUsize,
    pub iterations: AtomicUsize,
}

impl MockWorld {
    pub fn new() -> Self {
        Self {
            bounds: Aabb::centered(Vec3::splat(1000.0)),
            global: PhysForces {
                accel: GRAVITY,
                ..Default::default()
            },
            areas: RwLock::new(Vec::new()),
            ground_z: 0.0,
            samples: AtomicUsize::new(0),
            iterations: AtomicUsize::new(0),
        }
    }

    pub fn with_area(self, area: PhysArea) -> Self {
        self.areas.write().push(area);
        self
    }

    pub fn into_dyn(self) -> Arc<dyn PhysicsWorld> {
        Arc::new(self)
    }
}

impl PhysicsWorld for MockWorld {
    fn bounds(&self) -> Aabb {
        self.bounds
    }

    fn global_forces(&self) -> PhysForces {
        self.global
    }

    fn for_each_area(&self, visit: &mut dyn FnMut(&PhysArea)) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        for area in self.areas.read().iter() {
            visit(area);
        }
    }

    fn sample_area(&self, id: AreaId, pos: Vec3) -> Option<PhysForces> {
        self.samples.fetch_add(1, Ordering::Relaxed);
        let areas = self.areas.read();
        let area = areas.iter().find(|a| a.id == id)?;
        area.bounds.contains(pos).then(|| area.forces())
    }

    fn ray_terrain(&self, start: Vec3, dir: Vec3) -> Option<RayHit> {
        if dir.z >= 0.0 || start.z < self.ground_z {
            return None;
        }
        let t = (start.z - self.ground_z) / -dir.z;
        if t > 1.0 {
            return None;
        }
        Some(RayHit {
            dist: t * dir.length(),
            pos: start + dir * t,
            normal: Vec3::Z,
            surface_id: 1,
        })
    }

    fn ray_world(&self, _start: Vec3, _dir: Vec3, _flags: EnvironFlags) -> Option<RayHit> {
        None
    }

    fn ray_entity(&self, _entity: EntityId, _start: Vec3, _dir: Vec3) -> Option<RayHit> {
        None
    }
}

/// Records force areas by id
#[derive(Default)]
pub struct MockHost {
    next: AreaId,
    pub live: HashMap<AreaId, ForceAreaDesc>,
    pub created: usize,
    pub updated: usize,
    pub released: usize,
}

impl ForceAreaHost for MockHost {
    fn create_force_area(&mut self, desc: &ForceAreaDesc) -> Option<AreaId> {
        self.next += 1;
        self.created += 1;
        self.live.insert(self.next, desc.clone());
        Some(self.next)
    }

    fn update_force_area(&mut self, id: AreaId, desc: &ForceAreaDesc) {
        self.updated += 1;
        self.live.insert(id, desc.clone());
    }

    fn release_area(&mut self, id: AreaId) {
        self.released += 1;
        self.live.remove(&id);
    }
}

pub fn continuous_params(count: f32, life: f32) -> EffectParams {
    EffectParams {
        continuous: true,
        count: VarEParam::from(count),
        particle_life_time: VarEParam::from(life),
        ..Default::default()
    }
}

pub fn owner() -> MainEmitterState {
    MainEmitterState::new(
        1,
        PhysEnviron::with_uniform(PhysForces {
            accel: GRAVITY,
            ..Default::default()
        }),
    )
}

/// Sub-emitter attached to a fresh source, with a fixed seed.
pub fn sub_emitter(params: EffectParams, seed: u64) -> (Arc<SimpleSource>, SubEmitter) {
    let source = Arc::new(SimpleSource::default());
    let dyn_source: Arc<dyn ParticleSource> = source.clone();
    let weak: Weak<dyn ParticleSource> = Arc::downgrade(&dyn_source);
    let emitter = SubEmitter::new(Arc::new(params), Arc::new(EmissionConfig::default()), weak).with_seed(seed);
    (source, emitter)
}

/// Advance the source by `dt` and run one tick.
pub fn tick(
    source: &SimpleSource,
    emitter: &mut SubEmitter,
    buffer: &mut SpawnBuffer,
    owner: &MainEmitterState,
    dt: f32,
) -> u32 {
    source.advance(dt);
    if emitter.update_state(buffer, 0.0).is_err() {
        return 0;
    }
    let mut ctx = UpdateContext::new(dt);
    emitter.emit_particles(buffer, owner, &mut ctx)
}
