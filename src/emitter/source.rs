//! # Sources and Owners
//!
//! The thing a sub-emitter spawns from, and the top-level emitter that
//! owns it.

use glam::Vec3;
use parking_lot::RwLock;

use crate::environ::{OwnerId, PhysEnviron};
use crate::params::SpawnParams;
use crate::util::{Location, HUGE};

/// Source geometry handle
pub type GeometryId = u64;

/// Emitter or parent particle that particles spawn from.
pub trait ParticleSource: Send + Sync {
    fn location(&self) -> Location;
    fn age(&self) -> f32;
    fn stop_age(&self) -> f32;
    /// Age of the first collision, `+inf` if none
    fn collide_age(&self) -> f32;
    fn is_alive(&self) -> bool;
    fn velocity(&self) -> Vec3;

    /// Geometry particles should attach to
    fn geometry(&self) -> Option<GeometryId> {
        None
    }
}

/// Top-level emitter a sub-emitter belongs to.
pub trait EmitterOwner: Sync {
    fn spawn_params(&self) -> SpawnParams;
    fn emit_count_scale(&self) -> f32;
    fn phys_environ(&self) -> &PhysEnviron;
    fn particle_scale(&self) -> f32;
    fn owner_id(&self) -> OwnerId;
}

#[derive(Debug, Clone, Copy)]
struct SourceState {
    location: Location,
    age: f32,
    stop_age: f32,
    collide_age: f32,
    alive: bool,
    velocity: Vec3,
    geometry: Option<GeometryId>,
}

/// Source driven directly by the caller.
#[derive(Debug)]
pub struct SimpleSource {
    state: RwLock<SourceState>,
}

impl Default for SimpleSource {
    fn default() -> Self {
        Self::new(Location::IDENTITY)
    }
}

impl SimpleSource {
    pub fn new(location: Location) -> Self {
        Self {
            state: RwLock::new(SourceState {
                location,
                age: 0.0,
                stop_age: HUGE,
                collide_age: HUGE,
                alive: true,
                velocity: Vec3::ZERO,
                geometry: None,
            }),
        }
    }

    /// Advance the age, moving by the current velocity.
    pub fn advance(&self, dt: f32) {
        let mut s = self.state.write();
        s.age += dt;
        let velocity = s.velocity;
        s.location.translation += velocity * dt;
    }

    pub fn set_age(&self, age: f32) {
        self.state.write().age = age;
    }

    pub fn set_location(&self, location: Location) {
        self.state.write().location = location;
    }

    pub fn set_velocity(&self, velocity: Vec3) {
        self.state.write().velocity = velocity;
    }

    pub fn set_stop_age(&self, stop_age: f32) {
        self.state.write().stop_age = stop_age;
    }

    pub fn set_geometry(&self, geometry: Option<GeometryId>) {
        self.state.write().geometry = geometry;
    }

    /// Record a collision at the current age.
    pub fn collide(&self) {
        let mut s = self.state.write();
        s.collide_age = s.age;
    }

    /// Stop and die at the current age.
    pub fn kill(&self) {
        let mut s = self.state.write();
        s.stop_age = s.age;
        s.alive = false;
    }
}

impl ParticleSource for SimpleSource {
    fn location(&self) -> Location {
        self.state.read().location
    }

    fn age(&self) -> f32 {
        self.state.read().age
    }

    fn stop_age(&self) -> f32 {
        self.state.read().stop_age
    }

    fn collide_age(&self) -> f32 {
        self.state.read().collide_age
    }

    fn is_alive(&self) -> bool {
        let s = self.state.read();
        s.alive && s.age <= s.stop_age
    }

    fn velocity(&self) -> Vec3 {
        self.state.read().velocity
    }

    fn geometry(&self) -> Option<GeometryId> {
        self.state.read().geometry
    }
}

/// Plain owner state
#[derive(Debug, Clone)]
pub struct MainEmitterState {
    pub id: OwnerId,
    pub spawn: SpawnParams,
    /// Global count multiplier, e.g. from a quality setting
    pub count_scale: f32,
    pub particle_scale: f32,
    pub environ: PhysEnviron,
}

impl MainEmitterState {
    pub fn new(id: OwnerId, environ: PhysEnviron) -> Self {
        Self {
            id,
            spawn: SpawnParams::default(),
            count_scale: 1.0,
            particle_scale: 1.0,
            environ,
        }
    }

    pub fn with_spawn(mut self, spawn: SpawnParams) -> Self {
        self.spawn = spawn;
        self
    }
}

impl EmitterOwner for MainEmitterState {
    fn spawn_params(&self) -> SpawnParams {
        self.spawn
    }

    fn emit_count_scale(&self) -> f32 {
        self.count_scale * self.spawn.count_scale
    }

    fn phys_environ(&self) -> &PhysEnviron {
        &self.environ
    }

    fn particle_scale(&self) -> f32 {
        self.particle_scale
    }

    fn owner_id(&self) -> OwnerId {
        self.id
    }
}
