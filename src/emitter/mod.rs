//! # Emitter
//!
//! Sub-emitter scheduling and everything it drives: bounds, density
//! compensation, beam expansion and force-field projection.

pub mod beam;
pub mod bounds;
pub mod container;
pub mod density;
pub mod force;
pub mod group;
pub mod scheduler;
pub mod source;
pub mod state;
pub mod travel;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use beam::{walk_along_waveform, BeamEmitted, BeamPoint};
pub use bounds::EmitterBounds;
pub use container::{ParticleContainer, SpawnBuffer};
pub use force::{ForceChange, ForceFieldProjector, ForceTiming, ForceVolumeState};
pub use group::{EmitterGroup, GroupUpdateStats, SubEmitterKey};
pub use scheduler::{SubEmitter, SubEmitterState, SubEmitterStats};
pub use source::{EmitterOwner, GeometryId, MainEmitterState, ParticleSource, SimpleSource};
pub use state::SubEmitterSnapshot;

use crate::util::Location;

/// Per-tick inputs shared by the sub-emitters of one emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateContext {
    /// Time since the previous tick
    pub frame_time: f32,
    /// Level-of-detail blend; zero or less suspends emission
    pub lod_blend: f32,
    /// Reciprocal of the density boost applied this tick
    pub density_adjust: f32,
}

impl Default for UpdateContext {
    fn default() -> Self {
        Self {
            frame_time: 0.0,
            lod_blend: 1.0,
            density_adjust: 1.0,
        }
    }
}

impl UpdateContext {
    pub fn new(frame_time: f32) -> Self {
        Self {
            frame_time,
            ..Default::default()
        }
    }
}

/// Segment metadata of a beam particle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSegment {
    pub index: u32,
    /// Particles in the beam
    pub count: u32,
    /// Vector to the next point
    pub step: Vec3,
    pub uv_offset: f32,
    /// First or last particle of the chain
    pub edge: bool,
}

/// One spawn event.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitParticleData {
    pub location: Location,
    /// Time already elapsed since the particle's spawn
    pub age: f32,
    pub emit_index: u32,
    pub sequence: u16,
    pub beam: Option<BeamSegment>,
    pub beam_age: f32,
    pub geometry: Option<GeometryId>,
}

impl EmitParticleData {
    pub fn new(location: Location, age: f32) -> Self {
        Self {
            location,
            age,
            emit_index: 0,
            sequence: 0,
            beam: None,
            beam_age: 0.0,
            geometry: None,
        }
    }
}
