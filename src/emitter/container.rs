//! # Particle Container
//!
//! Receiver of spawn events.

use super::{EmitParticleData, UpdateContext};
use crate::environ::EnvironFlags;

/// Where emitted particles go.
pub trait ParticleContainer {
    /// Accept one particle; `false` means the container is full.
    fn add_particle(&mut self, ctx: &UpdateContext, data: EmitParticleData) -> bool;

    /// Longest a particle of this container lives, including children
    fn max_particle_full_life(&self) -> f32;

    fn next_emitter_sequence(&mut self) -> u16;

    fn environment_flags(&self) -> EnvironFlags;

    fn record_rejects(&mut self, count: u32);

    /// Spawned from parent particles rather than an emitter
    fn is_indirect(&self) -> bool {
        false
    }
}

/// Bounded in-memory container
#[derive(Debug, Clone)]
pub struct SpawnBuffer {
    particles: Vec<EmitParticleData>,
    capacity: usize,
    full_life: f32,
    sequence: u16,
    flags: EnvironFlags,
    indirect: bool,
    /// Particles refused because the buffer was full or the frame cap hit
    pub rejected: u64,
    /// Density adjustment seen with the last particle
    pub last_density_adjust: f32,
}

impl SpawnBuffer {
    pub fn new(capacity: usize, full_life: f32) -> Self {
        Self {
            particles: Vec::new(),
            capacity,
            full_life,
            sequence: 0,
            flags: EnvironFlags::empty(),
            indirect: false,
            rejected: 0,
            last_density_adjust: 1.0,
        }
    }

    pub fn with_flags(mut self, flags: EnvironFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_indirect(mut self, indirect: bool) -> Self {
        self.indirect = indirect;
        self
    }

    pub fn particles(&self) -> &[EmitParticleData] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Take everything emitted so far.
    pub fn drain(&mut self) -> Vec<EmitParticleData> {
        std::mem::take(&mut self.particles)
    }
}

impl ParticleContainer for SpawnBuffer {
    fn add_particle(&mut self, ctx: &UpdateContext, data: EmitParticleData) -> bool {
        if self.particles.len() >= self.capacity {
            return false;
        }
        self.last_density_adjust = ctx.density_adjust;
        self.particles.push(data);
        true
    }

    fn max_particle_full_life(&self) -> f32 {
        self.full_life
    }

    fn next_emitter_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn environment_flags(&self) -> EnvironFlags {
        self.flags
    }

    fn record_rejects(&mut self, count: u32) {
        self.rejected += count as u64;
    }

    fn is_indirect(&self) -> bool {
        self.indirect
    }
}
