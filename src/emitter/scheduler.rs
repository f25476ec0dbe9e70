//! # Sub-Emitter Scheduler
//!
//! Temporal state of one emission stream. Each tick decides whether and
//! how many particles to spawn, backfilling continuous emission across
//! the frame so the spawn rate does not depend on frame timing.

use std::sync::{Arc, Weak};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::beam;
use super::bounds::EmitterBounds;
use super::container::ParticleContainer;
use super::density::{self, DensityInput};
use super::force::{ForceChange, ForceFieldProjector, ForceTiming};
use super::source::{EmitterOwner, GeometryId, ParticleSource};
use super::{EmitParticleData, UpdateContext};
use crate::config::EmissionConfig;
use crate::environ::ForceAreaHost;
use crate::error::{EmissionError, EmissionResult};
use crate::params::{EffectParams, SpawnIndirection, SpawnParams};
use crate::util::{div_min, lerp, ChaosKey, Location, HUGE};

/// Particle life below this is treated as zero.
const MIN_PARTICLE_LIFE: f32 = 1e-6;

/// Slack when converting an emission window into whole steps.
const STEP_EPSILON: f32 = 1e-3;

/// Timing state of one emission stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEmitterState {
    pub activate_age: f32,
    pub start_age: f32,
    pub stop_age: f32,
    /// Next pulse boundary, `+inf` when the emitter does not repeat
    pub repeat_age: f32,
    pub last_emit_age: f32,
    pub chaos: ChaosKey,
    pub emit_index: u32,
    pub sequence: u16,
    /// Source location at the end of the previous emission tick
    pub last_loc: Option<Location>,
    pub active: bool,
}

impl Default for SubEmitterState {
    fn default() -> Self {
        Self {
            activate_age: 0.0,
            start_age: HUGE,
            stop_age: HUGE,
            repeat_age: HUGE,
            last_emit_age: HUGE,
            chaos: ChaosKey::new(0),
            emit_index: 0,
            sequence: 0,
            last_loc: None,
            active: false,
        }
    }
}

/// Running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubEmitterStats {
    /// Particles accepted by the container, beam segments included
    pub emitted: u64,
    /// Emissions refused by the container or dropped by the frame cap
    pub rejected: u64,
    pub activations: u64,
}

/// One emission stream bound to a source.
pub struct SubEmitter {
    params: Arc<EffectParams>,
    config: Arc<EmissionConfig>,
    source: Weak<dyn ParticleSource>,
    state: SubEmitterState,
    bounds: EmitterBounds,
    force: ForceFieldProjector,
    stats: SubEmitterStats,
    seeder: ChaosKey,
}

impl std::fmt::Debug for SubEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubEmitter")
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("has_force", &self.force.has_force())
            .finish()
    }
}

impl SubEmitter {
    pub fn new(params: Arc<EffectParams>, config: Arc<EmissionConfig>, source: Weak<dyn ParticleSource>) -> Self {
        let bounds = EmitterBounds::new(&params);
        Self {
            params,
            config,
            source,
            state: SubEmitterState::default(),
            bounds,
            force: ForceFieldProjector::new(),
            stats: SubEmitterStats::default(),
            seeder: ChaosKey::random(),
        }
    }

    /// Draw activation seeds from a fixed key, for replayable runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seeder = ChaosKey::new(seed);
        self
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    pub fn state(&self) -> &SubEmitterState {
        &self.state
    }

    pub fn stats(&self) -> &SubEmitterStats {
        &self.stats
    }

    pub fn bounds(&self) -> &EmitterBounds {
        &self.bounds
    }

    pub fn force(&self) -> &ForceFieldProjector {
        &self.force
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub(crate) fn seeder(&self) -> ChaosKey {
        self.seeder
    }

    pub(crate) fn restore_parts(&mut self, state: SubEmitterState, seeder: ChaosKey, has_force: bool) {
        self.state = state;
        self.seeder = seeder;
        self.force.set_expected(has_force);
        self.bounds.refresh(&self.params);
    }

    fn source_age(&self) -> Option<f32> {
        self.source.upgrade().map(|s| s.age())
    }

    /// Start a new activation at `age` with a seed from the emitter's key.
    pub fn initialize(&mut self, age: f32, container: &mut dyn ParticleContainer) {
        let seed = self.seeder.next_u64();
        self.initialize_with_seed(age, seed, container);
    }

    /// Start a new activation at `age` with an explicit seed.
    pub fn initialize_with_seed(&mut self, age: f32, seed: u64, container: &mut dyn ParticleContainer) {
        let now = self.source_age().unwrap_or(age);
        self.activate(age, now, seed, false, container);
    }

    fn activate(&mut self, age: f32, now: f32, seed: u64, triggered: bool, container: &mut dyn ParticleContainer) {
        let params = &self.params;
        let s = &mut self.state;

        s.emit_index = 0;
        s.sequence = container.next_emitter_sequence();
        s.chaos = ChaosKey::new(seed);
        s.last_loc = None;
        s.active = true;

        let mut age = age;
        s.repeat_age = HUGE;
        if params.pulse_period.max() > 0.0 {
            let period = params.pulse_period.sample(&mut s.chaos).max(self.config.min_pulse_period);
            if age + period < now {
                age += ((now - age) / period).floor() * period;
            }
            let mut repeat = age + period;
            while repeat < now {
                repeat += period;
            }
            s.repeat_age = repeat;
        }
        s.activate_age = age;

        let waiting = matches!(
            params.spawn_indirection,
            SpawnIndirection::ParentCollide | SpawnIndirection::ParentDeath
        ) && !triggered;
        if waiting {
            s.start_age = HUGE;
            s.stop_age = HUGE;
            s.last_emit_age = HUGE;
        } else {
            let start = age + params.spawn_delay.sample(&mut s.chaos);
            s.start_age = start;
            s.stop_age = start;
            s.last_emit_age = start;
            if params.continuous || params.particle_life_time.max() == 0.0 {
                s.stop_age += if params.emitter_life_time.max() > 0.0 {
                    params.emitter_life_time.sample(&mut s.chaos)
                } else {
                    HUGE
                };
            }
        }

        self.bounds.refresh(params);
        self.stats.activations += 1;
        log::trace!(
            "Sub-emitter activated at {:.3}: start {:.3} stop {:.3} repeat {:.3}",
            s.activate_age,
            s.start_age,
            s.stop_age,
            s.repeat_age
        );
    }

    /// Advance timing against the source: re-pulse, parent triggers, expiry.
    ///
    /// Returns [`EmissionError::SourceExpired`] once the source is gone;
    /// the owner must then deactivate this sub-emitter.
    pub fn update_state(&mut self, container: &mut dyn ParticleContainer, age_adjust: f32) -> EmissionResult<()> {
        let source = match self.source.upgrade() {
            Some(source) => source,
            None => {
                self.state.active = false;
                return Err(EmissionError::SourceExpired);
            }
        };
        let now = source.age() + age_adjust;
        let source_stop = source.stop_age();

        if now >= self.state.repeat_age && source_stop > self.state.repeat_age {
            let repeat = self.state.repeat_age;
            let seed = self.seeder.next_u64();
            log::trace!("Sub-emitter re-pulse at {:.3}", repeat);
            self.activate(repeat, now, seed, false, container);
        } else {
            let trigger = match self.params.spawn_indirection {
                SpawnIndirection::ParentCollide => source.collide_age(),
                SpawnIndirection::ParentDeath => source_stop,
                SpawnIndirection::Direct | SpawnIndirection::ParentStart => HUGE,
            };
            if trigger.is_finite() && trigger > self.state.activate_age && now >= trigger {
                let seed = self.seeder.next_u64();
                self.activate(trigger, now, seed, true, container);
            } else if !source.is_alive() {
                log::debug!("Sub-emitter source expired at {:.3}", now);
                self.state.active = false;
                return Err(EmissionError::SourceExpired);
            }
        }

        self.state.stop_age = self.state.stop_age.min(source_stop);
        self.bounds.refresh(&self.params);
        Ok(())
    }

    /// Strength used to sample parameter curves this tick.
    pub fn strength(&self, age_adjust: f32, spawn: &SpawnParams) -> f32 {
        let now = self.source_age().unwrap_or(self.state.activate_age) + age_adjust;
        self.strength_at(now, spawn)
    }

    fn strength_at(&self, now: f32, spawn: &SpawnParams) -> f32 {
        if spawn.strength >= 0.0 {
            return spawn.strength.min(1.0);
        }
        let s = &self.state;
        if self.params.continuous {
            let span = s.stop_age - s.start_age;
            if span > 0.0 && span.is_finite() {
                ((now - s.start_age) / span).clamp(0.0, 1.0)
            } else {
                0.0
            }
        } else {
            let max_count = self.params.emit_count().max();
            if max_count > 0.0 {
                div_min(s.emit_index as f32, max_count, 1.0)
            } else {
                0.0
            }
        }
    }

    /// Spawn this tick's particles into `container`. Returns the number of
    /// particles accepted.
    ///
    /// `ctx.density_adjust` is updated when density compensation applies.
    pub fn emit_particles(
        &mut self,
        container: &mut dyn ParticleContainer,
        owner: &dyn EmitterOwner,
        ctx: &mut UpdateContext,
    ) -> u32 {
        let source = match self.source.upgrade() {
            Some(source) => source,
            None => return 0,
        };
        let now = source.age();
        let loc = source.location();
        let emitted = self.emit_at(container, owner, ctx, now, &loc, source.geometry());
        self.state.last_loc = Some(loc);
        emitted
    }

    fn emit_at(
        &mut self,
        container: &mut dyn ParticleContainer,
        owner: &dyn EmitterOwner,
        ctx: &mut UpdateContext,
        now: f32,
        loc: &Location,
        geometry: Option<GeometryId>,
    ) -> u32 {
        if ctx.lod_blend <= 0.0 {
            self.state.last_emit_age = now;
            return 0;
        }
        if now < self.state.start_age {
            return 0;
        }
        // one-shot emitters fire once; afterwards last_emit_age is +inf
        if !self.params.continuous && now < self.state.last_emit_age {
            return 0;
        }

        let strength = self.strength_at(now, &owner.spawn_params());
        let mut count = self.params.emit_count().at(strength);
        if !container.is_indirect() {
            count *= owner.emit_count_scale();
        }
        let count = count.min(self.config.max_emit_count as f32);
        if !(count > 0.0) {
            return 0;
        }

        let particle_life = if self.params.is_beam() {
            self.params.beam.beam_age.mid_at(strength)
        } else {
            self.params.particle_life_time.mid_at(strength)
        };

        if self.params.continuous {
            self.emit_continuous(container, owner, ctx, now, loc, geometry, strength, count, particle_life)
        } else {
            self.emit_burst(container, ctx, now, loc, geometry, strength, count, particle_life)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_continuous(
        &mut self,
        container: &mut dyn ParticleContainer,
        owner: &dyn EmitterOwner,
        ctx: &mut UpdateContext,
        now: f32,
        loc: &Location,
        geometry: Option<GeometryId>,
        strength: f32,
        count: f32,
        particle_life: f32,
    ) -> u32 {
        let emitter_life = self.state.stop_age - self.state.start_age;
        let mut life = particle_life;
        if life < MIN_PARTICLE_LIFE {
            life = emitter_life;
        }
        if !(life > 0.0) {
            return 0;
        }

        let rate = if emitter_life > 0.0 {
            (count / life).max(count / emitter_life)
        } else {
            count / life
        };
        if !(rate > 0.0) || !rate.is_finite() {
            return 0;
        }
        let mut inc = 1.0 / rate;

        let prev = self.state.last_loc;
        let interpolate = ctx.frame_time > 0.0
            && !self.params.move_rel_emitter
            && prev.map_or(false, |p| {
                !p.is_equivalent(loc, self.config.interp_position_tolerance, self.config.interp_scale_tolerance)
            });

        let density = &self.params.maintain_density;
        let environ = owner.phys_environ();
        if density.factor > 0.0 && (interpolate || environ.has_non_uniform(self.params.environment_flags())) {
            let input = DensityInput {
                params: &self.params,
                bounds: &self.bounds,
                environ,
                strength,
                particle_life: life,
                particle_scale: owner.particle_scale(),
            };
            let boost = density::estimate(
                &input,
                loc,
                if interpolate { prev.as_ref() } else { None },
                self.config.max_density_adjust,
            );
            let m = lerp(1.0, boost, density.factor.min(1.0));
            if m > 0.0 {
                inc /= m;
                ctx.density_adjust = 1.0 / m;
            }
        }

        let mut age0 = self.state.last_emit_age.max(self.state.start_age);
        let full_life = container.max_particle_full_life();
        if full_life.is_finite() {
            let dead_before = now - full_life;
            if age0 < dead_before {
                age0 += ((dead_before - age0) / inc).floor() * inc;
            }
        }
        let age1 = now.min(self.state.stop_age);
        if age1 <= age0 {
            return 0;
        }

        let steps = ((age1 - age0) / inc + STEP_EPSILON).floor();
        if !(steps >= 1.0) {
            return 0;
        }
        let mut n = steps.min(u32::MAX as f32) as u32;

        let cap = self.config.max_emit_count;
        if n > cap {
            let excess = n - cap;
            age0 += excess as f32 * inc;
            container.record_rejects(excess);
            self.stats.rejected += excess as u64;
            n = cap;
        }

        let frame_start = now - ctx.frame_time;
        let mut emitted = 0;
        for k in (1..=n).rev() {
            let spawn_age = age0 + k as f32 * inc;
            let age = (now - spawn_age).max(0.0);
            let at = match prev {
                Some(prev) if interpolate => {
                    let t = ((spawn_age - frame_start) / ctx.frame_time).clamp(0.0, 1.0);
                    Location::interpolate(&prev, loc, t)
                }
                _ => *loc,
            };
            match self.emit_one(container, ctx, &at, age, strength, geometry) {
                Some(particles) => emitted += particles,
                None => {
                    container.record_rejects(k);
                    self.stats.rejected += k as u64;
                    break;
                }
            }
        }

        self.state.last_emit_age = age0 + n as f32 * inc;
        emitted
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_burst(
        &mut self,
        container: &mut dyn ParticleContainer,
        ctx: &mut UpdateContext,
        now: f32,
        loc: &Location,
        geometry: Option<GeometryId>,
        strength: f32,
        count: f32,
        particle_life: f32,
    ) -> u32 {
        let start = self.state.start_age;
        self.state.last_emit_age = HUGE;
        if now > start + particle_life + 2.0 * ctx.frame_time {
            return 0;
        }

        let n = count.round() as u32;
        let age = (now - start).max(0.0);
        let mut emitted = 0;
        for k in 0..n {
            match self.emit_one(container, ctx, loc, age, strength, geometry) {
                Some(particles) => emitted += particles,
                None => {
                    let remaining = n - k;
                    container.record_rejects(remaining);
                    self.stats.rejected += remaining as u64;
                    break;
                }
            }
        }
        emitted
    }

    /// One emission: a particle, or a whole beam. `None` when rejected.
    fn emit_one(
        &mut self,
        container: &mut dyn ParticleContainer,
        ctx: &UpdateContext,
        loc: &Location,
        age: f32,
        strength: f32,
        geometry: Option<GeometryId>,
    ) -> Option<u32> {
        let Self {
            params,
            config,
            state,
            bounds,
            stats,
            ..
        } = self;

        let mut data = EmitParticleData::new(*loc, age);
        data.emit_index = state.emit_index;
        data.sequence = state.sequence;
        data.geometry = geometry;

        let accepted = if params.is_beam() {
            let result = beam::expand(params, config, &mut state.chaos, bounds, strength, loc, &data, container, ctx);
            stats.emitted += result.particles as u64;
            (!result.rejected).then_some(result.particles)
        } else {
            let offset = params.sample_emitter_offset(
                &mut state.chaos,
                bounds.emit_box,
                bounds.emit_scale,
                strength,
                config.max_offset_attempts,
            ) + params.sample_shape_offset(&mut state.chaos);
            data.location = Location::new(
                loc.transform_point(offset),
                loc.rotation * params.focus_rotation(strength),
                loc.scale,
            );
            if container.add_particle(ctx, data) {
                stats.emitted += 1;
                Some(1)
            } else {
                None
            }
        };

        if accepted.is_some() {
            state.emit_index += 1;
        }
        accepted
    }

    /// Keep the force area in step with the emitter.
    pub fn update_force(&mut self, host: &mut dyn ForceAreaHost, owner: &dyn EmitterOwner) -> ForceChange {
        let source = match self.source.upgrade() {
            Some(source) if self.state.active => source,
            _ => return self.force.release(host),
        };
        let now = source.age();
        let timing = ForceTiming {
            age: now,
            start_age: self.state.start_age,
            stop_age: self.state.stop_age,
            particle_stop_age: self.state.stop_age + self.params.max_particle_life(),
        };
        let strength = self.strength_at(now, &owner.spawn_params());
        self.force.update_force(
            host,
            &self.params,
            &self.config,
            owner.phys_environ(),
            &timing,
            &source.location(),
            strength,
            owner.owner_id(),
        )
    }

    /// Stop emitting and release the force area.
    pub fn deactivate(&mut self, host: &mut dyn ForceAreaHost) -> ForceChange {
        self.state.active = false;
        self.force.release(host)
    }
}
