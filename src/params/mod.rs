//! # Effect Parameters
//!
//! Immutable per-effect configuration read by the sub-emitter, plus the
//! geometric quantities derived from it.

pub mod var;

pub use var::{Curve, CurveKey, VarEParam, VarParam};

use glam::{EulerRot, Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::emitter::travel::{self, EmitCone, ForceParams};
use crate::environ::{EnvironFlags, PhysForces};
use crate::error::EmissionError;
use crate::util::{div_min, zero_is_huge, Aabb, Location, HUGE};

/// Emitter shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitterShape {
    #[default]
    Point,
    Box,
    Circle,
    Sphere,
    Beam,
}

/// Where sub-emitter particles spawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnIndirection {
    /// From the emitter
    #[default]
    Direct,
    /// From each parent particle, at its birth
    ParentStart,
    /// From each parent particle, when it collides
    ParentCollide,
    /// From each parent particle, when it dies
    ParentDeath,
}

/// Physical force generated by an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    #[default]
    None,
    Wind,
    Gravity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// Fixed number of segments
    #[default]
    Fixed,
    /// Fixed segment length
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveType {
    #[default]
    None,
    Sine,
    Square,
    Noise,
}

/// End of the beam the waveform phase is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TangentSource {
    #[default]
    Origin,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureMapping {
    #[default]
    PerParticle,
    PerStream,
}

/// Air resistance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirResistance {
    pub drag: VarEParam,
    /// Fraction of the ambient wind that moves particles
    pub wind_scale: f32,
}

/// Emission boost for moving emitters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintainDensity {
    /// How much of the estimated boost is applied, `[0, 1]`
    pub factor: f32,
    pub reduce_life_time: f32,
    pub reduce_alpha: f32,
    pub reduce_size: f32,
}

impl MaintainDensity {
    /// Scale for a per-particle quantity when the emission rate was
    /// multiplied by `1 / density_adjust`.
    pub fn adjust(density_adjust: f32, reduce: f32) -> f32 {
        1.0 / (1.0 + (density_adjust - 1.0) * reduce)
    }

    pub fn life_time_scale(&self, density_adjust: f32) -> f32 {
        Self::adjust(density_adjust, self.reduce_life_time)
    }

    pub fn alpha_scale(&self, density_adjust: f32) -> f32 {
        Self::adjust(density_adjust, self.reduce_alpha)
    }

    pub fn size_scale(&self, density_adjust: f32) -> f32 {
        Self::adjust(density_adjust, self.reduce_size)
    }
}

/// Beam emitter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamParams {
    /// Target relative to the emitter
    pub target_position: Vec3,
    /// Random half extents around the target
    pub target_rand_offset: Vec3,
    /// Direction of waveform displacement
    pub up_vector: Vec3,
    /// How long beam particles live
    pub beam_age: VarEParam,
    pub segment_type: SegmentType,
    pub segment_count: f32,
    pub segment_length: f32,
    pub wave_type: WaveType,
    pub tangent_source: TangentSource,
    /// Waveform phase (degrees)
    pub tangent: VarEParam,
    pub amplitude: f32,
    pub frequency: f32,
    pub texture_mapping: TextureMapping,
}

impl Default for BeamParams {
    fn default() -> Self {
        Self {
            target_position: Vec3::new(0.0, 0.0, 10.0),
            target_rand_offset: Vec3::ZERO,
            up_vector: Vec3::Z,
            beam_age: VarEParam::from(2.0),
            segment_type: SegmentType::Fixed,
            segment_count: 10.0,
            segment_length: 1.0,
            wave_type: WaveType::None,
            tangent_source: TangentSource::Origin,
            tangent: VarEParam::default(),
            amplitude: 0.0,
            frequency: 0.0,
            texture_mapping: TextureMapping::PerParticle,
        }
    }
}

/// Per-instance overrides set by whoever spawned the effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnParams {
    /// Fixed strength; negative derives strength from emitter age
    pub strength: f32,
    /// Multiplier on particle counts
    pub count_scale: f32,
    /// Multiplier on particle size
    pub size_scale: f32,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            strength: -1.0,
            count_scale: 1.0,
            size_scale: 1.0,
        }
    }
}

impl SpawnParams {
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }
}

/// Per-effect parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub shape: EmitterShape,
    /// Emit over time rather than all at once
    pub continuous: bool,

    /// Particle count (per particle life when continuous)
    pub count: VarEParam,
    /// Beam count, replaces `count` for beams
    pub beam_count: VarEParam,

    /// Delay before emission starts (seconds)
    pub spawn_delay: VarParam,
    /// Emitter lifetime; zero is unbounded
    pub emitter_life_time: VarParam,
    /// Restart period; zero disables
    pub pulse_period: VarParam,
    /// Particle lifetime; zero lives as long as the emitter
    pub particle_life_time: VarEParam,

    pub spawn_indirection: SpawnIndirection,

    /// Fixed spawn offset
    pub spawn_pos_offset: Vec3,
    /// Random spawn offset half extents
    pub spawn_pos_random_offset: Vec3,
    /// Rounds the random offset box, `[0, 1]`
    pub offset_roundness: f32,
    /// Pushes offsets toward the surface, `[0, 1]`
    pub offset_inner_fraction: VarEParam,
    /// Box emitter full size
    pub emitter_size: Vec3,
    /// Circle and sphere emitter diameter
    pub emitter_diameter: VarParam,

    /// Tilt of the emission axis (degrees)
    pub focus_angle: VarEParam,
    /// Rotation of the tilt about the emitter axis (degrees)
    pub focus_azimuth: VarEParam,
    /// Emission axis opposes gravity
    pub focus_gravity_dir: bool,
    /// Emission cone angle (degrees)
    pub emit_angle: VarEParam,

    pub speed: VarEParam,
    /// Explicit initial velocity, added to the cone velocity
    pub velocity: Vec3,
    pub air_resistance: AirResistance,
    pub gravity_scale: VarEParam,
    /// Extra acceleration
    pub acceleration: Vec3,
    /// Particles follow the emitter
    pub move_rel_emitter: bool,

    /// Particle size (radius)
    pub size: VarEParam,

    pub maintain_density: MaintainDensity,
    pub force_generation: ForceMode,

    /// Particles align to water
    pub facing_water: bool,
    pub collide_terrain: bool,
    pub collide_static: bool,
    pub collide_dynamic: bool,

    pub beam: BeamParams,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            shape: EmitterShape::Point,
            continuous: false,
            count: VarEParam::default(),
            beam_count: VarEParam::from(1.0),
            spawn_delay: VarParam::default(),
            emitter_life_time: VarParam::default(),
            pulse_period: VarParam::default(),
            particle_life_time: VarEParam::default(),
            spawn_indirection: SpawnIndirection::Direct,
            spawn_pos_offset: Vec3::ZERO,
            spawn_pos_random_offset: Vec3::ZERO,
            offset_roundness: 0.0,
            offset_inner_fraction: VarEParam::default(),
            emitter_size: Vec3::ZERO,
            emitter_diameter: VarParam::default(),
            focus_angle: VarEParam::default(),
            focus_azimuth: VarEParam::default(),
            focus_gravity_dir: false,
            emit_angle: VarEParam::default(),
            speed: VarEParam::default(),
            velocity: Vec3::ZERO,
            air_resistance: AirResistance::default(),
            gravity_scale: VarEParam::default(),
            acceleration: Vec3::ZERO,
            move_rel_emitter: false,
            size: VarEParam::from(1.0),
            maintain_density: MaintainDensity::default(),
            force_generation: ForceMode::None,
            facing_water: false,
            collide_terrain: false,
            collide_static: false,
            collide_dynamic: false,
            beam: BeamParams::default(),
        }
    }
}

impl EffectParams {
    /// Parse effect parameters from JSON
    pub fn from_json(data: &[u8]) -> Result<Self, EmissionError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn is_beam(&self) -> bool {
        self.shape == EmitterShape::Beam
    }

    /// Count parameter for this shape
    pub fn emit_count(&self) -> &VarEParam {
        if self.is_beam() {
            &self.beam_count
        } else {
            &self.count
        }
    }

    /// Longest a particle can live; falls back to the emitter life.
    pub fn max_particle_life(&self) -> f32 {
        let life = self.particle_life_time.max();
        if life > 0.0 {
            life
        } else {
            zero_is_huge(self.emitter_life_time.max())
        }
    }

    /// Forces and collisions particles of this effect react to.
    pub fn environment_flags(&self) -> EnvironFlags {
        let mut flags = EnvironFlags::empty();
        if self.facing_water {
            flags |= EnvironFlags::WATER;
        }
        if !self.air_resistance.drag.is_zero() && self.air_resistance.wind_scale != 0.0 {
            flags |= EnvironFlags::WIND;
        }
        if !self.gravity_scale.is_zero() || self.focus_gravity_dir {
            flags |= EnvironFlags::GRAVITY;
        }
        if self.collide_terrain {
            flags |= EnvironFlags::COLLIDE_TERRAIN;
        }
        if self.collide_static {
            flags |= EnvironFlags::COLLIDE_STATIC;
        }
        if self.collide_dynamic {
            flags |= EnvironFlags::COLLIDE_DYNAMIC;
        }
        flags
    }

    /// Local bounds of every spawn position, before travel.
    pub fn emit_offset_bounds(&self) -> Aabb {
        let mut bb = Aabb::new(
            self.spawn_pos_offset - self.spawn_pos_random_offset,
            self.spawn_pos_offset + self.spawn_pos_random_offset,
        );

        match self.shape {
            EmitterShape::Box => bb.expand(self.emitter_size * 0.5),
            EmitterShape::Circle => {
                let r = self.emitter_diameter.max() * 0.5;
                bb.expand(Vec3::new(r, r, 0.0));
            }
            EmitterShape::Sphere => bb.expand(Vec3::splat(self.emitter_diameter.max() * 0.5)),
            EmitterShape::Beam => {
                let target = self.spawn_pos_offset + self.beam.target_position;
                bb.add(target + self.beam.target_rand_offset);
                bb.add(target - self.beam.target_rand_offset);
                let up = self.beam.up_vector.normalize_or_zero() * self.beam.amplitude;
                let mid = bb.center();
                bb.add(mid + up);
                bb.add(mid - up);
            }
            EmitterShape::Point => {}
        }
        bb
    }

    /// Random offset within the rounded offset box.
    ///
    /// `emit_box` and `emit_scale` come from [`crate::emitter::EmitterBounds`].
    /// Candidates outside the rounded volume are rejected; after
    /// `max_attempts` the last candidate is pulled onto the rounded surface.
    pub fn sample_emitter_offset<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        emit_box: Vec3,
        emit_scale: Vec3,
        strength: f32,
        max_attempts: u32,
    ) -> Vec3 {
        let random_offset = self.spawn_pos_random_offset;
        if random_offset == Vec3::ZERO {
            return self.spawn_pos_offset;
        }
        let inner_fraction = self.offset_inner_fraction.sample(rng, strength).clamp(0.0, 1.0);
        let rounded = self.offset_roundness > 0.0;

        // Excess of a point beyond the inner box, in units of the rounding radius
        let round_excess = |p: Vec3| -> Vec3 { (p.abs() - emit_box).max(Vec3::ZERO) * emit_scale };

        let mut offset = Vec3::ZERO;
        for attempt in 0..max_attempts.max(1) {
            offset = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * random_offset;

            if !rounded || round_excess(offset).length_squared() <= 1.0 {
                break;
            }
            if attempt + 1 == max_attempts.max(1) {
                offset = pull_to_rounded_surface(offset, emit_box, emit_scale);
            }
        }

        if inner_fraction > 0.0 {
            // Largest scaled copy of the offset that still fits the box
            let scale_max = div_min(
                random_offset.x,
                offset.x.abs(),
                div_min(
                    random_offset.y,
                    offset.y.abs(),
                    div_min(random_offset.z, offset.z.abs(), HUGE),
                ),
            );
            if scale_max.is_finite() {
                let mut offset_max = offset * scale_max;
                if rounded {
                    offset_max = pull_to_rounded_surface(offset_max, emit_box, emit_scale);
                }
                offset += (offset_max - offset) * inner_fraction;
            }
        }

        self.spawn_pos_offset + offset
    }

    /// Random position within the emitter shape.
    pub fn sample_shape_offset<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        match self.shape {
            EmitterShape::Box => {
                let half = self.emitter_size * 0.5;
                Vec3::new(
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                ) * half
            }
            EmitterShape::Circle => {
                let r = self.emitter_diameter.sample(rng) * 0.5;
                let phi = rng.gen_range(0.0..std::f32::consts::TAU);
                let rho = r * rng.gen::<f32>().sqrt();
                Vec3::new(rho * phi.cos(), rho * phi.sin(), 0.0)
            }
            EmitterShape::Sphere => {
                let r = self.emitter_diameter.sample(rng) * 0.5;
                let z: f32 = rng.gen_range(-1.0..=1.0);
                let phi = rng.gen_range(0.0..std::f32::consts::TAU);
                let ring = (1.0 - z * z).max(0.0).sqrt();
                let dir = Vec3::new(ring * phi.cos(), ring * phi.sin(), z);
                dir * (r * rng.gen::<f32>().cbrt())
            }
            EmitterShape::Point | EmitterShape::Beam => Vec3::ZERO,
        }
    }

    /// Random beam target, relative to the emitter.
    pub fn sample_beam_target<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let jitter = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        ) * self.beam.target_rand_offset;
        self.spawn_pos_offset + self.beam.target_position + jitter
    }

    /// Rotation from the emitter frame to the focus direction.
    pub fn focus_rotation(&self, strength: f32) -> Quat {
        if self.focus_angle.is_zero() && self.focus_azimuth.is_zero() {
            return Quat::IDENTITY;
        }
        let angle = self.focus_angle.mid_at(strength).to_radians();
        let azimuth = self.focus_azimuth.mid_at(strength).to_radians();
        Quat::from_euler(EulerRot::XYZ, angle, 0.0, azimuth)
    }

    /// Range of emission directions and speeds, over all random variation.
    pub fn emit_cone(&self, loc: &Location, forces: &PhysForces) -> EmitCone {
        let mut emit = EmitCone::default();
        let base = if self.focus_gravity_dir {
            let axis = (-forces.accel).try_normalize().unwrap_or(Vec3::Z);
            Quat::from_rotation_arc(Vec3::Z, axis)
        } else {
            loc.rotation
        };
        emit.axis = base * Vec3::Z;

        let cone_max = self.emit_angle.max().to_radians();
        let cone_min = self.emit_angle.min().to_radians();
        emit.cos_max = cone_min.cos();

        if self.focus_angle.is_zero() {
            emit.cos_min = cone_max.cos();
        } else {
            let (angle_min, angle_max) = (self.focus_angle.min().to_radians(), self.focus_angle.max().to_radians());
            let (az_min, az_max) = (self.focus_azimuth.min().to_radians(), self.focus_azimuth.max().to_radians());
            let spread = (angle_max - angle_min + az_max - az_min) * 0.5;
            emit.cos_min = (cone_max + spread).min(std::f32::consts::PI).cos();

            let tilt = Quat::from_euler(
                EulerRot::XYZ,
                (angle_min + angle_max) * 0.5,
                0.0,
                (az_min + az_max) * 0.5,
            );
            emit.axis = (base * tilt) * Vec3::Z;
        }

        emit.speed_min = self.speed.min() * loc.scale;
        emit.speed_max = self.speed.max() * loc.scale;
        emit
    }

    /// Bounds of particle travel relative to the spawn point, and the
    /// approximate path length at mid speed.
    pub fn travel_bounds(&self, loc: &Location, forces: &ForceParams, max_life: f32) -> (Aabb, f32) {
        let time = max_life.min(self.max_particle_life());
        if time <= 0.0 || !time.is_finite() {
            return (Aabb::point(Vec3::ZERO), 0.0);
        }

        let emit = self.emit_cone(
            loc,
            &PhysForces {
                accel: forces.accel,
                ..Default::default()
            },
        );
        let mut bb = Aabb::RESET;
        travel::travel_bb(&mut bb, &emit, forces, time, 0);
        let dist = travel::travel_distance_approx(emit.axis * (emit.speed_min + emit.speed_max) * 0.5, time, forces);
        (bb, dist)
    }
}

/// Clamp a point onto the rounded box surface when it lies outside it.
fn pull_to_rounded_surface(p: Vec3, emit_box: Vec3, emit_scale: Vec3) -> Vec3 {
    let excess = (p.abs() - emit_box).max(Vec3::ZERO);
    let scaled_sq = (excess * emit_scale).length_squared();
    if scaled_sq <= 0.0 {
        return p;
    }
    let unit_excess = excess / scaled_sq.sqrt();
    let mut out = p;
    for a in 0..3 {
        if unit_excess[a] > 0.0 {
            out[a] = (emit_box[a] + unit_excess[a]).copysign(p[a]);
        }
    }
    out
}
