//! # Density Compensation
//!
//! Compares the volume particles fill under standard conditions with the
//! volume they fill given the emitter's motion and the local forces. The
//! ratio is the emission boost that keeps apparent density constant.

use glam::{Quat, Vec3};

use super::bounds::EmitterBounds;
use super::travel::{travel_volume, ForceParams};
use crate::environ::PhysEnviron;
use crate::params::EffectParams;
use crate::util::Location;

/// Inputs for one estimate
#[derive(Debug, Clone, Copy)]
pub struct DensityInput<'a> {
    pub params: &'a EffectParams,
    pub bounds: &'a EmitterBounds,
    pub environ: &'a PhysEnviron,
    pub strength: f32,
    pub particle_life: f32,
    /// Particle size multiplier from the owner
    pub particle_scale: f32,
}

/// Emission multiplier in `[1, max_adjust]`.
///
/// `prev` is the emitter location at the previous tick when the emitter
/// moved; the swept source box then covers both positions.
pub fn estimate(input: &DensityInput<'_>, loc: &Location, prev: Option<&Location>, max_adjust: f32) -> f32 {
    let params = input.params;
    let scale = loc.scale;
    let drag = params.air_resistance.drag.at(input.strength);
    let gravity = params.gravity_scale.at(input.strength);
    let size = params.size.at(input.strength) * scale * input.particle_scale;
    let local = Location::new(Vec3::ZERO, Quat::IDENTITY, scale);

    let source = input.bounds.source_box.scaled(scale);

    let standard_forces = ForceParams {
        accel: input.environ.uniform.accel * gravity + params.acceleration * scale,
        wind: Vec3::ZERO,
        drag,
    };
    let (std_travel, std_dist) = params.travel_bounds(&local, &standard_forces, input.particle_life);
    let standard = travel_volume(&source, &std_travel, std_dist, size);

    let flags = params.environment_flags();
    let forces = input
        .environ
        .checked_forces(loc.translation, flags)
        .unwrap_or(input.environ.uniform);
    let inv = loc.rotation.inverse();
    let actual_forces = ForceParams {
        accel: inv * (forces.accel * gravity + params.acceleration * scale),
        wind: inv * (forces.wind * params.air_resistance.wind_scale),
        drag,
    };
    let (act_travel, act_dist) = params.travel_bounds(&local, &actual_forces, input.particle_life);

    let mut swept = source;
    if let Some(prev) = prev {
        let moved = inv * (prev.translation - loc.translation);
        let mut behind = source;
        behind.translate(moved);
        swept.add_box(&behind);
    }
    let actual = travel_volume(&swept, &act_travel, act_dist, size);

    if actual.is_nan() || actual <= standard {
        return 1.0;
    }
    if standard <= 0.0 {
        return max_adjust.max(1.0);
    }
    (actual / standard).clamp(1.0, max_adjust.max(1.0))
}
