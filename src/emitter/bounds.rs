//! # Emitter Bounds
//!
//! Spatial envelope of an emitter, and the rounded-box parameters used
//! when sampling spawn offsets.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::params::EffectParams;
use crate::util::{Aabb, Location};

/// Emitter envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmitterBounds {
    /// Local bounds of spawn positions
    pub source_box: Aabb,
    /// Inner (unrounded) part of the random offset box
    pub emit_box: Vec3,
    /// Inverse rounding radius per axis; zero when not rounded
    pub emit_scale: Vec3,
}

impl Default for EmitterBounds {
    fn default() -> Self {
        Self {
            source_box: Aabb::point(Vec3::ZERO),
            emit_box: Vec3::ZERO,
            emit_scale: Vec3::ZERO,
        }
    }
}

impl EmitterBounds {
    pub fn new(params: &EffectParams) -> Self {
        let mut bounds = Self::default();
        bounds.refresh(params);
        bounds
    }

    pub fn refresh(&mut self, params: &EffectParams) {
        self.source_box = params.emit_offset_bounds();
        self.emit_box = params.spawn_pos_random_offset.abs();
        self.emit_scale = Vec3::ZERO;

        if params.offset_roundness > 0.0 {
            let round = params.offset_roundness * self.emit_box.max_element();
            let v_round = self.emit_box.min(Vec3::splat(round));
            self.emit_box -= v_round;
            let inv = |r: f32| if r > 0.0 { 1.0 / r } else { 0.0 };
            self.emit_scale = Vec3::new(inv(v_round.x), inv(v_round.y), inv(v_round.z));
        }
    }

    /// World bounds at a location.
    pub fn world_bounds(&self, loc: &Location) -> Aabb {
        self.source_box.transformed(loc)
    }
}
