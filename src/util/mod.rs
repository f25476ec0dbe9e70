//! # Utilities
//!
//! Math helpers shared by the emitter and environment modules.

pub mod chaos;
pub mod geometry;
pub mod hash;
pub mod noise;
pub mod transform;

pub use chaos::ChaosKey;
pub use geometry::{Aabb, Plane, Trinary};
pub use transform::Location;

/// Stand-in for "never" in age arithmetic.
pub const HUGE: f32 = f32::INFINITY;

/// Divide with a fallback: `a / b` when `b > 0`, otherwise `ceiling`.
/// The quotient is also capped at `ceiling`.
#[inline]
pub fn div_min(a: f32, b: f32, ceiling: f32) -> f32 {
    if b > 0.0 {
        (a / b).min(ceiling)
    } else {
        ceiling
    }
}

/// Zero means "unbounded" for lifetime style parameters.
#[inline]
pub fn zero_is_huge(value: f32) -> f32 {
    if value == 0.0 {
        HUGE
    } else {
        value
    }
}

/// Linear interpolation.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
