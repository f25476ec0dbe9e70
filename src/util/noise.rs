//! # Noise
//!
//! 1D coherent gradient noise, used for beam waveforms.

use super::hash::lattice_unit;

const NOISE_SEED: u64 = 0x5eed_0f_be_a4;

/// Smooth noise in roughly `[-1, 1]`, zero at integer lattice points.
pub fn noise1(x: f32) -> f32 {
    let i0 = x.floor();
    let t = x - i0;
    let i = i0 as i64;

    let g0 = lattice_unit(NOISE_SEED, i);
    let g1 = lattice_unit(NOISE_SEED, i + 1);

    let v0 = g0 * t;
    let v1 = g1 * (t - 1.0);

    // quintic fade
    let fade = t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
    (v0 + (v1 - v0) * fade) * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_on_lattice() {
        for i in -10..10 {
            assert!(noise1(i as f32).abs() < 1e-6);
        }
    }

    #[test]
    fn test_continuity() {
        let mut x = -4.0f32;
        while x < 4.0 {
            assert!((noise1(x) - noise1(x + 1e-3)).abs() < 0.05);
            x += 0.037;
        }
    }

    #[test]
    fn test_bounded() {
        let mut x = -20.0f32;
        while x < 20.0 {
            assert!(noise1(x).abs() <= 1.01);
            x += 0.11;
        }
    }
}
