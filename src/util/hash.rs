//! # Hash Utilities
//!
//! Integer hashing behind the chaos key and the noise lattice.

/// 64-bit avalanche mix
#[inline]
pub fn mix64(mut h: u64) -> u64 {
    const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
    const PRIME3: u64 = 0x165667B19E3779F9;

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME3);
    h ^= h >> 32;
    h
}

/// Combine two hashes
#[inline]
pub fn hash_combine(h1: u64, h2: u64) -> u64 {
    h1 ^ (h2
        .wrapping_add(0x9e3779b97f4a7c15)
        .wrapping_add(h1 << 6)
        .wrapping_add(h1 >> 2))
}

/// Hash of a lattice coordinate, mapped to `[-1, 1]`.
#[inline]
pub fn lattice_unit(seed: u64, i: i64) -> f32 {
    let h = mix64(hash_combine(seed, i as u64));
    ((h >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
}
