//! # Travel
//!
//! Ballistic motion under gravity, wind and air resistance.
//!
//! With drag `d`, terminal velocity `vT = a/d + w`, and
//! `v(t) = vT + (v0 - vT) e^(-d t)`. The closed form is used once `d t`
//! passes [`DRAG_APPROX_THRESHOLD`]; below it a second-order expansion
//! is accurate and avoids the exponential.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::util::Aabb;

/// Below this `drag * time`, drag is integrated as a constant acceleration.
pub const DRAG_APPROX_THRESHOLD: f32 = 0.01;

/// Forces acting on one particle stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceParams {
    /// Gravity plus explicit acceleration
    pub accel: Vec3,
    /// Wind velocity, already scaled by the wind factor
    pub wind: Vec3,
    /// Air resistance
    pub drag: f32,
}

impl ForceParams {
    pub fn new(accel: Vec3, wind: Vec3, drag: f32) -> Self {
        Self { accel, wind, drag }
    }
}

/// Range of emission directions and speeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitCone {
    /// Cone axis (unit)
    pub axis: Vec3,
    /// Cosine of the widest emission angle
    pub cos_min: f32,
    /// Cosine of the narrowest emission angle
    pub cos_max: f32,
    pub speed_min: f32,
    pub speed_max: f32,
}

impl Default for EmitCone {
    fn default() -> Self {
        Self {
            axis: Vec3::Z,
            cos_min: 1.0,
            cos_max: 1.0,
            speed_min: 0.0,
            speed_max: 0.0,
        }
    }
}

impl EmitCone {
    pub fn is_single_dir(&self) -> bool {
        self.cos_min >= 1.0
    }
}

/// Advance a position and velocity by `time`.
pub fn travel(pos: &mut Vec3, vel: &mut Vec3, time: f32, forces: &ForceParams) {
    if forces.drag * time >= DRAG_APPROX_THRESHOLD {
        let inv_drag = 1.0 / forces.drag;
        let terminal = forces.accel * inv_drag + forces.wind;
        let decay = (-forces.drag * time).exp();
        *pos += terminal * time + (*vel - terminal) * ((1.0 - decay) * inv_drag);
        *vel = terminal + (*vel - terminal) * decay;
    } else {
        let accel = forces.accel + (forces.wind - *vel) * forces.drag;
        *pos += *vel * time + accel * (0.5 * time * time);
        *vel += accel * time;
    }
}

/// Distance covered along a straight line by initial speed `v0`
/// decaying under `drag`.
pub fn travel_distance(v0: f32, drag: f32, time: f32) -> f32 {
    if drag > 0.0 {
        v0 * (1.0 - (-drag * time).exp()) / drag
    } else {
        v0 * time
    }
}

/// Speed left after `time` of decay under `drag`.
pub fn travel_speed(v0: f32, drag: f32, time: f32) -> f32 {
    if drag > 0.0 {
        v0 * (-drag * time).exp()
    } else {
        v0
    }
}

/// Path length of a trajectory, by Simpson integration of speed over
/// one or two segments. The split happens at the speed minimum, if any.
pub fn travel_distance_approx(vel0: Vec3, time: f32, forces: &ForceParams) -> f32 {
    if time <= 0.0 {
        return 0.0;
    }

    let mut vel = vel0;
    let mut dt = [time, 0.0];
    let mut s = [vel.length(), 0.0, 0.0, 0.0, 0.0];
    let mut n = 1;

    if forces.drag * time >= DRAG_APPROX_THRESHOLD {
        let inv_drag = 1.0 / forces.drag;
        let terminal = forces.wind + forces.accel * inv_drag;

        // Speed is minimal where d/dt |vT + (v0 - vT) e^(-d t)|^2 = 0
        let dv = terminal - vel;
        let dd = dv.length_squared();
        let td = terminal.dot(dv);
        if dd * td > 0.0 {
            let t_min = -(td / dd).ln() * inv_drag;
            if t_min > 0.0 && t_min < time {
                dt = [t_min, time - t_min];
            }
        }

        for &seg in dt.iter().take_while(|&&seg| seg > 0.0) {
            let decay = 1.0 - (-forces.drag * seg * 0.5).exp();
            for _ in 0..2 {
                vel = vel.lerp(terminal, decay);
                s[n] = vel.length();
                n += 1;
            }
        }
    } else {
        let accel = forces.accel + (forces.wind - vel) * forces.drag;
        let va = vel.dot(accel);
        let aa = accel.dot(accel);
        if va * aa < 0.0 && -va < time * aa {
            dt[0] = -va / aa;
            dt[1] = time - dt[0];
        }

        for &seg in dt.iter().take_while(|&&seg| seg > 0.0) {
            let step = forces.accel * (seg * 0.5);
            for _ in 0..2 {
                vel += step;
                s[n] = vel.length();
                n += 1;
            }
        }
    }

    if n == 5 {
        ((s[0] + s[1] * 4.0 + s[2]) * dt[0] + (s[2] + s[3] * 4.0 + s[4]) * dt[1]) / 6.0
    } else {
        (s[0] + s[1] * 4.0 + s[2]) * dt[0] / 6.0
    }
}

/// Volume swept by a source box moving through a travel box, with
/// particle size. The travel distance adds a slab along the dominant
/// travel direction.
pub fn travel_volume(source: &Aabb, travel_bb: &Aabb, dist: f32, size: f32) -> f32 {
    let v = source.size() + travel_bb.size() + Vec3::splat(size);
    let t = travel_bb.center().abs().normalize_or_zero() * dist;

    v.x * v.y * v.z + v.x * v.y * t.z + v.x * t.y * v.z + t.x * v.y * v.z
}

fn add_travel_vec(bb: &mut Aabb, vel: Vec3, forces: &ForceParams, time: f32) {
    let mut pos = Vec3::ZERO;
    let mut v = vel;
    travel(&mut pos, &mut v, time, forces);
    bb.add(pos);
}

/// Add the end point of a trajectory to `bb`, plus the per-axis extrema
/// for each axis bit set in `axes`.
pub fn add_travel(bb: &mut Aabb, vel: Vec3, forces: &ForceParams, time: f32, axes: u8) {
    add_travel_vec(bb, vel, forces, time);

    if axes == 0 {
        return;
    }

    for i in 0..3 {
        if axes & (1 << i) == 0 {
            continue;
        }
        let t_ext = if forces.drag != 0.0 {
            let inv_drag = 1.0 / forces.drag;
            let vt = forces.accel[i] * inv_drag + forces.wind[i];
            let d = vt - vel[i];
            if vt * d > 0.0 {
                -(vt / d).ln() * inv_drag
            } else {
                continue;
            }
        } else if forces.accel[i] != 0.0 {
            -vel[i] / forces.accel[i]
        } else {
            continue;
        };
        if t_ext > 0.0 && t_ext < time {
            add_travel_vec(bb, vel, forces, t_ext);
        }
    }
}

/// Emission velocity in the cone closest to `ref_dir`.
pub fn extreme_emit_vec(ref_dir: Vec3, emit: &EmitCone) -> Vec3 {
    let emit_cos = ref_dir.dot(emit.axis);
    if emit_cos >= emit.cos_min && emit_cos <= emit.cos_max {
        return ref_dir * emit.speed_max;
    }

    let perp = ref_dir - emit.axis * emit_cos;
    let perp_len_sq = perp.length_squared();

    let cos = emit_cos.clamp(emit.cos_min, emit.cos_max);
    let dir = emit.axis * cos + perp * ((1.0 - cos * cos) / (perp_len_sq + f32::MIN_POSITIVE)).sqrt();
    let speed = if dir.dot(ref_dir) > 0.0 {
        emit.speed_max
    } else {
        emit.speed_min
    };
    dir * speed
}

fn add_emit_dirs(bb: &mut Aabb, ref_dir: Vec3, emit: &EmitCone, forces: &ForceParams, time: f32, axes: u8) {
    add_travel(bb, extreme_emit_vec(ref_dir, emit), forces, time, axes);
    add_travel(bb, extreme_emit_vec(-ref_dir, emit), forces, time, axes);
}

fn max_component(v: Vec3) -> f32 {
    v.abs().max_element()
}

/// Bounds of everything an emission cone can reach within `time`.
pub fn travel_bb(bb: &mut Aabb, emit: &EmitCone, forces: &ForceParams, time: f32, axes: u8) {
    if emit.speed_max == 0.0 {
        add_travel(bb, Vec3::ZERO, forces, time, axes);
        return;
    }
    if emit.is_single_dir() {
        add_travel(bb, emit.axis * emit.speed_max, forces, time, axes);
        if emit.speed_min != emit.speed_max {
            add_travel(bb, emit.axis * emit.speed_min, forces, time, axes);
        }
        return;
    }

    add_emit_dirs(bb, Vec3::X, emit, forces, time, axes & 1);
    add_emit_dirs(bb, Vec3::Y, emit, forces, time, axes & 2);
    add_emit_dirs(bb, Vec3::Z, emit, forces, time, axes & 4);

    if let Some(dir) = forces.accel.try_normalize() {
        if max_component(dir) < 0.999 {
            add_emit_dirs(bb, dir, emit, forces, time, 0);
        }
    }
    if forces.drag > 0.0 {
        if let Some(dir) = forces.wind.try_normalize() {
            if max_component(dir) < 0.999 {
                add_emit_dirs(bb, dir, emit, forces, time, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_no_drag_matches_ballistic() {
        let forces = ForceParams::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO, 0.0);
        let mut pos = Vec3::ZERO;
        let mut vel = Vec3::new(1.0, 0.0, 10.0);
        travel(&mut pos, &mut vel, 1.0, &forces);
        assert!((pos - Vec3::new(1.0, 0.0, 5.0)).length() < 1e-5);
        assert!((vel - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_travel_drag_reaches_terminal() {
        let forces = ForceParams::new(Vec3::new(0.0, 0.0, -9.8), Vec3::ZERO, 2.0);
        let mut pos = Vec3::ZERO;
        let mut vel = Vec3::ZERO;
        travel(&mut pos, &mut vel, 20.0, &forces);
        assert!((vel.z + 4.9).abs() < 1e-3);
    }

    #[test]
    fn test_scalar_travel() {
        assert_eq!(travel_distance(3.0, 0.0, 2.0), 6.0);
        assert_eq!(travel_speed(3.0, 0.0, 2.0), 3.0);
        let d = travel_distance(3.0, 1.0, 100.0);
        assert!((d - 3.0).abs() < 1e-4);
        assert!(travel_speed(3.0, 1.0, 100.0) < 1e-6);
    }

    #[test]
    fn test_distance_approx_straight() {
        let forces = ForceParams::default();
        let d = travel_distance_approx(Vec3::new(0.0, 2.0, 0.0), 3.0, &forces);
        assert!((d - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_distance_approx_turnaround() {
        // Thrown up at 10 m/s under 10 m/s^2: 5 m up and 5 m down in 2 s.
        let forces = ForceParams::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO, 0.0);
        let d = travel_distance_approx(Vec3::new(0.0, 0.0, 10.0), 2.0, &forces);
        assert!((d - 10.0).abs() < 0.05, "distance {}", d);
    }

    #[test]
    fn test_travel_bb_apex() {
        let forces = ForceParams::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO, 0.0);
        let emit = EmitCone {
            speed_min: 10.0,
            speed_max: 10.0,
            ..Default::default()
        };
        let mut bb = Aabb::point(Vec3::ZERO);
        travel_bb(&mut bb, &emit, &forces, 2.0, 7);
        assert!((bb.max.z - 5.0).abs() < 1e-4);
        assert!(bb.min.z.abs() < 1e-4);
    }

    #[test]
    fn test_travel_volume_static() {
        let source = Aabb::centered(Vec3::splat(0.5));
        let v = travel_volume(&source, &Aabb::point(Vec3::ZERO), 0.0, 0.0);
        assert!((v - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_extreme_emit_vec_outside_cone() {
        let emit = EmitCone {
            axis: Vec3::Z,
            cos_min: 0.0,
            cos_max: 1.0,
            speed_min: 1.0,
            speed_max: 2.0,
        };
        let v = extreme_emit_vec(-Vec3::Z, &emit);
        assert!(v.z <= 1e-5);
    }
}
