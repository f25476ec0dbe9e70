//! # Beam Emission
//!
//! Expands one beam emission into a chain of segment particles running
//! from a spawn point to a target, optionally bent by a waveform.

use glam::Vec3;

use super::bounds::EmitterBounds;
use super::container::ParticleContainer;
use super::{BeamSegment, EmitParticleData, UpdateContext};
use crate::config::EmissionConfig;
use crate::params::{BeamParams, EffectParams, SegmentType, TangentSource, TextureMapping, WaveType};
use crate::util::noise::noise1;
use crate::util::{ChaosKey, Location};

/// One point of a planned beam
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamPoint {
    pub pos: Vec3,
    pub segment: BeamSegment,
}

/// Result of emitting a beam
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamEmitted {
    /// Segment particles accepted, including the closing one
    pub particles: u32,
    /// The container refused a segment
    pub rejected: bool,
}

/// Straight step `segment_step` plus the waveform's lateral change
/// between steps `prev` and `cur`, along `up`.
///
/// Steps are spread evenly over `length`. Zero amplitude or frequency
/// leaves the step straight for every wave type.
#[allow(clippy::too_many_arguments)]
pub fn walk_along_waveform(
    beam: &BeamParams,
    segment_step: Vec3,
    up: Vec3,
    cur: u32,
    prev: u32,
    total: u32,
    length: f32,
    tangent: f32,
) -> Vec3 {
    if beam.amplitude == 0.0 || beam.frequency == 0.0 || total == 0 {
        return segment_step;
    }

    let spacing = length / total as f32;
    let phase = match beam.tangent_source {
        TangentSource::Origin => tangent,
        TangentSource::Target => tangent - beam.frequency * length,
    };
    let offset = |i: u32| -> f32 {
        let x = i as f32 * spacing;
        match beam.wave_type {
            WaveType::Sine => beam.amplitude * (beam.frequency * x + phase).sin(),
            WaveType::Square => beam.amplitude * (beam.frequency * x + phase).sin().signum(),
            WaveType::Noise => beam.amplitude * noise1(beam.frequency * x),
            WaveType::None => 0.0,
        }
    };

    segment_step + up * (offset(cur) - offset(prev))
}

/// Segment step and exact (fractional) segment count.
fn segmentation(beam: &BeamParams, total_offset: Vec3, dist: f32) -> (Vec3, f32) {
    match beam.segment_type {
        SegmentType::Fixed if beam.segment_count > 0.0 => (total_offset / beam.segment_count, beam.segment_count),
        SegmentType::Length if beam.segment_length > 0.0 && dist > 0.0 => (
            total_offset / dist * beam.segment_length,
            dist / beam.segment_length,
        ),
        _ => (total_offset, 1.0),
    }
}

/// Lay out the points of a beam between two world positions.
///
/// At most `max_segments` segments are laid out; a longer chain is
/// respaced evenly over the whole distance.
pub fn plan_segments(
    beam: &BeamParams,
    spawn: Vec3,
    target: Vec3,
    tangent: f32,
    epsilon: f32,
    max_segments: u32,
) -> Vec<BeamPoint> {
    let total_offset = target - spawn;
    let dist = total_offset.length();
    let (mut step, mut exact_count) = segmentation(beam, total_offset, dist);

    let cap = max_segments.max(1) as f32;
    if exact_count.is_nan() || exact_count > cap {
        step = total_offset / cap;
        exact_count = cap;
    }

    let segments = exact_count.ceil().max(1.0) as u32;
    let overshoot = segments as f32 - exact_count;
    let count = segments.saturating_add(1);

    let dir = total_offset.normalize_or_zero();
    let up = match beam.up_vector.try_normalize() {
        Some(up) => up,
        None if dir != Vec3::ZERO => dir.any_orthonormal_vector(),
        None => Vec3::Z,
    };

    let per_stream = beam.texture_mapping == TextureMapping::PerStream;
    let mut points = Vec::with_capacity(count as usize);
    let mut straight = spawn;
    let mut bent = spawn;

    for i in 0..count {
        let last = i + 1 == count;
        let mut seg_step = if last { Vec3::ZERO } else { step };

        if !last {
            let next = straight + step;
            if (next - spawn).length() >= dist || i + 2 == count {
                // final step lands exactly on the target
                seg_step = target - straight;
                if seg_step.length() < epsilon {
                    seg_step = if dir != Vec3::ZERO { dir * epsilon } else { Vec3::Z * epsilon };
                }
            }
        }

        let uv_offset = if last || per_stream { overshoot } else { 0.0 };
        points.push(BeamPoint {
            pos: if last { target + (bent - straight) } else { bent },
            segment: BeamSegment {
                index: i,
                count,
                step: seg_step,
                uv_offset,
                edge: i == 0 || last,
            },
        });

        if !last {
            let walked = walk_along_waveform(beam, seg_step, up, i + 1, i, segments, dist, tangent);
            straight += seg_step;
            bent += walked;
        }
    }

    // Snap the chain end onto the target when no waveform bends it
    if let Some(end) = points.last_mut() {
        if beam.amplitude == 0.0 || beam.frequency == 0.0 {
            end.pos = target;
        }
    }
    points
}

/// Emit one beam from `loc`. Stops at the first rejected segment.
#[allow(clippy::too_many_arguments)]
pub fn expand(
    params: &EffectParams,
    config: &EmissionConfig,
    rng: &mut ChaosKey,
    bounds: &EmitterBounds,
    strength: f32,
    loc: &Location,
    template: &EmitParticleData,
    container: &mut dyn ParticleContainer,
    ctx: &UpdateContext,
) -> BeamEmitted {
    let spawn_local = params.sample_emitter_offset(
        rng,
        bounds.emit_box,
        bounds.emit_scale,
        strength,
        config.max_offset_attempts,
    );
    let target_local = params.sample_beam_target(rng);
    let spawn = loc.transform_point(spawn_local);
    let target = loc.transform_point(target_local);

    let tangent = params.beam.tangent.sample(rng, strength).to_radians();
    let beam_age = params.beam.beam_age.sample(rng, strength);

    let points = plan_segments(
        &params.beam,
        spawn,
        target,
        tangent,
        config.beam_segment_epsilon,
        config.max_beam_segments,
    );
    let mut emitted = BeamEmitted {
        particles: 0,
        rejected: false,
    };
    for point in points {
        let data = EmitParticleData {
            location: Location::new(point.pos, loc.rotation, loc.scale),
            beam: Some(point.segment),
            beam_age,
            ..template.clone()
        };
        if !container.add_particle(ctx, data) {
            emitted.rejected = true;
            break;
        }
        emitted.particles += 1;
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::SpawnBuffer;

    fn fixed(count: f32) -> BeamParams {
        BeamParams {
            segment_type: SegmentType::Fixed,
            segment_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_fixed_four_segments() {
        let target = Vec3::new(3.0, 4.0, 0.0);
        let points = plan_segments(&fixed(4.0), Vec3::ZERO, target, 0.0, 1e-3, 1000);
        assert_eq!(points.len(), 5);
        assert!((points[4].pos - target).length() < 1e-6);
        assert!(points[0].segment.edge && points[4].segment.edge);
        assert!(!points[2].segment.edge);
        assert!((points[1].pos - Vec3::new(0.75, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_length_segments_overshoot() {
        let beam = BeamParams {
            segment_type: SegmentType::Length,
            segment_length: 1.5,
            ..Default::default()
        };
        let target = Vec3::new(4.0, 0.0, 0.0);
        let points = plan_segments(&beam, Vec3::ZERO, target, 0.0, 1e-3, 1000);
        // 4 / 1.5 = 2.67 -> 3 segments, 4 particles
        assert_eq!(points.len(), 4);
        assert_eq!(points[3].pos, target);
        assert!((points[2].segment.step - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
        let uv = points[3].segment.uv_offset;
        assert!((uv - (3.0 - 4.0 / 1.5)).abs() < 1e-5);
        assert_eq!(points[1].segment.uv_offset, 0.0);
    }

    #[test]
    fn test_per_stream_uv_everywhere() {
        let beam = BeamParams {
            segment_type: SegmentType::Length,
            segment_length: 1.5,
            texture_mapping: TextureMapping::PerStream,
            ..Default::default()
        };
        let points = plan_segments(&beam, Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), 0.0, 1e-3, 1000);
        assert!(points.iter().all(|p| p.segment.uv_offset > 0.0));
    }

    #[test]
    fn test_waveform_zero_cases() {
        let step = Vec3::new(1.0, 2.0, 3.0);
        for wave_type in [WaveType::None, WaveType::Sine, WaveType::Square, WaveType::Noise] {
            let flat_amp = BeamParams {
                wave_type,
                amplitude: 0.0,
                frequency: 3.0,
                ..Default::default()
            };
            let flat_freq = BeamParams {
                wave_type,
                amplitude: 2.0,
                frequency: 0.0,
                ..Default::default()
            };
            assert_eq!(walk_along_waveform(&flat_amp, step, Vec3::Z, 3, 2, 10, 10.0, 0.4), step);
            assert_eq!(walk_along_waveform(&flat_freq, step, Vec3::Z, 3, 2, 10, 10.0, 0.4), step);
        }
    }

    #[test]
    fn test_sine_displacement() {
        let beam = BeamParams {
            wave_type: WaveType::Sine,
            amplitude: 2.0,
            frequency: std::f32::consts::FRAC_PI_2,
            ..Default::default()
        };
        // x goes 0 -> 1 so the sine goes 0 -> 1
        let walked = walk_along_waveform(&beam, Vec3::X, Vec3::Z, 1, 0, 4, 4.0, 0.0);
        assert!((walked - Vec3::new(1.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_square_wave_levels() {
        let beam = BeamParams {
            wave_type: WaveType::Square,
            amplitude: 1.0,
            frequency: std::f32::consts::PI,
            ..Default::default()
        };
        // offset at x=0.5 is +1, at x=1.5 is -1
        let walked = walk_along_waveform(&beam, Vec3::ZERO, Vec3::Z, 3, 1, 8, 4.0, 0.0);
        assert!((walked.z + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_target_anchor_matches_at_end() {
        let beam = BeamParams {
            wave_type: WaveType::Sine,
            amplitude: 1.0,
            frequency: 1.3,
            tangent_source: TangentSource::Target,
            ..Default::default()
        };
        let points = plan_segments(&beam, Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), 0.0, 1e-3, 1000);
        // with target anchoring the wave is zero at the target end
        let end_offset = points.last().map(|p| p.pos.z).unwrap_or_default();
        let start_offset = (0.0 - 1.3f32 * 10.0).sin();
        assert!((end_offset + start_offset).abs() < 1e-3);
    }

    #[test]
    fn test_noise_displaces_along_up_only() {
        let beam = BeamParams {
            wave_type: WaveType::Noise,
            amplitude: 2.0,
            frequency: 1.3,
            ..Default::default()
        };
        // spacing 0.5, so steps 2 -> 3 sample x = 1.0 and 1.5
        let walked = walk_along_waveform(&beam, Vec3::X, Vec3::Y, 3, 2, 8, 4.0, 0.0);
        let expected = Vec3::X + Vec3::Y * 2.0 * (noise1(1.3 * 1.5) - noise1(1.3 * 1.0));
        assert!((walked - expected).length() < 1e-6);

        let bent = (1..8).any(|i| walk_along_waveform(&beam, Vec3::X, Vec3::Y, i, i - 1, 8, 4.0, 0.0) != Vec3::X);
        assert!(bent);
    }

    #[test]
    fn test_noise_ignores_phase() {
        let origin = BeamParams {
            wave_type: WaveType::Noise,
            amplitude: 1.0,
            frequency: 0.7,
            ..Default::default()
        };
        let target = BeamParams {
            tangent_source: TangentSource::Target,
            ..origin.clone()
        };
        for i in 1..10 {
            let a = walk_along_waveform(&origin, Vec3::X, Vec3::Z, i, i - 1, 10, 10.0, 0.0);
            let b = walk_along_waveform(&origin, Vec3::X, Vec3::Z, i, i - 1, 10, 10.0, 2.5);
            let c = walk_along_waveform(&target, Vec3::X, Vec3::Z, i, i - 1, 10, 10.0, 2.5);
            assert_eq!(a, b);
            assert_eq!(a, c);
        }
    }

    #[test]
    fn test_length_segments_capped() {
        let beam = BeamParams {
            segment_type: SegmentType::Length,
            segment_length: 1e-9,
            ..Default::default()
        };
        let target = Vec3::new(100.0, 0.0, 0.0);
        let points = plan_segments(&beam, Vec3::ZERO, target, 0.0, 1e-3, 50);
        assert_eq!(points.len(), 51);
        assert!(points.iter().all(|p| p.segment.count == 51));
        assert_eq!(points[50].pos, target);
        assert!((points[1].pos - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4);
        assert_eq!(points[50].segment.uv_offset, 0.0);
    }

    #[test]
    fn test_fixed_count_capped() {
        let points = plan_segments(&fixed(1e12), Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), 0.0, 1e-3, 1000);
        assert_eq!(points.len(), 1001);
        assert_eq!(points[1000].pos, Vec3::new(0.0, 0.0, 10.0));
    }

    fn long_beam() -> EffectParams {
        let mut params = EffectParams {
            shape: crate::params::EmitterShape::Beam,
            ..Default::default()
        };
        params.beam.segment_type = SegmentType::Length;
        params.beam.segment_length = 1e-9;
        params
    }

    #[test]
    fn test_expand_respects_segment_cap() {
        let params = long_beam();
        let config = EmissionConfig {
            max_beam_segments: 16,
            ..Default::default()
        };
        let bounds = EmitterBounds::new(&params);
        let mut rng = ChaosKey::new(3);
        let mut buffer = SpawnBuffer::new(1000, 1.0);
        let template = EmitParticleData::new(Location::IDENTITY, 0.0);

        let emitted = expand(
            &params,
            &config,
            &mut rng,
            &bounds,
            0.5,
            &Location::IDENTITY,
            &template,
            &mut buffer,
            &UpdateContext::new(0.1),
        );
        assert_eq!(emitted, BeamEmitted { particles: 17, rejected: false });
        let end = buffer.particles().last().map(|p| p.location.translation);
        assert_eq!(end, Some(Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_expand_stops_at_full_container() {
        let params = long_beam();
        let config = EmissionConfig::default();
        let bounds = EmitterBounds::new(&params);
        let mut rng = ChaosKey::new(4);
        let mut buffer = SpawnBuffer::new(5, 1.0);
        let template = EmitParticleData::new(Location::IDENTITY, 0.0);

        let emitted = expand(
            &params,
            &config,
            &mut rng,
            &bounds,
            0.5,
            &Location::IDENTITY,
            &template,
            &mut buffer,
            &UpdateContext::new(0.1),
        );
        assert_eq!(emitted, BeamEmitted { particles: 5, rejected: true });
        assert_eq!(buffer.len(), 5);
    }
}
