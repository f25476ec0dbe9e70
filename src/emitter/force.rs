//! # Force Field Projection
//!
//! Keeps a box-shaped physics area in sync with the aggregate push of an
//! active sub-emitter, so the world can react to wind or explosion
//! style effects.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::travel::travel_distance;
use crate::config::EmissionConfig;
use crate::environ::{AreaId, ForceAreaDesc, ForceAreaHost, OwnerId, PhysEnviron};
use crate::params::{EffectParams, ForceMode};
use crate::util::{Aabb, Location};

/// Ages that bound the force field's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceTiming {
    pub age: f32,
    pub start_age: f32,
    pub stop_age: f32,
    /// Emitter stop age plus the longest particle life
    pub particle_stop_age: f32,
}

/// Live force area and the description last sent to the physics engine
#[derive(Debug, Clone, PartialEq)]
pub struct ForceVolumeState {
    pub area: AreaId,
    pub desc: ForceAreaDesc,
}

/// What an update did to the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceChange {
    None,
    Created,
    Updated,
    Released,
}

impl ForceChange {
    pub fn touched_world(self) -> bool {
        self != ForceChange::None
    }
}

/// Owner of at most one force area.
#[derive(Debug, Clone, Default)]
pub struct ForceFieldProjector {
    state: Option<ForceVolumeState>,
    /// Set when restored from a snapshot that had a force area; the area
    /// is recreated on the next update.
    expected: bool,
}

impl ForceFieldProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_force(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ForceVolumeState> {
        self.state.as_ref()
    }

    /// Whether a force area existed or is pending recreation.
    pub fn is_expected(&self) -> bool {
        self.expected || self.state.is_some()
    }

    pub(crate) fn set_expected(&mut self, expected: bool) {
        self.expected = expected;
    }

    /// Release the area, if any.
    pub fn release(&mut self, host: &mut dyn ForceAreaHost) -> ForceChange {
        self.expected = false;
        match self.state.take() {
            Some(state) => {
                host.release_area(state.area);
                log::debug!("Released force area {}", state.area);
                ForceChange::Released
            }
            None => ForceChange::None,
        }
    }

    /// Recompute the force geometry and push it to the physics engine.
    #[allow(clippy::too_many_arguments)]
    pub fn update_force(
        &mut self,
        host: &mut dyn ForceAreaHost,
        params: &EffectParams,
        config: &EmissionConfig,
        environ: &PhysEnviron,
        timing: &ForceTiming,
        loc: &Location,
        strength: f32,
        owner: OwnerId,
    ) -> ForceChange {
        if params.force_generation == ForceMode::None
            || timing.age < timing.start_age
            || timing.age > timing.particle_stop_age
        {
            return self.release(host);
        }

        let desc = match project(params, environ, timing, loc, strength, owner) {
            Some(desc) => desc,
            None => return self.release(host),
        };

        match &mut self.state {
            None => match host.create_force_area(&desc) {
                Some(area) => {
                    log::debug!(
                        "Created {:?} force area {} for owner {} (radius {:.2})",
                        desc.mode,
                        area,
                        owner,
                        desc.location.scale
                    );
                    self.state = Some(ForceVolumeState { area, desc });
                    self.expected = false;
                    ForceChange::Created
                }
                None => {
                    log::warn!("Physics host refused a force area for owner {}", owner);
                    ForceChange::None
                }
            },
            Some(state) => {
                if !differs(&state.desc, &desc, config.force_tolerance) {
                    return ForceChange::None;
                }
                host.update_force_area(state.area, &desc);
                state.desc = desc;
                ForceChange::Updated
            }
        }
    }
}

/// Force area for the current frame, `None` when it would be empty.
fn project(
    params: &EffectParams,
    environ: &PhysEnviron,
    timing: &ForceTiming,
    loc: &Location,
    strength: f32,
    owner: OwnerId,
) -> Option<ForceAreaDesc> {
    let scale = loc.scale;
    let focus = params.focus_rotation(strength);

    let mut inner = params.emit_offset_bounds();
    inner.translate(-params.spawn_pos_offset);
    let inner = inner.scaled(scale);

    // Box around the unit directions of the emission cone
    let cone = params.emit_cone(&Location::new(Vec3::ZERO, Quat::IDENTITY, scale), &environ.uniform);
    let sin_max = if cone.cos_min > 0.0 {
        (1.0 - cone.cos_min * cone.cos_min).max(0.0).sqrt()
    } else {
        1.0
    };
    let cone_box = Aabb::new(
        Vec3::new(-sin_max, -sin_max, cone.cos_min),
        Vec3::new(sin_max, sin_max, cone.cos_max),
    );

    let life = params.particle_life_time.mid_at(strength);
    let life = if life.is_finite() && life > 0.0 { life } else { 0.0 };
    let drag = params.air_resistance.drag.mid_at(strength);
    let speed = params.speed.mid_at(strength) * scale;
    let vel = params.velocity * scale;

    let (dist, dist_v) = if life > 0.0 {
        (travel_distance(speed, drag, life), travel_distance(vel.length(), drag, life))
    } else {
        (0.0, 0.0)
    };

    let mut travel = cone_box.scaled(dist);
    let mut pushed = travel;
    pushed.translate(vel.normalize_or_zero() * dist_v);
    travel.add_box(&pushed);

    let mut magnitude = if life > 0.0 {
        (dist + dist_v) / life
    } else {
        speed + vel.length()
    };

    if params.continuous && life > 0.0 {
        let ramp_up = (timing.age - timing.start_age) / life;
        let ramp_down = (timing.particle_stop_age - timing.age) / life;
        magnitude *= ramp_up.min(ramp_down).clamp(0.0, 1.0);
    }

    let mut outer = inner;
    outer.augment(&travel);
    outer.expand(Vec3::splat(params.size.mid_at(strength) * scale));
    let radius = outer.max_abs_component();

    if !(magnitude * radius).is_normal() {
        return None;
    }

    let inv_radius = 1.0 / radius;
    let rotation = loc.rotation * focus;
    Some(ForceAreaDesc {
        location: Location::new(loc.transform_point(params.spawn_pos_offset), rotation, radius),
        inner: inner.scaled(inv_radius),
        outer: outer.scaled(inv_radius),
        mode: params.force_generation,
        force: rotation * Vec3::Z * magnitude,
        water: match params.force_generation {
            ForceMode::Wind => environ.uniform.water,
            _ => None,
        },
        owner,
    })
}

/// Relative change large enough to resend the area.
fn differs(a: &ForceAreaDesc, b: &ForceAreaDesc, tolerance: f32) -> bool {
    let radius = a.location.scale.max(b.location.scale);
    let box_delta = |x: &Aabb, y: &Aabb| (x.min - y.min).abs().max_element().max((x.max - y.max).abs().max_element());
    let force_scale = a.force.length().max(b.force.length());

    !a.location.is_equivalent(&b.location, tolerance * radius.max(1.0), tolerance * radius)
        || box_delta(&a.inner, &b.inner) > tolerance
        || box_delta(&a.outer, &b.outer) > tolerance
        || (a.force - b.force).length() > tolerance * force_scale
        || a.water != b.water
        || a.mode != b.mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::PhysForces;
    use crate::params::VarEParam;
    use crate::util::Plane;

    #[derive(Default)]
    struct Host {
        next: AreaId,
        live: Vec<AreaId>,
        updates: usize,
    }

    impl ForceAreaHost for Host {
        fn create_force_area(&mut self, _desc: &ForceAreaDesc) -> Option<AreaId> {
            self.next += 1;
            self.live.push(self.next);
            Some(self.next)
        }

        fn update_force_area(&mut self, _id: AreaId, _desc: &ForceAreaDesc) {
            self.updates += 1;
        }

        fn release_area(&mut self, id: AreaId) {
            self.live.retain(|&a| a != id);
        }
    }

    fn wind_params() -> EffectParams {
        EffectParams {
            force_generation: ForceMode::Wind,
            speed: VarEParam::from(5.0),
            particle_life_time: VarEParam::from(2.0),
            spawn_pos_random_offset: Vec3::splat(0.5),
            ..Default::default()
        }
    }

    fn timing(age: f32) -> ForceTiming {
        ForceTiming {
            age,
            start_age: 0.0,
            stop_age: 1.0,
            particle_stop_age: 3.0,
        }
    }

    #[test]
    fn test_create_then_hold() {
        let params = wind_params();
        let config = EmissionConfig::default();
        let environ = PhysEnviron::with_uniform(PhysForces::default());
        let mut host = Host::default();
        let mut force = ForceFieldProjector::new();

        let change = force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &Location::IDENTITY, 0.5, 7);
        assert_eq!(change, ForceChange::Created);
        assert!(force.has_force());

        let desc = &force.state().expect("force area").desc;
        assert_eq!(desc.owner, 7);
        assert!(desc.outer.max_abs_component() <= 1.0 + 1e-5);
        assert!(desc.force.z > 0.0);

        let change = force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &Location::IDENTITY, 0.5, 7);
        assert_eq!(change, ForceChange::None);
        assert_eq!(host.updates, 0);
    }

    #[test]
    fn test_moves_beyond_tolerance() {
        let params = wind_params();
        let config = EmissionConfig::default();
        let environ = PhysEnviron::with_uniform(PhysForces::default());
        let mut host = Host::default();
        let mut force = ForceFieldProjector::new();

        force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &Location::IDENTITY, 0.5, 1);
        let moved = Location::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let change = force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &moved, 0.5, 1);
        assert_eq!(change, ForceChange::Updated);
        assert_eq!(host.updates, 1);
    }

    #[test]
    fn test_teardown_after_particle_stop() {
        let params = wind_params();
        let config = EmissionConfig::default();
        let environ = PhysEnviron::with_uniform(PhysForces::default());
        let mut host = Host::default();
        let mut force = ForceFieldProjector::new();

        force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &Location::IDENTITY, 0.5, 1);
        let change = force.update_force(&mut host, &params, &config, &environ, &timing(3.5), &Location::IDENTITY, 0.5, 1);
        assert_eq!(change, ForceChange::Released);
        assert!(!force.has_force());
        assert!(host.live.is_empty());
    }

    #[test]
    fn test_zero_speed_has_no_force() {
        let params = EffectParams {
            speed: VarEParam::from(0.0),
            ..wind_params()
        };
        let config = EmissionConfig::default();
        let environ = PhysEnviron::with_uniform(PhysForces::default());
        let mut host = Host::default();
        let mut force = ForceFieldProjector::new();

        let change = force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &Location::IDENTITY, 0.5, 1);
        assert_eq!(change, ForceChange::None);
        assert!(!force.has_force());
    }

    #[test]
    fn test_continuous_ramp() {
        let params = EffectParams {
            continuous: true,
            ..wind_params()
        };
        let environ = PhysEnviron::with_uniform(PhysForces::default());
        let window = |age| ForceTiming {
            particle_stop_age: 10.0,
            ..timing(age)
        };
        let early = project(&params, &environ, &window(0.5), &Location::IDENTITY, 0.5, 1);
        let full = project(&params, &environ, &window(4.0), &Location::IDENTITY, 0.5, 1);
        let (early, full) = match (early, full) {
            (Some(e), Some(f)) => (e, f),
            other => panic!("expected both projections, got {:?}", other),
        };
        // a quarter of the way up the ramp
        assert!((early.force.length() / full.force.length() - 0.25).abs() < 1e-4);
    }

    fn watery() -> PhysEnviron {
        PhysEnviron::with_uniform(PhysForces {
            water: Some(Plane::horizontal(2.0)),
            ..Default::default()
        })
    }

    #[test]
    fn test_wind_passes_water_through() {
        let environ = watery();
        let desc = project(&wind_params(), &environ, &timing(0.5), &Location::IDENTITY, 0.5, 1).expect("wind area");
        assert_eq!(desc.mode, ForceMode::Wind);
        assert_eq!(desc.water, environ.uniform.water);
        assert_eq!(desc.water, Some(Plane::horizontal(2.0)));
    }

    #[test]
    fn test_gravity_area() {
        let params = EffectParams {
            force_generation: ForceMode::Gravity,
            ..wind_params()
        };
        let environ = watery();
        let config = EmissionConfig::default();
        let mut host = Host::default();
        let mut force = ForceFieldProjector::new();

        let change = force.update_force(&mut host, &params, &config, &environ, &timing(0.5), &Location::IDENTITY, 0.5, 2);
        assert_eq!(change, ForceChange::Created);
        let desc = &force.state().expect("gravity area").desc;
        assert_eq!(desc.mode, ForceMode::Gravity);
        assert!(desc.water.is_none());

        // same magnitude and direction as the equivalent wind area
        let wind = project(&wind_params(), &environ, &timing(0.5), &Location::IDENTITY, 0.5, 2).expect("wind area");
        assert!((desc.force - wind.force).length() < 1e-5);
        assert!(desc.force.z > 0.0);
    }
}
