//! # Variable Parameters
//!
//! Scalar parameters with a random spread and an optional strength curve.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Curve key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Position on the curve, `[0, 1]`
    pub t: f32,
    /// Value at `t`
    pub v: f32,
}

/// Piecewise-linear curve over `[0, 1]`. An empty curve evaluates to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl Curve {
    /// Build from `(t, v)` pairs; keys are sorted by `t`.
    pub fn new(points: &[(f32, f32)]) -> Self {
        let mut keys: Vec<CurveKey> = points.iter().map(|&(t, v)| CurveKey { t, v }).collect();
        keys.sort_by(|a, b| a.t.total_cmp(&b.t));
        Self { keys }
    }

    pub fn constant(v: f32) -> Self {
        Self::new(&[(0.0, v)])
    }

    pub fn eval(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 1.0,
        };
        if t <= first.t {
            return first.v;
        }
        if t >= last.t {
            return last.v;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= 0.0 {
                    return b.v;
                }
                return a.v + (b.v - a.v) * (t - a.t) / span;
            }
        }
        last.v
    }

    pub fn max_value(&self) -> f32 {
        self.keys.iter().map(|k| k.v).reduce(f32::max).unwrap_or(1.0)
    }

    pub fn min_value(&self) -> f32 {
        self.keys.iter().map(|k| k.v).reduce(f32::min).unwrap_or(1.0)
    }
}

/// Value with random spread: a sample is `value * (1 - random * u)`, `u` in `[0, 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarParam {
    pub value: f32,
    /// Random fraction, `[0, 1]`
    pub random: f32,
}

impl From<f32> for VarParam {
    fn from(value: f32) -> Self {
        Self { value, random: 0.0 }
    }
}

impl VarParam {
    pub fn new(value: f32, random: f32) -> Self {
        Self { value, random }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.random == 0.0 {
            return self.value;
        }
        self.value * (1.0 - self.random * rng.gen::<f32>())
    }

    pub fn max(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.value * (1.0 - self.random)
    }

    pub fn mid(&self) -> f32 {
        self.value * (1.0 - self.random * 0.5)
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

/// `VarParam` further scaled by a curve over emitter strength.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarEParam {
    pub value: f32,
    pub random: f32,
    /// Strength curve; absent means constant 1
    pub strength: Option<Curve>,
}

impl From<f32> for VarEParam {
    fn from(value: f32) -> Self {
        Self {
            value,
            random: 0.0,
            strength: None,
        }
    }
}

impl VarEParam {
    pub fn new(value: f32, random: f32) -> Self {
        Self {
            value,
            random,
            strength: None,
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.strength = Some(curve);
        self
    }

    fn curve_at(&self, strength: f32) -> f32 {
        self.strength.as_ref().map_or(1.0, |c| c.eval(strength))
    }

    /// Value at a strength, without randomness.
    pub fn at(&self, strength: f32) -> f32 {
        self.value * self.curve_at(strength)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, strength: f32) -> f32 {
        let base = self.at(strength);
        if self.random == 0.0 {
            return base;
        }
        base * (1.0 - self.random * rng.gen::<f32>())
    }

    pub fn max(&self) -> f32 {
        self.value * self.strength.as_ref().map_or(1.0, |c| c.max_value().max(0.0))
    }

    pub fn min(&self) -> f32 {
        self.value * (1.0 - self.random) * self.strength.as_ref().map_or(1.0, |c| c.min_value().max(0.0))
    }

    /// Midpoint of the random range at a strength
    pub fn mid_at(&self, strength: f32) -> f32 {
        self.at(strength) * (1.0 - self.random * 0.5)
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}
