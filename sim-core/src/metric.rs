//! Injected strategies: the distance metric and the spin-compatibility
//! function.
//!
//! Both are evaluated for every candidate pair on every tick, and both may
//! come from user code, so they return `Result` and the engine treats a
//! failure as "no interaction for this pair" rather than aborting a tick.
//! The engine runs every call through [`contained`], so a panicking
//! strategy is reported the same way.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EvalError, InteractionError},
    particle::Particle,
};

/// Distance between two positions in unit-square coordinates.
///
/// Implementations should be close to symmetric and return `0` for
/// identical positions; the grid only uses the result to filter and weight
/// neighbours.
pub trait Metric: Send + Sync {
    fn distance(&self, a: Vec2, b: Vec2) -> Result<f32, EvalError>;
}

/// Aggregate similarity of two particles' spins, in `[0, 1]`.
///
/// `0.5` is neutral. Lower values attract, higher values repel.
pub trait Compatibility: Send + Sync {
    fn compatibility(&self, a: &Particle, b: &Particle) -> Result<f32, EvalError>;
}

/// Built-in distance presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
    /// `(|dx|^p + |dy|^p)^(1/p)`.
    Minkowski { p: f32 },
    /// Squared Euclidean distance (no root).
    Biquadratic,
    /// `|sin(dx) + sin(dy)|`; not a true metric, kept for the patterns it makes.
    Wave,
}

impl Distance {
    /// Every preset, in menu order.
    pub const PRESETS: [Distance; 6] = [
        Distance::Euclidean,
        Distance::Manhattan,
        Distance::Chebyshev,
        Distance::Minkowski { p: 3.0 },
        Distance::Biquadratic,
        Distance::Wave,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Distance::Euclidean => "euclidean",
            Distance::Manhattan => "manhattan",
            Distance::Chebyshev => "chebyshev",
            Distance::Minkowski { .. } => "minkowski",
            Distance::Biquadratic => "biquadratic",
            Distance::Wave => "wave",
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Minkowski { p } => write!(f, "minkowski (p = {p})"),
            other => f.write_str(other.name()),
        }
    }
}

impl Metric for Distance {
    fn distance(&self, a: Vec2, b: Vec2) -> Result<f32, EvalError> {
        let d = (a - b).abs();
        let value = match *self {
            Distance::Euclidean => d.length(),
            Distance::Manhattan => d.x + d.y,
            Distance::Chebyshev => d.max_element(),
            Distance::Minkowski { p } => {
                if !(p.is_finite() && p > 0.0) {
                    return Err(EvalError::new(format!("minkowski order {p} must be positive")));
                }
                (d.x.powf(p) + d.y.powf(p)).powf(p.recip())
            }
            Distance::Biquadratic => d.length_squared(),
            Distance::Wave => ((a.x - b.x).sin() + (a.y - b.y).sin()).abs(),
        };
        Ok(value)
    }
}

/// Adapts a closure into a [`Metric`].
pub struct MetricFn<F>(pub F);

impl<F> Metric for MetricFn<F>
where
    F: Fn(Vec2, Vec2) -> Result<f32, EvalError> + Send + Sync,
{
    #[inline]
    fn distance(&self, a: Vec2, b: Vec2) -> Result<f32, EvalError> {
        (self.0)(a, b)
    }
}

/// Default compatibility: mean absolute difference of the spin components.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpinDifference;

impl Compatibility for SpinDifference {
    fn compatibility(&self, a: &Particle, b: &Particle) -> Result<f32, EvalError> {
        a.spin
            .mean_abs_difference(&b.spin)
            .map_err(|err| EvalError::new(err.to_string()))
    }
}

/// Adapts a closure into a [`Compatibility`].
pub struct CompatibilityFn<F>(pub F);

impl<F> Compatibility for CompatibilityFn<F>
where
    F: Fn(&Particle, &Particle) -> Result<f32, EvalError> + Send + Sync,
{
    #[inline]
    fn compatibility(&self, a: &Particle, b: &Particle) -> Result<f32, EvalError> {
        (self.0)(a, b)
    }
}

/// Runs one strategy call and catches a panic raised inside it.
///
/// ### Parameters
/// - `strategy` - Name of the strategy, used in the error message.
/// - `call` - The evaluation to run.
///
/// ### Returns
/// The call's result, or [`InteractionError::Panicked`] carrying the panic
/// message if it unwound.
pub fn contained<T>(strategy: &'static str, call: impl FnOnce() -> T) -> Result<T, InteractionError> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| InteractionError::Panicked {
        strategy,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Maps a raw compatibility in `[0, 1]` to a signed spin factor in
/// `[-1, 1]`; `0.5` maps to `0` (neutral).
#[inline]
pub fn spin_sign(raw: f32) -> f32 {
    raw * 2.0 - 1.0
}
