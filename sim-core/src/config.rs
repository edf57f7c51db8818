//! Tunable simulation parameters.
//!
//! [`Config`] is plain data: it derives serde so hosts can load it from a
//! preset file, and every field has a default so partial files work.
//! The engine reads it through the two narrow views [`ForceLaw`] and
//! [`Integration`].

use serde::{Deserialize, Serialize};

use crate::{error::SimError, metric::Distance};

/// What happens to a particle that leaves the unit square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// Reappear at the opposite edge; neighbour search crosses the seam.
    #[default]
    Wrap,
    /// Stop at the edge; neighbour search does not cross it.
    Clamp,
}

impl Boundary {
    #[inline]
    pub fn wraps(self) -> bool {
        matches!(self, Boundary::Wrap)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pane units (pixels) per grid cell.
    pub cell_size: f32,
    /// Interaction strength ("antigravity"). Negative values invert the law.
    pub strength: f32,
    /// Exponent applied to `strength / distance`.
    pub curve: f32,
    /// Global multiplier applied to the accumulated force before integration.
    pub speed: f32,
    pub air_friction: f32,
    pub particle_friction: f32,
    pub heat_speed: f32,
    pub initial_heat: f32,
    /// Per-axis velocity limit, in unit-square lengths per tick.
    pub max_speed: f32,
    pub boundary: Boundary,
    /// Interaction cutoff in unit-square lengths. `None` means one cell.
    pub interaction_cutoff: Option<f32>,
    pub metric: Distance,
    pub ticks_per_second: f64,
    pub frames_per_second: f64,
    /// Ticks the pacer may run in one frame before it drops the backlog.
    pub max_catch_up: u32,
    /// Seed for particle placement; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cell_size: 30.0,
            strength: 0.05,
            curve: 1.0,
            speed: 0.05,
            air_friction: 0.005,
            particle_friction: 0.1,
            heat_speed: 0.0,
            initial_heat: 0.5,
            max_speed: 0.01,
            boundary: Boundary::Wrap,
            interaction_cutoff: None,
            metric: Distance::Euclidean,
            ticks_per_second: 60.0,
            frames_per_second: 60.0,
            max_catch_up: 4,
            seed: None,
        }
    }
}

/// Parameters of the pairwise force law.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceLaw {
    pub strength: f32,
    pub curve: f32,
}

/// Parameters of one integration step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integration {
    pub speed: f32,
    pub air_friction: f32,
    pub heat_speed: f32,
    pub max_speed: f32,
    pub boundary: Boundary,
}

fn invalid(name: &'static str, reason: impl Into<String>) -> SimError {
    SimError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), SimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, format!("{value} is outside [0, 1]")))
    }
}

impl Config {
    /// Checks every parameter the engine relies on.
    ///
    /// ### Errors
    /// [`SimError::InvalidCellSize`] for a non-positive cell size and
    /// [`SimError::InvalidParameter`] for anything else out of range.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(SimError::InvalidCellSize(self.cell_size));
        }
        if !self.strength.is_finite() {
            return Err(invalid("strength", "must be finite"));
        }
        if !(self.curve.is_finite() && self.curve > 0.0) {
            return Err(invalid("curve", format!("{} must be positive", self.curve)));
        }
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(invalid("speed", format!("{} must be non-negative", self.speed)));
        }
        check_unit("air_friction", self.air_friction)?;
        check_unit("particle_friction", self.particle_friction)?;
        if !self.heat_speed.is_finite() {
            return Err(invalid("heat_speed", "must be finite"));
        }
        if !(-1.0..=1.0).contains(&self.initial_heat) {
            return Err(invalid(
                "initial_heat",
                format!("{} is outside [-1, 1]", self.initial_heat),
            ));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(invalid(
                "max_speed",
                format!("{} must be positive", self.max_speed),
            ));
        }
        if let Some(cutoff) = self.interaction_cutoff
            && !(cutoff.is_finite() && cutoff > 0.0)
        {
            return Err(invalid(
                "interaction_cutoff",
                format!("{cutoff} must be positive"),
            ));
        }
        if !(self.ticks_per_second.is_finite() && self.ticks_per_second > 0.0) {
            return Err(invalid("ticks_per_second", "must be positive"));
        }
        if !(self.frames_per_second.is_finite() && self.frames_per_second > 0.0) {
            return Err(invalid("frames_per_second", "must be positive"));
        }
        if self.max_catch_up == 0 {
            return Err(invalid("max_catch_up", "must allow at least one tick"));
        }
        Ok(())
    }

    pub fn force_law(&self) -> ForceLaw {
        ForceLaw {
            strength: self.strength,
            curve: self.curve,
        }
    }

    pub fn integration(&self) -> Integration {
        Integration {
            speed: self.speed,
            air_friction: self.air_friction,
            heat_speed: self.heat_speed,
            max_speed: self.max_speed,
            boundary: self.boundary,
        }
    }
}
