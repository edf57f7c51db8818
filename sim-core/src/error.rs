//! Error types for the simulation core.
//!
//! [`SimError`] covers configuration and programmer errors, which are
//! returned immediately. [`InteractionError`] covers failures of a single
//! pairwise evaluation; those never abort a tick and are reported as
//! [`crate::stats::InteractionFault`]s instead.

use thiserror::Error;

use crate::types::ParticleId;

/// Configuration and programmer errors. These are not recoverable runtime
/// conditions; callers are expected to fix their input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("dimension mismatch: {left} components vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("a spin needs at least one component")]
    EmptySpin,

    #[error("spin component {index} is {value}, expected a value in [0, 1]")]
    SpinOutOfRange { index: usize, value: f32 },

    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),

    #[error("grid dimensions must be at least 1x1, got {cols}x{rows}")]
    InvalidDimensions { cols: usize, rows: usize },

    #[error("pane size must be positive and finite, got ({width}, {height})")]
    InvalidPane { width: f32, height: f32 },

    #[error("position ({x}, {y}) is not finite")]
    NonFinitePosition { x: f32, y: f32 },

    #[error("parameter `{name}` is invalid: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no particle with id {0}")]
    UnknownParticle(ParticleId),
}

/// Failure raised by user-supplied logic (a custom distance or
/// compatibility function).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Why a single pairwise interaction was abandoned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InteractionError {
    #[error("distance function failed: {0}")]
    Distance(#[source] EvalError),

    #[error("distance function returned a non-finite value ({0})")]
    NonFiniteDistance(f32),

    #[error("compatibility function failed: {0}")]
    Compatibility(#[source] EvalError),

    #[error("compatibility must lie in [0, 1], got {0}")]
    CompatibilityOutOfRange(f32),

    #[error("{strategy} function panicked: {message}")]
    Panicked {
        strategy: &'static str,
        message: String,
    },
}
