//! Core engine of a 2-D spin-particle simulation on a torus.
//!
//! Main components:
//! - [`vector`]: unit-square wrapping on top of `glam::Vec2`.
//! - [`spin`]: the N-dimensional spin attribute.
//! - [`metric`]: injected distance and compatibility strategies.
//! - [`particle`]: particle state, force law and integration.
//! - [`zone`] and [`grid`]: the spatial index and dirty-zone tracking.
//! - [`force_buffer`]: per-tick force accumulation.
//! - [`phases`]: the force, integration and re-bucket passes.
//! - [`simulation`]: the driver a host talks to.
//! - [`schedule`]: fixed-timestep pacing of ticks and draws.
//! - [`stats`]: phase timers, tick counters and interaction faults.
//! - [`config`], [`error`], [`types`]: shared configuration, errors and ids.

pub mod config;
pub mod error;
pub mod force_buffer;
pub mod grid;
pub mod metric;
pub mod particle;
pub mod phases;
pub mod schedule;
pub mod simulation;
pub mod spin;
pub mod stats;
pub mod types;
pub mod vector;
pub mod zone;

pub use config::{Boundary, Config};
pub use error::{EvalError, InteractionError, SimError};
pub use metric::{Compatibility, CompatibilityFn, Distance, Metric, MetricFn, SpinDifference};
pub use simulation::Simulation;
pub use spin::Spin;
