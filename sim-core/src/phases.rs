//! The three passes of a simulation tick.
//!
//! 1. [`force_phase`]: every near pair is weighed by the metric and the
//!    compatibility function and the resulting force is accumulated in a
//!    [`ForceBuffer`]. Particles are only read.
//! 2. [`integration_phase`]: each particle queues its buffered force and
//!    integrates it, moving by its velocity.
//! 3. [`rebucket_phase`]: particles that moved are put back into the zone
//!    their new position belongs to.

use crate::{
    config::{ForceLaw, Integration},
    error::InteractionError,
    force_buffer::ForceBuffer,
    grid::Grid,
    metric::{Compatibility, Metric, contained, spin_sign},
    particle::Particle,
    stats::{InteractionFault, TickStats},
    types::Slot,
};

fn fault(particles: &[Particle], tick: u64, a: Slot, b: Slot, error: InteractionError) -> InteractionFault {
    InteractionFault {
        tick,
        a: particles[a].id,
        b: particles[b].id,
        error,
    }
}

/// Accumulates the pairwise forces of one tick.
///
/// For every pair the grid reports within `cutoff`:
///
/// 1. Evaluates `compatibility` and maps it to a signed factor with
///    [`spin_sign`].
/// 2. Calls [`Particle::react`] on the first particle against the image of
///    the second and adds the result into `forces` for the first particle.
///
/// A metric or compatibility failure or panic, or a compatibility outside
/// `[0, 1]`, is recorded in `stats` and the pair contributes nothing.
///
/// `forces` is resized (and cleared) to the particle count first.
///
/// ### Parameters
/// - `grid` - Particles and zones; only read access is required.
/// - `metric` - Distance used to find and weight neighbours.
/// - `compatibility` - Spin similarity of each pair, expected in `[0, 1]`.
/// - `law` - Strength and curve of the force law.
/// - `cutoff` - Largest distance at which a pair still interacts.
/// - `forces` - Scratch buffer receiving one sum per particle slot.
/// - `stats` - Receives the pair and contribution counts and the faults.
pub fn force_phase(
    grid: &Grid,
    metric: &dyn Metric,
    compatibility: &dyn Compatibility,
    law: &ForceLaw,
    cutoff: f32,
    forces: &mut ForceBuffer,
    stats: &mut TickStats,
) {
    forces.ensure_len(grid.len());
    let particles = grid.particles();
    let tick = stats.ticks();

    grid.for_each_pair(metric, cutoff, |candidate| {
        let pair = match candidate {
            Ok(pair) => pair,
            Err(failed) => {
                stats.record_fault(fault(particles, tick, failed.a, failed.b, failed.error));
                return;
            }
        };
        stats.last.pairs += 1;

        let (a, b) = (&particles[pair.a], &particles[pair.b]);
        let evaluated = contained("compatibility", || compatibility.compatibility(a, b))
            .and_then(|result| result.map_err(InteractionError::Compatibility))
            .and_then(|raw| {
                if (0.0..=1.0).contains(&raw) {
                    Ok(raw)
                } else {
                    Err(InteractionError::CompatibilityOutOfRange(raw))
                }
            });
        let raw = match evaluated {
            Ok(raw) => raw,
            Err(error) => {
                stats.record_fault(fault(particles, tick, pair.a, pair.b, error));
                return;
            }
        };

        if let Some(force) = a.react(pair.image, pair.distance, spin_sign(raw), law) {
            forces.add(pair.a, force);
        }
    });
    stats.last.contributions = forces.total();
}

/// Queues each buffered force into its particle and integrates every
/// particle.
///
/// Only slots that received a contribution get a force queued; all
/// particles are integrated, so friction still acts on the rest. Heat
/// changes on every call, but a particle that stays put leaves its zone
/// clean; only movement and membership changes make a zone dirty.
///
/// ### Parameters
/// - `grid` - The grid whose particles are integrated.
/// - `forces` - Buffer filled by [`force_phase`] for the same particle count.
/// - `params` - Friction, speed limit, heat and boundary settings.
///
/// ### Returns
/// Slots of the particles that are still moving, in ascending order.
pub fn integration_phase(grid: &mut Grid, forces: &ForceBuffer, params: &Integration) -> Vec<Slot> {
    let particles = grid.particles_mut();
    for slot in forces.influenced_indices() {
        if let Some(particle) = particles.get_mut(slot) {
            particle.apply_force(forces.force(slot));
        }
    }

    particles
        .iter_mut()
        .enumerate()
        .filter_map(|(slot, particle)| particle.tick(params).then_some(slot))
        .collect()
}

/// Re-buckets the given particles.
///
/// ### Parameters
/// - `grid` - The grid owning the particles; zones are updated and marked
///   dirty when a particle changes zone.
/// - `moving` - Slots returned by [`integration_phase`].
///
/// ### Returns
/// How many of them changed zone.
pub fn rebucket_phase(grid: &mut Grid, moving: &[Slot]) -> usize {
    moving
        .iter()
        .filter(|&&slot| grid.fix_particle_zone(slot))
        .count()
}
