//! The simulation driver.
//!
//! [`Simulation`] owns the grid (and through it every particle), the
//! configuration, the injected strategies, the id generator, the RNG and
//! the tick metrics. A host drives it with [`Simulation::tick`] and
//! renders from [`Simulation::drawable_zones`].

use std::time::Instant;

use glam::Vec2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::{Boundary, Config},
    error::SimError,
    force_buffer::ForceBuffer,
    grid::{Grid, ResizeReport, ZoneView},
    metric::{Compatibility, Metric, SpinDifference},
    particle::{IdGenerator, Particle},
    phases::{force_phase, integration_phase, rebucket_phase},
    spin::Spin,
    stats::{InteractionFault, TickStats},
    types::ParticleId,
    vector::Toroidal,
};

pub struct Simulation {
    cfg: Config,
    grid: Grid,
    metric: Box<dyn Metric>,
    compatibility: Box<dyn Compatibility>,
    forces: ForceBuffer,
    stats: TickStats,
    ids: IdGenerator,
    rng: StdRng,
    /// Spin dimensionality shared by every particle, fixed by the first add.
    spin_dims: Option<usize>,
    paused: bool,
    cutoff_warned: bool,
}

impl Simulation {
    /// Creates an empty, running simulation for a pane of `pane` units.
    ///
    /// ### Errors
    /// Any [`Config::validate`] error, or an invalid pane.
    pub fn new(cfg: Config, pane: Vec2) -> Result<Self, SimError> {
        cfg.validate()?;
        let grid = Grid::new(cfg.cell_size, pane, cfg.boundary.wraps())?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        log::debug!(
            "simulation created: {}x{} zones, cell size {}, {} boundary",
            grid.cols(),
            grid.rows(),
            cfg.cell_size,
            if cfg.boundary.wraps() { "wrapping" } else { "clamped" },
        );
        Ok(Self {
            metric: Box::new(cfg.metric),
            compatibility: Box::new(SpinDifference),
            cfg,
            grid,
            forces: ForceBuffer::default(),
            stats: TickStats::new(),
            ids: IdGenerator::new(),
            rng,
            spin_dims: None,
            paused: false,
            cutoff_warned: false,
        })
    }

    /// Creates a simulation whose grid is exactly `cols × rows` zones.
    pub fn with_dims(cfg: Config, cols: usize, rows: usize) -> Result<Self, SimError> {
        if cols == 0 || rows == 0 {
            return Err(SimError::InvalidDimensions { cols, rows });
        }
        let pane = Vec2::new(cols as f32, rows as f32) * cfg.cell_size;
        Self::new(cfg, pane)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Replaces the tunables.
    ///
    /// A changed metric preset replaces the current metric, a changed
    /// boundary switches the grid topology and a changed particle friction
    /// applies to every existing particle. The cell size and seed only take
    /// effect on a new simulation.
    ///
    /// ### Errors
    /// Any [`Config::validate`] error; the old configuration stays in place.
    pub fn update_config(&mut self, cfg: Config) -> Result<(), SimError> {
        cfg.validate()?;
        if cfg.metric != self.cfg.metric {
            self.metric = Box::new(cfg.metric);
        }
        if cfg.boundary != self.cfg.boundary {
            self.grid.set_wrap(cfg.boundary.wraps());
        }
        if cfg.particle_friction != self.cfg.particle_friction {
            for p in self.grid.particles_mut() {
                p.friction = cfg.particle_friction;
            }
        }
        if cfg.interaction_cutoff != self.cfg.interaction_cutoff {
            self.cutoff_warned = false;
        }
        let cell_size = self.cfg.cell_size;
        self.cfg = Config { cell_size, ..cfg };
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn particles(&self) -> &[Particle] {
        self.grid.particles()
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.grid.slot_of(id).and_then(|slot| self.grid.particle(slot))
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Drains the interaction faults recorded since the previous call.
    pub fn take_faults(&mut self) -> Vec<InteractionFault> {
        self.stats.take_faults()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Flips the pause flag and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.paused = !self.paused;
        log::debug!("simulation {}", if self.paused { "paused" } else { "resumed" });
        self.paused
    }

    pub fn set_metric(&mut self, metric: Box<dyn Metric>) {
        self.metric = metric;
    }

    pub fn set_compatibility(&mut self, compatibility: Box<dyn Compatibility>) {
        self.compatibility = compatibility;
    }

    pub fn set_boundary(&mut self, boundary: Boundary) {
        self.cfg.boundary = boundary;
        self.grid.set_wrap(boundary.wraps());
    }

    /// Cutoff used by the force pass: the configured one, capped at the
    /// grid reach of one cell.
    pub fn effective_cutoff(&self) -> f32 {
        let reach = self.grid.reach();
        self.cfg.interaction_cutoff.unwrap_or(reach).min(reach)
    }

    fn cutoff_for_tick(&mut self) -> f32 {
        let cutoff = self.effective_cutoff();
        if let Some(wanted) = self.cfg.interaction_cutoff
            && wanted > cutoff
            && !self.cutoff_warned
        {
            log::warn!(
                "interaction cutoff {wanted} exceeds one cell of the {}x{} grid, using {cutoff}",
                self.grid.cols(),
                self.grid.rows()
            );
            self.cutoff_warned = true;
        }
        cutoff
    }

    /// Adds a particle at `pos`, or at a uniformly random position when
    /// `None`. The position is wrapped (or clamped) into the unit square.
    ///
    /// ### Parameters
    /// - `spin` - Spin of the new particle; fixes the dimensionality of all
    ///   later ones until [`Simulation::reset`].
    /// - `pos` - Position in unit-square coordinates.
    ///
    /// ### Returns
    /// The id of the new particle.
    ///
    /// ### Errors
    /// - [`SimError::NonFinitePosition`] for a NaN or infinite position.
    /// - [`SimError::DimensionMismatch`] if `spin` has a different number
    ///   of components than the particles already present.
    pub fn add(&mut self, spin: Spin, pos: Option<Vec2>) -> Result<ParticleId, SimError> {
        if let Some(dims) = self.spin_dims
            && dims != spin.dims()
        {
            return Err(SimError::DimensionMismatch {
                left: spin.dims(),
                right: dims,
            });
        }
        let pos = match pos {
            Some(p) if !p.is_finite() => {
                return Err(SimError::NonFinitePosition { x: p.x, y: p.y });
            }
            Some(p) => p,
            None => Vec2::new(self.rng.random(), self.rng.random()),
        };
        let pos = match self.cfg.boundary {
            Boundary::Wrap => pos.wrap_unit(),
            Boundary::Clamp => pos.clamp_unit(),
        };

        self.spin_dims = Some(spin.dims());
        let id = self.ids.next_id();
        let particle = Particle::new(id, pos, spin)
            .with_heat(self.cfg.initial_heat)
            .with_friction(self.cfg.particle_friction);
        self.grid.track(particle);
        Ok(id)
    }

    /// Adds `count` particles with random spins of `dims` components at
    /// random positions.
    ///
    /// ### Returns
    /// The ids of the new particles, in creation order.
    pub fn populate(&mut self, count: usize, dims: usize) -> Result<Vec<ParticleId>, SimError> {
        let mut added = Vec::with_capacity(count);
        for _ in 0..count {
            let spin = Spin::random(dims, &mut self.rng)?;
            added.push(self.add(spin, None)?);
        }
        log::debug!("populated {count} particles with {dims}-dimensional spins");
        Ok(added)
    }

    /// ### Errors
    /// [`SimError::UnknownParticle`] or [`SimError::InvalidParameter`] for a
    /// non-finite velocity.
    pub fn set_velocity(&mut self, id: ParticleId, velocity: Vec2) -> Result<(), SimError> {
        if !velocity.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "velocity",
                reason: format!("{velocity} is not finite"),
            });
        }
        let slot = self.grid.slot_of(id).ok_or(SimError::UnknownParticle(id))?;
        let particle = self
            .grid
            .particle_mut(slot)
            .ok_or(SimError::UnknownParticle(id))?;
        particle.velocity = velocity;
        Ok(())
    }

    /// Advances one tick unless paused.
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.step();
    }

    /// Advances one tick regardless of the pause flag.
    pub fn step(&mut self) {
        self.stats.begin_tick();
        let cutoff = self.cutoff_for_tick();
        let law = self.cfg.force_law();
        let params = self.cfg.integration();

        let started = Instant::now();
        force_phase(
            &self.grid,
            self.metric.as_ref(),
            self.compatibility.as_ref(),
            &law,
            cutoff,
            &mut self.forces,
            &mut self.stats,
        );
        self.stats.force.record_since(started);

        let started = Instant::now();
        let moving = integration_phase(&mut self.grid, &self.forces, &params);
        self.stats.integrate.record_since(started);

        let started = Instant::now();
        let relocated = rebucket_phase(&mut self.grid, &moving);
        self.stats.rebucket.record_since(started);

        self.stats.last.moving = moving.len();
        self.stats.last.relocated = relocated;
        self.stats.finish_tick();
    }

    /// Zones changed since the previous call, with their particles. Clears
    /// the dirty set.
    pub fn drawable_zones(&mut self) -> Vec<ZoneView<'_>> {
        self.grid.drain_dirty()
    }

    /// Re-derives the grid from a new pane size. Unchanged dimensions are a
    /// no-op.
    pub fn resize(&mut self, pane: Vec2) -> Result<ResizeReport, SimError> {
        let report = self.grid.resize(pane)?;
        if report.changed() {
            self.cutoff_warned = false;
        }
        Ok(report)
    }

    /// Removes every particle. Ids keep counting up and the pause state is
    /// kept.
    pub fn reset(&mut self) {
        let removed = self.grid.len();
        self.grid.clear();
        self.forces.ensure_len(0);
        self.spin_dims = None;
        log::debug!("simulation reset, {removed} particles removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{EvalError, InteractionError},
        metric::{Distance, MetricFn},
        types::ZoneCoord,
    };

    fn seeded() -> Config {
        Config {
            seed: Some(7),
            ..Config::default()
        }
    }

    fn spin() -> Spin {
        Spin::uniform(0.5, 3).unwrap()
    }

    #[test]
    fn new_sizes_grid_from_pane() {
        let sim = Simulation::new(seeded(), Vec2::new(300.0, 150.0)).unwrap();
        assert_eq!((sim.grid().cols(), sim.grid().rows()), (10, 5));
        assert!(!sim.is_paused());
        assert!(sim.is_empty());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let cfg = Config {
            cell_size: -1.0,
            ..Config::default()
        };
        assert!(Simulation::new(cfg, Vec2::splat(100.0)).is_err());
    }

    #[test]
    fn add_wraps_positions_and_assigns_increasing_ids() {
        let mut sim = Simulation::with_dims(seeded(), 10, 10).unwrap();
        let a = sim.add(spin(), Some(Vec2::new(1.25, -0.25))).unwrap();
        let b = sim.add(spin(), None).unwrap();

        assert!(b > a);
        let p = sim.particle(a).unwrap();
        assert!((p.pos - Vec2::new(0.25, 0.75)).length() < 1e-6);
        let q = sim.particle(b).unwrap();
        assert!((0.0..1.0).contains(&q.pos.x) && (0.0..1.0).contains(&q.pos.y));
    }

    #[test]
    fn add_rejects_non_finite_and_mismatched_spins() {
        let mut sim = Simulation::with_dims(seeded(), 4, 4).unwrap();
        assert!(matches!(
            sim.add(spin(), Some(Vec2::new(f32::NAN, 0.0))),
            Err(SimError::NonFinitePosition { .. })
        ));
        sim.add(spin(), None).unwrap();
        assert_eq!(
            sim.add(Spin::uniform(0.5, 2).unwrap(), None),
            Err(SimError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn seeded_populations_are_reproducible() {
        let mut a = Simulation::with_dims(seeded(), 5, 5).unwrap();
        let mut b = Simulation::with_dims(seeded(), 5, 5).unwrap();
        a.populate(20, 3).unwrap();
        b.populate(20, 3).unwrap();
        assert_eq!(a.particles(), b.particles());
        assert!(a.grid().check_shape());
    }

    #[test]
    fn paused_tick_is_a_no_op_but_step_runs() {
        let mut sim = Simulation::with_dims(seeded(), 10, 10).unwrap();
        let id = sim.add(spin(), Some(Vec2::new(0.5, 0.5))).unwrap();
        sim.set_velocity(id, Vec2::new(0.005, 0.0)).unwrap();

        assert!(sim.toggle());
        sim.tick();
        assert_eq!(sim.particle(id).unwrap().pos, Vec2::new(0.5, 0.5));
        assert_eq!(sim.stats().ticks(), 0);

        sim.step();
        assert!(sim.particle(id).unwrap().pos.x > 0.5);
        assert_eq!(sim.stats().ticks(), 1);
    }

    #[test]
    fn set_velocity_checks_its_input() {
        let mut sim = Simulation::with_dims(seeded(), 4, 4).unwrap();
        assert_eq!(
            sim.set_velocity(9, Vec2::X),
            Err(SimError::UnknownParticle(9))
        );
        let id = sim.add(spin(), None).unwrap();
        assert!(sim.set_velocity(id, Vec2::new(f32::INFINITY, 0.0)).is_err());
    }

    #[test]
    fn cutoff_is_capped_at_one_cell() {
        let mut cfg = seeded();
        cfg.interaction_cutoff = Some(0.5);
        let sim = Simulation::with_dims(cfg, 10, 4).unwrap();
        assert!((sim.effective_cutoff() - 0.1).abs() < 1e-6);

        let mut cfg = seeded();
        cfg.interaction_cutoff = Some(0.02);
        let sim = Simulation::with_dims(cfg, 10, 10).unwrap();
        assert_eq!(sim.effective_cutoff(), 0.02);
    }

    #[test]
    fn reset_clears_particles_but_not_ids() {
        let mut sim = Simulation::with_dims(seeded(), 4, 4).unwrap();
        let first = sim.add(spin(), None).unwrap();
        sim.drawable_zones();

        sim.reset();
        assert!(sim.is_empty());
        assert_eq!(sim.drawable_zones().len(), 16);

        let next = sim.add(Spin::uniform(0.1, 5).unwrap(), None).unwrap();
        assert!(next > first);
    }

    #[test]
    fn failing_metric_does_not_stop_the_tick() {
        let mut sim = Simulation::with_dims(seeded(), 10, 10).unwrap();
        sim.add(spin(), Some(Vec2::new(0.45, 0.5))).unwrap();
        sim.add(spin(), Some(Vec2::new(0.5, 0.5))).unwrap();
        sim.set_metric(Box::new(MetricFn(|_: Vec2, _: Vec2| {
            Err(EvalError::new("metric offline"))
        })));

        sim.tick();
        assert_eq!(sim.stats().last.faults, 2);
        let faults = sim.take_faults();
        assert_eq!(faults.len(), 2);
        assert!(faults[0].to_string().contains("metric offline"));
        assert!(sim.take_faults().is_empty());
        assert_eq!(sim.stats().ticks(), 1);
    }

    #[test]
    fn panicking_metric_is_reported_as_a_fault() {
        let mut sim = Simulation::with_dims(seeded(), 10, 10).unwrap();
        sim.add(spin(), Some(Vec2::new(0.45, 0.5))).unwrap();
        sim.add(spin(), Some(Vec2::new(0.5, 0.5))).unwrap();
        sim.set_metric(Box::new(MetricFn(|a: Vec2, b: Vec2| {
            let table: Vec<f32> = Vec::new();
            Ok(table[(a.x * 10.0) as usize] + b.x)
        })));

        sim.tick();
        assert_eq!(sim.stats().ticks(), 1);
        let faults = sim.take_faults();
        assert_eq!(faults.len(), 2);
        assert!(faults.iter().all(|f| matches!(
            &f.error,
            InteractionError::Panicked { strategy: "distance", .. }
        )));
        assert!(faults[0].to_string().contains("index out of bounds"));

        sim.set_metric(Box::new(Distance::Euclidean));
        sim.tick();
        assert!(sim.take_faults().is_empty());
        assert_eq!(sim.stats().last.contributions, 2);
    }

    #[test]
    fn resize_marks_every_zone_dirty() {
        let mut sim = Simulation::new(seeded(), Vec2::new(300.0, 300.0)).unwrap();
        sim.populate(30, 2).unwrap();
        sim.drawable_zones();

        let report = sim.resize(Vec2::new(150.0, 90.0)).unwrap();
        assert!(report.consistent);
        assert_eq!(report.to, (5, 3));
        assert_eq!(sim.drawable_zones().len(), 15);

        assert!(!sim.resize(Vec2::new(150.0, 90.0)).unwrap().changed());
        assert!(sim.drawable_zones().is_empty());
    }

    #[test]
    fn switching_boundary_rebuilds_topology() {
        let mut sim = Simulation::with_dims(seeded(), 4, 4).unwrap();
        sim.set_boundary(Boundary::Clamp);
        assert!(!sim.grid().wraps());
        assert_eq!(sim.grid().nearby(ZoneCoord::new(0, 0)).len(), 4);
        assert_eq!(sim.config().boundary, Boundary::Clamp);
    }

    #[test]
    fn update_config_applies_friction_and_keeps_cell_size() {
        let mut sim = Simulation::with_dims(seeded(), 4, 4).unwrap();
        let id = sim.add(spin(), None).unwrap();

        let mut cfg = sim.config().clone();
        cfg.particle_friction = 0.3;
        cfg.cell_size = 99.0;
        sim.update_config(cfg).unwrap();

        assert_eq!(sim.particle(id).unwrap().friction, 0.3);
        assert_eq!(sim.config().cell_size, 30.0);

        let mut bad = sim.config().clone();
        bad.max_speed = 0.0;
        assert!(sim.update_config(bad).is_err());
        assert_eq!(sim.config().particle_friction, 0.3);
    }
}
