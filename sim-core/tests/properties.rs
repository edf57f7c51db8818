use std::collections::BTreeSet;

use glam::Vec2;
use rand::{Rng, SeedableRng, rngs::StdRng};
use spinfield_core::{
    Config, Distance, EvalError, MetricFn, Simulation, Spin,
    grid::{CUTOFF_TOLERANCE, Grid},
    particle::Particle,
    types::{Slot, ZoneCoord},
};

fn config() -> Config {
    Config {
        seed: Some(42),
        ..Config::default()
    }
}

fn spin() -> Spin {
    Spin::uniform(0.5, 3).unwrap()
}

/// Shortest distance between two points of the unit torus.
fn torus_distance(a: Vec2, b: Vec2) -> f32 {
    let d = (a - b).abs();
    Vec2::new(d.x.min(1.0 - d.x), d.y.min(1.0 - d.y)).length()
}

#[test]
fn zone_of_is_always_in_bounds() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..50 {
        let cols = rng.random_range(1..20);
        let rows = rng.random_range(1..20);
        let grid = Grid::with_dims(cols, rows, true).unwrap();
        for _ in 0..200 {
            let pos = Vec2::new(rng.random_range(-3.0..3.0), rng.random_range(-3.0..3.0));
            let z = grid.zone_of(pos);
            assert!(z.col < cols && z.row < rows, "{pos} -> {z:?}");
        }
        assert_eq!(grid.zone_of(Vec2::new(1.0, 0.0)), ZoneCoord::new(0, 0));
    }
}

#[test]
fn pair_pass_matches_brute_force_on_the_torus() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut grid = Grid::with_dims(8, 6, true).unwrap();
    for id in 0..300u64 {
        let pos = Vec2::new(rng.random(), rng.random());
        grid.track(Particle::new(id, pos, spin()));
    }
    let cutoff = grid.reach();

    let mut found: Vec<(Slot, Slot)> = Vec::new();
    grid.for_each_pair(&Distance::Euclidean, cutoff, |pair| {
        let pair = pair.unwrap();
        found.push((pair.a, pair.b));
    });
    found.sort_unstable();
    let unique: BTreeSet<(Slot, Slot)> = found.iter().copied().collect();
    assert_eq!(unique.len(), found.len(), "a pair was visited twice");

    let particles = grid.particles();
    let mut expected = BTreeSet::new();
    for a in 0..particles.len() {
        for b in 0..particles.len() {
            if a != b
                && torus_distance(particles[a].pos, particles[b].pos)
                    <= cutoff * (1.0 + CUTOFF_TOLERANCE)
            {
                expected.insert((a, b));
            }
        }
    }
    assert!(!expected.is_empty());
    assert_eq!(unique, expected);
}

#[test]
fn pair_pass_sees_across_the_seam() {
    let mut sim = Simulation::with_dims(config(), 10, 10).unwrap();
    let left = sim.add(spin(), Some(Vec2::new(0.01, 0.5))).unwrap();
    let right = sim.add(spin(), Some(Vec2::new(0.99, 0.5))).unwrap();

    sim.tick();

    // Identical spins attract through the seam, not across the square.
    assert!(sim.particle(left).unwrap().velocity.x < 0.0);
    assert!(sim.particle(right).unwrap().velocity.x > 0.0);
    assert_eq!(sim.stats().last.pairs, 2);
}

#[test]
fn resize_round_trip_conserves_particles() {
    let mut sim = Simulation::with_dims(config(), 4, 4).unwrap();
    sim.populate(100, 3).unwrap();
    let cell = sim.config().cell_size;

    for (cols, rows) in [(2, 2), (4, 4), (1, 3), (7, 5)] {
        let report = sim
            .resize(Vec2::new(cols as f32, rows as f32) * cell)
            .unwrap();
        assert!(report.consistent);
        assert_eq!(report.to, (cols, rows));

        let grid = sim.grid();
        let tracked: usize = grid.zones().map(|z| z.len()).sum();
        assert_eq!(tracked, 100);
        for (slot, p) in grid.particles().iter().enumerate() {
            assert_eq!(grid.home(slot), Some(grid.zone_of(p.pos)));
        }
    }
}

#[test]
fn coincident_particles_stay_finite() {
    let mut sim = Simulation::with_dims(config(), 10, 10).unwrap();
    let a = sim.add(spin(), Some(Vec2::new(0.3, 0.3))).unwrap();
    let b = sim.add(spin(), Some(Vec2::new(0.3, 0.3))).unwrap();

    for _ in 0..5 {
        sim.tick();
    }

    for id in [a, b] {
        let p = sim.particle(id).unwrap();
        assert!(p.pos.is_finite() && p.velocity.is_finite());
        assert_eq!(p.velocity, Vec2::ZERO);
    }
    assert_eq!(sim.stats().total_faults(), 0);
}

#[test]
fn friction_decays_speed_without_force() {
    let mut sim = Simulation::with_dims(config(), 10, 10).unwrap();
    let id = sim.add(spin(), Some(Vec2::new(0.5, 0.5))).unwrap();
    sim.set_velocity(id, Vec2::new(0.008, -0.004)).unwrap();

    let mut last = sim.particle(id).unwrap().velocity.length();
    for _ in 0..20 {
        sim.tick();
        let speed = sim.particle(id).unwrap().velocity.length();
        assert!(speed < last, "{speed} >= {last}");
        last = speed;
    }
}

#[test]
fn identical_spins_close_in_and_stay_on_the_torus() {
    let mut sim = Simulation::with_dims(config(), 10, 10).unwrap();
    let a = sim.add(spin(), Some(Vec2::new(0.45, 0.5))).unwrap();
    let b = sim.add(spin(), Some(Vec2::new(0.55, 0.5))).unwrap();
    let distance = |sim: &Simulation| {
        torus_distance(sim.particle(a).unwrap().pos, sim.particle(b).unwrap().pos)
    };

    let before = distance(&sim);
    sim.tick();
    assert!(distance(&sim) < before);

    for _ in 0..50 {
        sim.tick();
        for p in sim.particles() {
            assert!((0.0..1.0).contains(&p.pos.x), "{}", p.pos);
            assert!((0.0..1.0).contains(&p.pos.y), "{}", p.pos);
        }
    }
}

#[test]
fn only_touched_zones_are_dirty() {
    let mut sim = Simulation::with_dims(config(), 10, 10).unwrap();
    let mover = sim.add(spin(), Some(Vec2::new(0.195, 0.55))).unwrap();
    sim.add(spin(), Some(Vec2::new(0.75, 0.25))).unwrap();
    sim.set_velocity(mover, Vec2::new(0.01, 0.0)).unwrap();
    sim.drawable_zones();

    sim.tick();

    let dirty: Vec<ZoneCoord> = sim.drawable_zones().into_iter().map(|z| z.coord()).collect();
    assert_eq!(dirty, vec![ZoneCoord::new(1, 5), ZoneCoord::new(2, 5)]);
    assert!(sim.drawable_zones().is_empty());
}

#[test]
fn metric_faults_are_isolated_to_their_pairs() {
    let mut sim = Simulation::with_dims(config(), 10, 10).unwrap();
    sim.add(spin(), Some(Vec2::new(0.1, 0.5))).unwrap();
    sim.add(spin(), Some(Vec2::new(0.12, 0.5))).unwrap();
    let c = sim.add(spin(), Some(Vec2::new(0.6, 0.5))).unwrap();
    let d = sim.add(spin(), Some(Vec2::new(0.64, 0.5))).unwrap();
    sim.set_metric(Box::new(MetricFn(|a: Vec2, b: Vec2| {
        if a.x < 0.3 || b.x < 0.3 {
            Err(EvalError::new("left half unsupported"))
        } else {
            Ok(a.distance(b))
        }
    })));

    sim.tick();

    assert_eq!(sim.stats().last.faults, 2);
    assert_eq!(sim.stats().last.contributions, 2);
    assert!(sim.particle(c).unwrap().velocity.x > 0.0);
    assert!(sim.particle(d).unwrap().velocity.x < 0.0);
}
