use glam::Vec2;

use crate::{
    config::{Boundary, ForceLaw, Integration},
    spin::Spin,
    types::ParticleId,
    vector::{Toroidal, direction},
};

/// Default heat of a new particle.
pub const DEFAULT_HEAT: f32 = 0.5;
/// Default per-particle friction.
pub const DEFAULT_FRICTION: f32 = 0.1;

/// A single simulated particle.
///
/// `force` is a queue: contributions from every neighbour are summed into
/// it during a tick and consumed by one [`Particle::tick`], which resets it.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub id: ParticleId,
    /// Position on the unit torus, `[0, 1)` per axis once wrapped.
    pub pos: Vec2,
    pub spin: Spin,
    pub velocity: Vec2,
    pub force: Vec2,
    /// Auxiliary visual attribute in `[-1, 1]`; does not affect motion.
    pub heat: f32,
    pub friction: f32,
}

impl Particle {
    pub fn new(id: ParticleId, pos: Vec2, spin: Spin) -> Self {
        Self {
            id,
            pos,
            spin,
            velocity: Vec2::ZERO,
            force: Vec2::ZERO,
            heat: DEFAULT_HEAT,
            friction: DEFAULT_FRICTION,
        }
    }

    pub fn with_heat(mut self, heat: f32) -> Self {
        self.heat = heat;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Force this particle feels from a neighbour whose (possibly
    /// seam-shifted) position is `other`.
    ///
    /// `spin_sign` is the signed compatibility in `[-1, 1]`. The magnitude
    /// is `spin_sign * (|strength| / distance) ^ curve`, negated for a
    /// negative `strength`; positive values push away from `other`.
    ///
    /// ### Returns
    /// `None` for a neutral pair, a non-positive or non-finite distance, or
    /// a non-finite result. The contribution is not applied here; the caller
    /// queues it with [`Particle::apply_force`].
    pub fn react(&self, other: Vec2, distance: f32, spin_sign: f32, law: &ForceLaw) -> Option<Vec2> {
        if spin_sign == 0.0 || !spin_sign.is_finite() {
            return None;
        }
        if !(distance.is_finite() && distance > 0.0) {
            return None;
        }

        let mut gravity = spin_sign * (law.strength.abs() / distance).powf(law.curve);
        if law.strength < 0.0 {
            gravity = -gravity;
        }

        let force = direction(self.pos, other) * -gravity;
        force.is_finite().then_some(force)
    }

    /// Adds a contribution to the force queue.
    #[inline]
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Integrates the queued force and moves the particle.
    ///
    /// 1. Scale the force by `params.speed`.
    /// 2. Add it to the velocity.
    /// 3. Apply particle and air friction.
    /// 4. Clamp each velocity axis to `params.max_speed`.
    /// 5. Update heat from the force magnitude.
    /// 6. Move by the velocity.
    /// 7. Reset the force queue.
    /// 8. Wrap or clamp the position according to `params.boundary`.
    ///
    /// ### Returns
    /// `true` if the particle is moving (non-zero velocity).
    pub fn tick(&mut self, params: &Integration) -> bool {
        let mut force = self.force * params.speed;
        if !force.is_finite() {
            log::warn!("particle {}: dropping non-finite force {force}", self.id);
            force = Vec2::ZERO;
        }

        let damping = (1.0 - self.friction) * (1.0 - params.air_friction);
        let mut velocity = (self.velocity + force) * damping;
        if !velocity.is_finite() {
            log::warn!("particle {}: dropping non-finite velocity {velocity}", self.id);
            velocity = Vec2::ZERO;
        }
        self.velocity = velocity.clamp(
            Vec2::splat(-params.max_speed),
            Vec2::splat(params.max_speed),
        );

        let impact = force.length();
        let heat = (self.heat + (impact * 2.0 - 1.0) * params.heat_speed).tanh();
        if heat.is_finite() {
            self.heat = heat;
        }

        self.pos += self.velocity;
        self.force = Vec2::ZERO;

        self.pos = match params.boundary {
            Boundary::Wrap => self.pos.wrap_unit(),
            Boundary::Clamp => self.pos.clamp_unit(),
        };

        self.is_moving()
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.velocity != Vec2::ZERO
    }

    /// Heat as a colour channel: `-1` maps to `0` and `1` to `255`.
    #[inline]
    pub fn heat_shade(&self) -> u8 {
        ((self.heat + 1.0) / 2.0 * 256.0).floor().clamp(0.0, 255.0) as u8
    }
}

/// Hands out monotonically increasing [`ParticleId`]s.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: ParticleId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> ParticleId {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law() -> ForceLaw {
        ForceLaw {
            strength: 0.05,
            curve: 1.0,
        }
    }

    fn params() -> Integration {
        Integration {
            speed: 1.0,
            air_friction: 0.0,
            heat_speed: 0.0,
            max_speed: 1.0,
            boundary: Boundary::Wrap,
        }
    }

    fn particle_at(x: f32, y: f32) -> Particle {
        Particle::new(0, Vec2::new(x, y), Spin::uniform(0.5, 3).unwrap())
    }

    #[test]
    fn compatible_spins_pull_toward_the_other() {
        let p = particle_at(0.4, 0.5);
        let f = p.react(Vec2::new(0.5, 0.5), 0.1, -1.0, &law()).unwrap();
        assert!(f.x > 0.0);
        assert!((f.x - 0.5).abs() < 1e-4, "{f}");
        assert_eq!(f.y, 0.0);
    }

    #[test]
    fn incompatible_spins_push_away() {
        let p = particle_at(0.4, 0.5);
        let f = p.react(Vec2::new(0.5, 0.5), 0.1, 1.0, &law()).unwrap();
        assert!(f.x < 0.0);
    }

    #[test]
    fn negative_strength_inverts_the_law() {
        let p = particle_at(0.4, 0.5);
        let inverted = ForceLaw {
            strength: -0.05,
            curve: 1.0,
        };
        let f = p.react(Vec2::new(0.5, 0.5), 0.1, -1.0, &inverted).unwrap();
        assert!(f.x < 0.0);
    }

    #[test]
    fn degenerate_inputs_contribute_nothing() {
        let p = particle_at(0.4, 0.5);
        let other = Vec2::new(0.5, 0.5);
        assert_eq!(p.react(other, 0.0, -1.0, &law()), None);
        assert_eq!(p.react(other, -0.1, -1.0, &law()), None);
        assert_eq!(p.react(other, f32::NAN, -1.0, &law()), None);
        assert_eq!(p.react(other, 0.1, 0.0, &law()), None);
    }

    #[test]
    fn fractional_curve_with_repulsion_stays_finite() {
        let p = particle_at(0.4, 0.5);
        let soft = ForceLaw {
            strength: 0.05,
            curve: 0.5,
        };
        let f = p.react(Vec2::new(0.45, 0.5), 0.05, 0.7, &soft).unwrap();
        assert!(f.is_finite());
        assert!(f.x < 0.0);
    }

    #[test]
    fn tick_consumes_the_force_queue() {
        let mut p = particle_at(0.5, 0.5);
        p.friction = 0.0;
        p.apply_force(Vec2::new(0.01, 0.0));
        p.apply_force(Vec2::new(0.01, 0.0));

        assert!(p.tick(&params()));
        assert_eq!(p.force, Vec2::ZERO);
        assert!((p.velocity.x - 0.02).abs() < 1e-6);
        assert!((p.pos.x - 0.52).abs() < 1e-6);
    }

    #[test]
    fn tick_clamps_each_velocity_axis() {
        let mut p = particle_at(0.5, 0.5);
        p.friction = 0.0;
        p.apply_force(Vec2::new(3.0, -4.0));
        let mut params = params();
        params.max_speed = 0.01;

        p.tick(&params);
        assert_eq!(p.velocity, Vec2::new(0.01, -0.01));
    }

    #[test]
    fn tick_wraps_or_clamps_at_the_edge() {
        let mut p = particle_at(0.995, 0.5).with_velocity(Vec2::new(0.01, 0.0));
        p.friction = 0.0;
        p.tick(&params());
        assert!(p.pos.x < 0.01, "{}", p.pos);

        let mut p = particle_at(0.995, 0.5).with_velocity(Vec2::new(0.01, 0.0));
        p.friction = 0.0;
        let mut clamped = params();
        clamped.boundary = Boundary::Clamp;
        p.tick(&clamped);
        assert_eq!(p.pos.x, 1.0);
    }

    #[test]
    fn heat_saturates_in_unit_range() {
        let mut p = particle_at(0.5, 0.5);
        let mut params = params();
        params.heat_speed = 10.0;
        for _ in 0..20 {
            p.apply_force(Vec2::new(5.0, 0.0));
            p.tick(&params);
            assert!((-1.0..=1.0).contains(&p.heat));
        }
        assert!(p.heat > 0.9);
    }

    #[test]
    fn non_finite_force_does_not_corrupt_position() {
        let mut p = particle_at(0.5, 0.5);
        p.apply_force(Vec2::new(f32::NAN, 0.0));
        assert!(!p.tick(&params()));
        assert_eq!(p.pos, Vec2::new(0.5, 0.5));
        assert!(p.heat.is_finite());
    }

    #[test]
    fn settled_particle_reports_not_moving() {
        let mut p = particle_at(0.5, 0.5);
        assert!(!p.tick(&params()));
        assert_eq!(p.pos, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn id_generator_is_monotonic() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }
}
