//! Unit-square helpers on top of [`glam::Vec2`].
//!
//! `Vec2` already provides the elementwise value arithmetic the engine
//! needs (`+`, `-`, `*`, `/`, `length`, `normalize_or_zero`, `floor`,
//! `round`). Every one of those returns a new value; the only in-place
//! updates in the engine are `+=` on a particle's force queue and velocity.
//!
//! [`Toroidal`] adds the wrap/clamp operations used to keep positions on
//! the unit torus.

use glam::Vec2;

/// True mathematical modulo of `value` by a positive `range`.
///
/// Unlike `%`, the result is never negative, and unlike a bare
/// `rem_euclid` it is always strictly below `range`.
#[inline]
pub fn modulo(value: f32, range: f32) -> f32 {
    let r = value.rem_euclid(range);
    // rem_euclid(-tiny, 1.0) rounds up to exactly 1.0 in f32.
    if r >= range { 0.0 } else { r }
}

pub trait Toroidal {
    /// Per-axis [`modulo`] by `range`.
    fn modulo(self, range: Vec2) -> Self;

    /// Wraps into `[0, 1)` on both axes.
    fn wrap_unit(self) -> Self;

    /// Clamps into `[0, 1]` on both axes.
    fn clamp_unit(self) -> Self;
}

impl Toroidal for Vec2 {
    #[inline]
    fn modulo(self, range: Vec2) -> Self {
        Vec2::new(modulo(self.x, range.x), modulo(self.y, range.y))
    }

    #[inline]
    fn wrap_unit(self) -> Self {
        self.modulo(Vec2::ONE)
    }

    #[inline]
    fn clamp_unit(self) -> Self {
        self.clamp(Vec2::ZERO, Vec2::ONE)
    }
}

/// Unit vector pointing from `from` to `to`, or zero when they coincide.
#[inline]
pub fn direction(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}
