/// Identifier of a [`crate::particle::Particle`].
///
/// Assigned monotonically by [`crate::particle::IdGenerator`] and never
/// reused within one simulation, even across resets.
pub type ParticleId = u64;

/// Index into the grid's particle storage.
///
/// Unlike [`ParticleId`], a slot is only meaningful until the next reset.
pub type Slot = usize;

/// Column/row address of a [`crate::zone::Zone`].
///
/// Ordered column-major so sets of coordinates iterate in grid order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneCoord {
    pub col: usize,
    pub row: usize,
}

impl ZoneCoord {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}
