use crate::types::Slot;
use glam::Vec2;

/// Scratch buffer that collects pairwise force contributions per particle
/// during one force pass.
///
/// The force pass only reads particles, so it writes here instead of into
/// the particles themselves; the integration pass then queues each sum into
/// [`crate::particle::Particle::force`]. For every slot this stores:
///
/// - The sum of all contributions.
/// - How many contributions were added.
///
/// `force[i]` and `count[i]` belong to the particle in grid slot `i`.
#[derive(Debug, Default)]
pub struct ForceBuffer {
    force: Vec<Vec2>,
    count: Vec<u32>,
}

impl ForceBuffer {
    /// Creates a zeroed buffer.
    ///
    /// ### Parameters
    /// - `len` - Number of particle slots the buffer holds.
    ///
    /// ### Returns
    /// A [`ForceBuffer`] of length `len` with every sum at `Vec2::ZERO`.
    pub fn with_len(len: usize) -> Self {
        Self {
            force: vec![Vec2::ZERO; len],
            count: vec![0; len],
        }
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.force.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.force.is_empty()
    }

    /// Resizes to exactly `len` slots and clears every entry, even when the
    /// length already matched.
    ///
    /// ### Parameters
    /// - `len` - Particle count of the grid for the coming pass.
    pub fn ensure_len(&mut self, len: usize) {
        if self.force.len() != len {
            self.force.resize(len, Vec2::ZERO);
            self.count.resize(len, 0);
        }
        self.clear();
    }

    /// Zeroes all sums and counts, keeping the length.
    pub fn clear(&mut self) {
        self.force.fill(Vec2::ZERO);
        self.count.fill(0);
    }

    /// Adds one contribution for a particle.
    ///
    /// ### Parameters
    /// - `slot` - Grid slot of the particle receiving the force.
    /// - `force` - Contribution to add to the slot's sum.
    ///
    /// ### Panics
    /// Panics if `slot` is out of bounds.
    #[inline]
    pub fn add(&mut self, slot: Slot, force: Vec2) {
        self.force[slot] += force;
        self.count[slot] += 1;
    }

    /// Summed force for `slot`, zero if nothing was added.
    #[inline]
    pub fn force(&self, slot: Slot) -> Vec2 {
        self.force[slot]
    }

    /// Whether `slot` received at least one contribution.
    #[inline]
    pub fn is_influenced(&self, slot: Slot) -> bool {
        self.count[slot] > 0
    }

    /// Iterates over the slots that received at least one contribution.
    ///
    /// ### Returns
    /// Slots in ascending order.
    pub fn influenced_indices(&self) -> impl Iterator<Item = Slot> + '_ {
        self.count
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| if c > 0 { Some(i) } else { None })
    }

    /// Total number of contributions across all slots.
    ///
    /// ### Returns
    /// The sum of the per-slot counts; the force pass reports it as the
    /// tick's contribution count.
    pub fn total(&self) -> u64 {
        self.count.iter().map(|&c| u64::from(c)).sum()
    }
}
