use crate::types::{Slot, ZoneCoord};

/// One grid cell: a bucket of the particles currently inside it.
///
/// A zone does not decide membership; [`crate::grid::Grid`] moves slots
/// between zones and guarantees each particle sits in exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub col: usize,
    pub row: usize,
    particles: Vec<Slot>,
}

impl Zone {
    pub fn new(col: usize, row: usize) -> Self {
        Self {
            col,
            row,
            particles: Vec::new(),
        }
    }

    #[inline]
    pub fn coord(&self) -> ZoneCoord {
        ZoneCoord::new(self.col, self.row)
    }

    #[inline]
    pub fn particles(&self) -> &[Slot] {
        &self.particles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub(crate) fn insert(&mut self, slot: Slot) {
        self.particles.push(slot);
    }

    /// Removes `slot` by identity; linear in the bucket size.
    pub(crate) fn remove(&mut self, slot: Slot) -> bool {
        match self.particles.iter().position(|&s| s == slot) {
            Some(i) => {
                self.particles.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub(crate) fn take_particles(&mut self) -> Vec<Slot> {
        std::mem::take(&mut self.particles)
    }

    pub(crate) fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_by_identity() {
        let mut z = Zone::new(2, 3);
        z.insert(4);
        z.insert(7);
        z.insert(9);

        assert!(z.remove(7));
        assert!(!z.remove(7));
        assert_eq!(z.len(), 2);

        let mut left = z.particles().to_vec();
        left.sort_unstable();
        assert_eq!(left, vec![4, 9]);
    }

    #[test]
    fn coord_matches_fields() {
        let z = Zone::new(5, 1);
        assert_eq!(z.coord(), ZoneCoord::new(5, 1));
        assert!(z.is_empty());
    }

    #[test]
    fn take_particles_empties_the_bucket() {
        let mut z = Zone::new(0, 0);
        z.insert(1);
        z.insert(2);
        assert_eq!(z.take_particles(), vec![1, 2]);
        assert!(z.is_empty());
    }
}
