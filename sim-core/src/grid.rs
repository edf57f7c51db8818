//! Toroidal uniform grid: the spatial index behind the force pass.
//!
//! The grid owns every particle and buckets them into [`Zone`]s. Positions
//! live in unit-square coordinates, so cell lookup is
//! `floor(pos * (cols, rows))`. Each zone's 3×3 neighbourhood is cached
//! together with the image shift that places a neighbour's particles on the
//! near side of the wrap seam; with the interaction cutoff capped at one
//! cell, scanning that neighbourhood finds every interacting pair.
//!
//! The grid also records which zones changed since the last render flush
//! (see [`Grid::drain_dirty`]).

use std::collections::BTreeSet;

use glam::Vec2;

use crate::{
    error::{InteractionError, SimError},
    metric::{Metric, contained},
    particle::Particle,
    types::{ParticleId, Slot, ZoneCoord},
    zone::Zone,
};

/// Relative slack on the cutoff test, so two particles placed exactly one
/// cell apart still interact despite f32 rounding of their positions.
pub const CUTOFF_TOLERANCE: f32 = 1e-5;

/// One entry of a zone's 3×3 neighbourhood.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub coord: ZoneCoord,
    /// Added to the neighbour's particle positions: `-1`, `0` or `+1` per
    /// axis, non-zero only when the neighbour sits across the seam.
    pub shift: Vec2,
}

/// A candidate interaction found by [`Grid::for_each_pair`], seen from `a`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pair {
    pub a: Slot,
    pub b: Slot,
    /// Position of `b` shifted into `a`'s side of the seam.
    pub image: Vec2,
    pub distance: f32,
}

/// A pair whose distance could not be evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct PairFault {
    pub a: Slot,
    pub b: Slot,
    pub error: InteractionError,
}

/// Outcome of [`Grid::resize_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeReport {
    pub from: (usize, usize),
    pub to: (usize, usize),
    /// Particles that ended up in a different zone.
    pub relocated: usize,
    /// Whether the shape and conservation checks passed afterwards.
    pub consistent: bool,
}

impl ResizeReport {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Read-only view of a zone together with the particles it holds.
#[derive(Clone, Copy, Debug)]
pub struct ZoneView<'a> {
    zone: &'a Zone,
    particles: &'a [Particle],
}

impl<'a> ZoneView<'a> {
    pub fn coord(self) -> ZoneCoord {
        self.zone.coord()
    }

    pub fn zone(self) -> &'a Zone {
        self.zone
    }

    pub fn len(self) -> usize {
        self.zone.len()
    }

    pub fn is_empty(self) -> bool {
        self.zone.is_empty()
    }

    pub fn particles(self) -> impl Iterator<Item = &'a Particle> {
        let all = self.particles;
        self.zone.particles().iter().map(move |&slot| &all[slot])
    }
}

#[derive(Debug)]
pub struct Grid {
    cell_size: f32,
    cols: usize,
    rows: usize,
    wrap: bool,
    /// Indexed `[col][row]`.
    zones: Vec<Vec<Zone>>,
    /// Cached neighbourhoods, indexed `col * rows + row`.
    nearby: Vec<Vec<Neighbor>>,
    particles: Vec<Particle>,
    /// Zone currently holding each slot.
    homes: Vec<ZoneCoord>,
    dirty: BTreeSet<ZoneCoord>,
}

/// Cells along one axis, tolerating float noise such as `1.0 / 0.1`.
fn cells_along(extent: f32, cell_size: f32) -> usize {
    let n = extent / cell_size;
    let snapped = n.round();
    let n = if (n - snapped).abs() < 1e-3 { snapped } else { n.floor() };
    (n as usize).max(1)
}

/// Index of a unit-square coordinate along an axis with `count` cells.
fn axis_index(value: f32, count: usize, wrap: bool) -> usize {
    let raw = (value * count as f32).floor();
    let raw = if raw.is_finite() { raw as i64 } else { 0 };
    let count = count as i64;
    if wrap {
        raw.rem_euclid(count) as usize
    } else {
        raw.clamp(0, count - 1) as usize
    }
}

/// Neighbour index and image shift along one axis, or `None` past a
/// non-wrapping edge.
fn neighbor_axis(index: usize, delta: isize, count: usize, wrap: bool) -> Option<(usize, f32)> {
    let raw = index as isize + delta;
    let count = count as isize;
    if (0..count).contains(&raw) {
        return Some((raw as usize, 0.0));
    }
    if !wrap {
        return None;
    }
    Some((raw.rem_euclid(count) as usize, raw.div_euclid(count) as f32))
}

#[inline]
fn within(distance: f32, cutoff: f32) -> bool {
    distance <= cutoff + cutoff * CUTOFF_TOLERANCE
}

impl Grid {
    /// Builds an empty grid sized for a pane of `pane` units.
    ///
    /// ### Parameters
    /// - `cell_size` - Side of one zone, in pane units.
    /// - `pane` - Pane size; each axis gets `pane / cell_size` zones.
    /// - `wrap` - Whether positions wrap around (torus) or clamp.
    ///
    /// ### Errors
    /// [`SimError::InvalidCellSize`] or [`SimError::InvalidPane`].
    pub fn new(cell_size: f32, pane: Vec2, wrap: bool) -> Result<Self, SimError> {
        let (cols, rows) = Self::dims_for(pane, cell_size)?;
        let mut grid = Self::with_dims(cols, rows, wrap)?;
        grid.cell_size = cell_size;
        Ok(grid)
    }

    /// Builds an empty `cols × rows` grid with a cell size of one pane unit.
    ///
    /// ### Errors
    /// [`SimError::InvalidDimensions`] if either dimension is zero.
    pub fn with_dims(cols: usize, rows: usize, wrap: bool) -> Result<Self, SimError> {
        if cols == 0 || rows == 0 {
            return Err(SimError::InvalidDimensions { cols, rows });
        }
        let zones = (0..cols)
            .map(|c| (0..rows).map(|r| Zone::new(c, r)).collect())
            .collect();
        let mut grid = Self {
            cell_size: 1.0,
            cols,
            rows,
            wrap,
            zones,
            nearby: Vec::new(),
            particles: Vec::new(),
            homes: Vec::new(),
            dirty: BTreeSet::new(),
        };
        grid.rebuild_nearby();
        Ok(grid)
    }

    /// Grid dimensions for a pane, at least one cell per axis.
    pub fn dims_for(pane: Vec2, cell_size: f32) -> Result<(usize, usize), SimError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SimError::InvalidCellSize(cell_size));
        }
        if !(pane.is_finite() && pane.x > 0.0 && pane.y > 0.0) {
            return Err(SimError::InvalidPane {
                width: pane.x,
                height: pane.y,
            });
        }
        Ok((cells_along(pane.x, cell_size), cells_along(pane.y, cell_size)))
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn wraps(&self) -> bool {
        self.wrap
    }

    /// Largest cutoff for which the 3×3 scan is complete: one cell.
    pub fn reach(&self) -> f32 {
        (1.0 / self.cols as f32).min(1.0 / self.rows as f32)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn particle(&self, slot: Slot) -> Option<&Particle> {
        self.particles.get(slot)
    }

    pub(crate) fn particle_mut(&mut self, slot: Slot) -> Option<&mut Particle> {
        self.particles.get_mut(slot)
    }

    /// Mutable access for integration. Moving a particle through this slice
    /// must be followed by [`Grid::fix_particle_zone`].
    pub(crate) fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Slot of the particle with `id`. Ids are handed out in insertion
    /// order, so the storage is sorted by id.
    pub fn slot_of(&self, id: ParticleId) -> Option<Slot> {
        self.particles.binary_search_by_key(&id, |p| p.id).ok()
    }

    pub fn zone(&self, coord: ZoneCoord) -> Option<&Zone> {
        self.zones.get(coord.col).and_then(|column| column.get(coord.row))
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().flatten()
    }

    pub fn view(&self, coord: ZoneCoord) -> Option<ZoneView<'_>> {
        self.zone(coord).map(|zone| ZoneView {
            zone,
            particles: &self.particles,
        })
    }

    /// Zone currently holding `slot`.
    pub fn home(&self, slot: Slot) -> Option<ZoneCoord> {
        self.homes.get(slot).copied()
    }

    /// Zone that `pos` belongs to. Always within bounds: wrapped modulo the
    /// dimensions on a torus, clamped otherwise; non-finite input maps to 0.
    pub fn zone_of(&self, pos: Vec2) -> ZoneCoord {
        ZoneCoord::new(
            axis_index(pos.x, self.cols, self.wrap),
            axis_index(pos.y, self.rows, self.wrap),
        )
    }

    /// Cached 3×3 neighbourhood of `coord`, self included.
    pub fn nearby(&self, coord: ZoneCoord) -> &[Neighbor] {
        &self.nearby[coord.col * self.rows + coord.row]
    }

    fn rebuild_nearby(&mut self) {
        let (cols, rows, wrap) = (self.cols, self.rows, self.wrap);
        self.nearby = (0..cols)
            .flat_map(|c| (0..rows).map(move |r| (c, r)))
            .map(|(c, r)| {
                let mut around = Vec::with_capacity(9);
                for dc in -1..=1 {
                    let Some((nc, sx)) = neighbor_axis(c, dc, cols, wrap) else {
                        continue;
                    };
                    for dr in -1..=1 {
                        let Some((nr, sy)) = neighbor_axis(r, dr, rows, wrap) else {
                            continue;
                        };
                        around.push(Neighbor {
                            coord: ZoneCoord::new(nc, nr),
                            shift: Vec2::new(sx, sy),
                        });
                    }
                }
                around
            })
            .collect();
    }

    /// Adds a particle and buckets it by position.
    ///
    /// ### Returns
    /// The slot the particle now occupies.
    pub fn track(&mut self, particle: Particle) -> Slot {
        let slot = self.particles.len();
        let home = self.zone_of(particle.pos);
        self.particles.push(particle);
        self.homes.push(home);
        self.zones[home.col][home.row].insert(slot);
        self.dirty.insert(home);
        slot
    }

    /// Drops every particle. All zones become dirty so the renderer clears
    /// them.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.homes.clear();
        for zone in self.zones.iter_mut().flatten() {
            zone.clear();
        }
        self.mark_all_dirty();
    }

    /// Switches between toroidal and bounded topology.
    pub fn set_wrap(&mut self, wrap: bool) {
        if self.wrap == wrap {
            return;
        }
        self.wrap = wrap;
        self.rebuild_nearby();
        self.rebucket_all();
        self.mark_all_dirty();
    }

    /// Moves `slot` into the zone its position belongs to.
    ///
    /// The current zone is always marked dirty, since the particle moved
    /// inside it; on a zone change the new zone is marked too.
    ///
    /// ### Returns
    /// `true` if the particle changed zone.
    pub fn fix_particle_zone(&mut self, slot: Slot) -> bool {
        let Some(&home) = self.homes.get(slot) else {
            return false;
        };
        self.dirty.insert(home);
        self.relocate(slot)
    }

    fn relocate(&mut self, slot: Slot) -> bool {
        let home = self.homes[slot];
        let target = self.zone_of(self.particles[slot].pos);
        if target == home {
            return false;
        }
        self.zones[home.col][home.row].remove(slot);
        self.zones[target.col][target.row].insert(slot);
        self.homes[slot] = target;
        self.dirty.insert(home);
        self.dirty.insert(target);
        true
    }

    /// Re-buckets every particle regardless of velocity.
    ///
    /// ### Returns
    /// The number of particles that changed zone.
    pub fn rebucket_all(&mut self) -> usize {
        (0..self.particles.len())
            .filter(|&slot| self.relocate(slot))
            .count()
    }

    /// Recomputes the dimensions for a new pane size and redistributes.
    pub fn resize(&mut self, pane: Vec2) -> Result<ResizeReport, SimError> {
        let (cols, rows) = Self::dims_for(pane, self.cell_size)?;
        self.resize_to(cols, rows)
    }

    /// Grows or shrinks the zone array to `cols × rows`.
    ///
    /// Growing appends empty zones at the high end. Shrinking removes the
    /// high-index columns/rows and moves each removed zone's particles to
    /// index `old % new`, so none are lost. A reconciliation pass then puts
    /// every particle in the zone its position maps to under the new
    /// dimensions. Unchanged dimensions are a no-op.
    ///
    /// A failed shape/conservation check is logged and reported through
    /// [`ResizeReport::consistent`]; the grid stays usable.
    ///
    /// ### Parameters
    /// - `cols` - New number of columns.
    /// - `rows` - New number of rows.
    ///
    /// ### Errors
    /// [`SimError::InvalidDimensions`] if either dimension is zero.
    pub fn resize_to(&mut self, cols: usize, rows: usize) -> Result<ResizeReport, SimError> {
        if cols == 0 || rows == 0 {
            return Err(SimError::InvalidDimensions { cols, rows });
        }
        let from = (self.cols, self.rows);
        if from == (cols, rows) {
            return Ok(ResizeReport {
                from,
                to: from,
                relocated: 0,
                consistent: true,
            });
        }

        let (old_cols, old_rows) = from;

        // Rows first, column by column.
        for (c, column) in self.zones.iter_mut().enumerate() {
            if rows > old_rows {
                column.extend((old_rows..rows).map(|r| Zone::new(c, r)));
            } else if rows < old_rows {
                for mut removed in column.split_off(rows) {
                    let target = removed.row % rows;
                    for slot in removed.take_particles() {
                        column[target].insert(slot);
                        self.homes[slot] = ZoneCoord::new(c, target);
                    }
                }
            }
        }

        if cols > old_cols {
            self.zones
                .extend((old_cols..cols).map(|c| (0..rows).map(|r| Zone::new(c, r)).collect()));
        } else if cols < old_cols {
            for column in self.zones.split_off(cols) {
                for mut removed in column {
                    let target = ZoneCoord::new(removed.col % cols, removed.row);
                    for slot in removed.take_particles() {
                        self.zones[target.col][target.row].insert(slot);
                        self.homes[slot] = target;
                    }
                }
            }
        }

        self.cols = cols;
        self.rows = rows;
        self.rebuild_nearby();
        self.dirty.retain(|c| c.col < cols && c.row < rows);

        let relocated = self.rebucket_all();
        let consistent = self.check_shape();
        if !consistent {
            log::error!(
                "grid resize {}x{} -> {cols}x{rows} left an inconsistent zone array \
                 ({} columns, {} particles tracked of {})",
                old_cols,
                old_rows,
                self.zones.len(),
                self.zones().map(Zone::len).sum::<usize>(),
                self.particles.len(),
            );
        }
        self.mark_all_dirty();

        log::debug!("grid resized {old_cols}x{old_rows} -> {cols}x{rows}, {relocated} particles relocated");
        Ok(ResizeReport {
            from,
            to: (cols, rows),
            relocated,
            consistent,
        })
    }

    /// Shape and conservation postcondition: `cols` columns of `rows`
    /// correctly addressed zones, and every particle in exactly its home.
    pub fn check_shape(&self) -> bool {
        let shaped = self.zones.len() == self.cols
            && self.nearby.len() == self.cols * self.rows
            && self.zones.iter().enumerate().all(|(c, column)| {
                column.len() == self.rows
                    && column
                        .iter()
                        .enumerate()
                        .all(|(r, zone)| zone.col == c && zone.row == r)
            });
        if !shaped {
            return false;
        }
        let tracked: usize = self.zones().map(Zone::len).sum();
        tracked == self.particles.len()
            && self.homes.iter().enumerate().all(|(slot, home)| {
                self.zone(*home)
                    .is_some_and(|zone| zone.particles().contains(&slot))
            })
    }

    /// Visits every pair within `cutoff` of each other, from each side.
    ///
    /// Self-pairs are excluded by identity before anything else; the
    /// partner's seam-shifted image is then measured with `metric` and
    /// filtered against `cutoff`. A metric failure or panic is passed to
    /// `visit` as an `Err` and the scan continues.
    ///
    /// ### Parameters
    /// - `metric` - Distance between a particle and a neighbour's image.
    /// - `cutoff` - Largest distance reported; should not exceed [`Grid::reach`].
    /// - `visit` - Called once per ordered pair and image, or per failure.
    pub fn for_each_pair<F>(&self, metric: &dyn Metric, cutoff: f32, mut visit: F)
    where
        F: FnMut(Result<Pair, PairFault>),
    {
        for c in 0..self.cols {
            self.scan_column(c, metric, cutoff, &mut visit);
        }
    }

    /// [`Grid::for_each_pair`] restricted to the particles of one column.
    pub fn scan_column<F>(&self, col: usize, metric: &dyn Metric, cutoff: f32, visit: &mut F)
    where
        F: FnMut(Result<Pair, PairFault>),
    {
        for r in 0..self.rows {
            self.scan_zone(ZoneCoord::new(col, r), metric, cutoff, visit);
        }
    }

    fn scan_zone<F>(&self, coord: ZoneCoord, metric: &dyn Metric, cutoff: f32, visit: &mut F)
    where
        F: FnMut(Result<Pair, PairFault>),
    {
        let zone = &self.zones[coord.col][coord.row];
        if zone.is_empty() {
            return;
        }
        for nb in self.nearby(coord) {
            let other = &self.zones[nb.coord.col][nb.coord.row];
            for &a in zone.particles() {
                let pa = self.particles[a].pos;
                for &b in other.particles() {
                    if a == b {
                        continue;
                    }
                    let image = self.particles[b].pos + nb.shift;
                    let measured = contained("distance", || metric.distance(pa, image))
                        .and_then(|result| result.map_err(InteractionError::Distance));
                    match measured {
                        Err(error) => visit(Err(PairFault { a, b, error })),
                        Ok(d) if !d.is_finite() => visit(Err(PairFault {
                            a,
                            b,
                            error: InteractionError::NonFiniteDistance(d),
                        })),
                        Ok(d) if within(d, cutoff) => visit(Ok(Pair {
                            a,
                            b,
                            image,
                            distance: d,
                        })),
                        Ok(_) => {}
                    }
                }
            }
        }
    }

    pub fn mark_dirty(&mut self, coord: ZoneCoord) {
        if coord.col < self.cols && coord.row < self.rows {
            self.dirty.insert(coord);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for c in 0..self.cols {
            for r in 0..self.rows {
                self.dirty.insert(ZoneCoord::new(c, r));
            }
        }
    }

    pub fn is_dirty(&self, coord: ZoneCoord) -> bool {
        self.dirty.contains(&coord)
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Zones changed since the previous call, in column-major order.
    /// Clears the dirty set.
    pub fn drain_dirty(&mut self) -> Vec<ZoneView<'_>> {
        let coords = std::mem::take(&mut self.dirty);
        let grid: &Grid = self;
        coords.into_iter().filter_map(|c| grid.view(c)).collect()
    }
}
