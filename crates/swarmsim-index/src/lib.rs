//! Spatial indexing abstractions for swarm neighborhood queries.
//!
//! The simulation only ever asks two kinds of questions: "who sits in the
//! 3×3 cell block around this point?" (perception assembly, where the cell
//! size is chosen at least as large as every interaction radius) and "how
//! many entities sit inside this exact disk?" (defender counting). Both are
//! answered from a uniform grid keyed by signed cell coordinates that is
//! rebuilt once per tick.

use ordered_float::OrderedFloat;
use std::collections::HashMap;
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from entity positions, binning each entity
    /// into its cell. Implementations retain bucket capacity across rebuilds.
    fn rebuild(&mut self, cell_size: f64, positions: &[(f64, f64)]) -> Result<(), IndexError>;

    /// Visit every entity index stored in the 3×3 cell block centered on the
    /// cell containing `(x, y)`. No distance filtering is applied; with a cell
    /// size at least as large as the query radius the visited set is a
    /// superset of any disk of that radius around the point.
    fn for_each_in_block(&self, x: f64, y: f64, visitor: &mut dyn FnMut(usize));

    /// Visit every entity strictly inside the disk of `radius` around
    /// `center`, scanning only the minimum enclosing block of cells. The
    /// visitor receives the entity index and its squared distance.
    fn for_each_within(
        &self,
        center: (f64, f64),
        radius: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    );
}

/// Baseline uniform grid index backing neighbor queries.
///
/// Buckets are kept in a sparse map over signed cell coordinates, so negative
/// positions are supported without remapping. `rebuild` clears bucket lengths
/// but keeps their capacity, which drives steady-state allocations to zero.
#[derive(Debug, Default)]
pub struct UniformGrid {
    cell_size: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
    positions: Vec<(f64, f64)>,
}

impl UniformGrid {
    /// Create an empty grid. Cell size is supplied on every `rebuild` because
    /// the owning simulation derives it from hot-updatable radii.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell size used by the most recent rebuild.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of entities indexed by the most recent rebuild.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when no entities are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Count entities strictly inside the disk for which `pred` holds.
    /// Performs no allocation; callers compose faction filters and identity
    /// exclusion through the predicate.
    pub fn count_within(
        &self,
        center: (f64, f64),
        radius: f64,
        pred: &mut dyn FnMut(usize) -> bool,
    ) -> usize {
        let mut count = 0;
        self.for_each_within(center, radius, &mut |idx, _dist_sq| {
            if pred(idx) {
                count += 1;
            }
        });
        count
    }

    /// Collect entity indices strictly inside the disk into `out` (cleared
    /// first, capacity retained).
    pub fn collect_within(&self, center: (f64, f64), radius: f64, out: &mut Vec<usize>) {
        out.clear();
        self.for_each_within(center, radius, &mut |idx, _dist_sq| out.push(idx));
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn cell_coord(&self, value: f64) -> i64 {
        (value / self.cell_size).floor() as i64
    }

    #[inline]
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (self.cell_coord(x), self.cell_coord(y))
    }
}

impl NeighborhoodIndex for UniformGrid {
    fn rebuild(&mut self, cell_size: f64, positions: &[(f64, f64)]) -> Result<(), IndexError> {
        if !(cell_size > 0.0) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        self.cell_size = cell_size;
        self.positions.clear();
        self.positions.extend_from_slice(positions);

        // Reset lengths only; the backing arrays are reused next tick.
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        for (idx, &(x, y)) in positions.iter().enumerate() {
            let key = self.cell_of(x, y);
            self.buckets.entry(key).or_default().push(idx);
        }
        Ok(())
    }

    fn for_each_in_block(&self, x: f64, y: f64, visitor: &mut dyn FnMut(usize)) {
        if self.positions.is_empty() {
            return;
        }
        let (cx, cy) = self.cell_of(x, y);
        for gx in (cx - 1)..=(cx + 1) {
            for gy in (cy - 1)..=(cy + 1) {
                if let Some(bucket) = self.buckets.get(&(gx, gy)) {
                    for &idx in bucket {
                        visitor(idx);
                    }
                }
            }
        }
    }

    fn for_each_within(
        &self,
        center: (f64, f64),
        radius: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    ) {
        if self.positions.is_empty() || radius < 0.0 {
            return;
        }
        let (cx, cy) = center;
        let radius_sq = radius * radius;
        let min_gx = self.cell_coord(cx - radius);
        let max_gx = self.cell_coord(cx + radius);
        let min_gy = self.cell_coord(cy - radius);
        let max_gy = self.cell_coord(cy + radius);

        for gx in min_gx..=max_gx {
            for gy in min_gy..=max_gy {
                let Some(bucket) = self.buckets.get(&(gx, gy)) else {
                    continue;
                };
                for &idx in bucket {
                    let (ox, oy) = self.positions[idx];
                    let dx = ox - cx;
                    let dy = oy - cy;
                    let dist_sq = dx.mul_add(dx, dy * dy);
                    if dist_sq < radius_sq {
                        visitor(idx, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuilt(cell_size: f64, positions: &[(f64, f64)]) -> UniformGrid {
        let mut grid = UniformGrid::new();
        grid.rebuild(cell_size, positions).expect("rebuild");
        grid
    }

    fn block_indices(grid: &UniformGrid, x: f64, y: f64) -> Vec<usize> {
        let mut seen = Vec::new();
        grid.for_each_in_block(x, y, &mut |idx| seen.push(idx));
        seen.sort_unstable();
        seen
    }

    #[test]
    fn rebuild_bins_entities_into_expected_cells() {
        // Cell size 100: (50, 50) -> (0, 0), (150, 50) -> (1, 0), etc.
        let grid = rebuilt(
            100.0,
            &[(50.0, 50.0), (150.0, 50.0), (50.0, 150.0), (250.0, 250.0)],
        );
        assert_eq!(block_indices(&grid, 50.0, 50.0), vec![0, 1, 2]);
        assert_eq!(block_indices(&grid, 150.0, 150.0), vec![0, 1, 2, 3]);
        // (250, 250) sits in cell (2, 2); its 3x3 block excludes cell (0, 0).
        assert_eq!(block_indices(&grid, 250.0, 250.0), vec![1, 2, 3]);
    }

    #[test]
    fn block_scan_contains_every_entity_at_its_own_position() {
        let positions = [(3.0, 7.0), (99.9, 0.1), (512.0, 480.0), (47.0, 47.0)];
        let grid = rebuilt(50.0, &positions);
        for (idx, &(x, y)) in positions.iter().enumerate() {
            assert!(
                block_indices(&grid, x, y).contains(&idx),
                "entity {idx} missing from its own block"
            );
        }
    }

    #[test]
    fn block_scan_covers_any_disk_up_to_cell_size() {
        // Neighbors exactly cell_size away in each direction stay inside the
        // 3x3 block, so the block is a superset of the enclosed disk.
        let center = (150.0, 150.0);
        let positions = [
            center,
            (50.0, 150.0),
            (250.0, 150.0),
            (150.0, 50.0),
            (150.0, 250.0),
        ];
        let grid = rebuilt(100.0, &positions);
        let block = block_indices(&grid, center.0, center.1);
        for idx in 0..positions.len() {
            assert!(block.contains(&idx));
        }
    }

    #[test]
    fn negative_positions_land_in_signed_cells() {
        let grid = rebuilt(10.0, &[(-5.0, -5.0), (5.0, 5.0), (-95.0, 3.0)]);
        // (-5, -5) is in cell (-1, -1), adjacent to (5, 5) in cell (0, 0).
        assert_eq!(block_indices(&grid, -5.0, -5.0), vec![0, 1]);
        assert_eq!(block_indices(&grid, 5.0, 5.0), vec![0, 1]);
        // (-95, 3) is far away in cell (-10, 0).
        assert_eq!(block_indices(&grid, -95.0, 3.0), vec![2]);
    }

    #[test]
    fn radius_scan_filters_by_strict_distance() {
        let grid = rebuilt(10.0, &[(0.0, 0.0), (3.0, 0.0), (0.0, 4.9), (0.0, 5.0)]);
        let mut found = Vec::new();
        grid.for_each_within((0.0, 0.0), 5.0, &mut |idx, dist_sq| {
            found.push((idx, dist_sq.into_inner()));
        });
        found.sort_by_key(|&(idx, _)| idx);
        let indices: Vec<usize> = found.iter().map(|&(idx, _)| idx).collect();
        // The boundary entity at exactly radius 5.0 is excluded.
        assert_eq!(indices, vec![0, 1, 2]);
        assert!((found[1].1 - 9.0).abs() < 1e-12);
    }

    #[test]
    fn radius_scan_spans_cells_wider_than_one_block() {
        // Radius far larger than the cell size must still see everything.
        let grid = rebuilt(10.0, &[(0.0, 0.0), (95.0, 0.0), (0.0, -95.0)]);
        let mut count = 0;
        grid.for_each_within((0.0, 0.0), 100.0, &mut |_idx, _dist_sq| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn count_within_applies_predicate_and_exclusion() {
        let grid = rebuilt(10.0, &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (9.0, 9.0)]);
        let count = grid.count_within((0.0, 0.0), 5.0, &mut |idx| idx != 0);
        assert_eq!(count, 2);
    }

    #[test]
    fn collect_within_reuses_buffer() {
        let grid = rebuilt(10.0, &[(0.0, 0.0), (2.0, 0.0), (40.0, 0.0)]);
        let mut out = vec![7usize; 8];
        grid.collect_within((0.0, 0.0), 5.0, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn rebuild_rejects_non_positive_cell_size() {
        let mut grid = UniformGrid::new();
        assert!(grid.rebuild(0.0, &[(1.0, 1.0)]).is_err());
        assert!(grid.rebuild(-4.0, &[(1.0, 1.0)]).is_err());
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let mut grid = UniformGrid::new();
        grid.rebuild(10.0, &[(0.0, 0.0), (1.0, 1.0)]).expect("first");
        grid.rebuild(10.0, &[(100.0, 100.0)]).expect("second");
        assert_eq!(grid.len(), 1);
        assert!(block_indices(&grid, 0.0, 0.0).is_empty());
        assert_eq!(block_indices(&grid, 100.0, 100.0), vec![0]);
    }
}
