//! Static uniform grid over data-space positions.
//!
//! CSR-style storage: `offsets` holds prefix sums per cell, `ids` holds
//! point indices grouped by cell. Built once per dataset and immutable
//! afterward; AABB queries visit candidates without allocating and in a
//! deterministic row-major order.

use crate::dataset::Dataset;

/// Target mean points per cell.
const TARGET_OCCUPANCY: f64 = 64.0;
/// Per-axis cell count clamp.
const MIN_CELLS_PER_AXIS: usize = 8;
const MAX_CELLS_PER_AXIS: usize = 2048;
/// Query AABBs are expanded by this before binning.
const QUERY_EPS: f64 = 1e-12;

/// Inclusive cell-coordinate rectangle produced by an AABB query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub cx0: usize,
    pub cx1: usize,
    pub cy0: usize,
    pub cy1: usize,
}

#[derive(Debug)]
pub struct SpatialGrid {
    min_x: f64,
    min_y: f64,
    inv_cell_w: f64,
    inv_cell_h: f64,
    cells_x: usize,
    cells_y: usize,
    offsets: Vec<u32>,
    ids: Vec<u32>,
}

impl SpatialGrid {
    pub fn build(dataset: &Dataset) -> Self {
        let n = dataset.len();
        let b = dataset.bounds();
        let width = b.max_x - b.min_x;
        let height = b.max_y - b.min_y;

        // Split the cell budget between axes proportionally to aspect.
        let total_cells = (n as f64 / TARGET_OCCUPANCY).max(1.0);
        let aspect = width / height;
        let cells_x = ((total_cells * aspect).sqrt().round() as usize)
            .clamp(MIN_CELLS_PER_AXIS, MAX_CELLS_PER_AXIS);
        let cells_y = ((total_cells / aspect).sqrt().round() as usize)
            .clamp(MIN_CELLS_PER_AXIS, MAX_CELLS_PER_AXIS);

        let inv_cell_w = cells_x as f64 / width;
        let inv_cell_h = cells_y as f64 / height;

        let cell_of = |x: f64, y: f64| -> usize {
            let cx = (((x - b.min_x) * inv_cell_w) as usize).min(cells_x - 1);
            let cy = (((y - b.min_y) * inv_cell_h) as usize).min(cells_y - 1);
            cy * cells_x + cx
        };

        // Counting pass, prefix sums, then a scatter pass.
        let cell_count = cells_x * cells_y;
        let mut offsets = vec![0u32; cell_count + 1];
        for i in 0..n {
            offsets[cell_of(dataset.x(i), dataset.y(i)) + 1] += 1;
        }
        for c in 0..cell_count {
            offsets[c + 1] += offsets[c];
        }
        let mut cursor = offsets.clone();
        let mut ids = vec![0u32; n];
        for i in 0..n {
            let c = cell_of(dataset.x(i), dataset.y(i));
            ids[cursor[c] as usize] = i as u32;
            cursor[c] += 1;
        }

        Self {
            min_x: b.min_x,
            min_y: b.min_y,
            inv_cell_w,
            inv_cell_h,
            cells_x,
            cells_y,
            offsets,
            ids,
        }
    }

    pub fn cell_dims(&self) -> (usize, usize) {
        (self.cells_x, self.cells_y)
    }

    /// Cell rectangle covered by the (ε-expanded) AABB.
    pub fn cell_rect(&self, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> CellRect {
        let xmin = xmin - QUERY_EPS;
        let ymin = ymin - QUERY_EPS;
        let xmax = xmax + QUERY_EPS;
        let ymax = ymax + QUERY_EPS;
        CellRect {
            cx0: (((xmin - self.min_x) * self.inv_cell_w).floor() as i64)
                .clamp(0, self.cells_x as i64 - 1) as usize,
            cx1: (((xmax - self.min_x) * self.inv_cell_w).floor() as i64)
                .clamp(0, self.cells_x as i64 - 1) as usize,
            cy0: (((ymin - self.min_y) * self.inv_cell_h).floor() as i64)
                .clamp(0, self.cells_y as i64 - 1) as usize,
            cy1: (((ymax - self.min_y) * self.inv_cell_h).floor() as i64)
                .clamp(0, self.cells_y as i64 - 1) as usize,
        }
    }

    /// Point indices stored in one cell.
    #[inline]
    pub fn cell_ids(&self, cx: usize, cy: usize) -> &[u32] {
        let c = cy * self.cells_x + cx;
        &self.ids[self.offsets[c] as usize..self.offsets[c + 1] as usize]
    }

    /// Total candidate count over a cell rectangle; columns within a row
    /// are contiguous in the CSR layout, so this is one subtraction per row.
    pub fn count_in_rect(&self, rect: &CellRect) -> usize {
        let mut total = 0usize;
        for cy in rect.cy0..=rect.cy1 {
            let row = cy * self.cells_x;
            total += (self.offsets[row + rect.cx1 + 1] - self.offsets[row + rect.cx0]) as usize;
        }
        total
    }

    /// Visit every point whose cell intersects the AABB. Candidates may
    /// lie outside the box; callers re-test exactly.
    pub fn for_each_in_aabb<F: FnMut(u32)>(
        &self,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
        mut visit: F,
    ) {
        let rect = self.cell_rect(xmin, ymin, xmax, ymax);
        for cy in rect.cy0..=rect.cy1 {
            for cx in rect.cx0..=rect.cx1 {
                for &id in self.cell_ids(cx, cy) {
                    visit(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GeometryKind;

    fn grid_dataset(n: usize) -> Dataset {
        // Deterministic lattice in [0,1)².
        let side = (n as f64).sqrt().ceil() as usize;
        let mut positions = Vec::with_capacity(2 * n);
        for i in 0..n {
            positions.push((i % side) as f32 / side as f32);
            positions.push((i / side) as f32 / side as f32);
        }
        Dataset::new(positions, vec![0; n], GeometryKind::Euclidean).unwrap()
    }

    #[test]
    fn every_point_lands_in_exactly_one_cell() {
        let ds = grid_dataset(10_000);
        let grid = SpatialGrid::build(&ds);
        let mut seen = vec![false; ds.len()];
        grid.for_each_in_aabb(-1.0, -1.0, 2.0, 2.0, |id| {
            assert!(!seen[id as usize], "point {id} visited twice");
            seen[id as usize] = true;
        });
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn aabb_query_is_a_superset_of_the_exact_answer() {
        let ds = grid_dataset(4_096);
        let grid = SpatialGrid::build(&ds);
        let (xmin, ymin, xmax, ymax) = (0.25, 0.25, 0.5, 0.5);
        let mut candidates = Vec::new();
        grid.for_each_in_aabb(xmin, ymin, xmax, ymax, |id| candidates.push(id));
        for i in 0..ds.len() {
            let inside = ds.x(i) >= xmin && ds.x(i) <= xmax && ds.y(i) >= ymin && ds.y(i) <= ymax;
            if inside {
                assert!(
                    candidates.contains(&(i as u32)),
                    "grid query missed point {i}"
                );
            }
        }
    }

    #[test]
    fn iteration_order_is_deterministic() {
        let ds = grid_dataset(1_000);
        let grid = SpatialGrid::build(&ds);
        let mut first = Vec::new();
        let mut second = Vec::new();
        grid.for_each_in_aabb(0.1, 0.1, 0.9, 0.9, |id| first.push(id));
        grid.for_each_in_aabb(0.1, 0.1, 0.9, 0.9, |id| second.push(id));
        assert_eq!(first, second);
    }

    #[test]
    fn axis_cell_counts_stay_clamped() {
        let tiny = grid_dataset(4);
        let (cx, cy) = SpatialGrid::build(&tiny).cell_dims();
        assert!(cx >= MIN_CELLS_PER_AXIS && cy >= MIN_CELLS_PER_AXIS);

        let ds = grid_dataset(100_000);
        let (cx, cy) = SpatialGrid::build(&ds).cell_dims();
        assert!(cx <= MAX_CELLS_PER_AXIS && cy <= MAX_CELLS_PER_AXIS);
    }

    #[test]
    fn degenerate_single_point_dataset_builds() {
        let ds = Dataset::new(vec![3.0, 7.0], vec![0], GeometryKind::Euclidean).unwrap();
        let grid = SpatialGrid::build(&ds);
        let mut hits = 0;
        grid.for_each_in_aabb(2.0, 6.0, 4.0, 8.0, |_| hits += 1);
        assert_eq!(hits, 1);
    }
}
