//! Selection results: enumerated index sets and polygon-predicate
//! ("geometry") selections.
//!
//! A lasso over a large dataset can select millions of points, so the
//! candidate renderer never materializes an index set eagerly: it returns
//! the geometry variant, whose `has(i)` tests bounds then the shared
//! point-in-polygon predicate. Exact counts come from the cooperative
//! counter in [`count`].

pub mod bitset;
pub mod count;
pub mod polygon;

use std::sync::Arc;

use crate::dataset::Dataset;
use bitset::IndexBitset;
use polygon::PolyAabb;

/// Index selections at or above this cardinality switch to the bitset.
pub const BITSET_THRESHOLD: usize = 2_000_000;

/// `get_selection` clones snapshots below this size; above it the
/// internal Arc is returned to avoid duplicating huge sets.
pub const SNAPSHOT_CLONE_LIMIT: usize = 200_000;

/// Set-like container of point indices.
#[derive(Debug, Clone)]
pub enum IndexStore {
    /// Ascending, deduplicated indices; membership by binary search.
    Sorted(Vec<u32>),
    Bits(IndexBitset),
}

impl IndexStore {
    /// Build from an arbitrary index list over `0..universe`. Sorts and
    /// dedups; switches to the bitset representation at the threshold.
    pub fn from_indices(mut indices: Vec<u32>, universe: usize) -> Self {
        indices.sort_unstable();
        indices.dedup();
        if indices.len() >= BITSET_THRESHOLD {
            let mut bits = IndexBitset::new(universe);
            for &i in &indices {
                bits.insert(i as usize);
            }
            IndexStore::Bits(bits)
        } else {
            IndexStore::Sorted(indices)
        }
    }

    #[inline]
    pub fn contains(&self, i: usize) -> bool {
        match self {
            IndexStore::Sorted(v) => v.binary_search(&(i as u32)).is_ok(),
            IndexStore::Bits(b) => i < b.universe() && b.contains(i),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexStore::Sorted(v) => v.len(),
            IndexStore::Bits(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            IndexStore::Sorted(v) => v.is_empty(),
            IndexStore::Bits(b) => b.is_empty(),
        }
    }

    pub fn iter(&self) -> IndexStoreIter<'_> {
        match self {
            IndexStore::Sorted(v) => IndexStoreIter::Sorted(v.iter()),
            IndexStore::Bits(b) => IndexStoreIter::Bits(b.iter()),
        }
    }
}

pub enum IndexStoreIter<'a> {
    Sorted(std::slice::Iter<'a, u32>),
    Bits(bitset::BitsetIter<'a>),
}

impl Iterator for IndexStoreIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self {
            IndexStoreIter::Sorted(it) => it.next().copied(),
            IndexStoreIter::Bits(it) => it.next(),
        }
    }
}

/// Polygon-predicate selection: membership is computed, not stored.
///
/// Holds its own handle to the dataset whose positions the polygon was
/// unprojected against; if the renderer's dataset is replaced, an
/// outstanding geometry selection keeps answering against the dataset it
/// was created from.
#[derive(Debug, Clone)]
pub struct GeometrySelection {
    dataset: Arc<Dataset>,
    /// Flat data-space polygon coordinates.
    pub polygon: Vec<f64>,
    /// Tight polygon bounds; None for degenerate (< 3 vertex) polygons.
    pub bounds: Option<PolyAabb>,
}

impl GeometrySelection {
    pub fn new(dataset: Arc<Dataset>, polygon: Vec<f64>) -> Self {
        let bounds = polygon::aabb(&polygon);
        Self {
            dataset,
            polygon,
            bounds,
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Bounds prefilter, then the shared ray-cast predicate.
    #[inline]
    pub fn has(&self, i: usize) -> bool {
        let Some(bounds) = &self.bounds else {
            return false;
        };
        let x = self.dataset.x(i);
        let y = self.dataset.y(i);
        bounds.contains(x, y) && polygon::contains(&self.polygon, x, y)
    }
}

#[derive(Debug, Clone)]
pub enum SelectionKind {
    Indices(IndexStore),
    Geometry(GeometrySelection),
}

/// Result of a lasso or programmatic selection.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub kind: SelectionKind,
    /// Time spent constructing this result (for the geometry variant,
    /// only the polyline unprojection).
    pub compute_time_ms: f64,
}

impl SelectionResult {
    pub fn empty() -> Self {
        Self {
            kind: SelectionKind::Indices(IndexStore::Sorted(Vec::new())),
            compute_time_ms: 0.0,
        }
    }

    #[inline]
    pub fn has(&self, i: usize) -> bool {
        match &self.kind {
            SelectionKind::Indices(s) => s.contains(i),
            SelectionKind::Geometry(g) => g.has(i),
        }
    }

    /// Known cardinality; `None` means deferred (geometry variant, use
    /// the cooperative counter).
    pub fn size(&self) -> Option<usize> {
        match &self.kind {
            SelectionKind::Indices(s) => Some(s.len()),
            SelectionKind::Geometry(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GeometryKind;

    fn unit_square_dataset() -> Arc<Dataset> {
        // 3 points: inside, on edge, outside the unit square polygon.
        Arc::new(
            Dataset::new(
                vec![0.5, 0.5, 1.0, 0.5, 2.0, 2.0],
                vec![0, 1, 2],
                GeometryKind::Euclidean,
            )
            .unwrap(),
        )
    }

    #[test]
    fn index_store_membership_and_dedup() {
        let s = IndexStore::from_indices(vec![5, 3, 3, 9], 16);
        assert_eq!(s.len(), 3);
        assert!(s.contains(3) && s.contains(5) && s.contains(9));
        assert!(!s.contains(4));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![3, 5, 9]);
    }

    #[test]
    fn geometry_selection_honors_boundary_rule() {
        let ds = unit_square_dataset();
        let sel = GeometrySelection::new(
            ds,
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        );
        assert!(sel.has(0));
        assert!(sel.has(1)); // on-edge is inside
        assert!(!sel.has(2));
    }

    #[test]
    fn degenerate_polygon_selects_nothing() {
        let ds = unit_square_dataset();
        let sel = GeometrySelection::new(ds, vec![0.0, 0.0, 1.0, 1.0]);
        assert!(sel.bounds.is_none());
        assert!(!sel.has(0));
    }

    #[test]
    fn geometry_size_is_deferred() {
        let ds = unit_square_dataset();
        let result = SelectionResult {
            kind: SelectionKind::Geometry(GeometrySelection::new(ds, vec![])),
            compute_time_ms: 0.0,
        };
        assert_eq!(result.size(), None);
        assert!(SelectionResult::empty().size() == Some(0));
    }
}
