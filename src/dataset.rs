//! Dataset container: flat positions, 16-bit labels, geometry tag.
//!
//! Datasets are immutable after construction and shared with renderers by
//! `Arc`; renderers never mutate them. Replacing a renderer's dataset
//! invalidates any outstanding geometry selection that references its
//! polygon coordinates.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Which plane geometry the positions live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Euclidean,
    /// Open unit disk; every position must satisfy x² + y² < 1.
    Poincare,
}

/// Immutable point dataset.
#[derive(Debug)]
pub struct Dataset {
    n: usize,
    positions: Vec<f32>,
    labels: Vec<u16>,
    geometry: GeometryKind,
}

/// Axis-aligned bounds of a dataset in data space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Dataset {
    /// Validates lengths and, for Poincaré data, disk containment.
    pub fn new(
        positions: Vec<f32>,
        labels: Vec<u16>,
        geometry: GeometryKind,
    ) -> RenderResult<Self> {
        if positions.len() % 2 != 0 {
            return Err(RenderError::geometry(format!(
                "positions length must be even, got {}",
                positions.len()
            )));
        }
        let n = positions.len() / 2;
        if labels.len() != n {
            return Err(RenderError::geometry(format!(
                "labels length {} does not match point count {}",
                labels.len(),
                n
            )));
        }
        if geometry == GeometryKind::Poincare {
            for i in 0..n {
                let x = positions[2 * i] as f64;
                let y = positions[2 * i + 1] as f64;
                if x * x + y * y >= 1.0 {
                    return Err(RenderError::geometry(format!(
                        "poincare point {i} at ({x}, {y}) lies outside the open unit disk"
                    )));
                }
            }
        }
        Ok(Self {
            n,
            positions,
            labels,
            geometry,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn geometry(&self) -> GeometryKind {
        self.geometry
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn labels(&self) -> &[u16] {
        &self.labels
    }

    #[inline]
    pub fn x(&self, i: usize) -> f64 {
        self.positions[2 * i] as f64
    }

    #[inline]
    pub fn y(&self, i: usize) -> f64 {
        self.positions[2 * i + 1] as f64
    }

    #[inline]
    pub fn label(&self, i: usize) -> u16 {
        self.labels[i]
    }

    /// Bounds over all positions; degenerate axes are expanded by 1 so a
    /// grid or fit-view over them stays well-formed.
    pub fn bounds(&self) -> DataBounds {
        let mut b = DataBounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        if self.n == 0 {
            return DataBounds {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 1.0,
                max_y: 1.0,
            };
        }
        for i in 0..self.n {
            let (x, y) = (self.x(i), self.y(i));
            b.min_x = b.min_x.min(x);
            b.min_y = b.min_y.min(y);
            b.max_x = b.max_x.max(x);
            b.max_y = b.max_y.max(y);
        }
        if b.max_x - b.min_x <= 0.0 {
            b.min_x -= 0.5;
            b.max_x += 0.5;
        }
        if b.max_y - b.min_y <= 0.0 {
            b.min_y -= 0.5;
            b.max_y += 0.5;
        }
        b
    }

    pub fn centroid(&self) -> (f64, f64) {
        if self.n == 0 {
            return (0.0, 0.0);
        }
        let mut sx = 0.0;
        let mut sy = 0.0;
        for i in 0..self.n {
            sx += self.x(i);
            sy += self.y(i);
        }
        (sx / self.n as f64, sy / self.n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(Dataset::new(vec![0.0, 0.0, 1.0], vec![0], GeometryKind::Euclidean).is_err());
        assert!(Dataset::new(vec![0.0, 0.0], vec![0, 1], GeometryKind::Euclidean).is_err());
    }

    #[test]
    fn rejects_poincare_point_on_or_outside_boundary() {
        assert!(Dataset::new(vec![1.0, 0.0], vec![0], GeometryKind::Poincare).is_err());
        assert!(Dataset::new(vec![0.8, 0.8], vec![0], GeometryKind::Poincare).is_err());
        assert!(Dataset::new(vec![0.5, 0.5], vec![0], GeometryKind::Poincare).is_ok());
    }

    #[test]
    fn degenerate_bounds_are_expanded() {
        let ds = Dataset::new(vec![2.0, 3.0, 2.0, 3.0], vec![0, 0], GeometryKind::Euclidean)
            .unwrap();
        let b = ds.bounds();
        assert_eq!(b.max_x - b.min_x, 1.0);
        assert_eq!(b.max_y - b.min_y, 1.0);
    }

    #[test]
    fn centroid_averages_positions() {
        let ds = Dataset::new(
            vec![0.0, 0.0, 2.0, 4.0],
            vec![0, 1],
            GeometryKind::Euclidean,
        )
        .unwrap();
        assert_eq!(ds.centroid(), (1.0, 2.0));
    }
}
