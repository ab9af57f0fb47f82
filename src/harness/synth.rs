//! Seeded synthetic datasets for the harnesses.
//!
//! Everything is deterministic from an explicit seed; the same seed
//! always produces the same dataset, so accuracy and performance runs
//! are reproducible across machines.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::dataset::{Dataset, GeometryKind};

/// Gaussian cluster spread in Euclidean data units.
const EUCLIDEAN_SPREAD: f32 = 0.12;
/// Poincaré points are kept strictly inside this radius.
const POINCARE_MAX_R: f32 = 0.999;

/// `clusters` Gaussian blobs; labels are cluster ids.
pub fn clustered_dataset(
    seed: u64,
    n: usize,
    clusters: usize,
    geometry: GeometryKind,
) -> Arc<Dataset> {
    let clusters = clusters.max(1).min(u16::MAX as usize + 1);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let centers: Vec<(f32, f32)> = (0..clusters)
        .map(|_| match geometry {
            GeometryKind::Euclidean => (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
            GeometryKind::Poincare => {
                // Area-uniform inside radius 0.7 so clusters crowd the
                // rim the way hyperbolic embeddings do.
                let r = 0.7 * rng.gen::<f32>().sqrt();
                let a = rng.gen_range(0.0..std::f32::consts::TAU);
                (r * a.cos(), r * a.sin())
            }
        })
        .collect();

    let mut positions = Vec::with_capacity(2 * n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let c = i % clusters;
        let (cx, cy) = centers[c];
        let gx: f32 = StandardNormal.sample(&mut rng);
        let gy: f32 = StandardNormal.sample(&mut rng);
        let (mut x, mut y) = match geometry {
            GeometryKind::Euclidean => (cx + gx * EUCLIDEAN_SPREAD, cy + gy * EUCLIDEAN_SPREAD),
            GeometryKind::Poincare => {
                // Spread shrinks toward the boundary to respect the metric.
                let room = 1.0 - (cx * cx + cy * cy).sqrt();
                (cx + gx * 0.08 * room, cy + gy * 0.08 * room)
            }
        };
        if geometry == GeometryKind::Poincare {
            let r = (x * x + y * y).sqrt();
            if r >= POINCARE_MAX_R {
                let s = (POINCARE_MAX_R - 1e-3) / r;
                x *= s;
                y *= s;
            }
        }
        positions.push(x);
        positions.push(y);
        labels.push(c as u16);
    }

    Arc::new(
        Dataset::new(positions, labels, geometry)
            .expect("synthetic dataset construction is infallible"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_dataset() {
        let a = clustered_dataset(42, 1000, 10, GeometryKind::Euclidean);
        let b = clustered_dataset(42, 1000, 10, GeometryKind::Euclidean);
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.labels(), b.labels());
    }

    #[test]
    fn different_seeds_differ() {
        let a = clustered_dataset(1, 100, 4, GeometryKind::Euclidean);
        let b = clustered_dataset(2, 100, 4, GeometryKind::Euclidean);
        assert_ne!(a.positions(), b.positions());
    }

    #[test]
    fn poincare_points_stay_inside_the_disk() {
        let ds = clustered_dataset(7, 50_000, 16, GeometryKind::Poincare);
        for i in 0..ds.len() {
            let r_sq = ds.x(i) * ds.x(i) + ds.y(i) * ds.y(i);
            assert!(r_sq < 1.0, "point {i} at radius² {r_sq}");
        }
    }

    #[test]
    fn labels_cycle_through_clusters() {
        let ds = clustered_dataset(3, 100, 10, GeometryKind::Euclidean);
        assert_eq!(ds.label(0), 0);
        assert_eq!(ds.label(11), 1);
        assert!(ds.labels().iter().all(|&l| l < 10));
    }
}
