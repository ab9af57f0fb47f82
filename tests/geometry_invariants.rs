//! Universal geometric invariants and the canonical scenarios:
//! round-trips, anchor invariance, boundary containment, fit-to-data.
//! Canvas 1200×800, seed 42, 10 labels throughout.

use std::sync::Arc;

use scatterforge::harness::synth::clustered_dataset;
use scatterforge::renderer::points::{PointsOptions, PointsRenderer};
use scatterforge::{
    Dataset, GeometryKind, PoincareView, ReferenceRenderer, Renderer, RendererOptions, View,
};

const W: u32 = 1200;
const H: u32 = 800;

fn reference(geometry: GeometryKind) -> ReferenceRenderer {
    let options = RendererOptions {
        width: W,
        height: H,
        ..Default::default()
    };
    ReferenceRenderer::new(geometry, &options).unwrap()
}

fn candidate(geometry: GeometryKind) -> PointsRenderer {
    let options = PointsOptions {
        renderer: RendererOptions {
            width: W,
            height: H,
            ..Default::default()
        },
        ..Default::default()
    };
    PointsRenderer::new(geometry, &options).unwrap()
}

#[test]
fn projection_roundtrip_across_reachable_views() {
    for geometry in [GeometryKind::Euclidean, GeometryKind::Poincare] {
        let mut r = reference(geometry);
        let ds = clustered_dataset(42, 2_000, 10, geometry);
        r.set_dataset(ds.clone()).unwrap();

        // Walk through a few pans and zooms; the round-trip property must
        // hold at every reachable view.
        for step in 0..5 {
            let tol = if geometry == GeometryKind::Poincare {
                1e-5
            } else {
                1e-6
            };
            for i in (0..ds.len()).step_by(97) {
                let (x, y) = (ds.x(i), ds.y(i));
                let (sx, sy) = r.project_to_screen(x, y);
                let (bx, by) = r.unproject_from_screen(sx, sy);
                let err = ((bx - x).powi(2) + (by - y).powi(2)).sqrt();
                assert!(err < tol, "step {step} point {i}: error {err}");
            }
            r.start_pan(600.0, 400.0);
            r.pan(37.0, -21.0);
            r.zoom(800.0, 300.0, if step % 2 == 0 { 1.5 } else { -1.0 });
        }
    }
}

#[test]
fn euclidean_fit_to_data() {
    let mut r = reference(GeometryKind::Euclidean);
    let ds = clustered_dataset(42, 10_000, 10, GeometryKind::Euclidean);
    r.set_dataset(ds.clone()).unwrap();

    let View::Euclidean(v) = r.get_view() else {
        panic!("euclidean renderer must hold a euclidean view")
    };
    assert!(v.zoom >= 0.1 && v.zoom <= 100.0);
    let (cx, cy) = ds.centroid();
    assert!((v.center_x - cx).abs() < 1e-9);
    assert!((v.center_y - cy).abs() < 1e-9);

    let b = ds.bounds();
    for (x, y) in [
        (b.min_x, b.min_y),
        (b.min_x, b.max_y),
        (b.max_x, b.min_y),
        (b.max_x, b.max_y),
    ] {
        let (sx, sy) = r.project_to_screen(x, y);
        assert!(sx >= 0.0 && sx <= W as f64, "corner sx {sx} escaped canvas");
        assert!(sy >= 0.0 && sy <= H as f64, "corner sy {sy} escaped canvas");
    }
}

#[test]
fn poincare_pan_roundtrip_returns_to_origin() {
    let mut r = candidate(GeometryKind::Poincare);
    let ds = clustered_dataset(42, 1_000, 10, GeometryKind::Poincare);
    r.set_dataset(ds).unwrap();

    r.start_pan(600.0, 400.0);
    r.pan(100.0, 0.0);
    r.start_pan(700.0, 400.0);
    r.pan(-100.0, 0.0);

    let View::Poincare(v) = r.get_view() else {
        panic!("poincare renderer must hold a poincare view")
    };
    // Hyperbolic pan is not a vector field; approximate return only.
    let a_norm = (v.ax * v.ax + v.ay * v.ay).sqrt();
    assert!(a_norm < 1e-6, "|a| = {a_norm} after round-trip");
}

#[test]
fn pan_anchor_invariance() {
    for geometry in [GeometryKind::Euclidean, GeometryKind::Poincare] {
        let mut r = candidate(geometry);
        let ds = clustered_dataset(42, 1_000, 10, geometry);
        r.set_dataset(ds).unwrap();
        r.set_view(View::default_for(geometry)).unwrap();

        let (px, py) = r.unproject_from_screen(400.0, 266.0);
        r.start_pan(400.0, 266.0);
        r.pan(200.0, 134.0);
        let (sx, sy) = r.project_to_screen(px, py);
        assert!(
            (sx - 600.0).abs() < 1e-6 && (sy - 400.0).abs() < 1e-6,
            "{geometry:?}: anchor landed at ({sx}, {sy})"
        );
    }
}

#[test]
fn zoom_anchor_stays_within_a_pixel() {
    for geometry in [GeometryKind::Euclidean, GeometryKind::Poincare] {
        let mut r = candidate(geometry);
        let ds = clustered_dataset(42, 1_000, 10, geometry);
        r.set_dataset(ds).unwrap();
        r.set_view(View::default_for(geometry)).unwrap();

        let anchor = (750.0, 320.0);
        let (px, py) = r.unproject_from_screen(anchor.0, anchor.1);
        for delta in [2.0, -1.0, 3.0] {
            r.zoom(anchor.0, anchor.1, delta);
            let (sx, sy) = r.project_to_screen(px, py);
            let drift = ((sx - anchor.0).powi(2) + (sy - anchor.1).powi(2)).sqrt();
            assert!(drift <= 1.0, "{geometry:?}: anchor drifted {drift} px");
        }
    }
}

#[test]
fn poincare_boundary_stress() {
    let mut r = candidate(GeometryKind::Poincare);
    let ds = clustered_dataset(42, 1_000, 10, GeometryKind::Poincare);
    r.set_dataset(ds).unwrap();

    for i in 0..20 {
        r.start_pan(600.0, 400.0);
        r.pan(30.0, 0.0);
        let View::Poincare(v) = r.get_view() else {
            panic!()
        };
        assert!(
            v.ax * v.ax + v.ay * v.ay < 1.0,
            "pan {i} escaped the disk: a = ({}, {})",
            v.ax,
            v.ay
        );
        let (sx, sy) = r.project_to_screen(0.0, 0.0);
        assert!(sx.is_finite() && sy.is_finite(), "pan {i} produced NaN");
    }
}

#[test]
fn view_state_never_goes_non_finite_under_pathological_input() {
    let mut r = reference(GeometryKind::Poincare);
    let ds = Arc::new(
        Dataset::new(vec![0.998, 0.0, 0.0, -0.998], vec![0, 1], GeometryKind::Poincare).unwrap(),
    );
    r.set_dataset(ds).unwrap();
    r.set_view(View::Poincare(PoincareView {
        ax: 0.9899,
        ay: 0.0,
        display_zoom: 10.0,
    }))
    .unwrap();

    for _ in 0..50 {
        r.start_pan(1199.0, 1.0);
        r.pan(500.0, -500.0);
        assert!(r.get_view().is_finite());
        r.zoom(0.0, 0.0, 80.0);
        assert!(r.get_view().is_finite());
        r.zoom(1200.0, 800.0, -80.0);
        assert!(r.get_view().is_finite());
    }
}
