//! Reference/candidate equivalence under identical operation sequences,
//! including the accuracy-harness suite for both geometries and the
//! semantic edge rules both implementations must share.

use std::sync::Arc;

use scatterforge::harness::accuracy::run_suite;
use scatterforge::harness::synth::clustered_dataset;
use scatterforge::renderer::points::{PointsOptions, PointsRenderer};
use scatterforge::{
    Dataset, GeometryKind, ReferenceRenderer, Renderer, RendererOptions,
};

fn pair(geometry: GeometryKind) -> (ReferenceRenderer, PointsRenderer) {
    let options = RendererOptions {
        width: 1200,
        height: 800,
        ..Default::default()
    };
    let points = PointsOptions {
        renderer: options.clone(),
        ..Default::default()
    };
    (
        ReferenceRenderer::new(geometry, &options).unwrap(),
        PointsRenderer::new(geometry, &points).unwrap(),
    )
}

#[test]
fn accuracy_suite_passes_both_geometries() {
    for geometry in [GeometryKind::Euclidean, GeometryKind::Poincare] {
        let (mut reference, mut candidate) = pair(geometry);
        let ds = clustered_dataset(42, 20_000, 10, geometry);
        let report = run_suite(&mut reference, &mut candidate, ds).unwrap();
        for op in &report.operations {
            assert!(
                op.passed,
                "{geometry:?} / {}: max error {} ({:?})",
                op.name, op.max_error, op.detail
            );
        }
    }
}

#[test]
fn interleaved_operation_sequences_stay_equivalent() {
    for geometry in [GeometryKind::Euclidean, GeometryKind::Poincare] {
        let (mut reference, mut candidate) = pair(geometry);
        let ds = clustered_dataset(11, 5_000, 10, geometry);
        reference.set_dataset(ds.clone()).unwrap();
        candidate.set_dataset(ds.clone()).unwrap();
        candidate.set_view(reference.get_view()).unwrap();

        let script: [(&str, f64, f64); 7] = [
            ("pan", 45.0, -20.0),
            ("zoom", 1.8, 0.0),
            ("pan", -110.0, 64.0),
            ("zoom", -1.2, 0.0),
            ("pan", 15.0, 15.0),
            ("zoom", 0.6, 0.0),
            ("pan", -30.0, -45.0),
        ];
        for (op, a, b) in script {
            match op {
                "pan" => {
                    reference.start_pan(600.0, 400.0);
                    candidate.start_pan(600.0, 400.0);
                    reference.pan(a, b);
                    candidate.pan(a, b);
                }
                _ => {
                    reference.zoom(700.0, 350.0, a);
                    candidate.zoom(700.0, 350.0, a);
                }
            }
            // Views agree to 1e-10 after every step.
            match (reference.get_view(), candidate.get_view()) {
                (
                    scatterforge::View::Euclidean(r),
                    scatterforge::View::Euclidean(c),
                ) => {
                    assert!((r.center_x - c.center_x).abs() < 1e-10);
                    assert!((r.center_y - c.center_y).abs() < 1e-10);
                    assert!((r.zoom - c.zoom).abs() < 1e-10);
                }
                (
                    scatterforge::View::Poincare(r),
                    scatterforge::View::Poincare(c),
                ) => {
                    assert!((r.ax - c.ax).abs() < 1e-10);
                    assert!((r.ay - c.ay).abs() < 1e-10);
                    assert!((r.display_zoom - c.display_zoom).abs() < 1e-10);
                }
                _ => panic!("view variants diverged"),
            }
        }

        // After the whole script, hit-tests agree exactly.
        for &(sx, sy) in &[(600.0, 400.0), (420.0, 513.0), (881.0, 143.0)] {
            assert_eq!(
                reference.hit_test(sx, sy).map(|h| h.index),
                candidate.hit_test(sx, sy).map(|h| h.index),
                "{geometry:?}: hit mismatch at ({sx}, {sy})"
            );
        }
    }
}

#[test]
fn hit_test_tie_break_prefers_lowest_index() {
    // Two points at identical coordinates, in both implementations.
    let (mut reference, mut candidate) = pair(GeometryKind::Euclidean);
    let ds = Arc::new(
        Dataset::new(
            vec![0.3, 0.3, 0.3, 0.3, -0.5, -0.5],
            vec![0, 1, 2],
            GeometryKind::Euclidean,
        )
        .unwrap(),
    );
    reference.set_dataset(ds.clone()).unwrap();
    candidate.set_dataset(ds).unwrap();
    candidate.set_view(reference.get_view()).unwrap();

    let (sx, sy) = reference.project_to_screen(0.3, 0.3);
    assert_eq!(reference.hit_test(sx, sy).unwrap().index, 0);
    assert_eq!(candidate.hit_test(sx, sy).unwrap().index, 0);
}

#[test]
fn lasso_membership_agrees_on_boundary_points() {
    let (mut reference, mut candidate) = pair(GeometryKind::Euclidean);
    // One point exactly on the polygon edge after unprojection.
    let ds = Arc::new(
        Dataset::new(
            vec![0.0, 0.0, 0.25, 0.0, 0.5, 0.5],
            vec![0, 1, 2],
            GeometryKind::Euclidean,
        )
        .unwrap(),
    );
    reference.set_dataset(ds.clone()).unwrap();
    candidate.set_dataset(ds.clone()).unwrap();
    candidate.set_view(reference.get_view()).unwrap();

    // Rectangle whose left edge passes through point 1's projection.
    let (ex, _) = reference.project_to_screen(0.25, 0.0);
    let polyline: Vec<f32> = vec![
        ex as f32, 100.0, 1100.0, 100.0, 1100.0, 700.0, ex as f32, 700.0,
    ];
    let r_sel = reference.lasso_select(&polyline).unwrap();
    let c_sel = candidate.lasso_select(&polyline).unwrap();
    for i in 0..ds.len() {
        assert_eq!(
            r_sel.has(i),
            c_sel.has(i),
            "membership diverged at point {i}"
        );
    }
    // Interior membership is unambiguous regardless of f32 rounding of
    // the polyline; the exact on-edge rule is pinned by the shared
    // predicate's unit tests.
    assert!(r_sel.has(2));
    assert!(!r_sel.has(0));
}

#[test]
fn degenerate_lasso_is_empty_in_both() {
    let (mut reference, mut candidate) = pair(GeometryKind::Euclidean);
    let ds = clustered_dataset(5, 500, 4, GeometryKind::Euclidean);
    reference.set_dataset(ds.clone()).unwrap();
    candidate.set_dataset(ds.clone()).unwrap();

    let tiny = [100.0_f32, 100.0, 200.0, 200.0];
    let r_sel = reference.lasso_select(&tiny).unwrap();
    let c_sel = candidate.lasso_select(&tiny).unwrap();
    assert_eq!(r_sel.size(), Some(0));
    assert!(r_sel.compute_time_ms >= 0.0);
    assert!(c_sel.compute_time_ms >= 0.0);
    for i in 0..ds.len() {
        assert!(!r_sel.has(i) && !c_sel.has(i));
    }
}
