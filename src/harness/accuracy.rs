//! Accuracy harness: reference and candidate side by side on identical
//! operations, asserting equivalence within per-operation tolerances.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::dataset::{Dataset, GeometryKind};
use crate::renderer::Renderer;
use crate::selection::SelectionResult;
use crate::view::View;

/// Tolerances per the equivalence contract.
const PROJECT_TOL_PX: f64 = 1e-6;
const ROUNDTRIP_TOL: f64 = 1e-6;
const BOUNDARY_TOL: f64 = 1e-5;
const VIEW_TOL: f64 = 1e-10;
const VIEW_TOL_EXTREME: f64 = 1e-9;

#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub name: String,
    pub passed: bool,
    pub max_error: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    pub geometry: GeometryKind,
    pub operations: Vec<OperationReport>,
}

impl AccuracyReport {
    pub fn passed(&self) -> bool {
        self.operations.iter().all(|op| op.passed)
    }
}

struct Recorder {
    operations: Vec<OperationReport>,
}

impl Recorder {
    fn record(&mut self, name: &str, max_error: f64, tol: f64, detail: Option<String>) {
        self.operations.push(OperationReport {
            name: name.to_string(),
            passed: max_error <= tol,
            max_error,
            detail,
        });
    }

    fn record_bool(&mut self, name: &str, passed: bool, detail: Option<String>) {
        self.operations.push(OperationReport {
            name: name.to_string(),
            passed,
            max_error: if passed { 0.0 } else { f64::INFINITY },
            detail,
        });
    }
}

/// Component-wise distance between two views of the same variant.
fn view_distance(a: &View, b: &View) -> f64 {
    match (a, b) {
        (View::Euclidean(a), View::Euclidean(b)) => (a.center_x - b.center_x)
            .abs()
            .max((a.center_y - b.center_y).abs())
            .max((a.zoom - b.zoom).abs()),
        (View::Poincare(a), View::Poincare(b)) => (a.ax - b.ax)
            .abs()
            .max((a.ay - b.ay).abs())
            .max((a.display_zoom - b.display_zoom).abs()),
        _ => f64::INFINITY,
    }
}

fn sample_indices(n: usize) -> Vec<usize> {
    let mut v = vec![0, n / 4, n / 2, n.saturating_sub(1)];
    v.dedup();
    v
}

fn reset_views(
    reference: &mut dyn Renderer,
    candidate: &mut dyn Renderer,
    geometry: GeometryKind,
) -> Result<()> {
    let view = View::default_for(geometry);
    reference.set_view(view)?;
    candidate.set_view(view)?;
    Ok(())
}

/// Run the fixed cross-implementation suite against a shared dataset.
pub fn run_suite(
    reference: &mut dyn Renderer,
    candidate: &mut dyn Renderer,
    dataset: Arc<Dataset>,
) -> Result<AccuracyReport> {
    let geometry = dataset.geometry();
    anyhow::ensure!(
        reference.geometry() == geometry && candidate.geometry() == geometry,
        "renderer geometries must match the dataset"
    );
    reference.set_dataset(dataset.clone())?;
    candidate.set_dataset(dataset.clone())?;
    // Identical initial view on both sides.
    let initial = reference.get_view();
    candidate.set_view(initial)?;

    let mut rec = Recorder {
        operations: Vec::new(),
    };
    let n = dataset.len();
    let (w, h) = reference.size();
    let (w, h) = (w as f64, h as f64);

    // 1. Projection at representative indices.
    let mut max_err: f64 = 0.0;
    for &i in &sample_indices(n) {
        let (rx, ry) = reference.project_to_screen(dataset.x(i), dataset.y(i));
        let (cx, cy) = candidate.project_to_screen(dataset.x(i), dataset.y(i));
        max_err = max_err.max((rx - cx).abs()).max((ry - cy).abs());
    }
    rec.record("projection", max_err, PROJECT_TOL_PX, None);

    // 2. Projection round-trip on each implementation.
    for (label, r) in [
        ("roundtrip/reference", &*reference),
        ("roundtrip/candidate", &*candidate),
    ] {
        let mut max_err: f64 = 0.0;
        for &i in &sample_indices(n) {
            let (x, y) = (dataset.x(i), dataset.y(i));
            let (sx, sy) = r.project_to_screen(x, y);
            let (bx, by) = r.unproject_from_screen(sx, sy);
            max_err = max_err.max((bx - x).abs()).max((by - y).abs());
        }
        rec.record(label, max_err, ROUNDTRIP_TOL, None);
    }

    // 3. Near-boundary probes (Poincaré only), relaxed tolerance.
    if geometry == GeometryKind::Poincare {
        let probes = [
            (0.95, 0.0),
            (0.0, 0.95),
            (-0.6717, 0.6717),
            (-0.95, 0.0),
        ];
        let mut max_err: f64 = 0.0;
        for &(x, y) in &probes {
            let (rx, ry) = reference.project_to_screen(x, y);
            let (cx, cy) = candidate.project_to_screen(x, y);
            max_err = max_err.max((rx - cx).abs()).max((ry - cy).abs());
            let (bx, by) = candidate.unproject_from_screen(cx, cy);
            max_err = max_err.max((bx - x).abs()).max((by - y).abs());
        }
        rec.record("near-boundary", max_err, BOUNDARY_TOL, None);
    }

    // 4. Pan equivalence.
    reset_views(reference, candidate, geometry)?;
    let pan_start = (w / 2.0, h / 2.0 - h / 6.0);
    reference.start_pan(pan_start.0, pan_start.1);
    candidate.start_pan(pan_start.0, pan_start.1);
    let mut max_err: f64 = 0.0;
    for (dx, dy) in [(40.0, 10.0), (-12.0, 30.0), (65.0, -22.0), (-90.0, -15.0)] {
        reference.pan(dx, dy);
        candidate.pan(dx, dy);
        max_err = max_err.max(view_distance(&reference.get_view(), &candidate.get_view()));
    }
    rec.record("pan", max_err, VIEW_TOL, None);

    // 5. Zoom equivalence, plus two extreme deltas at relaxed tolerance.
    reset_views(reference, candidate, geometry)?;
    let anchor = (w * 0.6, h * 0.4);
    let mut max_err: f64 = 0.0;
    for delta in [1.2, -0.8, 2.4, -1.6] {
        reference.zoom(anchor.0, anchor.1, delta);
        candidate.zoom(anchor.0, anchor.1, delta);
        max_err = max_err.max(view_distance(&reference.get_view(), &candidate.get_view()));
    }
    rec.record("zoom", max_err, VIEW_TOL, None);

    let mut max_err: f64 = 0.0;
    for delta in [60.0, -120.0] {
        reference.zoom(anchor.0, anchor.1, delta);
        candidate.zoom(anchor.0, anchor.1, delta);
        max_err = max_err.max(view_distance(&reference.get_view(), &candidate.get_view()));
    }
    rec.record("zoom/extreme", max_err, VIEW_TOL_EXTREME, None);

    // 6. Hit-test: exact index agreement at fixed positions.
    reset_views(reference, candidate, geometry)?;
    let mut mismatch = None;
    for &(sx, sy) in &[
        (w / 2.0, h / 2.0),
        (w * 0.25, h * 0.33),
        (w * 0.75, h * 0.66),
        (w * 0.1, h * 0.9),
        (w * 0.9, h * 0.1),
    ] {
        let r_hit = reference.hit_test(sx, sy).map(|hit| hit.index);
        let c_hit = candidate.hit_test(sx, sy).map(|hit| hit.index);
        if r_hit != c_hit {
            mismatch = Some(format!("at ({sx}, {sy}): {r_hit:?} vs {c_hit:?}"));
            break;
        }
    }
    rec.record_bool("hit-test", mismatch.is_none(), mismatch);

    // 7. Lasso membership equality on a canonical polygon covering ~40%
    // of the canvas.
    let half_w = w * 0.3162;
    let half_h = h * 0.3162;
    let polyline: Vec<f32> = [
        (w / 2.0 - half_w, h / 2.0 - half_h),
        (w / 2.0 + half_w, h / 2.0 - half_h),
        (w / 2.0 + half_w, h / 2.0 + half_h),
        (w / 2.0 - half_w, h / 2.0 + half_h),
    ]
    .iter()
    .flat_map(|&(x, y)| [x as f32, y as f32])
    .collect();

    let r_sel = reference.lasso_select(&polyline)?;
    let c_sel = candidate.lasso_select(&polyline)?;
    let mismatch = first_membership_mismatch(&r_sel, &c_sel, n);
    rec.record_bool(
        "lasso",
        mismatch.is_none(),
        mismatch.map(|i| format!("membership differs at index {i}")),
    );

    Ok(AccuracyReport {
        geometry,
        operations: rec.operations,
    })
}

fn first_membership_mismatch(
    a: &SelectionResult,
    b: &SelectionResult,
    n: usize,
) -> Option<usize> {
    (0..n).find(|&i| a.has(i) != b.has(i))
}
