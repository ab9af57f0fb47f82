//! Reference renderer: semantic ground truth.
//!
//! Naive per-point CPU rasterization against `Raster2d`. No culling
//! beyond trivial frustum/disk rejection, no spatial acceleration in
//! hit-testing, eager index materialization in lasso. Slow and obviously
//! correct; the candidate renderer is validated against it operation by
//! operation.

pub mod raster;

use std::sync::Arc;
use std::time::Instant;

use crate::dataset::{Dataset, GeometryKind};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{self, poincare};
use crate::renderer::{HitResult, Renderer, RendererBase, RendererOptions, HIT_SLOP_PX};
use crate::selection::count::{CountHooks, CountOptions, CountOutcome, CountProgress};
use crate::selection::{IndexStore, SelectionKind, SelectionResult};
use crate::view::View;
use raster::Raster2d;

/// Concentric grid circles drawn inside the Poincaré disk.
const GRID_CIRCLES: usize = 5;
/// Radial geodesics (diameters) drawn through the disk center.
const GRID_SPOKES: usize = 8;

pub struct ReferenceRenderer {
    base: RendererBase,
    surface: Raster2d,
}

impl ReferenceRenderer {
    pub fn new(geometry: GeometryKind, options: &RendererOptions) -> RenderResult<Self> {
        let base = RendererBase::new(geometry, options)?;
        let mut renderer = Self {
            base,
            surface: Raster2d::new(),
        };
        renderer.init_surface();
        Ok(renderer)
    }

    /// Size the backing buffer and (re)apply the DPR transform. The
    /// reset before `scale` is mandatory: the transform persists across
    /// reinitialization and a repeated bare scale() would compound.
    fn init_surface(&mut self) {
        let bw = (self.base.wf() * self.base.dpr).round().max(1.0) as u32;
        let bh = (self.base.hf() * self.base.dpr).round().max(1.0) as u32;
        self.surface.set_backing_size(bw, bh);
        self.surface.reset_transform();
        self.surface.scale(self.base.dpr);
    }

    /// Backing-buffer pixels (width·dpr × height·dpr, RGBA8).
    pub fn pixels(&self) -> &[u8] {
        self.surface.pixels()
    }

    pub fn surface(&self) -> &Raster2d {
        &self.surface
    }

    fn disk_params(&self) -> (f64, f64, f64) {
        let View::Poincare(v) = &self.base.view else {
            unreachable!("disk backdrop only exists in poincare mode");
        };
        (
            self.base.wf() / 2.0,
            self.base.hf() / 2.0,
            poincare::disk_radius(v, self.base.wf(), self.base.hf()),
        )
    }

    fn draw_poincare_backdrop(&mut self) {
        let (cx, cy, r) = self.disk_params();
        let colors = self.base.colors.clone();
        self.surface.fill_circle(cx, cy, r, colors.disk_fill);

        let grid_w = self.base.grid_width;
        for k in 0..GRID_SPOKES {
            let ang = k as f64 * std::f64::consts::PI / GRID_SPOKES as f64;
            let (dx, dy) = (ang.cos(), ang.sin());
            self.surface.line(
                cx - dx * r,
                cy - dy * r,
                cx + dx * r,
                cy + dy * r,
                grid_w,
                colors.grid,
            );
        }
        for i in 1..=GRID_CIRCLES {
            let rr = r * i as f64 / (GRID_CIRCLES + 1) as f64;
            self.surface.stroke_circle(cx, cy, rr, grid_w, colors.grid);
        }
        self.surface
            .stroke_circle(cx, cy, r, self.base.disk_border_width, colors.disk_border);
    }

    /// Trivial rejection: outside the canvas (plus slop), or outside the
    /// disk in Poincaré mode.
    fn visible(&self, sx: f64, sy: f64, slop: f64) -> bool {
        if sx < -slop || sy < -slop || sx > self.base.wf() + slop || sy > self.base.hf() + slop {
            return false;
        }
        if let View::Poincare(v) = &self.base.view {
            let r = poincare::disk_radius(v, self.base.wf(), self.base.hf());
            let dx = sx - self.base.wf() / 2.0;
            let dy = sy - self.base.hf() / 2.0;
            return dx * dx + dy * dy <= (r + slop) * (r + slop);
        }
        true
    }

    fn dataset_or_err(&self) -> RenderResult<&Arc<Dataset>> {
        self.base
            .dataset
            .as_ref()
            .ok_or_else(|| RenderError::render("no dataset set"))
    }
}

impl Renderer for ReferenceRenderer {
    fn geometry(&self) -> GeometryKind {
        self.base.geometry
    }

    fn size(&self) -> (u32, u32) {
        (self.base.width, self.base.height)
    }

    fn set_dataset(&mut self, dataset: Arc<Dataset>) -> RenderResult<()> {
        self.base.set_dataset(dataset)
    }

    fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.base.dataset.as_ref()
    }

    fn set_view(&mut self, view: View) -> RenderResult<()> {
        self.base.set_view(view)
    }

    fn get_view(&self) -> View {
        self.base.view
    }

    fn render(&mut self) -> RenderResult<()> {
        let background = self.base.colors.background;
        self.surface.clear(background);
        if self.base.geometry == GeometryKind::Poincare {
            self.draw_poincare_backdrop();
        }
        let Some(dataset) = self.base.dataset.clone() else {
            return Ok(());
        };

        let r = self.base.point_radius;
        let selection = self.base.selection.clone();
        let hovered = self.base.hovered;
        let (w, h) = (self.base.wf(), self.base.hf());
        let view = self.base.view;

        // Base pass: everything that is neither selected nor hovered.
        for i in 0..dataset.len() {
            if hovered == Some(i as u32) || selection.has(i) {
                continue;
            }
            let (sx, sy) = geometry::project(&view, w, h, dataset.x(i), dataset.y(i));
            if !self.visible(sx, sy, r) {
                continue;
            }
            let color = self.base.colors.label_color(dataset.label(i));
            self.surface.fill_circle(sx, sy, r, color);
        }

        // Selected pass.
        let selection_color = self.base.colors.selection;
        for i in 0..dataset.len() {
            if !selection.has(i) || hovered == Some(i as u32) {
                continue;
            }
            let (sx, sy) = geometry::project(&view, w, h, dataset.x(i), dataset.y(i));
            if !self.visible(sx, sy, r + 1.0) {
                continue;
            }
            self.surface.fill_circle(sx, sy, r + 1.0, selection_color);
        }

        // Hover pass: ring plus fill, selection color when selected.
        if let Some(hi) = hovered {
            let i = hi as usize;
            if i < dataset.len() {
                let (sx, sy) = geometry::project(&view, w, h, dataset.x(i), dataset.y(i));
                if self.visible(sx, sy, r + HIT_SLOP_PX) {
                    let color = if selection.has(i) {
                        selection_color
                    } else {
                        self.base.colors.label_color(dataset.label(i))
                    };
                    self.surface.stroke_circle(sx, sy, r + 3.0, 2.0, color);
                    self.surface.fill_circle(sx, sy, r + 1.0, color);
                }
            }
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.base.resize(width, height)?;
        self.init_surface();
        Ok(())
    }

    fn destroy(&mut self) {
        self.surface = Raster2d::new();
        self.base.dataset = None;
    }

    fn set_selection(&mut self, indices: &[u32]) {
        self.base.set_selection_indices(indices);
    }

    fn get_selection(&self) -> Arc<SelectionResult> {
        self.base.selection_snapshot()
    }

    fn set_hovered(&mut self, index: Option<u32>) {
        self.base.hovered = index;
    }

    fn hovered(&self) -> Option<u32> {
        self.base.hovered
    }

    fn pan(&mut self, dx: f64, dy: f64) {
        self.base.pan(dx, dy);
    }

    fn zoom(&mut self, anchor_x: f64, anchor_y: f64, delta: f64) {
        self.base.zoom(anchor_x, anchor_y, delta);
    }

    fn start_pan(&mut self, x: f64, y: f64) {
        self.base.start_pan(x, y);
    }

    /// Exhaustive scan: project every point and keep the closest within
    /// r+5 px; ties resolve to the lowest index by ascending iteration.
    fn hit_test(&self, sx: f64, sy: f64) -> Option<HitResult> {
        let dataset = self.base.dataset.as_ref()?;
        let (w, h) = (self.base.wf(), self.base.hf());
        let hit_r = self.base.point_radius + HIT_SLOP_PX;
        let hit_r_sq = hit_r * hit_r;

        let mut best: Option<HitResult> = None;
        for i in 0..dataset.len() {
            let (px, py) = geometry::project(&self.base.view, w, h, dataset.x(i), dataset.y(i));
            if let View::Poincare(v) = &self.base.view {
                let r = poincare::disk_radius(v, w, h);
                let dx = px - w / 2.0;
                let dy = py - h / 2.0;
                if dx * dx + dy * dy > r * r {
                    continue;
                }
            }
            let dx = px - sx;
            let dy = py - sy;
            let d_sq = dx * dx + dy * dy;
            if d_sq <= hit_r_sq && best.as_ref().map_or(true, |b| d_sq < b.distance * b.distance)
            {
                best = Some(HitResult {
                    index: i as u32,
                    screen_x: px,
                    screen_y: py,
                    distance: d_sq.sqrt(),
                });
            }
        }
        best
    }

    /// Unproject the polyline and test every point; returns the eagerly
    /// materialized indices variant.
    fn lasso_select(&mut self, polyline: &[f32]) -> RenderResult<SelectionResult> {
        if polyline.len() % 2 != 0 {
            return Err(RenderError::geometry(format!(
                "polyline length must be even, got {}",
                polyline.len()
            )));
        }
        let started = Instant::now();
        let dataset = self.dataset_or_err()?.clone();
        if polyline.len() < 6 {
            return Ok(SelectionResult {
                kind: SelectionKind::Indices(IndexStore::Sorted(Vec::new())),
                compute_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            });
        }

        let (w, h) = (self.base.wf(), self.base.hf());
        let mut polygon = Vec::with_capacity(polyline.len());
        for v in polyline.chunks_exact(2) {
            let (x, y) = geometry::unproject(&self.base.view, w, h, v[0] as f64, v[1] as f64);
            polygon.push(x);
            polygon.push(y);
        }

        let mut indices = Vec::new();
        for i in 0..dataset.len() {
            if crate::selection::polygon::contains(&polygon, dataset.x(i), dataset.y(i)) {
                indices.push(i as u32);
            }
        }
        let result = SelectionResult {
            kind: SelectionKind::Indices(IndexStore::from_indices(indices, dataset.len())),
            compute_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        self.base.selection = Arc::new(result.clone());
        Ok(result)
    }

    /// Brute-force count in keeping with the reference's role; honors the
    /// same yield/cancel protocol as the candidate.
    fn count_selection(
        &self,
        selection: &SelectionResult,
        options: &CountOptions,
        hooks: &mut CountHooks<'_>,
    ) -> CountOutcome {
        match &selection.kind {
            SelectionKind::Indices(store) => CountOutcome::Exact(store.len()),
            SelectionKind::Geometry(sel) => {
                let n = sel.dataset().len();
                let mut matched = 0usize;
                let mut last_yield = Instant::now();
                for i in 0..n {
                    if sel.has(i) {
                        matched += 1;
                    }
                    if i % 4096 == 0
                        && last_yield.elapsed().as_secs_f64() * 1000.0 >= options.yield_every_ms
                    {
                        if let Some(progress) = hooks.on_progress.as_mut() {
                            progress(CountProgress {
                                visited: i + 1,
                                total: n,
                                matched,
                            });
                        }
                        if let Some(yield_now) = hooks.yield_now.as_mut() {
                            yield_now();
                        }
                        if let Some(cancel) = hooks.should_cancel.as_mut() {
                            if cancel() {
                                return CountOutcome::Cancelled(matched);
                            }
                        }
                        last_yield = Instant::now();
                    }
                }
                CountOutcome::Exact(matched)
            }
        }
    }

    fn project_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        geometry::project(&self.base.view, self.base.wf(), self.base.hf(), x, y)
    }

    fn unproject_from_screen(&self, sx: f64, sy: f64) -> (f64, f64) {
        geometry::unproject(&self.base.view, self.base.wf(), self.base.hf(), sx, sy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::PoincareView;

    fn small_euclidean() -> (ReferenceRenderer, Arc<Dataset>) {
        let options = RendererOptions {
            width: 200,
            height: 200,
            ..Default::default()
        };
        let mut r = ReferenceRenderer::new(GeometryKind::Euclidean, &options).unwrap();
        let ds = Arc::new(
            Dataset::new(
                vec![0.0, 0.0, 0.5, 0.5, -0.5, -0.5],
                vec![0, 1, 2],
                GeometryKind::Euclidean,
            )
            .unwrap(),
        );
        r.set_dataset(ds.clone()).unwrap();
        (r, ds)
    }

    #[test]
    fn render_paints_points_over_background() {
        let (mut r, ds) = small_euclidean();
        r.render().unwrap();
        let (sx, sy) = r.project_to_screen(ds.x(0), ds.y(0));
        let px = r.surface().pixel(sx as u32, sy as u32);
        assert_ne!(px, r.base.colors.background);
    }

    #[test]
    fn hit_test_finds_nearest_and_respects_slop() {
        let (r, ds) = small_euclidean();
        let (sx, sy) = r.project_to_screen(ds.x(1), ds.y(1));
        let hit = r.hit_test(sx + 2.0, sy).unwrap();
        assert_eq!(hit.index, 1);
        assert!(hit.distance <= 2.0 + 1e-9);
        assert!(r.hit_test(sx + 30.0, sy + 30.0).is_none());
    }

    #[test]
    fn hit_test_tie_breaks_to_lowest_index() {
        let options = RendererOptions::default();
        let mut r = ReferenceRenderer::new(GeometryKind::Euclidean, &options).unwrap();
        let ds = Arc::new(
            Dataset::new(
                vec![0.25, 0.25, 0.25, 0.25],
                vec![0, 1],
                GeometryKind::Euclidean,
            )
            .unwrap(),
        );
        r.set_dataset(ds).unwrap();
        let (sx, sy) = r.project_to_screen(0.25, 0.25);
        assert_eq!(r.hit_test(sx, sy).unwrap().index, 0);
    }

    #[test]
    fn lasso_matches_polygon_predicate() {
        let (mut r, ds) = small_euclidean();
        // Screen-space rectangle around the projection of point 1 only.
        let (sx, sy) = r.project_to_screen(ds.x(1), ds.y(1));
        let polyline: Vec<f32> = vec![
            (sx - 10.0) as f32,
            (sy - 10.0) as f32,
            (sx + 10.0) as f32,
            (sy - 10.0) as f32,
            (sx + 10.0) as f32,
            (sy + 10.0) as f32,
            (sx - 10.0) as f32,
            (sy + 10.0) as f32,
        ];
        let sel = r.lasso_select(&polyline).unwrap();
        assert!(sel.has(1));
        assert!(!sel.has(0) && !sel.has(2));
        assert_eq!(sel.size(), Some(1));
    }

    #[test]
    fn degenerate_lasso_is_empty() {
        let (mut r, _) = small_euclidean();
        let sel = r.lasso_select(&[10.0, 10.0, 20.0, 20.0]).unwrap();
        assert_eq!(sel.size(), Some(0));
        assert!(sel.compute_time_ms >= 0.0);
    }

    #[test]
    fn poincare_hit_test_rejects_outside_disk() {
        let options = RendererOptions {
            width: 400,
            height: 400,
            ..Default::default()
        };
        let mut r = ReferenceRenderer::new(GeometryKind::Poincare, &options).unwrap();
        let ds = Arc::new(
            Dataset::new(vec![0.9, 0.0], vec![0], GeometryKind::Poincare).unwrap(),
        );
        r.set_dataset(ds).unwrap();
        // Pull the view so the point projects outside the visible disk.
        r.set_view(View::Poincare(PoincareView {
            ax: -0.9,
            ay: 0.0,
            display_zoom: 1.0,
        }))
        .unwrap();
        let (sx, sy) = r.project_to_screen(0.9, 0.0);
        // The projected position is clamped near the rim; the hit-test
        // must not return a point whose projection left the disk.
        if let Some(hit) = r.hit_test(sx, sy) {
            let dx = hit.screen_x - 200.0;
            let dy = hit.screen_y - 200.0;
            let View::Poincare(v) = r.get_view() else {
                unreachable!()
            };
            let disk_r = poincare::disk_radius(&v, 400.0, 400.0);
            assert!(dx * dx + dy * dy <= disk_r * disk_r);
        }
    }

    #[test]
    fn reinit_does_not_compound_dpr() {
        let options = RendererOptions {
            width: 100,
            height: 100,
            device_pixel_ratio: 2.0,
            ..Default::default()
        };
        let mut r = ReferenceRenderer::new(GeometryKind::Euclidean, &options).unwrap();
        r.resize(120, 100).unwrap();
        r.resize(100, 100).unwrap();
        assert_eq!(r.surface().current_scale(), 2.0);
        assert_eq!(r.surface().backing_size(), (200, 200));
    }
}
