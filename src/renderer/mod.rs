//! Renderer contract shared by the reference (CPU) and candidate (GPU)
//! implementations.
//!
//! Both backends expose the same capability set and are driven
//! interchangeably by the interaction controller and the harnesses. The
//! shared `RendererBase` holds everything geometry- and backend-agnostic:
//! sizes, DPR, dataset handle, view, selection, hover, colors.

pub mod points;
pub mod reference;

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::color::{self, Rgba};
use crate::dataset::{Dataset, GeometryKind};
use crate::error::{RenderError, RenderResult};
use crate::geometry;
use crate::selection::count::{CountHooks, CountOptions, CountOutcome};
use crate::selection::{SelectionResult, SNAPSHOT_CLONE_LIMIT};
use crate::view::View;

/// Construction-time renderer configuration. All knobs flow through
/// here; there is no global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
    pub background_color: String,
    /// Base point radius r in CSS pixels. Selection draws at r+1, the
    /// hover ring at r+3, and hit-testing accepts within r+5.
    pub point_radius: f64,
    /// Label palette as hex strings; None selects the built-in palette.
    pub colors: Option<Vec<String>>,
    pub selection_color: String,
    pub poincare_disk_fill_color: String,
    pub poincare_disk_border_color: String,
    pub poincare_grid_color: String,
    pub poincare_disk_border_width_px: f64,
    pub poincare_grid_width_px: f64,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            device_pixel_ratio: 1.0,
            background_color: "#14161c".to_string(),
            point_radius: 3.0,
            colors: None,
            selection_color: "#ff3b30".to_string(),
            poincare_disk_fill_color: "#1b1e27".to_string(),
            poincare_disk_border_color: "#4a5068".to_string(),
            poincare_grid_color: "#2a2e3d".to_string(),
            poincare_disk_border_width_px: 1.5,
            poincare_grid_width_px: 1.0,
        }
    }
}

/// Successful hit-test outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub index: u32,
    pub screen_x: f64,
    pub screen_y: f64,
    /// Pixel distance from the cursor to the point center.
    pub distance: f64,
}

/// Extra pixels beyond the point radius accepted by hit-testing.
pub const HIT_SLOP_PX: f64 = 5.0;

/// Parsed colors shared by both backends.
#[derive(Debug, Clone)]
pub struct Colors {
    pub background: Rgba,
    pub selection: Rgba,
    pub disk_fill: Rgba,
    pub disk_border: Rgba,
    pub grid: Rgba,
    pub palette: Vec<Rgba>,
}

impl Colors {
    pub fn from_options(options: &RendererOptions) -> RenderResult<Self> {
        let palette = match &options.colors {
            Some(colors) => color::parse_palette(colors)?,
            None => color::default_palette(),
        };
        Ok(Self {
            background: color::parse_hex(&options.background_color)?,
            selection: color::parse_hex(&options.selection_color)?,
            disk_fill: color::parse_hex(&options.poincare_disk_fill_color)?,
            disk_border: color::parse_hex(&options.poincare_disk_border_color)?,
            grid: color::parse_hex(&options.poincare_grid_color)?,
            palette,
        })
    }

    #[inline]
    pub fn label_color(&self, label: u16) -> Rgba {
        self.palette[label as usize % self.palette.len()]
    }
}

/// State common to every (geometry × backend) renderer.
#[derive(Debug)]
pub struct RendererBase {
    pub geometry: GeometryKind,
    pub width: u32,
    pub height: u32,
    pub dpr: f64,
    pub point_radius: f64,
    pub disk_border_width: f64,
    pub grid_width: f64,
    pub colors: Colors,
    pub dataset: Option<Arc<Dataset>>,
    pub view: View,
    pub selection: Arc<SelectionResult>,
    pub hovered: Option<u32>,
    /// Current pan anchor in screen coordinates (Poincaré pans solve
    /// against it; Euclidean pans ignore it).
    pub pan_anchor: Option<(f64, f64)>,
    /// Timestamp of the last view mutation; drives interaction LOD.
    pub last_view_change: Option<Instant>,
}

impl RendererBase {
    pub fn new(geometry: GeometryKind, options: &RendererOptions) -> RenderResult<Self> {
        if options.width == 0 || options.height == 0 {
            return Err(RenderError::geometry(format!(
                "canvas size must be positive, got {}x{}",
                options.width, options.height
            )));
        }
        if !(options.device_pixel_ratio.is_finite() && options.device_pixel_ratio > 0.0) {
            return Err(RenderError::geometry(format!(
                "device pixel ratio must be positive, got {}",
                options.device_pixel_ratio
            )));
        }
        Ok(Self {
            geometry,
            width: options.width,
            height: options.height,
            dpr: options.device_pixel_ratio,
            point_radius: options.point_radius,
            disk_border_width: options.poincare_disk_border_width_px,
            grid_width: options.poincare_grid_width_px,
            colors: Colors::from_options(options)?,
            dataset: None,
            view: View::default_for(geometry),
            selection: Arc::new(SelectionResult::empty()),
            hovered: None,
            pan_anchor: None,
            last_view_change: None,
        })
    }

    #[inline]
    pub fn wf(&self) -> f64 {
        self.width as f64
    }

    #[inline]
    pub fn hf(&self) -> f64 {
        self.height as f64
    }

    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) -> RenderResult<()> {
        if dataset.geometry() != self.geometry {
            return Err(RenderError::geometry(format!(
                "dataset geometry {:?} does not match renderer geometry {:?}",
                dataset.geometry(),
                self.geometry
            )));
        }
        self.view = self.fit_view(&dataset);
        self.dataset = Some(dataset);
        self.selection = Arc::new(SelectionResult::empty());
        self.hovered = None;
        self.touch_view();
        Ok(())
    }

    /// Initial view for a fresh dataset: Euclidean centers on the
    /// centroid and fits the bounds with 10% padding; Poincaré starts at
    /// the identity view.
    fn fit_view(&self, dataset: &Dataset) -> View {
        match self.geometry {
            GeometryKind::Poincare => View::default_for(GeometryKind::Poincare),
            GeometryKind::Euclidean => {
                let (cx, cy) = dataset.centroid();
                let b = dataset.bounds();
                let hx = (b.max_x - cx).abs().max((cx - b.min_x).abs()).max(1e-12);
                let hy = (b.max_y - cy).abs().max((cy - b.min_y).abs()).max(1e-12);
                let s = (0.8 * self.wf() / 2.0 / hx).min(0.8 * self.hf() / 2.0 / hy);
                let zoom = (s / (self.wf().min(self.hf()) * 0.4)).clamp(0.1, 100.0);
                View::Euclidean(crate::view::EuclideanView {
                    center_x: cx,
                    center_y: cy,
                    zoom,
                })
            }
        }
    }

    pub fn set_view(&mut self, view: View) -> RenderResult<()> {
        if view.geometry() != self.geometry {
            return Err(RenderError::geometry(format!(
                "view geometry {:?} does not match renderer geometry {:?}",
                view.geometry(),
                self.geometry
            )));
        }
        if !view.is_finite() {
            return Err(RenderError::geometry("view contains non-finite components"));
        }
        self.view = view;
        self.touch_view();
        Ok(())
    }

    pub fn touch_view(&mut self) {
        self.last_view_change = Some(Instant::now());
    }

    /// Milliseconds since the last view mutation, or None before any.
    pub fn ms_since_view_change(&self) -> Option<f64> {
        self.last_view_change
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
    }

    pub fn start_pan(&mut self, x: f64, y: f64) {
        self.pan_anchor = Some((x, y));
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        let anchor = self
            .pan_anchor
            .unwrap_or((self.wf() / 2.0, self.hf() / 2.0));
        let w = self.wf();
        let h = self.hf();
        let next = geometry::pan(&mut self.view, w, h, anchor, dx, dy);
        self.pan_anchor = Some(next);
        self.touch_view();
    }

    pub fn zoom(&mut self, anchor_x: f64, anchor_y: f64, delta: f64) {
        let w = self.wf();
        let h = self.hf();
        geometry::zoom(&mut self.view, w, h, anchor_x, anchor_y, delta);
        self.touch_view();
    }

    pub fn set_selection_indices(&mut self, indices: &[u32]) {
        let universe = self.dataset.as_ref().map_or(0, |d| d.len());
        let store = crate::selection::IndexStore::from_indices(indices.to_vec(), universe);
        self.selection = Arc::new(SelectionResult {
            kind: crate::selection::SelectionKind::Indices(store),
            compute_time_ms: 0.0,
        });
    }

    /// Snapshot semantics: deep-clone small selections; share the Arc for
    /// huge or deferred-size ones (documented aliasing, avoids OOM).
    pub fn selection_snapshot(&self) -> Arc<SelectionResult> {
        match self.selection.size() {
            Some(n) if n < SNAPSHOT_CLONE_LIMIT => Arc::new((*self.selection).clone()),
            _ => self.selection.clone(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::geometry(format!(
                "resize to zero area: {width}x{height}"
            )));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// The capability set every renderer implements. Geometry is a runtime
/// tag carried by the dataset and view; implementations are backends.
pub trait Renderer {
    fn geometry(&self) -> GeometryKind;
    fn size(&self) -> (u32, u32);

    /// Dataset geometry must match the renderer's; replaces selection and
    /// hover, rebuilds backend resources, computes the initial view.
    fn set_dataset(&mut self, dataset: Arc<Dataset>) -> RenderResult<()>;
    fn dataset(&self) -> Option<&Arc<Dataset>>;

    fn set_view(&mut self, view: View) -> RenderResult<()>;
    fn get_view(&self) -> View;

    fn render(&mut self) -> RenderResult<()>;
    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()>;
    /// Release backend resources. Further renders recreate them lazily.
    fn destroy(&mut self);

    fn set_selection(&mut self, indices: &[u32]);
    fn get_selection(&self) -> Arc<SelectionResult>;

    /// `None` clears the hover.
    fn set_hovered(&mut self, index: Option<u32>);
    fn hovered(&self) -> Option<u32>;

    fn pan(&mut self, dx: f64, dy: f64);
    fn zoom(&mut self, anchor_x: f64, anchor_y: f64, delta: f64);

    /// Record the pan anchor for the next `pan`. Meaningful for Poincaré;
    /// the default records it anyway so backends can share the base.
    fn start_pan(&mut self, x: f64, y: f64);

    /// End-of-gesture hook; candidate uses it to drop interaction LOD
    /// without waiting out the interaction window.
    fn end_interaction(&mut self) {}

    fn hit_test(&self, sx: f64, sy: f64) -> Option<HitResult>;

    /// `polyline` is flat screen coordinates. Fewer than 3 vertices
    /// yields an empty selection.
    fn lasso_select(&mut self, polyline: &[f32]) -> RenderResult<SelectionResult>;

    fn count_selection(
        &self,
        selection: &SelectionResult,
        options: &CountOptions,
        hooks: &mut CountHooks<'_>,
    ) -> CountOutcome;

    fn project_to_screen(&self, x: f64, y: f64) -> (f64, f64);
    fn unproject_from_screen(&self, sx: f64, sy: f64) -> (f64, f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::GeometryKind;

    #[test]
    fn base_rejects_mismatched_dataset() {
        let mut base =
            RendererBase::new(GeometryKind::Euclidean, &RendererOptions::default()).unwrap();
        let poincare = Arc::new(
            Dataset::new(vec![0.1, 0.1], vec![0], GeometryKind::Poincare).unwrap(),
        );
        assert!(matches!(
            base.set_dataset(poincare),
            Err(RenderError::Geometry(_))
        ));
    }

    #[test]
    fn base_rejects_mismatched_view() {
        let mut base =
            RendererBase::new(GeometryKind::Euclidean, &RendererOptions::default()).unwrap();
        assert!(base
            .set_view(View::default_for(GeometryKind::Poincare))
            .is_err());
        assert!(base
            .set_view(View::default_for(GeometryKind::Euclidean))
            .is_ok());
    }

    #[test]
    fn fit_view_centers_on_centroid_with_padding() {
        let options = RendererOptions {
            width: 1200,
            height: 800,
            ..Default::default()
        };
        let mut base = RendererBase::new(GeometryKind::Euclidean, &options).unwrap();
        let ds = Arc::new(
            Dataset::new(
                vec![-3.0, -1.0, 5.0, 3.0, 1.0, 1.0],
                vec![0, 1, 2],
                GeometryKind::Euclidean,
            )
            .unwrap(),
        );
        base.set_dataset(ds.clone()).unwrap();
        let View::Euclidean(v) = base.view else {
            panic!("wrong view variant")
        };
        let (cx, cy) = ds.centroid();
        assert!((v.center_x - cx).abs() < 1e-12 && (v.center_y - cy).abs() < 1e-12);
        assert!(v.zoom >= 0.1 && v.zoom <= 100.0);

        // Every corner of the data bounds projects inside the padded canvas.
        let b = ds.bounds();
        for (x, y) in [
            (b.min_x, b.min_y),
            (b.min_x, b.max_y),
            (b.max_x, b.min_y),
            (b.max_x, b.max_y),
        ] {
            let (sx, sy) = geometry::project(&base.view, 1200.0, 800.0, x, y);
            assert!((60.0..=1140.0).contains(&sx), "sx = {sx}");
            assert!((40.0..=760.0).contains(&sy), "sy = {sy}");
        }
    }

    #[test]
    fn selection_snapshot_clones_small_sets() {
        let mut base =
            RendererBase::new(GeometryKind::Euclidean, &RendererOptions::default()).unwrap();
        let ds = Arc::new(
            Dataset::new(vec![0.0; 20], vec![0; 10], GeometryKind::Euclidean).unwrap(),
        );
        base.set_dataset(ds).unwrap();
        base.set_selection_indices(&[1, 3, 5]);
        let snap = base.selection_snapshot();
        assert!(!Arc::ptr_eq(&snap, &base.selection));
        assert!(snap.has(3) && !snap.has(2));
    }
}
