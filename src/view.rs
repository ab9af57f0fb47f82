//! Tagged view state for both geometries.
//!
//! Views are owned by renderers and mutated only through pan/zoom/set_view;
//! the clamping rules live in the geometry math modules.

use serde::{Deserialize, Serialize};

use crate::dataset::GeometryKind;

/// Zoom bounds for the Euclidean view.
pub const EUCLIDEAN_ZOOM_MIN: f64 = 0.1;
pub const EUCLIDEAN_ZOOM_MAX: f64 = 100.0;

/// Display-zoom bounds for the Poincaré view.
pub const POINCARE_ZOOM_MIN: f64 = 0.5;
pub const POINCARE_ZOOM_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EuclideanView {
    pub center_x: f64,
    pub center_y: f64,
    /// Always within [0.1, 100]; the zoom operation clamps.
    pub zoom: f64,
}

impl Default for EuclideanView {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoincareView {
    /// Möbius translation parameter; invariant ax² + ay² < 1.
    pub ax: f64,
    pub ay: f64,
    /// Always within [0.5, 10]; the zoom operation clamps.
    pub display_zoom: f64,
}

impl Default for PoincareView {
    fn default() -> Self {
        Self {
            ax: 0.0,
            ay: 0.0,
            display_zoom: 1.0,
        }
    }
}

impl PoincareView {
    /// Squared magnitude of the translation parameter.
    pub fn a_norm_sq(&self) -> f64 {
        self.ax * self.ax + self.ay * self.ay
    }
}

/// View state tagged by geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "geometry", rename_all = "lowercase")]
pub enum View {
    Euclidean(EuclideanView),
    Poincare(PoincareView),
}

impl View {
    pub fn geometry(&self) -> GeometryKind {
        match self {
            View::Euclidean(_) => GeometryKind::Euclidean,
            View::Poincare(_) => GeometryKind::Poincare,
        }
    }

    /// Identity view for a geometry.
    pub fn default_for(kind: GeometryKind) -> Self {
        match kind {
            GeometryKind::Euclidean => View::Euclidean(EuclideanView::default()),
            GeometryKind::Poincare => View::Poincare(PoincareView::default()),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            View::Euclidean(v) => {
                v.center_x.is_finite() && v.center_y.is_finite() && v.zoom.is_finite()
            }
            View::Poincare(v) => v.ax.is_finite() && v.ay.is_finite() && v.display_zoom.is_finite(),
        }
    }
}
