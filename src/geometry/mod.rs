//! Pure view math for both geometries.
//!
//! Everything here is a pure function over (view, canvas size, point); the
//! renderers own the view state and call through this module for every
//! projection, unprojection, pan and zoom. Math runs in f64; datasets
//! store f32 and are widened at the call site.

pub mod euclidean;
pub mod poincare;

use crate::view::View;

/// Project a data-space point to screen (CSS pixel) coordinates.
#[inline]
pub fn project(view: &View, width: f64, height: f64, x: f64, y: f64) -> (f64, f64) {
    match view {
        View::Euclidean(v) => euclidean::project(v, width, height, x, y),
        View::Poincare(v) => poincare::project(v, width, height, x, y),
    }
}

/// Invert `project`. Poincaré screen points outside the disk are clamped
/// radially before the inverse Möbius transform.
#[inline]
pub fn unproject(view: &View, width: f64, height: f64, sx: f64, sy: f64) -> (f64, f64) {
    match view {
        View::Euclidean(v) => euclidean::unproject(v, width, height, sx, sy),
        View::Poincare(v) => poincare::unproject(v, width, height, sx, sy),
    }
}

/// Anchor-invariant pan. `anchor` is the screen position the gesture
/// currently holds (Poincaré needs it; Euclidean pans are translation-
/// invariant and ignore it). Returns the updated anchor position.
pub fn pan(
    view: &mut View,
    width: f64,
    height: f64,
    anchor: (f64, f64),
    dx: f64,
    dy: f64,
) -> (f64, f64) {
    match view {
        View::Euclidean(v) => {
            euclidean::pan(v, width, height, dx, dy);
        }
        View::Poincare(v) => {
            let to = (anchor.0 + dx, anchor.1 + dy);
            poincare::pan(v, width, height, anchor, to);
            return to;
        }
    }
    (anchor.0 + dx, anchor.1 + dy)
}

/// Anchored zoom: the data point under (anchor_x, anchor_y) stays under
/// the cursor (within 0.5 px for Poincaré).
pub fn zoom(view: &mut View, width: f64, height: f64, anchor_x: f64, anchor_y: f64, delta: f64) {
    match view {
        View::Euclidean(v) => euclidean::zoom(v, width, height, anchor_x, anchor_y, delta),
        View::Poincare(v) => poincare::zoom(v, width, height, anchor_x, anchor_y, delta),
    }
}
