//! Euclidean view math: linear scale about a data-space center, Y flipped
//! on screen.

use crate::view::{EuclideanView, EUCLIDEAN_ZOOM_MAX, EUCLIDEAN_ZOOM_MIN};

/// Screen pixels per data unit at this view and canvas size.
#[inline]
pub fn scale(view: &EuclideanView, width: f64, height: f64) -> f64 {
    width.min(height) * 0.4 * view.zoom
}

#[inline]
pub fn project(view: &EuclideanView, width: f64, height: f64, x: f64, y: f64) -> (f64, f64) {
    let s = scale(view, width, height);
    (
        width / 2.0 + (x - view.center_x) * s,
        height / 2.0 - (y - view.center_y) * s,
    )
}

#[inline]
pub fn unproject(view: &EuclideanView, width: f64, height: f64, sx: f64, sy: f64) -> (f64, f64) {
    let s = scale(view, width, height);
    (
        view.center_x + (sx - width / 2.0) / s,
        view.center_y - (sy - height / 2.0) / s,
    )
}

/// Pan by a screen delta. Anchor-invariant by construction: every data
/// point shifts by exactly (dx, dy) on screen.
pub fn pan(view: &mut EuclideanView, width: f64, height: f64, dx: f64, dy: f64) {
    let s = scale(view, width, height);
    view.center_x -= dx / s;
    view.center_y += dy / s;
}

/// Zoom by 1.1^delta, clamped, keeping the data point under the anchor
/// fixed on screen.
pub fn zoom(
    view: &mut EuclideanView,
    width: f64,
    height: f64,
    anchor_x: f64,
    anchor_y: f64,
    delta: f64,
) {
    let (ax, ay) = unproject(view, width, height, anchor_x, anchor_y);
    view.zoom = (view.zoom * 1.1f64.powf(delta)).clamp(EUCLIDEAN_ZOOM_MIN, EUCLIDEAN_ZOOM_MAX);
    let s = scale(view, width, height);
    // Re-derive the center so (ax, ay) projects back to the anchor.
    view.center_x = ax - (anchor_x - width / 2.0) / s;
    view.center_y = ay + (anchor_y - height / 2.0) / s;
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: f64 = 1200.0;
    const H: f64 = 800.0;

    #[test]
    fn project_unproject_roundtrip() {
        let v = EuclideanView {
            center_x: 0.3,
            center_y: -1.2,
            zoom: 3.7,
        };
        for &(x, y) in &[(0.0, 0.0), (1.5, -2.25), (-10.0, 4.0)] {
            let (sx, sy) = project(&v, W, H, x, y);
            let (bx, by) = unproject(&v, W, H, sx, sy);
            assert!((bx - x).abs() < 1e-9 && (by - y).abs() < 1e-9);
        }
    }

    #[test]
    fn y_axis_is_flipped_on_screen() {
        let v = EuclideanView::default();
        let (_, sy_up) = project(&v, W, H, 0.0, 1.0);
        let (_, sy_down) = project(&v, W, H, 0.0, -1.0);
        assert!(sy_up < H / 2.0 && sy_down > H / 2.0);
    }

    #[test]
    fn pan_is_anchor_invariant() {
        let mut v = EuclideanView {
            center_x: 1.0,
            center_y: 2.0,
            zoom: 2.0,
        };
        let p = unproject(&v, W, H, 400.0, 266.0);
        pan(&mut v, W, H, 200.0, 134.0);
        let (sx, sy) = project(&v, W, H, p.0, p.1);
        assert!((sx - 600.0).abs() < 1e-9);
        assert!((sy - 400.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_clamps_and_keeps_anchor() {
        let mut v = EuclideanView::default();
        let anchor = (900.0, 200.0);
        let p = unproject(&v, W, H, anchor.0, anchor.1);
        zoom(&mut v, W, H, anchor.0, anchor.1, 5.0);
        let (sx, sy) = project(&v, W, H, p.0, p.1);
        assert!((sx - anchor.0).abs() < 1e-9 && (sy - anchor.1).abs() < 1e-9);

        zoom(&mut v, W, H, anchor.0, anchor.1, 1e6);
        assert_eq!(v.zoom, 100.0);
        zoom(&mut v, W, H, anchor.0, anchor.1, -1e6);
        assert_eq!(v.zoom, 0.1);
    }
}
