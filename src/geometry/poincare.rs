//! Poincaré disk view math.
//!
//! The view is a Möbius translation parameter `a` (|a| < 1) plus a display
//! zoom that scales the disk on screen. Möbius transforms that fix the
//! disk are hyperbolic isometries, so panning is exact navigation of
//! hyperbolic space rather than a screen-space translation.
//!
//! All denominators are guarded: degenerate Möbius evaluations clamp
//! radially to 0.999 instead of producing NaN, and the pan solver falls
//! back to `a' = -d2` when its determinant collapses. Non-finite values
//! never reach the view state.

use glam::DVec2;

use crate::view::{PoincareView, POINCARE_ZOOM_MAX, POINCARE_ZOOM_MIN};

/// Degenerate-denominator guard for Möbius evaluation.
const DEN_EPS: f64 = 1e-12;
/// Radial clamp applied to degenerate or boundary-escaping results.
const DISK_CLAMP: f64 = 0.999;
/// Pan solver determinant guard.
const PAN_DET_EPS: f64 = 1e-10;
/// Disk-coordinate clamp for pan gesture endpoints.
const PAN_INPUT_CLAMP: f64 = 0.95;
/// Zoom re-anchors only when the anchor moved farther than this (px).
const ZOOM_REANCHOR_PX: f64 = 0.5;

/// Clamp a disk point to radius `max_r` if it lies outside.
#[inline]
fn clamp_radial(p: DVec2, max_r: f64) -> DVec2 {
    let len = p.length();
    if len > max_r {
        p * (max_r / len)
    } else {
        p
    }
}

/// Möbius translation T_a(z) = (z - a) / (1 - conj(a)·z).
///
/// Maps `a` to the origin; a disk automorphism for |a| < 1.
pub fn mobius(a: DVec2, z: DVec2) -> DVec2 {
    let num = z - a;
    let den_re = 1.0 - (a.x * z.x + a.y * z.y);
    let den_im = -(a.x * z.y - a.y * z.x);
    let den_sq = den_re * den_re + den_im * den_im;
    if den_sq < DEN_EPS * DEN_EPS {
        let len = num.length();
        if len > 0.0 {
            return num * (DISK_CLAMP / len);
        }
        return DVec2::new(DISK_CLAMP, 0.0);
    }
    // num / den via multiplication by the conjugate.
    let w = DVec2::new(
        (num.x * den_re + num.y * den_im) / den_sq,
        (num.y * den_re - num.x * den_im) / den_sq,
    );
    if w.length_squared() >= 1.0 {
        return clamp_radial(w, DISK_CLAMP);
    }
    w
}

/// Inverse Möbius translation T_a⁻¹(w) = (w + a) / (1 + conj(a)·w).
pub fn mobius_inv(a: DVec2, w: DVec2) -> DVec2 {
    let num = w + a;
    let den_re = 1.0 + (a.x * w.x + a.y * w.y);
    let den_im = a.x * w.y - a.y * w.x;
    let den_sq = den_re * den_re + den_im * den_im;
    if den_sq < DEN_EPS * DEN_EPS {
        let len = num.length();
        if len > 0.0 {
            return num * (DISK_CLAMP / len);
        }
        return DVec2::new(DISK_CLAMP, 0.0);
    }
    let z = DVec2::new(
        (num.x * den_re + num.y * den_im) / den_sq,
        (num.y * den_re - num.x * den_im) / den_sq,
    );
    if z.length_squared() >= 1.0 {
        return clamp_radial(z, DISK_CLAMP);
    }
    z
}

/// Screen radius of the unit disk in CSS pixels.
#[inline]
pub fn disk_radius(view: &PoincareView, width: f64, height: f64) -> f64 {
    width.min(height) * 0.45 * view.display_zoom
}

#[inline]
fn a_vec(view: &PoincareView) -> DVec2 {
    DVec2::new(view.ax, view.ay)
}

/// Screen coordinates to disk coordinates (unclamped).
#[inline]
pub fn screen_to_disk(
    view: &PoincareView,
    width: f64,
    height: f64,
    sx: f64,
    sy: f64,
) -> DVec2 {
    let r = disk_radius(view, width, height);
    DVec2::new((sx - width / 2.0) / r, (height / 2.0 - sy) / r)
}

pub fn project(view: &PoincareView, width: f64, height: f64, x: f64, y: f64) -> (f64, f64) {
    let w = mobius(a_vec(view), DVec2::new(x, y));
    let r = disk_radius(view, width, height);
    (width / 2.0 + w.x * r, height / 2.0 - w.y * r)
}

pub fn unproject(view: &PoincareView, width: f64, height: f64, sx: f64, sy: f64) -> (f64, f64) {
    let mut d = screen_to_disk(view, width, height, sx, sy);
    if d.length_squared() >= 1.0 {
        d = clamp_radial(d, DISK_CLAMP);
    }
    let z = mobius_inv(a_vec(view), d);
    (z.x, z.y)
}

/// Anchor-invariant pan: solve for the translation parameter `a'` under
/// which the data point at screen position `from` projects to `to`.
///
/// The constraint T_{a'}(p) = d₂ is linear in a': with
/// A = d₂ₓpₓ − d₂_yp_y and B = d₂ₓp_y + d₂_ypₓ the system has
/// determinant A² + B² − 1, strictly negative inside the disk. Near-zero
/// determinant falls back to a' = −d₂ (the translation centering d₂).
pub fn pan(
    view: &mut PoincareView,
    width: f64,
    height: f64,
    from: (f64, f64),
    to: (f64, f64),
) {
    let d1 = clamp_radial(
        screen_to_disk(view, width, height, from.0, from.1),
        PAN_INPUT_CLAMP,
    );
    let d2 = clamp_radial(
        screen_to_disk(view, width, height, to.0, to.1),
        PAN_INPUT_CLAMP,
    );
    let p = mobius_inv(a_vec(view), d1);

    let a_big = d2.x * p.x - d2.y * p.y;
    let b_big = d2.x * p.y + d2.y * p.x;
    let det = a_big * a_big + b_big * b_big - 1.0;

    let mut a_new = if det.abs() < PAN_DET_EPS {
        -d2
    } else {
        let rhs = DVec2::new(p.x - d2.x, d2.y - p.y);
        DVec2::new(
            (-rhs.x * (1.0 + a_big) + b_big * rhs.y) / det,
            ((1.0 - a_big) * rhs.y - b_big * rhs.x) / det,
        )
    };

    if !a_new.x.is_finite() || !a_new.y.is_finite() {
        a_new = -d2;
    }
    if a_new.length_squared() >= 1.0 {
        a_new = clamp_radial(a_new, 0.99);
    }
    view.ax = a_new.x;
    view.ay = a_new.y;
}

/// Anchored zoom: scale the display zoom by 1.1^delta (clamped), then pan
/// the anchor data point back under the cursor if it drifted more than
/// half a pixel.
pub fn zoom(
    view: &mut PoincareView,
    width: f64,
    height: f64,
    anchor_x: f64,
    anchor_y: f64,
    delta: f64,
) {
    let (px, py) = unproject(view, width, height, anchor_x, anchor_y);
    view.display_zoom =
        (view.display_zoom * 1.1f64.powf(delta)).clamp(POINCARE_ZOOM_MIN, POINCARE_ZOOM_MAX);
    let (sx, sy) = project(view, width, height, px, py);
    let drift = ((sx - anchor_x).powi(2) + (sy - anchor_y).powi(2)).sqrt();
    if drift > ZOOM_REANCHOR_PX {
        pan(view, width, height, (sx, sy), (anchor_x, anchor_y));
    }
}

/// Hyperbolic distance between two disk points:
/// 2·atanh(|z₁−z₂| / |1−z̄₁z₂|), ratio clamped below 1.
pub fn hyperbolic_distance(z1: DVec2, z2: DVec2) -> f64 {
    let num = (z1 - z2).length();
    let den_re = 1.0 - (z1.x * z2.x + z1.y * z2.y);
    let den_im = -(z1.x * z2.y - z1.y * z2.x);
    let den = (den_re * den_re + den_im * den_im).sqrt();
    let ratio = if den > 0.0 { num / den } else { 1.0 };
    2.0 * ratio.min(1.0 - 1e-10).atanh()
}

/// Conservative data-space radius covering a screen hit radius at `z`.
///
/// Bounds the inverse Möbius derivative |T'_a(z)| = (1−|a|²)/|1−āz|² by
/// iterating the fixed point r ← r_px·(D₀+|a|·r)²/(R·(1−|a|²)); the
/// result over-covers so the spatial-index AABB never misses a hit.
pub fn conservative_data_radius(
    view: &PoincareView,
    width: f64,
    height: f64,
    z: DVec2,
    r_screen: f64,
) -> f64 {
    let r_disk = disk_radius(view, width, height);
    let a = a_vec(view);
    let a_len = a.length();
    let one_minus_a_sq = (1.0 - a.length_squared()).max(1e-12);
    let den_re = 1.0 - (a.x * z.x + a.y * z.y);
    let den_im = -(a.x * z.y - a.y * z.x);
    let d0 = (den_re * den_re + den_im * den_im).sqrt();

    let mut r = 0.0;
    for _ in 0..5 {
        let scaled = d0 + a_len * r;
        r = r_screen * scaled * scaled / (r_disk * one_minus_a_sq);
    }
    (r * 1.001).min(1.999)
}
