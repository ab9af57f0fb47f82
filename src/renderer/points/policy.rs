//! Adaptive quality policy for the GPU point renderer.
//!
//! Pure functions and a small hysteresis state, kept free of GPU types so
//! every decision is unit-testable. Two budgets drive the offscreen
//! resolution: a pixel budget tiered by point count and a fragment budget
//! over the estimated per-frame fill cost. A separate (smaller) circle
//! budget decides when the antialiased circle shader gives way to flat
//! squares.

use std::f64::consts::PI;

use serde::Deserialize;

/// A canvas at or above this many CSS pixels counts as "large" for the
/// tightest pixel-budget tier.
const LARGE_CANVAS_CSS_PX: f64 = 1.2e6;

/// Hysteresis release fraction for the square/circle switch.
const SHAPE_RELEASE: f64 = 0.75;

/// Below this offscreen DPR the AA circle shader keeps its cost but not
/// its quality, so squares are forced.
pub const FORCE_SQUARE_DPR: f64 = 0.75;

/// Offscreen pixel budget by point count tier.
pub fn pixel_budget(point_count: usize, css_pixels: f64) -> f64 {
    if point_count >= 1_000_000 {
        if css_pixels >= LARGE_CANVAS_CSS_PX {
            2.0e5
        } else {
            5.0e5
        }
    } else if point_count >= 500_000 {
        1.4e6
    } else if point_count >= 250_000 {
        2.1e6
    } else {
        8.0e6
    }
}

/// Upper DPR cap by point count tier.
pub fn dpr_cap(point_count: usize) -> f64 {
    if point_count >= 1_000_000 {
        1.0
    } else if point_count >= 500_000 {
        1.25
    } else {
        1.5
    }
}

/// Lower DPR floor by point count tier. `min_points_dpr` is the
/// configured floor for the heaviest tier.
pub fn dpr_floor(point_count: usize, min_points_dpr: f64) -> f64 {
    if point_count >= 1_000_000 {
        min_points_dpr
    } else if point_count >= 500_000 {
        0.75
    } else {
        1.0
    }
}

/// Inputs to the offscreen-DPR decision.
#[derive(Debug, Clone, Copy)]
pub struct DprInputs {
    pub point_count: usize,
    /// Points the base pass will actually draw (post-LOD).
    pub draw_count: usize,
    pub css_width: f64,
    pub css_height: f64,
    pub device_dpr: f64,
    pub point_radius_px: f64,
    pub min_points_dpr: f64,
    pub fragment_budget: f64,
}

/// Offscreen points-buffer DPR: min(device, tier cap, pixel-budget DPR,
/// fragment-budget DPR), clamped up to the tier floor.
pub fn points_dpr(inputs: &DprInputs) -> f64 {
    let css_pixels = inputs.css_width * inputs.css_height;
    let budget = pixel_budget(inputs.point_count, css_pixels);
    let dpr_pixels = (budget / css_pixels.max(1.0)).sqrt();

    let frag_per_point = PI * inputs.point_radius_px * inputs.point_radius_px;
    let dpr_fragments =
        (inputs.fragment_budget / (inputs.draw_count.max(1) as f64 * frag_per_point)).sqrt();

    let chosen = inputs
        .device_dpr
        .min(dpr_cap(inputs.point_count))
        .min(dpr_pixels)
        .min(dpr_fragments);
    chosen.max(dpr_floor(inputs.point_count, inputs.min_points_dpr))
}

/// Estimated fragments the base pass will shade this frame.
pub fn fragment_estimate(draw_count: usize, point_radius_px: f64, points_dpr: f64) -> f64 {
    draw_count as f64 * PI * point_radius_px * point_radius_px * points_dpr * points_dpr
}

/// Square/circle switch with hysteresis: squares engage at the circle
/// budget and release at 75% of it, so the shape cannot flap across
/// frames that straddle the boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeState {
    squares: bool,
}

impl ShapeState {
    pub fn squares(&self) -> bool {
        self.squares
    }

    pub fn update(&mut self, fragment_estimate: f64, circle_budget: f64, points_dpr: f64) -> bool {
        if points_dpr <= FORCE_SQUARE_DPR {
            self.squares = true;
        } else if fragment_estimate >= circle_budget {
            self.squares = true;
        } else if fragment_estimate <= SHAPE_RELEASE * circle_budget {
            self.squares = false;
        }
        self.squares
    }
}

/// Deterministic stride subsample: target count, then indices
/// 0, step, 2·step, …
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subsample {
    pub target: usize,
    pub step: usize,
    pub count: usize,
}

pub fn stride_subsample(n: usize) -> Subsample {
    let target = n.min(250_000usize.max(4_000_000usize.min(n / 4)));
    let target = target.max(1).min(n.max(1));
    let step = (n / target).max(1);
    let count = if n == 0 { 0 } else { (n - 1) / step + 1 };
    Subsample {
        target,
        step,
        count,
    }
}

/// Whether the base pass draws the LOD subsample this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LodPolicy {
    /// Spec behavior: LOD during Poincaré interaction on big datasets,
    /// and always above the base draw cap.
    Auto,
    /// Offline-quality rendering: never subsample the base pass.
    Never,
}

#[derive(Debug, Clone, Copy)]
pub struct LodInputs {
    pub policy: LodPolicy,
    pub point_count: usize,
    pub poincare: bool,
    pub interacting: bool,
    pub interaction_min_points: usize,
    pub max_base_draw_points: usize,
}

pub fn use_lod(inputs: &LodInputs) -> bool {
    if inputs.policy == LodPolicy::Never {
        return false;
    }
    if inputs.point_count > inputs.max_base_draw_points {
        return true;
    }
    inputs.interacting && inputs.poincare && inputs.point_count >= inputs.interaction_min_points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(point_count: usize, draw_count: usize) -> DprInputs {
        DprInputs {
            point_count,
            draw_count,
            css_width: 1200.0,
            css_height: 800.0,
            device_dpr: 2.0,
            point_radius_px: 3.0,
            min_points_dpr: 0.35,
            fragment_budget: 2.4e7,
        }
    }

    #[test]
    fn pixel_budget_tiers() {
        assert_eq!(pixel_budget(2_000_000, 2e6), 2.0e5);
        assert_eq!(pixel_budget(2_000_000, 9.6e5), 5.0e5);
        assert_eq!(pixel_budget(600_000, 9.6e5), 1.4e6);
        assert_eq!(pixel_budget(300_000, 9.6e5), 2.1e6);
        assert_eq!(pixel_budget(10_000, 9.6e5), 8.0e6);
    }

    #[test]
    fn small_datasets_keep_device_dpr_up_to_cap() {
        let dpr = points_dpr(&inputs(10_000, 10_000));
        assert_eq!(dpr, 1.5); // device 2.0 capped by tier ceiling
    }

    #[test]
    fn heavy_datasets_drop_toward_the_floor() {
        let dpr = points_dpr(&inputs(10_000_000, 4_000_000));
        assert!(dpr < 1.0);
        assert!(dpr >= 0.35);
    }

    #[test]
    fn floor_wins_over_budgets() {
        let mut i = inputs(20_000_000, 20_000_000);
        i.fragment_budget = 1.0; // absurdly tight
        assert_eq!(points_dpr(&i), 0.35);
    }

    #[test]
    fn shape_hysteresis_does_not_flap() {
        let mut s = ShapeState::default();
        let budget = 8.0e6;
        assert!(!s.update(budget * 0.5, budget, 1.0));
        assert!(s.update(budget * 1.01, budget, 1.0));
        // Between release and engage thresholds: hold previous state.
        assert!(s.update(budget * 0.9, budget, 1.0));
        assert!(!s.update(budget * 0.7, budget, 1.0));
        assert!(!s.update(budget * 0.9, budget, 1.0));
    }

    #[test]
    fn low_dpr_forces_squares() {
        let mut s = ShapeState::default();
        assert!(s.update(0.0, 8.0e6, 0.5));
    }

    #[test]
    fn subsample_tiers() {
        // Below 1M: target = max(250k, n/4) capped at n.
        let s = stride_subsample(100_000);
        assert_eq!(s.target, 100_000);
        assert_eq!(s.step, 1);
        assert_eq!(s.count, 100_000);

        let s = stride_subsample(2_000_000);
        assert_eq!(s.target, 500_000);
        assert_eq!(s.step, 4);
        assert_eq!(s.count, 500_000);

        // Huge n: target capped at 4M.
        let s = stride_subsample(20_000_000);
        assert_eq!(s.target, 4_000_000);
        assert_eq!(s.step, 5);
        assert_eq!(s.count, 4_000_000);
    }

    #[test]
    fn lod_active_above_base_draw_cap_even_when_idle() {
        let i = LodInputs {
            policy: LodPolicy::Auto,
            point_count: 5_000_000,
            poincare: false,
            interacting: false,
            interaction_min_points: 2_000_000,
            max_base_draw_points: 4_000_000,
        };
        assert!(use_lod(&i));
    }

    #[test]
    fn lod_during_poincare_interaction_only() {
        let mut i = LodInputs {
            policy: LodPolicy::Auto,
            point_count: 3_000_000,
            poincare: true,
            interacting: true,
            interaction_min_points: 2_000_000,
            max_base_draw_points: 4_000_000,
        };
        assert!(use_lod(&i));
        i.poincare = false;
        assert!(!use_lod(&i));
        i.poincare = true;
        i.interacting = false;
        assert!(!use_lod(&i));
        i.policy = LodPolicy::Never;
        i.interacting = true;
        assert!(!use_lod(&i));
    }
}
