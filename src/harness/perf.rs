//! Performance harness: wall-clock measurement of the interactive
//! operations under synthetic workloads.
//!
//! Hand-rolled timing with warmup, per geometry × point count. Headless
//! frames have no vsync, so "frame interval" is the measured wall time of
//! submit-to-submit; derived FPS is 1000 / interval.

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::time::Instant;

use crate::dataset::GeometryKind;
use crate::harness::synth::clustered_dataset;
use crate::renderer::Renderer;
use crate::selection::count::{CountHooks, CountOptions};

#[derive(Debug, Clone, Serialize)]
pub struct PerfConfig {
    pub geometry: GeometryKind,
    pub point_count: usize,
    pub clusters: usize,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    /// Timed frames per phase (a few warmup frames are always added).
    pub frames: usize,
    pub warmup_frames: usize,
    pub hit_test_samples: usize,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryKind::Euclidean,
            point_count: 100_000,
            clusters: 10,
            seed: 42,
            width: 1200,
            height: 800,
            frames: 60,
            warmup_frames: 5,
            hit_test_samples: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerfReport {
    pub config: PerfConfig,
    pub dataset_gen_ms: f64,
    pub set_dataset_ms: f64,
    /// CPU time spent inside render() per frame.
    pub submit_ms_avg: f64,
    /// Wall interval between consecutive frames and its derived FPS.
    pub frame_interval_ms_avg: f64,
    pub derived_fps: f64,
    pub hit_test_ms_avg: f64,
    /// Lasso end-to-end: selection plus exact-count materialization.
    pub lasso_ms: f64,
    pub lasso_count: usize,
    pub pan_frame_ms_avg: f64,
    pub hover_frame_ms_avg: f64,
    /// Approximate engine-owned allocation footprint.
    pub approx_engine_bytes: usize,
}

fn ms(t: Instant) -> f64 {
    t.elapsed().as_secs_f64() * 1000.0
}

/// Drive the full measurement suite against one renderer.
pub fn run_suite(renderer: &mut dyn Renderer, config: &PerfConfig) -> Result<PerfReport> {
    let t = Instant::now();
    let dataset = clustered_dataset(
        config.seed,
        config.point_count,
        config.clusters,
        config.geometry,
    );
    let dataset_gen_ms = ms(t);

    let t = Instant::now();
    renderer.set_dataset(dataset.clone())?;
    let set_dataset_ms = ms(t);

    let (w, h) = (config.width as f64, config.height as f64);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed ^ 0x5f5f);

    // Static frames: submit cost and frame-to-frame interval.
    for _ in 0..config.warmup_frames {
        renderer.render()?;
    }
    let mut submit_total = 0.0;
    let loop_start = Instant::now();
    for _ in 0..config.frames {
        let t = Instant::now();
        renderer.render()?;
        submit_total += ms(t);
    }
    let frame_interval_ms_avg = ms(loop_start) / config.frames as f64;
    let submit_ms_avg = submit_total / config.frames as f64;

    // Hit-testing over random screen positions.
    let t = Instant::now();
    for _ in 0..config.hit_test_samples {
        let sx = rng.gen_range(0.0..w);
        let sy = rng.gen_range(0.0..h);
        let _ = renderer.hit_test(sx, sy);
    }
    let hit_test_ms_avg = ms(t) / config.hit_test_samples.max(1) as f64;

    // Lasso end-to-end, including exact-count materialization for
    // geometry selections.
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
    let t = Instant::now();
    let selection = renderer.lasso_select(&polyline)?;
    let lasso_count = match selection.size() {
        Some(size) => size,
        None => renderer
            .count_selection(&selection, &CountOptions::default(), &mut CountHooks::default())
            .count(),
    };
    let lasso_ms = ms(t);

    // Pan: drive frames along a 5-keypoint loop, deltas issued
    // synchronously frame by frame.
    let keypoints = [
        (w * 0.5, h * 0.5),
        (w * 0.7, h * 0.4),
        (w * 0.6, h * 0.7),
        (w * 0.3, h * 0.6),
        (w * 0.4, h * 0.3),
    ];
    let pan_frames = config.frames.max(60);
    renderer.start_pan(keypoints[0].0, keypoints[0].1);
    let t = Instant::now();
    for f in 0..pan_frames {
        let a = keypoints[f % keypoints.len()];
        let b = keypoints[(f + 1) % keypoints.len()];
        renderer.pan((b.0 - a.0) / 8.0, (b.1 - a.1) / 8.0);
        renderer.render()?;
    }
    let pan_frame_ms_avg = ms(t) / pan_frames as f64;
    renderer.end_interaction();

    // Hover: circular mouse path, one hit-test + hover update per frame.
    let t = Instant::now();
    for f in 0..config.frames {
        let a = f as f64 * std::f64::consts::TAU / config.frames as f64;
        let sx = w / 2.0 + w * 0.25 * a.cos();
        let sy = h / 2.0 + h * 0.25 * a.sin();
        let hit = renderer.hit_test(sx, sy).map(|hit| hit.index);
        renderer.set_hovered(hit);
        renderer.render()?;
    }
    let hover_frame_ms_avg = ms(t) / config.frames as f64;

    // Engine-owned allocations: dataset storage, spatial index, and the
    // current selection, estimated from their known layouts.
    let n = dataset.len();
    let approx_engine_bytes = n * 8      // positions f32x2
        + n * 2                          // labels
        + n * 4 + (n / 64 + 2) * 4       // grid ids + offsets (≈64/cell)
        + match selection.size() {
            Some(size) => size * 4,
            None => n / 8,               // geometry predicate + bitset-scale bound
        };

    Ok(PerfReport {
        config: config.clone(),
        dataset_gen_ms,
        set_dataset_ms,
        submit_ms_avg,
        frame_interval_ms_avg,
        derived_fps: if frame_interval_ms_avg > 0.0 {
            1000.0 / frame_interval_ms_avg
        } else {
            f64::INFINITY
        },
        hit_test_ms_avg,
        lasso_ms,
        lasso_count,
        pan_frame_ms_avg,
        hover_frame_ms_avg,
        approx_engine_bytes,
    })
}
