//! Cooperative exact counting for geometry selections.
//!
//! There is no animation-frame primitive here, so the scheduling point is
//! a monotonic-timer budget: the walk checks elapsed wall time between
//! cells and, past the budget, reports progress, invokes the caller's
//! yield hook and cancellation predicate, then resumes. Cancellation is
//! cooperative and returns the partial count; it never errors.

use std::time::Instant;

use crate::selection::GeometrySelection;
use crate::spatial::SpatialGrid;

#[derive(Debug, Clone, Copy)]
pub struct CountOptions {
    /// Wall-time budget between yields, in milliseconds.
    pub yield_every_ms: f64,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self { yield_every_ms: 8.0 }
    }
}

/// Progress snapshot handed to the caller at each yield point.
#[derive(Debug, Clone, Copy)]
pub struct CountProgress {
    /// Candidates visited so far.
    pub visited: usize,
    /// Total candidates the walk will visit.
    pub total: usize,
    /// Matches so far.
    pub matched: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOutcome {
    Exact(usize),
    /// The caller cancelled; carries the partial count.
    Cancelled(usize),
}

impl CountOutcome {
    pub fn count(&self) -> usize {
        match *self {
            CountOutcome::Exact(n) | CountOutcome::Cancelled(n) => n,
        }
    }
}

/// Hooks threaded through a counting run. All optional.
#[derive(Default)]
pub struct CountHooks<'a> {
    pub should_cancel: Option<&'a mut dyn FnMut() -> bool>,
    pub on_progress: Option<&'a mut dyn FnMut(CountProgress)>,
    /// Invoked at each budget expiry; the host pumps its loop here.
    pub yield_now: Option<&'a mut dyn FnMut()>,
}

/// Exact membership count of a geometry selection over the spatial index.
pub fn count_geometry_selection(
    grid: &SpatialGrid,
    selection: &GeometrySelection,
    options: &CountOptions,
    hooks: &mut CountHooks<'_>,
) -> CountOutcome {
    let Some(bounds) = &selection.bounds else {
        return CountOutcome::Exact(0);
    };
    let rect = grid.cell_rect(bounds.xmin, bounds.ymin, bounds.xmax, bounds.ymax);
    let total = grid.count_in_rect(&rect);
    let dataset = selection.dataset().clone();

    let mut matched = 0usize;
    let mut visited = 0usize;
    let mut last_yield = Instant::now();

    for cy in rect.cy0..=rect.cy1 {
        for cx in rect.cx0..=rect.cx1 {
            for &id in grid.cell_ids(cx, cy) {
                let i = id as usize;
                let x = dataset.x(i);
                let y = dataset.y(i);
                if bounds.contains(x, y)
                    && crate::selection::polygon::contains(&selection.polygon, x, y)
                {
                    matched += 1;
                }
                visited += 1;
            }

            if last_yield.elapsed().as_secs_f64() * 1000.0 >= options.yield_every_ms {
                if let Some(progress) = hooks.on_progress.as_mut() {
                    progress(CountProgress {
                        visited,
                        total,
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
    }

    if let Some(progress) = hooks.on_progress.as_mut() {
        progress(CountProgress {
            visited,
            total,
            matched,
        });
    }
    CountOutcome::Exact(matched)
}
