//! scatterforge: an interactive large-N scatterplot engine for 2D
//! embeddings under Euclidean and Poincaré-disk geometry.
//!
//! The engine is built around a dual-implementation discipline: a naive
//! CPU [`renderer::reference::ReferenceRenderer`] defines the semantics,
//! and the GPU [`renderer::points::PointsRenderer`] reproduces them at
//! 10⁷-point scale behind an adaptive quality policy. Both expose the
//! same [`renderer::Renderer`] capability set; the
//! [`harness::accuracy`] suite drives them side by side and the
//! [`harness::perf`] suite measures the candidate under synthetic
//! workloads.
//!
//! Exact geometric semantics (hit-testing, lasso membership, pan/zoom
//! anchoring) always run on the CPU in f64, backed by a uniform spatial
//! grid; the GPU path is free to subsample, cache and re-scale without
//! ever changing what a click means.

pub mod color;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod export;
pub mod geometry;
pub mod harness;
pub mod renderer;
pub mod selection;
pub mod spatial;
pub mod view;

pub use controller::{InteractionController, Modifiers, PointerEvent, WheelEvent};
pub use dataset::{Dataset, GeometryKind};
pub use error::{RenderError, RenderResult};
pub use renderer::points::{PointsOptions, PointsRenderer};
pub use renderer::reference::ReferenceRenderer;
pub use renderer::{HitResult, Renderer, RendererOptions};
pub use selection::{SelectionKind, SelectionResult};
pub use view::{EuclideanView, PoincareView, View};
