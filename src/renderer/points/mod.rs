//! Candidate renderer: GPU point sprites with adaptive quality.
//!
//! All view math is delegated to the geometry modules; the GPU path only
//! places sprites. Context acquisition is lazy (first render), and every
//! CPU-visible semantic — hit-testing, lasso membership, counting — runs
//! against the full dataset even when the GPU base layer is subsampled.

pub mod context;
pub mod palette;
pub mod pipelines;
pub mod policy;

use std::sync::Arc;
use std::time::Instant;

use glam::DVec2;
use serde::Deserialize;

use crate::dataset::{Dataset, GeometryKind};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{self, euclidean, poincare};
use crate::renderer::{HitResult, Renderer, RendererBase, RendererOptions, HIT_SLOP_PX};
use crate::selection::count::{
    count_geometry_selection, CountHooks, CountOptions, CountOutcome,
};
use crate::selection::{GeometrySelection, SelectionKind, SelectionResult};
use crate::spatial::SpatialGrid;
use crate::view::View;
use context::{read_texture_rgba, GpuContext};
use palette::PaletteTexture;
use pipelines::{BackdropUniform, Pipelines, PointsUniform};
use policy::{LodInputs, LodPolicy, ShapeState};

/// Candidate-renderer configuration: the shared renderer options plus the
/// adaptive-quality knobs of this backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PointsOptions {
    #[serde(flatten)]
    pub renderer: RendererOptions,
    /// Full upload above this point count gives way to a deterministic
    /// stride subsample; CPU semantics still see every point.
    pub max_gpu_upload_points: usize,
    /// Base pass always draws the LOD subsample above this count.
    pub max_base_draw_points: usize,
    /// LOD buffers are precomputed from this count upward.
    pub lod_min_points: usize,
    /// Interaction LOD engages from this count (Poincaré only).
    pub lod_interaction_min_points: usize,
    /// A view change within this window counts as active interaction.
    pub interaction_window_ms: f64,
    /// Selection overlay renders at most this many sprites.
    pub overlay_cap: usize,
    pub min_points_dpr: f64,
    pub fragment_budget: f64,
    pub circle_budget: f64,
    pub lod_policy: LodPolicy,
}

impl Default for PointsOptions {
    fn default() -> Self {
        Self {
            renderer: RendererOptions::default(),
            max_gpu_upload_points: 10_000_000,
            max_base_draw_points: 4_000_000,
            lod_min_points: 500_000,
            lod_interaction_min_points: 2_000_000,
            interaction_window_ms: 80.0,
            overlay_cap: 250_000,
            min_points_dpr: 0.35,
            fragment_budget: 2.4e7,
            circle_budget: 8.0e6,
            lod_policy: LodPolicy::Auto,
        }
    }
}

struct InstanceBuffers {
    positions: wgpu::Buffer,
    labels: wgpu::Buffer,
    count: u32,
    capacity: usize,
}

struct PassUniform {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BackdropKey {
    width: u32,
    height: u32,
    dpr_milli: u32,
    zoom_milli: u32,
}

struct BackdropCache {
    key: BackdropKey,
    composite_bind: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

struct PointsTarget {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    composite_bind: wgpu::BindGroup,
}

struct CanvasTarget {
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Everything that only exists once a device has been acquired.
struct Gpu {
    ctx: GpuContext,
    pipelines: Pipelines,
    palette: PaletteTexture,
    canvas: Option<CanvasTarget>,
    points_target: Option<PointsTarget>,
    backdrop: Option<BackdropCache>,
    backdrop_uniform: wgpu::Buffer,
    backdrop_bind: wgpu::BindGroup,
    base: Option<InstanceBuffers>,
    lod: Option<InstanceBuffers>,
    overlay: Option<InstanceBuffers>,
    hover: Option<InstanceBuffers>,
    /// base, selection, hover ring, hover fill.
    pass_uniforms: [PassUniform; 4],
}

pub struct PointsRenderer {
    base: RendererBase,
    options: PointsOptions,
    grid: Option<SpatialGrid>,
    shape: ShapeState,
    gpu: Option<Gpu>,
    dataset_dirty: bool,
    overlay_dirty: bool,
    /// Offscreen DPR chosen by the last render; exposed for harnesses.
    last_points_dpr: f64,
}

impl PointsRenderer {
    /// Records configuration only; the GPU context is acquired at first
    /// render.
    pub fn new(geometry: GeometryKind, options: &PointsOptions) -> RenderResult<Self> {
        let base = RendererBase::new(geometry, &options.renderer)?;
        Ok(Self {
            base,
            options: options.clone(),
            grid: None,
            shape: ShapeState::default(),
            gpu: None,
            dataset_dirty: false,
            overlay_dirty: false,
            last_points_dpr: 1.0,
        })
    }

    pub fn spatial_grid(&self) -> Option<&SpatialGrid> {
        self.grid.as_ref()
    }

    pub fn last_points_dpr(&self) -> f64 {
        self.last_points_dpr
    }

    pub fn drawing_squares(&self) -> bool {
        self.shape.squares()
    }

    fn interacting(&self) -> bool {
        self.base
            .ms_since_view_change()
            .is_some_and(|ms| ms < self.options.interaction_window_ms)
    }

    fn ensure_gpu(&mut self) -> RenderResult<&mut Gpu> {
        if self.gpu.is_none() {
            let ctx = GpuContext::acquire()?;
            let pipelines = Pipelines::new(&ctx.device);
            let palette = PaletteTexture::new(&ctx, &self.base.colors.palette)?;

            let make_pass_uniform = || {
                let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("sf.Points.Uniform"),
                    size: std::mem::size_of::<PointsUniform>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("sf.Points.BindGroup"),
                    layout: &pipelines.points_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&palette.view),
                        },
                    ],
                });
                PassUniform { buffer, bind_group }
            };
            let pass_uniforms = [
                make_pass_uniform(),
                make_pass_uniform(),
                make_pass_uniform(),
                make_pass_uniform(),
            ];

            let backdrop_uniform = ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("sf.Backdrop.Uniform"),
                size: std::mem::size_of::<BackdropUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let backdrop_bind = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sf.Backdrop.BindGroup"),
                layout: &pipelines.backdrop_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: backdrop_uniform.as_entire_binding(),
                }],
            });

            self.gpu = Some(Gpu {
                ctx,
                pipelines,
                palette,
                canvas: None,
                points_target: None,
                backdrop: None,
                backdrop_uniform,
                backdrop_bind,
                base: None,
                lod: None,
                overlay: None,
                hover: None,
                pass_uniforms,
            });
            self.dataset_dirty = self.base.dataset.is_some();
            self.overlay_dirty = true;
        }
        Ok(self.gpu.as_mut().expect("gpu just ensured"))
    }

    fn upload_instances(
        ctx: &GpuContext,
        existing: Option<InstanceBuffers>,
        label: &str,
        positions: &[f32],
        labels: &[u32],
    ) -> InstanceBuffers {
        let count = labels.len();
        let mut buffers = match existing {
            Some(b) if b.capacity >= count => b,
            _ => {
                let capacity = count.next_power_of_two().max(1024);
                InstanceBuffers {
                    positions: ctx.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(label),
                        size: (capacity * 8) as u64,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }),
                    labels: ctx.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(label),
                        size: (capacity * 4) as u64,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }),
                    count: 0,
                    capacity,
                }
            }
        };
        if count > 0 {
            ctx.queue
                .write_buffer(&buffers.positions, 0, bytemuck::cast_slice(positions));
            ctx.queue
                .write_buffer(&buffers.labels, 0, bytemuck::cast_slice(labels));
        }
        buffers.count = count as u32;
        buffers
    }

    /// Upload the base layer (full or stride-subsampled) and, from the
    /// LOD threshold up, the interaction subsample.
    fn upload_dataset(&mut self) -> RenderResult<()> {
        let Some(dataset) = self.base.dataset.clone() else {
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.base = None;
                gpu.lod = None;
            }
            return Ok(());
        };
        let n = dataset.len();
        let full_upload = n <= self.options.max_gpu_upload_points;
        let sub = policy::stride_subsample(n);

        let gpu = self.gpu.as_mut().expect("gpu exists during upload");

        if full_upload {
            let labels: Vec<u32> = dataset.labels().iter().map(|&l| l as u32).collect();
            gpu.base = Some(Self::upload_instances(
                &gpu.ctx,
                gpu.base.take(),
                "sf.Points.Base",
                dataset.positions(),
                &labels,
            ));
        } else {
            let (positions, labels) = subsample_arrays(&dataset, sub.step);
            gpu.base = Some(Self::upload_instances(
                &gpu.ctx,
                gpu.base.take(),
                "sf.Points.Base",
                &positions,
                &labels,
            ));
        }

        // The interaction subsample duplicates the base when the base is
        // itself the subsample.
        if full_upload && n >= self.options.lod_min_points {
            let (positions, labels) = subsample_arrays(&dataset, sub.step);
            gpu.lod = Some(Self::upload_instances(
                &gpu.ctx,
                gpu.lod.take(),
                "sf.Points.Lod",
                &positions,
                &labels,
            ));
        } else {
            gpu.lod = None;
        }

        self.dataset_dirty = false;
        Ok(())
    }

    /// Compact the current selection into overlay instances, capped at
    /// the overlay render cap (a documented lossy overlay, not lossy
    /// semantics).
    fn upload_overlay(&mut self) {
        let cap = self.options.overlay_cap;
        let Some(dataset) = self.base.dataset.clone() else {
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.overlay = None;
            }
            self.overlay_dirty = false;
            return;
        };
        let selection = self.base.selection.clone();

        let mut positions: Vec<f32> = Vec::new();
        let mut labels: Vec<u32> = Vec::new();
        match &selection.kind {
            SelectionKind::Indices(store) => {
                for i in store.iter().take(cap) {
                    let i = i as usize;
                    positions.push(dataset.positions()[2 * i]);
                    positions.push(dataset.positions()[2 * i + 1]);
                    labels.push(dataset.label(i) as u32);
                }
            }
            SelectionKind::Geometry(sel) => {
                for i in 0..dataset.len() {
                    if sel.has(i) {
                        positions.push(dataset.positions()[2 * i]);
                        positions.push(dataset.positions()[2 * i + 1]);
                        labels.push(dataset.label(i) as u32);
                        if labels.len() >= cap {
                            break;
                        }
                    }
                }
            }
        }

        let gpu = self.gpu.as_mut().expect("gpu exists during overlay upload");
        gpu.overlay = if labels.is_empty() {
            None
        } else {
            Some(Self::upload_instances(
                &gpu.ctx,
                gpu.overlay.take(),
                "sf.Points.Overlay",
                &positions,
                &labels,
            ))
        };
        self.overlay_dirty = false;
    }

    fn upload_hover(&mut self) {
        let hovered = self.base.hovered;
        let Some(dataset) = self.base.dataset.clone() else {
            return;
        };
        let Some(i) = hovered.map(|h| h as usize).filter(|&i| i < dataset.len()) else {
            if let Some(gpu) = self.gpu.as_mut() {
                gpu.hover = None;
            }
            return;
        };
        let positions = [dataset.positions()[2 * i], dataset.positions()[2 * i + 1]];
        let labels = [dataset.label(i) as u32];
        let gpu = self.gpu.as_mut().expect("gpu exists during hover upload");
        gpu.hover = Some(Self::upload_instances(
            &gpu.ctx,
            gpu.hover.take(),
            "sf.Points.Hover",
            &positions,
            &labels,
        ));
    }

    fn points_uniform(&self, radius_px: f64, ring_inner: f64, solid: [f32; 4]) -> PointsUniform {
        let (w, h) = (self.base.wf(), self.base.hf());
        let palette_len = self.base.colors.palette.len() as u32;
        match &self.base.view {
            View::Euclidean(v) => PointsUniform {
                screen_size: [w as f32, h as f32],
                center: [v.center_x as f32, v.center_y as f32],
                mobius_a: [0.0, 0.0],
                scale: euclidean::scale(v, w, h) as f32,
                disk_radius: 0.0,
                radius_px: radius_px as f32,
                mode: 0,
                ring_inner: ring_inner as f32,
                palette_len,
                solid_color: solid,
                extra: [self.last_points_dpr as f32, 0.0, 0.0, 0.0],
            },
            View::Poincare(v) => PointsUniform {
                screen_size: [w as f32, h as f32],
                center: [0.0, 0.0],
                mobius_a: [v.ax as f32, v.ay as f32],
                scale: 0.0,
                disk_radius: poincare::disk_radius(v, w, h) as f32,
                radius_px: radius_px as f32,
                mode: 1,
                ring_inner: ring_inner as f32,
                palette_len,
                solid_color: solid,
                extra: [self.last_points_dpr as f32, 0.0, 0.0, 0.0],
            },
        }
    }

    fn ensure_canvas(&mut self) {
        let pw = (self.base.wf() * self.base.dpr).ceil().max(1.0) as u32;
        let ph = (self.base.hf() * self.base.dpr).ceil().max(1.0) as u32;
        let gpu = self.gpu.as_mut().expect("gpu exists");
        let stale = gpu
            .canvas
            .as_ref()
            .map_or(true, |c| c.width != pw || c.height != ph);
        if stale {
            let (texture, view) = gpu.ctx.create_target("sf.Canvas", pw, ph);
            gpu.canvas = Some(CanvasTarget {
                width: pw,
                height: ph,
                texture,
                view,
            });
        }
    }

    fn ensure_points_target(&mut self, points_dpr: f64) {
        let pw = (self.base.wf() * points_dpr).ceil().max(1.0) as u32;
        let ph = (self.base.hf() * points_dpr).ceil().max(1.0) as u32;
        let gpu = self.gpu.as_mut().expect("gpu exists");
        let stale = gpu
            .points_target
            .as_ref()
            .map_or(true, |t| t.width != pw || t.height != ph);
        if stale {
            let (texture, view) = gpu.ctx.create_target("sf.Points.Target", pw, ph);
            let composite_bind = gpu.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sf.Points.CompositeBind"),
                layout: &gpu.pipelines.composite_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&gpu.pipelines.sampler),
                    },
                ],
            });
            gpu.points_target = Some(PointsTarget {
                width: pw,
                height: ph,
                texture,
                view,
                composite_bind,
            });
        }
    }

    /// (Re)render the cached disk backdrop when (size, DPR, display zoom)
    /// changed, then leave the cache ready for per-frame compositing.
    fn ensure_backdrop(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let View::Poincare(v) = self.base.view else {
            return;
        };
        let (w, h) = (self.base.wf(), self.base.hf());
        let pw = (w * self.base.dpr).ceil().max(1.0) as u32;
        let ph = (h * self.base.dpr).ceil().max(1.0) as u32;
        let key = BackdropKey {
            width: pw,
            height: ph,
            dpr_milli: (self.base.dpr * 1000.0).round() as u32,
            zoom_milli: (v.display_zoom * 1000.0).round() as u32,
        };
        let disk_radius = poincare::disk_radius(&v, w, h);
        let colors = self.base.colors.clone();
        let uniform = BackdropUniform {
            screen_size: [w as f32, h as f32],
            disk_radius: disk_radius as f32,
            border_width: self.base.disk_border_width as f32,
            grid_width: self.base.grid_width as f32,
            dpr: self.base.dpr as f32,
            _pad: [0.0; 2],
            fill_color: colors.disk_fill.to_f32(),
            border_color: colors.disk_border.to_f32(),
            grid_color: colors.grid.to_f32(),
            background_color: colors.background.to_f32(),
        };

        let gpu = self.gpu.as_mut().expect("gpu exists");
        if gpu.backdrop.as_ref().is_some_and(|b| b.key == key) {
            return;
        }

        let (texture, view) = gpu.ctx.create_target("sf.Backdrop.Cache", pw, ph);
        let composite_bind = gpu.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sf.Backdrop.CompositeBind"),
            layout: &gpu.pipelines.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&gpu.pipelines.sampler),
                },
            ],
        });
        gpu.ctx
            .queue
            .write_buffer(&gpu.backdrop_uniform, 0, bytemuck::bytes_of(&uniform));

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sf.Backdrop.Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&gpu.pipelines.backdrop);
            pass.set_bind_group(0, &gpu.backdrop_bind, &[]);
            pass.draw(0..3, 0..1);
        }

        gpu.backdrop = Some(BackdropCache {
            key,
            composite_bind,
            _texture: texture,
        });
    }

    /// Tightly packed RGBA readback of the composited frame at physical
    /// (DPR-scaled) resolution.
    pub fn read_pixels(&mut self) -> RenderResult<(u32, u32, Vec<u8>)> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| RenderError::readback("no frame rendered yet"))?;
        let canvas = gpu
            .canvas
            .as_ref()
            .ok_or_else(|| RenderError::readback("no frame rendered yet"))?;
        let pixels = read_texture_rgba(&gpu.ctx, &canvas.texture, canvas.width, canvas.height)?;
        Ok((canvas.width, canvas.height, pixels))
    }
}

/// Stride-subsampled positions and (widened) labels.
fn subsample_arrays(dataset: &Dataset, step: usize) -> (Vec<f32>, Vec<u32>) {
    let n = dataset.len();
    let mut positions = Vec::with_capacity(2 * (n / step + 1));
    let mut labels = Vec::with_capacity(n / step + 1);
    let mut i = 0;
    while i < n {
        positions.push(dataset.positions()[2 * i]);
        positions.push(dataset.positions()[2 * i + 1]);
        labels.push(dataset.label(i) as u32);
        i += step;
    }
    (positions, labels)
}

impl Renderer for PointsRenderer {
    fn geometry(&self) -> GeometryKind {
        self.base.geometry
    }

    fn size(&self) -> (u32, u32) {
        (self.base.width, self.base.height)
    }

    fn set_dataset(&mut self, dataset: Arc<Dataset>) -> RenderResult<()> {
        self.base.set_dataset(dataset)?;
        self.grid = Some(SpatialGrid::build(
            self.base.dataset.as_ref().expect("dataset just set"),
        ));
        self.dataset_dirty = true;
        self.overlay_dirty = true;
        Ok(())
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
        self.ensure_gpu()?;
        self.ensure_canvas();
        if self.dataset_dirty {
            self.upload_dataset()?;
        }

        let n = self.base.dataset.as_ref().map_or(0, |d| d.len());
        let interacting = self.interacting();
        let poincare_mode = self.base.geometry == GeometryKind::Poincare;

        let lod_active = policy::use_lod(&LodInputs {
            policy: self.options.lod_policy,
            point_count: n,
            poincare: poincare_mode,
            interacting,
            interaction_min_points: self.options.lod_interaction_min_points,
            max_base_draw_points: self.options.max_base_draw_points,
        });
        let (draw_lod, draw_count) = {
            let gpu = self.gpu.as_ref().expect("gpu ensured");
            let base_count = gpu.base.as_ref().map_or(0, |b| b.count) as usize;
            let lod_count = gpu.lod.as_ref().map_or(base_count, |l| l.count as usize);
            if lod_active && gpu.lod.is_some() {
                (true, lod_count)
            } else {
                (false, base_count)
            }
        };

        let r = self.base.point_radius;
        let points_dpr = policy::points_dpr(&policy::DprInputs {
            point_count: n,
            draw_count,
            css_width: self.base.wf(),
            css_height: self.base.hf(),
            device_dpr: self.base.dpr,
            point_radius_px: r,
            min_points_dpr: self.options.min_points_dpr,
            fragment_budget: self.options.fragment_budget,
        });
        self.last_points_dpr = points_dpr;
        let estimate = policy::fragment_estimate(draw_count, r, points_dpr);
        let squares = self
            .shape
            .update(estimate, self.options.circle_budget, points_dpr);
        self.ensure_points_target(points_dpr);

        if self.overlay_dirty && !interacting {
            self.upload_overlay();
        }
        self.upload_hover();

        // Per-pass uniforms; separate buffers because queue writes all
        // land before this frame's passes execute.
        let selection_color = self.base.colors.selection;
        let hover_color = {
            let hovered = self.base.hovered.map(|h| h as usize);
            let selected = hovered.is_some_and(|i| self.base.selection.has(i));
            match (hovered, selected, self.base.dataset.as_ref()) {
                (Some(_), true, _) => selection_color,
                (Some(i), false, Some(ds)) if i < ds.len() => {
                    self.base.colors.label_color(ds.label(i))
                }
                _ => selection_color,
            }
        };
        let base_uniform = self.points_uniform(r, 0.0, [0.0; 4]);
        let sel_uniform = self.points_uniform(r + 1.0, 0.0, selection_color.to_f32());
        let ring_uniform =
            self.points_uniform(r + 4.0, (r + 2.0) / (r + 4.0), hover_color.to_f32());
        let fill_uniform = self.points_uniform(r + 1.0, 0.0, hover_color.to_f32());

        let background = self.base.colors.background.to_wgpu();

        let mut encoder = {
            let gpu = self.gpu.as_ref().expect("gpu ensured");
            for (slot, uniform) in [
                (0, &base_uniform),
                (1, &sel_uniform),
                (2, &ring_uniform),
                (3, &fill_uniform),
            ] {
                gpu.ctx.queue.write_buffer(
                    &gpu.pass_uniforms[slot].buffer,
                    0,
                    bytemuck::bytes_of(uniform),
                );
            }
            gpu.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("sf.Frame.Encoder"),
                })
        };

        if poincare_mode {
            self.ensure_backdrop(&mut encoder);
        }

        let gpu = self.gpu.as_ref().expect("gpu ensured");
        let canvas = gpu.canvas.as_ref().expect("canvas ensured");
        let points_target = gpu.points_target.as_ref().expect("points target ensured");

        // Backdrop (or clear) onto the canvas target.
        {
            let load = if poincare_mode {
                // The cached backdrop covers the full canvas.
                wgpu::LoadOp::Load
            } else {
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: background[0],
                    g: background[1],
                    b: background[2],
                    a: background[3],
                })
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sf.Canvas.Backdrop"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &canvas.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if poincare_mode {
                let backdrop = gpu.backdrop.as_ref().expect("backdrop ensured");
                pass.set_pipeline(&gpu.pipelines.composite_replace);
                pass.set_bind_group(0, &backdrop.composite_bind, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        // Points pass into the offscreen buffer.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sf.Points.Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &points_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let buffers = if draw_lod {
                gpu.lod.as_ref()
            } else {
                gpu.base.as_ref()
            };
            if let Some(buffers) = buffers.filter(|b| b.count > 0) {
                pass.set_pipeline(if squares {
                    &gpu.pipelines.square
                } else {
                    &gpu.pipelines.circle
                });
                pass.set_bind_group(0, &gpu.pass_uniforms[0].bind_group, &[]);
                pass.set_vertex_buffer(0, buffers.positions.slice(..));
                pass.set_vertex_buffer(1, buffers.labels.slice(..));
                pass.draw(0..4, 0..buffers.count);
            }

            // Overlays reclaim frame time during interaction.
            if !interacting {
                if let Some(overlay) = gpu.overlay.as_ref().filter(|b| b.count > 0) {
                    pass.set_pipeline(&gpu.pipelines.solid);
                    pass.set_bind_group(0, &gpu.pass_uniforms[1].bind_group, &[]);
                    pass.set_vertex_buffer(0, overlay.positions.slice(..));
                    pass.set_vertex_buffer(1, overlay.labels.slice(..));
                    pass.draw(0..4, 0..overlay.count);
                }
                if let Some(hover) = gpu.hover.as_ref().filter(|b| b.count > 0) {
                    pass.set_pipeline(&gpu.pipelines.solid);
                    pass.set_bind_group(0, &gpu.pass_uniforms[2].bind_group, &[]);
                    pass.set_vertex_buffer(0, hover.positions.slice(..));
                    pass.set_vertex_buffer(1, hover.labels.slice(..));
                    pass.draw(0..4, 0..hover.count);

                    pass.set_bind_group(0, &gpu.pass_uniforms[3].bind_group, &[]);
                    pass.draw(0..4, 0..hover.count);
                }
            }
        }

        // Composite the points buffer over the backdrop.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sf.Canvas.Composite"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &canvas.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&gpu.pipelines.composite_over);
            pass.set_bind_group(0, &points_target.composite_bind, &[]);
            pass.draw(0..3, 0..1);
        }

        gpu.ctx.queue.submit([encoder.finish()]);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.base.resize(width, height)
        // Targets reallocate lazily at the next render via size keys.
    }

    fn destroy(&mut self) {
        self.gpu = None;
    }

    fn set_selection(&mut self, indices: &[u32]) {
        self.base.set_selection_indices(indices);
        self.overlay_dirty = true;
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

    /// Drop out of interaction LOD immediately so the first post-gesture
    /// frame renders at full density (no visible pop after release).
    fn end_interaction(&mut self) {
        self.base.last_view_change = None;
    }

    /// Spatial-index hit test: unproject the cursor, bound the query in
    /// data space, then re-project candidates with the exact f64 math.
    fn hit_test(&self, sx: f64, sy: f64) -> Option<HitResult> {
        let dataset = self.base.dataset.as_ref()?;
        let grid = self.grid.as_ref()?;
        let (w, h) = (self.base.wf(), self.base.hf());
        let hit_r = self.base.point_radius + HIT_SLOP_PX;
        let hit_r_sq = hit_r * hit_r;

        let query_radius = match &self.base.view {
            View::Euclidean(v) => (hit_r + 1e-9) / euclidean::scale(v, w, h),
            View::Poincare(v) => {
                // Fast path: cursor beyond the disk plus slop hits nothing.
                let dx = sx - w / 2.0;
                let dy = sy - h / 2.0;
                let disk_r = poincare::disk_radius(v, w, h);
                if dx * dx + dy * dy > (disk_r + hit_r) * (disk_r + hit_r) {
                    return None;
                }
                let (qx, qy) = poincare::unproject(v, w, h, sx, sy);
                poincare::conservative_data_radius(v, w, h, DVec2::new(qx, qy), hit_r)
            }
        };
        let (qx, qy) = geometry::unproject(&self.base.view, w, h, sx, sy);

        let disk_limit = match &self.base.view {
            View::Poincare(v) => {
                let r = poincare::disk_radius(v, w, h);
                Some(r * r)
            }
            View::Euclidean(_) => None,
        };

        let mut best_d_sq = f64::INFINITY;
        let mut best: Option<HitResult> = None;
        grid.for_each_in_aabb(
            qx - query_radius,
            qy - query_radius,
            qx + query_radius,
            qy + query_radius,
            |id| {
                let i = id as usize;
                let (px, py) =
                    geometry::project(&self.base.view, w, h, dataset.x(i), dataset.y(i));
                if let Some(disk_r_sq) = disk_limit {
                    let cx = px - w / 2.0;
                    let cy = py - h / 2.0;
                    if cx * cx + cy * cy > disk_r_sq {
                        return;
                    }
                }
                let dx = px - sx;
                let dy = py - sy;
                let d_sq = dx * dx + dy * dy;
                if d_sq > hit_r_sq {
                    return;
                }
                let better = d_sq < best_d_sq
                    || (d_sq == best_d_sq && best.as_ref().is_some_and(|b| id < b.index));
                if better {
                    best_d_sq = d_sq;
                    best = Some(HitResult {
                        index: id,
                        screen_x: px,
                        screen_y: py,
                        distance: d_sq.sqrt(),
                    });
                }
            },
        );
        best
    }

    /// Geometry-variant lasso: one polygon allocation, bounds, and a
    /// predicate; nothing is materialized. `compute_time_ms` covers only
    /// the unprojection work.
    fn lasso_select(&mut self, polyline: &[f32]) -> RenderResult<SelectionResult> {
        if polyline.len() % 2 != 0 {
            return Err(RenderError::geometry(format!(
                "polyline length must be even, got {}",
                polyline.len()
            )));
        }
        let dataset = self
            .base
            .dataset
            .clone()
            .ok_or_else(|| RenderError::render("no dataset set"))?;
        let (w, h) = (self.base.wf(), self.base.hf());

        let started = Instant::now();
        let mut polygon = Vec::with_capacity(polyline.len());
        for v in polyline.chunks_exact(2) {
            let (x, y) = geometry::unproject(&self.base.view, w, h, v[0] as f64, v[1] as f64);
            polygon.push(x);
            polygon.push(y);
        }
        let compute_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = SelectionResult {
            kind: SelectionKind::Geometry(GeometrySelection::new(dataset, polygon)),
            compute_time_ms,
        };
        self.base.selection = Arc::new(result.clone());
        self.overlay_dirty = true;
        Ok(result)
    }

    fn count_selection(
        &self,
        selection: &SelectionResult,
        options: &CountOptions,
        hooks: &mut CountHooks<'_>,
    ) -> CountOutcome {
        match &selection.kind {
            SelectionKind::Indices(store) => CountOutcome::Exact(store.len()),
            SelectionKind::Geometry(sel) => {
                let grid_usable = self
                    .base
                    .dataset
                    .as_ref()
                    .is_some_and(|d| Arc::ptr_eq(d, sel.dataset()));
                if let (true, Some(grid)) = (grid_usable, self.grid.as_ref()) {
                    count_geometry_selection(grid, sel, options, hooks)
                } else {
                    // Selection from a replaced dataset: count against its
                    // own dataset without the index.
                    let n = sel.dataset().len();
                    CountOutcome::Exact((0..n).filter(|&i| sel.has(i)).count())
                }
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
