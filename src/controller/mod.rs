//! Interaction controller: pointer/wheel/resize input → renderer calls,
//! at most one batched update per frame tick.
//!
//! Event handlers write pending buffers; `frame` drains each exactly once
//! in a fixed order (resize → pan → zoom → hover) and reports whether a
//! render is due. The controller owns no renderer: handlers that must
//! touch one (gesture start/end) take it as a parameter, everything else
//! is a pure buffer write.

pub mod lasso;

use log::debug;

use crate::renderer::Renderer;
use crate::selection::SelectionResult;

/// Keyboard modifier state carried by pointer and wheel events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pointer event in viewport (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub pointer_id: u64,
    pub client_x: f64,
    pub client_y: f64,
    /// 0 = primary. Only the primary button starts a gesture.
    pub button: i16,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy)]
pub struct WheelEvent {
    pub client_x: f64,
    pub client_y: f64,
    pub delta_y: f64,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Pan,
    Lasso,
}

/// Completed lasso gesture, delivered to the completion hook.
pub struct LassoCompletion {
    /// Simplified polygon in data space.
    pub data_polygon: Vec<f64>,
    /// The same polygon projected to screen (flat f32, the lasso input).
    pub screen_polygon: Vec<f32>,
    pub selection: SelectionResult,
}

type LassoHook = Box<dyn FnMut(&LassoCompletion)>;
type LassoTrigger = Box<dyn Fn(Modifiers) -> bool>;

pub struct ControllerOptions {
    /// Predicate choosing lasso mode at pointer-down.
    pub lasso_trigger: LassoTrigger,
    /// Minimum screen displacement between lasso samples.
    pub lasso_sample_px: f64,
    /// Vertex budget for the live preview polygon.
    pub lasso_preview_vertices: usize,
    /// Vertex budget for the final simplified polygon.
    pub lasso_final_vertices: usize,
    /// Wheel delta → zoom delta scale.
    pub wheel_zoom_scale: f64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            lasso_trigger: Box::new(|m| m.shift && (m.meta || m.ctrl)),
            lasso_sample_px: 2.0,
            lasso_preview_vertices: 24,
            lasso_final_vertices: 24,
            wheel_zoom_scale: 1.0 / 100.0,
        }
    }
}

/// What a frame tick did; `rendered` mirrors whether `render()` was
/// called on the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub rendered: bool,
    pub resized: bool,
    pub panned: bool,
    pub zoomed: bool,
    pub hover_changed: bool,
}

pub struct InteractionController {
    options: ControllerOptions,
    /// Canvas layout origin in viewport coordinates; events subtract it.
    canvas_origin: (f64, f64),
    mode: Mode,
    active_pointer: Option<u64>,
    last_pointer: (f64, f64),

    // Pending buffers, drained once per frame.
    pending_pan: (f64, f64),
    pending_zoom: f64,
    zoom_anchor: (f64, f64),
    pending_hover: Option<(f64, f64)>,
    size_dirty: bool,
    pending_size: (u32, u32),
    lasso_grew: bool,

    /// Raw lasso stroke in data space.
    lasso_raw: Vec<f64>,
    last_sample_screen: (f64, f64),

    on_lasso: Option<LassoHook>,
}

impl InteractionController {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            options,
            canvas_origin: (0.0, 0.0),
            mode: Mode::Idle,
            active_pointer: None,
            last_pointer: (0.0, 0.0),
            pending_pan: (0.0, 0.0),
            pending_zoom: 0.0,
            zoom_anchor: (0.0, 0.0),
            pending_hover: None,
            size_dirty: false,
            pending_size: (0, 0),
            lasso_grew: false,
            lasso_raw: Vec::new(),
            last_sample_screen: (0.0, 0.0),
            on_lasso: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Layout position of the canvas within the viewport.
    pub fn set_canvas_origin(&mut self, x: f64, y: f64) {
        self.canvas_origin = (x, y);
    }

    pub fn set_lasso_hook(&mut self, hook: LassoHook) {
        self.on_lasso = Some(hook);
    }

    /// Live lasso stroke (data space) for preview drawing, simplified to
    /// the preview budget.
    pub fn lasso_preview(&self) -> Option<Vec<f64>> {
        if self.mode != Mode::Lasso || self.lasso_raw.len() < 6 {
            return None;
        }
        Some(lasso::simplify_closed(
            &self.lasso_raw,
            self.options.lasso_preview_vertices,
        ))
    }

    #[inline]
    fn local(&self, client_x: f64, client_y: f64) -> (f64, f64) {
        (client_x - self.canvas_origin.0, client_y - self.canvas_origin.1)
    }

    pub fn pointer_down(&mut self, renderer: &mut dyn Renderer, ev: &PointerEvent) {
        if ev.button != 0 || self.active_pointer.is_some() {
            return;
        }
        let (x, y) = self.local(ev.client_x, ev.client_y);
        self.active_pointer = Some(ev.pointer_id);
        self.last_pointer = (x, y);
        self.pending_hover = None;
        renderer.set_hovered(None);

        if (self.options.lasso_trigger)(ev.modifiers) {
            self.mode = Mode::Lasso;
            self.lasso_raw.clear();
            let (dx, dy) = renderer.unproject_from_screen(x, y);
            self.lasso_raw.push(dx);
            self.lasso_raw.push(dy);
            self.last_sample_screen = (x, y);
            self.lasso_grew = true;
        } else {
            self.mode = Mode::Pan;
            renderer.start_pan(x, y);
        }
    }

    pub fn pointer_move(&mut self, renderer: &mut dyn Renderer, ev: &PointerEvent) {
        let (x, y) = self.local(ev.client_x, ev.client_y);
        match self.mode {
            Mode::Idle => {
                self.pending_hover = Some((x, y));
            }
            Mode::Pan => {
                if self.active_pointer == Some(ev.pointer_id) {
                    self.pending_pan.0 += x - self.last_pointer.0;
                    self.pending_pan.1 += y - self.last_pointer.1;
                    self.last_pointer = (x, y);
                }
            }
            Mode::Lasso => {
                if self.active_pointer == Some(ev.pointer_id) {
                    let dx = x - self.last_sample_screen.0;
                    let dy = y - self.last_sample_screen.1;
                    if (dx * dx + dy * dy).sqrt() > self.options.lasso_sample_px {
                        let (px, py) = renderer.unproject_from_screen(x, y);
                        self.lasso_raw.push(px);
                        self.lasso_raw.push(py);
                        self.last_sample_screen = (x, y);
                        self.lasso_grew = true;
                    }
                    self.last_pointer = (x, y);
                }
            }
        }
    }

    pub fn pointer_up(&mut self, renderer: &mut dyn Renderer, ev: &PointerEvent) {
        if self.active_pointer != Some(ev.pointer_id) {
            return;
        }
        match self.mode {
            Mode::Pan => {
                // Flush synchronously: a short gesture ending before its
                // scheduled frame would otherwise be discarded and appear
                // as snap-back.
                let (dx, dy) = std::mem::take(&mut self.pending_pan);
                if dx != 0.0 || dy != 0.0 {
                    renderer.pan(dx, dy);
                }
                renderer.end_interaction();
            }
            Mode::Lasso => {
                self.finish_lasso(renderer);
            }
            Mode::Idle => {}
        }
        self.mode = Mode::Idle;
        self.active_pointer = None;
    }

    pub fn pointer_cancel(&mut self, renderer: &mut dyn Renderer, ev: &PointerEvent) {
        if self.active_pointer != Some(ev.pointer_id) {
            return;
        }
        if self.mode == Mode::Pan {
            let (dx, dy) = std::mem::take(&mut self.pending_pan);
            if dx != 0.0 || dy != 0.0 {
                renderer.pan(dx, dy);
            }
            renderer.end_interaction();
        }
        // A cancelled lasso is discarded outright.
        self.lasso_raw.clear();
        self.lasso_grew = false;
        self.mode = Mode::Idle;
        self.active_pointer = None;
    }

    /// Wheel: the host is expected to have suppressed default scrolling.
    pub fn wheel(&mut self, ev: &WheelEvent) {
        self.pending_zoom += -ev.delta_y * self.options.wheel_zoom_scale;
        self.zoom_anchor = self.local(ev.client_x, ev.client_y);
    }

    /// Resize notification (already-measured container size); applied at
    /// the next frame tick.
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        self.size_dirty = true;
        self.pending_size = (width, height);
    }

    fn finish_lasso(&mut self, renderer: &mut dyn Renderer) {
        let raw = std::mem::take(&mut self.lasso_raw);
        self.lasso_grew = false;
        if raw.len() < 6 {
            debug!("lasso ignored: {} coordinates", raw.len());
            return;
        }
        let data_polygon =
            lasso::simplify_closed(&raw, self.options.lasso_final_vertices);
        let mut screen_polygon = Vec::with_capacity(data_polygon.len());
        for v in data_polygon.chunks_exact(2) {
            let (sx, sy) = renderer.project_to_screen(v[0], v[1]);
            screen_polygon.push(sx as f32);
            screen_polygon.push(sy as f32);
        }
        match renderer.lasso_select(&screen_polygon) {
            Ok(selection) => {
                if let Some(hook) = self.on_lasso.as_mut() {
                    hook(&LassoCompletion {
                        data_polygon,
                        screen_polygon,
                        selection,
                    });
                }
            }
            Err(e) => log::warn!("lasso selection failed: {e}"),
        }
    }

    /// Frame tick: drain pending buffers in order (resize → pan → zoom →
    /// hover), render iff anything changed or the lasso stroke grew.
    pub fn frame(&mut self, renderer: &mut dyn Renderer) -> FrameReport {
        let mut report = FrameReport::default();

        if self.size_dirty {
            self.size_dirty = false;
            let (w, h) = self.pending_size;
            let (w, h) = (w.max(1), h.max(1));
            if (w, h) != renderer.size() {
                if renderer.resize(w, h).is_ok() {
                    report.resized = true;
                }
            }
        }

        let (dx, dy) = std::mem::take(&mut self.pending_pan);
        if dx != 0.0 || dy != 0.0 {
            renderer.pan(dx, dy);
            report.panned = true;
        }

        let zoom = std::mem::take(&mut self.pending_zoom);
        if zoom != 0.0 {
            renderer.zoom(self.zoom_anchor.0, self.zoom_anchor.1, zoom);
            report.zoomed = true;
        }

        if self.mode == Mode::Idle {
            if let Some((hx, hy)) = self.pending_hover.take() {
                let hit = renderer.hit_test(hx, hy).map(|h| h.index);
                if hit != renderer.hovered() {
                    renderer.set_hovered(hit);
                    report.hover_changed = true;
                }
            }
        } else {
            self.pending_hover = None;
        }

        let lasso_grew = std::mem::take(&mut self.lasso_grew);
        if report.resized || report.panned || report.zoomed || report.hover_changed || lasso_grew
        {
            if let Err(e) = renderer.render() {
                log::warn!("render failed: {e}");
            } else {
                report.rendered = true;
            }
        }
        report
    }
}
