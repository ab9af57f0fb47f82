//! Minimal CPU raster surface for the reference renderer.
//!
//! An RGBA8 backing buffer at css-size × DPR with an explicit transform
//! scale, mirroring a 2D canvas context closely enough to reproduce its
//! one real hazard: the transform persists across reinitialization, so
//! `reset_transform` + `scale(dpr)` is mandatory on every init/resize and
//! a bare `scale(dpr)` would compound.

use crate::color::Rgba;

#[derive(Debug)]
pub struct Raster2d {
    buf_width: u32,
    buf_height: u32,
    scale: f64,
    buf: Vec<u8>,
}

impl Raster2d {
    pub fn new() -> Self {
        Self {
            buf_width: 0,
            buf_height: 0,
            scale: 1.0,
            buf: Vec::new(),
        }
    }

    /// Reallocate the backing buffer. Does NOT touch the transform; that
    /// is the caller's job, exactly like a real 2D context.
    pub fn set_backing_size(&mut self, buf_width: u32, buf_height: u32) {
        self.buf_width = buf_width;
        self.buf_height = buf_height;
        self.buf = vec![0; (buf_width as usize) * (buf_height as usize) * 4];
    }

    pub fn reset_transform(&mut self) {
        self.scale = 1.0;
    }

    /// Multiplies the current transform scale (persistent, like a canvas
    /// context).
    pub fn scale(&mut self, factor: f64) {
        self.scale *= factor;
    }

    pub fn current_scale(&self) -> f64 {
        self.scale
    }

    pub fn backing_size(&self) -> (u32, u32) {
        (self.buf_width, self.buf_height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.buf
    }

    /// Color at backing-buffer pixel (px, py).
    pub fn pixel(&self, px: u32, py: u32) -> Rgba {
        let i = ((py * self.buf_width + px) * 4) as usize;
        Rgba::new(self.buf[i], self.buf[i + 1], self.buf[i + 2], self.buf[i + 3])
    }

    pub fn clear(&mut self, color: Rgba) {
        for px in self.buf.chunks_exact_mut(4) {
            px.copy_from_slice(&color.to_bytes());
        }
    }

    #[inline]
    fn blend_pixel(&mut self, px: i64, py: i64, color: Rgba) {
        if px < 0 || py < 0 || px >= self.buf_width as i64 || py >= self.buf_height as i64 {
            return;
        }
        let i = ((py as usize) * self.buf_width as usize + px as usize) * 4;
        if color.a == 255 {
            self.buf[i..i + 4].copy_from_slice(&color.to_bytes());
            return;
        }
        // Source-over with 8-bit alpha.
        let a = color.a as u32;
        let inv = 255 - a;
        for (c, s) in [color.r, color.g, color.b].into_iter().enumerate() {
            let d = self.buf[i + c] as u32;
            self.buf[i + c] = ((s as u32 * a + d * inv) / 255) as u8;
        }
        self.buf[i + 3] = ((a * 255 + self.buf[i + 3] as u32 * inv) / 255) as u8;
    }

    /// Scan a CSS-space bounding box and fill pixels passing `test`,
    /// where `test` receives CSS-space coordinates of the pixel center.
    fn fill_region<F: Fn(f64, f64) -> bool>(
        &mut self,
        cx: f64,
        cy: f64,
        extent: f64,
        color: Rgba,
        test: F,
    ) {
        let s = self.scale;
        let x0 = ((cx - extent) * s).floor() as i64;
        let x1 = ((cx + extent) * s).ceil() as i64;
        let y0 = ((cy - extent) * s).floor() as i64;
        let y1 = ((cy + extent) * s).ceil() as i64;
        for py in y0..=y1 {
            for px in x0..=x1 {
                let x = (px as f64 + 0.5) / s;
                let y = (py as f64 + 0.5) / s;
                if test(x, y) {
                    self.blend_pixel(px, py, color);
                }
            }
        }
    }

    /// Filled circle; center and radius in CSS pixels.
    pub fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: Rgba) {
        let r_sq = r * r;
        self.fill_region(cx, cy, r + 1.0, color, |x, y| {
            let dx = x - cx;
            let dy = y - cy;
            dx * dx + dy * dy <= r_sq
        });
    }

    /// Circle outline of the given stroke width (CSS pixels).
    pub fn stroke_circle(&mut self, cx: f64, cy: f64, r: f64, width: f64, color: Rgba) {
        let half = width / 2.0;
        let inner_sq = (r - half).max(0.0) * (r - half).max(0.0);
        let outer_sq = (r + half) * (r + half);
        self.fill_region(cx, cy, r + half + 1.0, color, |x, y| {
            let dx = x - cx;
            let dy = y - cy;
            let d_sq = dx * dx + dy * dy;
            d_sq >= inner_sq && d_sq <= outer_sq
        });
    }

    /// Straight line segment of the given stroke width (CSS pixels).
    pub fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, color: Rgba) {
        let half = width / 2.0;
        let cx = (x0 + x1) / 2.0;
        let cy = (y0 + y1) / 2.0;
        let extent = ((x1 - x0).abs().max((y1 - y0).abs())) / 2.0 + half + 1.0;
        let dx = x1 - x0;
        let dy = y1 - y0;
        let len_sq = dx * dx + dy * dy;
        self.fill_region(cx, cy, extent, color, |x, y| {
            let t = if len_sq > 0.0 {
                (((x - x0) * dx + (y - y0) * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let ex = x - (x0 + t * dx);
            let ey = y - (y0 + t * dy);
            ex * ex + ey * ey <= half * half
        });
    }
}

impl Default for Raster2d {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    #[test]
    fn scale_compounds_without_reset() {
        let mut r = Raster2d::new();
        r.set_backing_size(10, 10);
        r.scale(2.0);
        r.scale(2.0);
        assert_eq!(r.current_scale(), 4.0);
        r.reset_transform();
        r.scale(2.0);
        assert_eq!(r.current_scale(), 2.0);
    }

    #[test]
    fn fill_circle_respects_dpr_scale() {
        let mut r = Raster2d::new();
        r.set_backing_size(40, 40);
        r.reset_transform();
        r.scale(2.0);
        r.clear(BLACK);
        // CSS center (10, 10) radius 4 → backing center (20, 20) radius 8.
        r.fill_circle(10.0, 10.0, 4.0, WHITE);
        assert_eq!(r.pixel(20, 20), WHITE);
        assert_eq!(r.pixel(26, 20), WHITE);
        assert_eq!(r.pixel(30, 20), BLACK);
    }

    #[test]
    fn stroke_circle_leaves_interior_untouched() {
        let mut r = Raster2d::new();
        r.set_backing_size(64, 64);
        r.reset_transform();
        r.clear(BLACK);
        r.stroke_circle(32.0, 32.0, 20.0, 2.0, WHITE);
        assert_eq!(r.pixel(32, 32), BLACK);
        assert_eq!(r.pixel(32 + 20, 32), WHITE);
    }

    #[test]
    fn line_covers_endpoints() {
        let mut r = Raster2d::new();
        r.set_backing_size(32, 32);
        r.reset_transform();
        r.clear(BLACK);
        r.line(4.0, 16.0, 28.0, 16.0, 2.0, WHITE);
        assert_eq!(r.pixel(5, 16), WHITE);
        assert_eq!(r.pixel(27, 16), WHITE);
        assert_eq!(r.pixel(16, 20), BLACK);
    }

    #[test]
    fn alpha_blends_toward_source() {
        let mut r = Raster2d::new();
        r.set_backing_size(4, 4);
        r.reset_transform();
        r.clear(BLACK);
        r.fill_circle(2.0, 2.0, 4.0, Rgba::new(255, 255, 255, 128));
        let p = r.pixel(2, 2);
        assert!(p.r > 100 && p.r < 160);
    }
}
