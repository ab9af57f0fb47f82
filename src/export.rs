//! PNG export of rendered frames: the reference raster buffer directly,
//! or a depadded GPU readback.

use std::path::Path;

use image::{ImageBuffer, Rgba};

use crate::error::{RenderError, RenderResult};

/// Write tightly packed RGBA8 pixels as a PNG.
pub fn write_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> RenderResult<()> {
    if rgba.len() != (width as usize) * (height as usize) * 4 {
        return Err(RenderError::render(format!(
            "pixel buffer is {} bytes, expected {} for {width}x{height}",
            rgba.len(),
            width as usize * height as usize * 4
        )));
    }
    let img: ImageBuffer<Rgba<u8>, _> =
        ImageBuffer::from_raw(width, height, rgba.to_vec())
            .ok_or_else(|| RenderError::render("ImageBuffer::from_raw failed"))?;
    img.save(path)
        .map_err(|e| RenderError::render(format!("png encode failed: {e}")))
}
