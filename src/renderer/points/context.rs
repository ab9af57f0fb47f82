//! GPU context acquisition and offscreen target management.
//!
//! Acquisition is lazy: `PointsRenderer::new` records configuration only,
//! and the adapter/device pair is requested at first render. A failed
//! acquisition surfaces as a descriptive `Surface` error then, never at
//! init.

use crate::error::{RenderError, RenderResult};

pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Request an adapter and device. Headless: no surface compatibility
    /// constraint.
    pub fn acquire() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| RenderError::surface("no suitable GPU adapter"))?;

        let info = adapter.get_info();
        log::info!(
            "scatterforge device: {} ({:?} / {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let mut limits = adapter.limits();
        limits = limits.using_resolution(wgpu::Limits::downlevel_defaults());
        let max_texture_dim = limits.max_texture_dimension_2d;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                label: Some("scatterforge-device"),
            },
            None,
        ))
        .map_err(|e| RenderError::surface(format!("request_device failed: {e}")))?;

        Ok(Self {
            device,
            queue,
            adapter_info: info,
            max_texture_dim,
        })
    }

    /// Whether any adapter exists at all; lets tests skip instead of fail
    /// on GPU-less machines.
    pub fn adapter_available() -> bool {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .is_some()
    }

    pub fn create_target(
        &self,
        label: &str,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

/// Align to WebGPU's required bytes-per-row for texture copies.
#[inline]
pub fn align_copy_bpr(unpadded: u32) -> u32 {
    let a = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(a) * a
}

/// Copy a texture into a tightly packed RGBA byte vector.
pub fn read_texture_rgba(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> RenderResult<Vec<u8>> {
    let row_bytes = width * 4;
    let padded_bpr = align_copy_bpr(row_bytes);
    let size = (padded_bpr as u64) * (height as u64);

    let readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("sf.Readback"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sf.Readback.Encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &readback,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit([encoder.finish()]);

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| RenderError::readback("map_async channel closed"))?
        .map_err(|e| RenderError::readback(format!("map_async failed: {e:?}")))?;

    let data = slice.get_mapped_range();
    let mut out = vec![0u8; (row_bytes * height) as usize];
    for y in 0..height as usize {
        let src = y * padded_bpr as usize;
        let dst = y * row_bytes as usize;
        out[dst..dst + row_bytes as usize]
            .copy_from_slice(&data[src..src + row_bytes as usize]);
    }
    drop(data);
    readback.unmap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_alignment_rounds_up_to_256() {
        assert_eq!(align_copy_bpr(1), 256);
        assert_eq!(align_copy_bpr(256), 256);
        assert_eq!(align_copy_bpr(257), 512);
        assert_eq!(align_copy_bpr(1200 * 4), 4864);
    }
}
