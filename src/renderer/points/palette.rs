//! Label palette as a small RGBA8 texture, indexed by `label % len` in
//! the point vertex stage.

use crate::color::Rgba;
use crate::error::{RenderError, RenderResult};

use super::context::GpuContext;

pub struct PaletteTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub len: u32,
}

impl PaletteTexture {
    pub fn new(ctx: &GpuContext, palette: &[Rgba]) -> RenderResult<Self> {
        let len = palette.len() as u32;
        if len == 0 {
            return Err(RenderError::upload("palette must not be empty"));
        }
        if len > ctx.max_texture_dim {
            return Err(RenderError::upload(format!(
                "palette of {len} colors exceeds device texture limit {}",
                ctx.max_texture_dim
            )));
        }

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sf.Palette.Texture"),
            size: wgpu::Extent3d {
                width: len,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let mut bytes = Vec::with_capacity(palette.len() * 4);
        for c in palette {
            bytes.extend_from_slice(&c.to_bytes());
        }
        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(len * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: len,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self { texture, view, len })
    }
}
