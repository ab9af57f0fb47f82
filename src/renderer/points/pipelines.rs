//! Pipeline and uniform plumbing for the GPU point renderer.

use bytemuck::{Pod, Zeroable};

use super::context::TARGET_FORMAT;

/// Uniform block shared by the point vertex stage and all three fragment
/// variants. Layout mirrors `PointsUniform` in points.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointsUniform {
    pub screen_size: [f32; 2],
    pub center: [f32; 2],
    pub mobius_a: [f32; 2],
    pub scale: f32,
    pub disk_radius: f32,
    pub radius_px: f32,
    pub mode: u32,
    pub ring_inner: f32,
    pub palette_len: u32,
    pub solid_color: [f32; 4],
    /// x = points buffer DPR; remaining lanes unused.
    pub extra: [f32; 4],
}

/// Uniform block for the cached Poincaré backdrop. Layout mirrors
/// `BackdropUniform` in backdrop.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BackdropUniform {
    pub screen_size: [f32; 2],
    pub disk_radius: f32,
    pub border_width: f32,
    pub grid_width: f32,
    pub dpr: f32,
    pub _pad: [f32; 2],
    pub fill_color: [f32; 4],
    pub border_color: [f32; 4],
    pub grid_color: [f32; 4],
    pub background_color: [f32; 4],
}

/// Instance vertex layouts: positions (f32x2) and labels (u32) ride in
/// two separate buffers so labels can be omitted conceptually by overlay
/// passes without re-packing.
fn instance_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    const POS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
    const LABEL: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Uint32];
    [
        wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &POS,
        },
        wgpu::VertexBufferLayout {
            array_stride: 4,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &LABEL,
        },
    ]
}

pub struct Pipelines {
    pub points_layout: wgpu::BindGroupLayout,
    pub circle: wgpu::RenderPipeline,
    pub square: wgpu::RenderPipeline,
    pub solid: wgpu::RenderPipeline,
    pub backdrop_layout: wgpu::BindGroupLayout,
    pub backdrop: wgpu::RenderPipeline,
    pub composite_layout: wgpu::BindGroupLayout,
    /// Backdrop re-blit: overwrites the target.
    pub composite_replace: wgpu::RenderPipeline,
    /// Points-over-backdrop: SRC_ALPHA / ONE_MINUS_SRC_ALPHA.
    pub composite_over: wgpu::RenderPipeline,
    pub sampler: wgpu::Sampler,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let points_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("points.wgsl"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../shaders/points.wgsl").into(),
            ),
        });
        let backdrop_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("backdrop.wgsl"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../shaders/backdrop.wgsl").into(),
            ),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite.wgsl"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../shaders/composite.wgsl").into(),
            ),
        });

        let points_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sf.Points.BindGroupLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
            ],
        });

        let points_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sf.Points.PipelineLayout"),
                bind_group_layouts: &[&points_layout],
                push_constant_ranges: &[],
            });

        let make_points_pipeline = |label: &str, entry: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&points_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &points_shader,
                    entry_point: "vs_main",
                    buffers: &instance_layouts(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &points_shader,
                    entry_point: entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        let circle = make_points_pipeline("sf.Points.Circle", "fs_circle");
        let square = make_points_pipeline("sf.Points.Square", "fs_square");
        let solid = make_points_pipeline("sf.Points.Solid", "fs_solid");

        let backdrop_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sf.Backdrop.BindGroupLayout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let backdrop_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sf.Backdrop.PipelineLayout"),
                bind_group_layouts: &[&backdrop_layout],
                push_constant_ranges: &[],
            });
        let backdrop = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sf.Backdrop.Pipeline"),
            layout: Some(&backdrop_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &backdrop_shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &backdrop_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sf.Composite.BindGroupLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sf.Composite.PipelineLayout"),
                bind_group_layouts: &[&composite_layout],
                push_constant_ranges: &[],
            });
        let make_composite = |label: &str, blend: Option<wgpu::BlendState>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&composite_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &composite_shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &composite_shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };
        let composite_replace = make_composite("sf.Composite.Replace", None);
        let composite_over =
            make_composite("sf.Composite.Over", Some(wgpu::BlendState::ALPHA_BLENDING));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sf.Composite.Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            points_layout,
            circle,
            square,
            solid,
            backdrop_layout,
            backdrop,
            composite_layout,
            composite_replace,
            composite_over,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<PointsUniform>(), 80);
        assert_eq!(std::mem::size_of::<BackdropUniform>(), 96);
    }
}
