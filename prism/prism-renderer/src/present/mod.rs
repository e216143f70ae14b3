//! Presentation pass: full-screen draw of whichever buffer is selected.
//! One pipeline per mode, all built from the entry points of a single
//! shader; raw channels are shown pixel-for-pixel with no tone mapping,
//! composites read the light buffer. No depth attachment, no blending.

use scene_api::{PresentationMode, RenderError};
use wgpu::CommandEncoder;

use crate::resources::RenderTargets;
use crate::uniforms::FRAME_UNIFORMS_SIZE;

const PRESENT_SHADER: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/present.wgsl"));

fn entry_point(mode: PresentationMode) -> &'static str {
    match mode {
        PresentationMode::Depth => "fs_depth",
        PresentationMode::LinearDepth => "fs_linear_depth",
        PresentationMode::Position => "fs_position",
        PresentationMode::Normal => "fs_normal",
        PresentationMode::Diffuse => "fs_diffuse",
        PresentationMode::Specular => "fs_specular",
        PresentationMode::Velocity => "fs_velocity",
        PresentationMode::Ambient => "fs_ambient",
        PresentationMode::MotionBlur => "fs_motion_blur",
        PresentationMode::FinalLit => "fs_final",
    }
}

pub struct PresentPass {
    pipelines: Vec<wgpu::RenderPipeline>,
    frame_layout: wgpu::BindGroupLayout,
    inputs_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    mode: PresentationMode,
}

impl PresentPass {
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("present_shader"),
            source: wgpu::ShaderSource::Wgsl(PRESENT_SHADER.into()),
        });
        // Deferred data is pixel-exact: nearest filtering, clamped edges.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("present_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present_frame_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(FRAME_UNIFORMS_SIZE),
                },
                count: None,
            }],
        });

        let channel_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let inputs_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present_inputs_layout"),
            entries: &[
                channel_entry(0),
                channel_entry(1),
                channel_entry(2),
                channel_entry(3),
                channel_entry(4),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                channel_entry(6),
                wgpu::BindGroupLayoutEntry {
                    binding: 7,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("present_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &inputs_layout],
            push_constant_ranges: &[],
        });

        let pipelines = PresentationMode::ALL
            .iter()
            .map(|&mode| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(entry_point(mode)),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_fullscreen"),
                        buffers: &[],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some(entry_point(mode)),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: output_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .collect();

        Ok(Self {
            pipelines,
            frame_layout,
            inputs_layout,
            sampler,
            mode: PresentationMode::default(),
        })
    }

    /// Set the active mode unconditionally. Takes effect at the next encode;
    /// a pass already issued this frame is unaffected.
    pub fn select(&mut self, mode: PresentationMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    /// Draw the active buffer to the output view. Composite modes read
    /// whatever the light buffer currently holds; without a light pass this
    /// frame that is the previous frame's accumulation (stale but defined).
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        device: &wgpu::Device,
        targets: &RenderTargets,
        frame_buf: &wgpu::Buffer,
        output_view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present_frame_group"),
            layout: &self.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buf.as_entire_binding(),
            }],
        });
        let position = targets.position_view();
        let normal = targets.normal_view();
        let diffuse = targets.diffuse_view();
        let specular = targets.specular_view();
        let velocity = targets.velocity_view();
        let depth = targets.depth_view();
        let light_buffer = targets.light_buffer_view();
        let inputs_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present_inputs_group"),
            layout: &self.inputs_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&position),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&normal),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&diffuse),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&specular),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&velocity),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&depth),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&light_buffer),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipelines[self.mode.index()]);
        rp.set_bind_group(0, &frame_group, &[]);
        rp.set_bind_group(1, &inputs_group, &[]);
        rp.draw(0..3, 0..1);
        drop(rp);
        Ok(())
    }
}
