//! G-buffer pass: rasterize all opaque instances once, writing position,
//! normal, diffuse, specular, and velocity channels plus depth. Depth test
//! less-than, back-face culling, no blending.

use std::sync::Arc;

use scene_api::{InstanceMaterial, RenderError};
use wgpu::CommandEncoder;

use crate::resources::{RenderTargets, CHANNEL_FORMAT, DEPTH_FORMAT};
use crate::uniforms::FRAME_UNIFORMS_SIZE;

const GBUFFER_SHADER: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/gbuffer.wgsl"));

/// One opaque drawable: geometry buffers plus the per-instance state the
/// pass uploads per draw. Previous transform drives the velocity channel.
#[derive(Clone)]
pub struct InstanceDraw {
    pub vertex_buf: Arc<wgpu::Buffer>,
    pub index_buf: Arc<wgpu::Buffer>,
    pub index_count: u32,
    /// World transform this frame (column-major 4x4).
    pub transform: [f32; 16],
    /// World transform last frame.
    pub prev_transform: [f32; 16],
    pub material: InstanceMaterial,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceUniforms {
    model: [f32; 16],
    prev_model: [f32; 16],
    diffuse: [f32; 4],
    specular: [f32; 4],
}

impl InstanceUniforms {
    fn new(model: [f32; 16], prev_model: [f32; 16], material: &InstanceMaterial) -> Self {
        Self {
            model,
            prev_model,
            diffuse: [material.diffuse[0], material.diffuse[1], material.diffuse[2], 1.0],
            specular: [
                material.specular[0],
                material.specular[1],
                material.specular[2],
                material.specular_exponent,
            ],
        }
    }
}

pub struct GBufferPass {
    pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    instance_layout: wgpu::BindGroupLayout,
}

impl GBufferPass {
    pub fn new(device: &wgpu::Device) -> Result<Self, RenderError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gbuffer_shader"),
            source: wgpu::ShaderSource::Wgsl(GBUFFER_SHADER.into()),
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gbuffer_frame_layout"),
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

        let instance_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gbuffer_instance_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<InstanceUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gbuffer_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &instance_layout],
            push_constant_ranges: &[],
        });

        let channel_target = Some(wgpu::ColorTargetState {
            format: CHANNEL_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gbuffer_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 24,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: 12,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[
                    channel_target.clone(),
                    channel_target.clone(),
                    channel_target.clone(),
                    channel_target.clone(),
                    channel_target,
                ],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            frame_layout,
            instance_layout,
        })
    }

    /// Draw every instance into the channel images. Clears all color
    /// attachments and depth first; the previous frame's contents are fully
    /// overwritten. Instances draw in caller-supplied order.
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        targets: &RenderTargets,
        frame_buf: &wgpu::Buffer,
        instances: &[InstanceDraw],
    ) -> Result<(), RenderError> {
        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gbuffer_frame_group"),
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
        fn cleared(view: &wgpu::TextureView) -> Option<wgpu::RenderPassColorAttachment<'_>> {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        }
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gbuffer_pass"),
            color_attachments: &[
                cleared(&position),
                cleared(&normal),
                cleared(&diffuse),
                cleared(&specular),
                cleared(&velocity),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &frame_group, &[]);
        for instance in instances {
            let instance_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("gbuffer_instance"),
                size: std::mem::size_of::<InstanceUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            queue.write_buffer(
                &instance_buf,
                0,
                bytemuck::bytes_of(&InstanceUniforms::new(
                    instance.transform,
                    instance.prev_transform,
                    &instance.material,
                )),
            );
            let instance_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("gbuffer_instance_group"),
                layout: &self.instance_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: instance_buf.as_entire_binding(),
                }],
            });
            rp.set_bind_group(1, &instance_group, &[]);
            rp.set_vertex_buffer(0, instance.vertex_buf.slice(..));
            rp.set_index_buffer(instance.index_buf.slice(..), wgpu::IndexFormat::Uint32);
            rp.draw_indexed(0..instance.index_count, 0, 0..1);
        }
        drop(rp);
        Ok(())
    }
}
