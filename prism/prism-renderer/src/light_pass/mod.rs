//! Light accumulation pass: one instanced draw of a low-poly sphere proxy
//! per frame, additive One/One blending into the light buffer, depth compare
//! inverted to greater-than against the shared depth image (read-only). A
//! light shades a pixel only where opaque geometry already sits in front of
//! the proxy's rasterized shell.

use scene_api::{PointLight, RenderError};
use wgpu::CommandEncoder;

use crate::resources::{RenderTargets, DEPTH_FORMAT, LIGHT_BUFFER_FORMAT};
use crate::uniforms::FRAME_UNIFORMS_SIZE;

const LIGHTS_SHADER: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/lights.wgsl"));

/// Per-light instance record fed to the vertex stage.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LightInstanceRaw {
    position: [f32; 3],
    radius: f32,
    color: [f32; 3],
    falloff_exponent: f32,
}

impl From<&PointLight> for LightInstanceRaw {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position,
            radius: light.radius,
            color: light.color,
            falloff_exponent: light.falloff_exponent,
        }
    }
}

/// Build the proxy sphere by subdividing an octahedron and pushing every
/// vertex out until the insphere radius is exactly 1, so a proxy scaled by a
/// light's radius always covers the full extent of that light.
fn proxy_sphere(subdivisions: u32) -> (Vec<[f32; 3]>, Vec<u32>) {
    let mut vertices: Vec<[f32; 3]> = vec![
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    // Outward-wound octahedron faces.
    let mut indices: Vec<u32> = vec![
        0, 2, 4, 2, 1, 4, 1, 3, 4, 3, 0, 4, 2, 0, 5, 1, 2, 5, 3, 1, 5, 0, 3, 5,
    ];
    let normalize = |v: [f32; 3]| {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        [v[0] / len, v[1] / len, v[2] / len]
    };
    for _ in 0..subdivisions {
        let mut midpoints: std::collections::HashMap<(u32, u32), u32> =
            std::collections::HashMap::new();
        let mut next = Vec::with_capacity(indices.len() * 4);
        for tri in indices.chunks(3) {
            let mut mids = [0u32; 3];
            for (slot, (a, b)) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])]
                .into_iter()
                .enumerate()
            {
                let key = (a.min(b), a.max(b));
                mids[slot] = *midpoints.entry(key).or_insert_with(|| {
                    let va = vertices[a as usize];
                    let vb = vertices[b as usize];
                    vertices.push(normalize([
                        (va[0] + vb[0]) * 0.5,
                        (va[1] + vb[1]) * 0.5,
                        (va[2] + vb[2]) * 0.5,
                    ]));
                    (vertices.len() - 1) as u32
                });
            }
            next.extend_from_slice(&[
                tri[0], mids[0], mids[2], tri[1], mids[1], mids[0], tri[2], mids[2], mids[1],
                mids[0], mids[1], mids[2],
            ]);
        }
        indices = next;
    }
    // Insphere radius = min distance from the origin to a face plane.
    let mut insphere = f32::MAX;
    for tri in indices.chunks(3) {
        let a = vertices[tri[0] as usize];
        let b = vertices[tri[1] as usize];
        let c = vertices[tri[2] as usize];
        let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let n = [
            ab[1] * ac[2] - ab[2] * ac[1],
            ab[2] * ac[0] - ab[0] * ac[2],
            ab[0] * ac[1] - ab[1] * ac[0],
        ];
        let n_len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let plane_dist = (a[0] * n[0] + a[1] * n[1] + a[2] * n[2]).abs() / n_len;
        insphere = insphere.min(plane_dist);
    }
    for v in &mut vertices {
        v[0] /= insphere;
        v[1] /= insphere;
        v[2] /= insphere;
    }
    (vertices, indices)
}

pub struct LightPass {
    pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    channels_layout: wgpu::BindGroupLayout,
    proxy_vertex_buf: wgpu::Buffer,
    proxy_index_buf: wgpu::Buffer,
    proxy_index_count: u32,
    instance_buf: wgpu::Buffer,
    capacity: u32,
}

impl LightPass {
    pub fn new(device: &wgpu::Device, max_point_lights: u32) -> Result<Self, RenderError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lights_shader"),
            source: wgpu::ShaderSource::Wgsl(LIGHTS_SHADER.into()),
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_pass_frame_layout"),
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
        let channels_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("light_pass_channels_layout"),
            entries: &[
                channel_entry(0),
                channel_entry(1),
                channel_entry(2),
                channel_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("light_pass_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &channels_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("light_pass_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_proxy"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<LightInstanceRaw>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 1,
                                format: wgpu::VertexFormat::Float32x4,
                            },
                            wgpu::VertexAttribute {
                                offset: 16,
                                shader_location: 2,
                                format: wgpu::VertexFormat::Float32x4,
                            },
                        ],
                    },
                ],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_point"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: LIGHT_BUFFER_FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Rasterize the far shell of the proxy so the greater-than test
            // accepts exactly the pixels whose surface lies in front of it,
            // camera-inside-volume included.
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Greater,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let (proxy_vertices, proxy_indices) = proxy_sphere(2);
        let proxy_vertex_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light_proxy_vertices"),
            size: (proxy_vertices.len() * 12) as u64,
            usage: wgpu::BufferUsages::VERTEX,
            mapped_at_creation: true,
        });
        proxy_vertex_buf
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::cast_slice(&proxy_vertices));
        proxy_vertex_buf.unmap();
        let proxy_index_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light_proxy_indices"),
            size: (proxy_indices.len() * 4) as u64,
            usage: wgpu::BufferUsages::INDEX,
            mapped_at_creation: true,
        });
        proxy_index_buf
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::cast_slice(&proxy_indices));
        proxy_index_buf.unmap();

        let capacity = max_point_lights.max(1);
        let instance_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light_instances"),
            size: capacity as u64 * std::mem::size_of::<LightInstanceRaw>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            frame_layout,
            channels_layout,
            proxy_vertex_buf,
            proxy_index_buf,
            proxy_index_count: proxy_indices.len() as u32,
            instance_buf,
            capacity,
        })
    }

    /// Clear the light buffer and accumulate every light into it. Runs even
    /// with zero lights so the buffer never carries stale energy into the
    /// composite modes of the same frame.
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        targets: &RenderTargets,
        frame_buf: &wgpu::Buffer,
        lights: &[PointLight],
    ) -> Result<(), RenderError> {
        let mut count = lights.len() as u32;
        if count > self.capacity {
            log::warn!(
                "light pass: {count} lights exceed the configured capacity {}, dropping the rest",
                self.capacity
            );
            count = self.capacity;
        }
        if count > 0 {
            let raw: Vec<LightInstanceRaw> = lights[..count as usize]
                .iter()
                .map(LightInstanceRaw::from)
                .collect();
            queue.write_buffer(&self.instance_buf, 0, bytemuck::cast_slice(&raw));
        }
        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_pass_frame_group"),
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
        let channels_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light_pass_channels_group"),
            layout: &self.channels_layout,
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
            ],
        });
        let light_view = targets.light_buffer_view();
        let depth_view = targets.depth_view();
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("light_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &light_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            // Shared depth image, read-only: written by the geometry pass,
            // only compared against here.
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: None,
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if count > 0 {
            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &frame_group, &[]);
            rp.set_bind_group(1, &channels_group, &[]);
            rp.set_vertex_buffer(0, self.proxy_vertex_buf.slice(..));
            rp.set_vertex_buffer(1, self.instance_buf.slice(..));
            rp.set_index_buffer(self.proxy_index_buf.slice(..), wgpu::IndexFormat::Uint32);
            rp.draw_indexed(0..self.proxy_index_count, 0, 0..count);
        }
        drop(rp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_instance_layout_is_two_vec4s() {
        assert_eq!(std::mem::size_of::<LightInstanceRaw>(), 32);
        assert_eq!(std::mem::offset_of!(LightInstanceRaw, radius), 12);
        assert_eq!(std::mem::offset_of!(LightInstanceRaw, color), 16);
        assert_eq!(std::mem::offset_of!(LightInstanceRaw, falloff_exponent), 28);
    }

    #[test]
    fn proxy_sphere_is_a_closed_circumscribing_mesh() {
        let (vertices, indices) = proxy_sphere(2);
        assert_eq!(indices.len() % 3, 0);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        // Every vertex sits at or beyond the unit sphere, and not absurdly far.
        for v in &vertices {
            let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!(len >= 1.0 - 1e-4, "vertex inside unit sphere: {len}");
            assert!(len < 1.5, "vertex unreasonably far: {len}");
        }
        // Face planes clear the unit sphere: centroid distance >= 1 after the
        // insphere rescale, within float tolerance.
        for tri in indices.chunks(3) {
            let a = vertices[tri[0] as usize];
            let b = vertices[tri[1] as usize];
            let c = vertices[tri[2] as usize];
            let cx = (a[0] + b[0] + c[0]) / 3.0;
            let cy = (a[1] + b[1] + c[1]) / 3.0;
            let cz = (a[2] + b[2] + c[2]) / 3.0;
            let dist = (cx * cx + cy * cy + cz * cz).sqrt();
            assert!(dist >= 1.0 - 1e-3, "face dips into the unit sphere: {dist}");
        }
    }

    #[test]
    fn subdivision_quadruples_triangles() {
        let (_, level0) = proxy_sphere(0);
        let (_, level1) = proxy_sphere(1);
        let (_, level2) = proxy_sphere(2);
        assert_eq!(level0.len(), 8 * 3);
        assert_eq!(level1.len(), 32 * 3);
        assert_eq!(level2.len(), 128 * 3);
    }
}
