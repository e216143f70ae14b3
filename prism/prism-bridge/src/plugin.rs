//! Prism plugin: implements RenderBackend for the host. Owns the mesh cache
//! and the current/previous camera snapshot pair; the swap happens at one
//! well-defined point, the start of each frame.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use prism_renderer::{InstanceDraw, Renderer, RendererConfig};
use scene_api::{
    ExtractedScene, ExtractedView, InstanceMaterial, PointLight, PresentationMode, RenderBackend,
    RenderError, ViewSnapshot,
};

/// Cached GPU buffers and per-frame state for one instance.
struct CachedInstance {
    vertex_buf: Arc<wgpu::Buffer>,
    index_buf: Arc<wgpu::Buffer>,
    index_count: u32,
    vertex_len: usize,
    index_len: usize,
    transform: [f32; 16],
    prev_transform: [f32; 16],
    material: InstanceMaterial,
}

/// Owns the renderer and mesh cache; implements RenderBackend.
pub struct PrismPlugin {
    renderer: Renderer,
    /// Cache by entity id, updated in prepare() from the extracted scene.
    mesh_cache: HashMap<u64, CachedInstance>,
    lights: Vec<PointLight>,
    camera: ViewSnapshot,
    camera_prev: ViewSnapshot,
}

impl PrismPlugin {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, RenderError> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    pub fn new_with_config(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        let renderer = Renderer::new_with_config(device, queue, config)?;
        Ok(Self {
            renderer,
            mesh_cache: HashMap::new(),
            lights: Vec::new(),
            camera: ViewSnapshot::default(),
            camera_prev: ViewSnapshot::default(),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        self.renderer.device()
    }
    pub fn queue(&self) -> &wgpu::Queue {
        self.renderer.queue()
    }
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Render one frame and present to the given view (e.g. a swapchain).
    pub fn render_frame_to_view(
        &mut self,
        view: &ExtractedView,
        output_view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        self.render_frame_impl(view, Some(output_view))
    }

    fn render_frame_impl(
        &mut self,
        view: &ExtractedView,
        output_view: Option<&wgpu::TextureView>,
    ) -> Result<(), RenderError> {
        // The one place the snapshot pair rolls forward.
        self.camera_prev = self.camera;
        self.camera = view.snapshot;

        let (width, height) = view.viewport_size;
        self.renderer.resize(width.max(1), height.max(1))?;

        let instances: Vec<InstanceDraw> = self
            .mesh_cache
            .values()
            .map(|cached| InstanceDraw {
                vertex_buf: Arc::clone(&cached.vertex_buf),
                index_buf: Arc::clone(&cached.index_buf),
                index_count: cached.index_count,
                transform: cached.transform,
                prev_transform: cached.prev_transform,
                material: cached.material,
            })
            .collect();
        let lights = self.lights.clone();

        let mut encoder =
            self.renderer
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("prism_frame"),
                });
        let camera = self.camera;
        let camera_prev = self.camera_prev;
        self.renderer
            .encode_frame(&mut encoder, &camera, &camera_prev, &instances, &lights)?;
        if let Some(output) = output_view {
            self.renderer.encode_present(&mut encoder, output)?;
        }
        self.renderer.submit([encoder.finish()]);
        Ok(())
    }
}

impl RenderBackend for PrismPlugin {
    fn prepare(&mut self, extracted: &ExtractedScene) {
        let device = self.renderer.device();
        let queue = self.renderer.queue();
        let current_entities: HashSet<u64> = extracted.instances.keys().copied().collect();
        self.mesh_cache.retain(|k, _| current_entities.contains(k));
        for (&entity_id, instance) in &extracted.instances {
            if !instance.visible
                || instance.vertex_data.is_empty()
                || instance.index_data.is_empty()
            {
                self.mesh_cache.remove(&entity_id);
                continue;
            }
            let vertex_len = instance.vertex_data.len();
            let index_len = instance.index_data.len();
            let index_count = (index_len / 4) as u32;
            if let Some(cached) = self.mesh_cache.get_mut(&entity_id) {
                if cached.vertex_len == vertex_len && cached.index_len == index_len {
                    queue.write_buffer(&cached.vertex_buf, 0, &instance.vertex_data);
                    queue.write_buffer(&cached.index_buf, 0, &instance.index_data);
                    cached.transform = instance.transform;
                    cached.prev_transform = instance.prev_transform;
                    cached.material = instance.material;
                    continue;
                }
            }
            let vertex_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("prism_instance_vertex"),
                size: vertex_len as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            queue.write_buffer(&vertex_buf, 0, &instance.vertex_data);
            let index_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("prism_instance_index"),
                size: index_len as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            queue.write_buffer(&index_buf, 0, &instance.index_data);
            self.mesh_cache.insert(
                entity_id,
                CachedInstance {
                    vertex_buf: Arc::new(vertex_buf),
                    index_buf: Arc::new(index_buf),
                    index_count,
                    vertex_len,
                    index_len,
                    transform: instance.transform,
                    prev_transform: instance.prev_transform,
                    material: instance.material,
                },
            );
        }
        self.lights.clear();
        self.lights.extend_from_slice(&extracted.lights);
    }

    fn render_frame(&mut self, view: &ExtractedView) -> Result<(), RenderError> {
        self.render_frame_impl(view, None)
    }

    fn select_mode(&mut self, mode: PresentationMode) {
        self.renderer.select_mode(mode);
    }
}
