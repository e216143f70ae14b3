//! Prism renderer: wgpu-based deferred pipeline. Geometry rasterizes once
//! into the G-buffer channels, point lights accumulate additively into the
//! light buffer, and a presentation pass displays any intermediate buffer or
//! the final composite.
//!
//! Per-frame order is fixed: `begin_frame` (single uniform write) ->
//! `encode_geometry` -> `encode_lights` -> `encode_present` -> submit.
//! Submission order is the only synchronization; there is no concurrent pass
//! execution.

pub mod config;
pub mod gbuffer;
pub mod light_pass;
pub mod math;
pub mod present;
pub mod resources;
pub mod uniforms;

pub use config::RendererConfig;
pub use gbuffer::{GBufferPass, InstanceDraw};
pub use light_pass::LightPass;
pub use present::PresentPass;
pub use resources::RenderTargets;
pub use uniforms::FrameUniforms;

use scene_api::{PointLight, PresentationMode, RenderError, ViewSnapshot};

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,
    frame_buf: wgpu::Buffer,
    gbuffer_pass: GBufferPass,
    light_pass: LightPass,
    present_pass: PresentPass,
    targets: Option<RenderTargets>,
}

impl Renderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, RenderError> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    pub fn new_with_config(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: RendererConfig,
    ) -> Result<Self, RenderError> {
        let frame_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: uniforms::FRAME_UNIFORMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let gbuffer_pass = GBufferPass::new(&device)?;
        let light_pass = LightPass::new(&device, config.max_point_lights)?;
        let present_pass = PresentPass::new(&device, config.output_format)?;
        Ok(Self {
            device,
            queue,
            config,
            frame_buf,
            gbuffer_pass,
            light_pass,
            present_pass,
            targets: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
    pub fn targets(&self) -> Option<&RenderTargets> {
        self.targets.as_ref()
    }

    /// Reallocate the target set. Must run before the first frame and on
    /// every viewport size change; a same-size call is a no-op. A rejected
    /// configuration is fatal: the caller decides whether to terminate.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let existing = self.targets.take();
        let targets = RenderTargets::ensure_size(&self.device, existing, width, height)?;
        targets.complete()?;
        self.targets = Some(targets);
        Ok(())
    }

    /// Switch the displayed buffer. Takes effect at the next present.
    pub fn select_mode(&mut self, mode: PresentationMode) {
        self.present_pass.select(mode);
    }

    pub fn mode(&self) -> PresentationMode {
        self.present_pass.mode()
    }

    /// Write the frame uniform block from the two camera snapshots. The
    /// single uniform write of the frame; every subsequent pass reads it.
    pub fn begin_frame(
        &mut self,
        current: &ViewSnapshot,
        previous: &ViewSnapshot,
    ) -> Result<(), RenderError> {
        let targets = self.targets.as_ref().ok_or(RenderError::Configuration {
            stage: "frame",
            reason: "begin_frame before the first resize".to_string(),
        })?;
        let block = FrameUniforms::compose(
            current,
            previous,
            self.config.ambient_color,
            self.config.depth_near,
            self.config.depth_far,
            targets.width() as f32,
            targets.height() as f32,
        );
        self.queue
            .write_buffer(&self.frame_buf, 0, bytemuck::bytes_of(&block));
        Ok(())
    }

    pub fn encode_geometry(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        instances: &[InstanceDraw],
    ) -> Result<(), RenderError> {
        let targets = self.require_targets()?;
        self.gbuffer_pass.encode(
            encoder,
            &self.device,
            &self.queue,
            targets,
            &self.frame_buf,
            instances,
        )
    }

    pub fn encode_lights(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        lights: &[PointLight],
    ) -> Result<(), RenderError> {
        let targets = self.require_targets()?;
        self.light_pass.encode(
            encoder,
            &self.device,
            &self.queue,
            targets,
            &self.frame_buf,
            lights,
        )
    }

    pub fn encode_present(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output_view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let targets = self.require_targets()?;
        self.present_pass
            .encode(encoder, &self.device, targets, &self.frame_buf, output_view)
    }

    /// Encode a whole frame minus presentation: uniform write, geometry
    /// pass, light pass. Present separately so a host can skip it or point
    /// it at a swapchain view.
    pub fn encode_frame(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        current: &ViewSnapshot,
        previous: &ViewSnapshot,
        instances: &[InstanceDraw],
        lights: &[PointLight],
    ) -> Result<(), RenderError> {
        self.begin_frame(current, previous)?;
        self.encode_geometry(encoder, instances)?;
        self.encode_lights(encoder, lights)?;
        Ok(())
    }

    pub fn submit(&self, command_buffers: impl IntoIterator<Item = wgpu::CommandBuffer>) {
        self.queue.submit(command_buffers);
    }

    fn require_targets(&self) -> Result<&RenderTargets, RenderError> {
        self.targets.as_ref().ok_or(RenderError::Configuration {
            stage: "frame",
            reason: "no render targets (call resize first)".to_string(),
        })
    }
}
