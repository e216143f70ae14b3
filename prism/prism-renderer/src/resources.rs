//! Render target set: G-buffer channels, light buffer, shared depth.
//! Every image has identical dimensions; resizing reallocates all of them
//! atomically so no partial-resolution state is ever bound for drawing.

use scene_api::{DeferredChannel, RenderError};
use wgpu::TextureView;

/// Format of the five attribute channels. Full float keeps positions,
/// normals, and velocities pixel-exact; these are never blended.
pub const CHANNEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Accumulation target; must be blendable, which Rgba32Float is not without
/// an extra device feature.
pub const LIGHT_BUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Color attachment count of the geometry target.
pub const GBUFFER_COLOR_ATTACHMENTS: u32 = 5;

pub struct RenderTargets {
    pub position: wgpu::Texture,
    pub normal: wgpu::Texture,
    pub diffuse: wgpu::Texture,
    pub specular: wgpu::Texture,
    pub velocity: wgpu::Texture,
    pub light_buffer: wgpu::Texture,
    pub depth: wgpu::Texture,
    width: u32,
    height: u32,
}

impl RenderTargets {
    /// Reallocate every image at the given dimensions, or return the existing
    /// set unchanged when the size already matches. Validation runs before
    /// any allocation; a rejected configuration is fatal to the pipeline and
    /// never retried. Zero dimensions are a caller contract violation.
    pub fn ensure_size(
        device: &wgpu::Device,
        existing: Option<Self>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        debug_assert!(width > 0 && height > 0, "resize with zero dimension");
        if let Some(targets) = existing {
            if targets.width == width && targets.height == height {
                return Ok(targets);
            }
        }
        let limits = device.limits();
        let max_dim = limits.max_texture_dimension_2d;
        if width > max_dim || height > max_dim {
            return Err(RenderError::Configuration {
                stage: "render_targets",
                reason: format!(
                    "{width}x{height} exceeds the device texture limit of {max_dim}"
                ),
            });
        }
        if GBUFFER_COLOR_ATTACHMENTS > limits.max_color_attachments {
            return Err(RenderError::Configuration {
                stage: "render_targets",
                reason: format!(
                    "geometry target needs {GBUFFER_COLOR_ATTACHMENTS} color attachments, device supports {}",
                    limits.max_color_attachments
                ),
            });
        }
        let make_channel = |label: &str, format: wgpu::TextureFormat| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        let targets = Self {
            position: make_channel("channel_position", CHANNEL_FORMAT),
            normal: make_channel("channel_normal", CHANNEL_FORMAT),
            diffuse: make_channel("channel_diffuse", CHANNEL_FORMAT),
            specular: make_channel("channel_specular", CHANNEL_FORMAT),
            velocity: make_channel("channel_velocity", CHANNEL_FORMAT),
            light_buffer: make_channel("light_buffer", LIGHT_BUFFER_FORMAT),
            depth: make_channel("depth", DEPTH_FORMAT),
            width,
            height,
        };
        log::info!("render targets allocated at {width}x{height}");
        Ok(targets)
    }

    /// The wgpu analog of framebuffer completeness: every image present with
    /// identical dimensions and the expected formats.
    pub fn complete(&self) -> Result<(), RenderError> {
        let check = |texture: &wgpu::Texture, what: &'static str, format: wgpu::TextureFormat| {
            if texture.width() != self.width || texture.height() != self.height {
                return Err(RenderError::Configuration {
                    stage: what,
                    reason: format!(
                        "attachment is {}x{}, target set is {}x{}",
                        texture.width(),
                        texture.height(),
                        self.width,
                        self.height
                    ),
                });
            }
            if texture.format() != format {
                return Err(RenderError::Configuration {
                    stage: what,
                    reason: format!("attachment format {:?}, expected {format:?}", texture.format()),
                });
            }
            Ok(())
        };
        check(&self.position, "position", CHANNEL_FORMAT)?;
        check(&self.normal, "normal", CHANNEL_FORMAT)?;
        check(&self.diffuse, "diffuse", CHANNEL_FORMAT)?;
        check(&self.specular, "specular", CHANNEL_FORMAT)?;
        check(&self.velocity, "velocity", CHANNEL_FORMAT)?;
        check(&self.light_buffer, "light_buffer", LIGHT_BUFFER_FORMAT)?;
        check(&self.depth, "depth", DEPTH_FORMAT)?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn position_view(&self) -> TextureView {
        self.position.create_view(&Default::default())
    }
    pub fn normal_view(&self) -> TextureView {
        self.normal.create_view(&Default::default())
    }
    pub fn diffuse_view(&self) -> TextureView {
        self.diffuse.create_view(&Default::default())
    }
    pub fn specular_view(&self) -> TextureView {
        self.specular.create_view(&Default::default())
    }
    pub fn velocity_view(&self) -> TextureView {
        self.velocity.create_view(&Default::default())
    }
    pub fn light_buffer_view(&self) -> TextureView {
        self.light_buffer.create_view(&Default::default())
    }
    pub fn depth_view(&self) -> TextureView {
        self.depth.create_view(&Default::default())
    }

    /// The image backing a presentation channel. Depth and LinearDepth share
    /// the depth image; LinearDepth is derived at presentation time.
    pub fn channel_image(&self, channel: DeferredChannel) -> &wgpu::Texture {
        match channel {
            DeferredChannel::Depth | DeferredChannel::LinearDepth => &self.depth,
            DeferredChannel::Position => &self.position,
            DeferredChannel::Normal => &self.normal,
            DeferredChannel::Diffuse => &self.diffuse,
            DeferredChannel::Specular => &self.specular,
            DeferredChannel::Velocity => &self.velocity,
        }
    }
}
