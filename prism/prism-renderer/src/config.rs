//! Renderer configuration: ambient term, depth planes, light capacity, output.

/// Prism renderer configuration.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Ambient color composited by the Ambient and FinalLit modes (RGBA).
    pub ambient_color: [f32; 4],
    /// Near clip plane distance.
    pub depth_near: f32,
    /// Far clip plane distance.
    pub depth_far: f32,
    /// Capacity of the per-frame light instance buffer; extra lights are
    /// dropped with a warning.
    pub max_point_lights: u32,
    /// Texture format of the presentation output (e.g. Rgba8Unorm or
    /// Bgra8Unorm for a swapchain).
    pub output_format: wgpu::TextureFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ambient_color: [0.2, 0.2, 0.2, 1.0],
            depth_near: 0.1,
            depth_far: 1000.0,
            max_point_lights: 64,
            output_format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}
