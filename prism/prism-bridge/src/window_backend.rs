//! Window-capable backend: created from a window, implements
//! RenderBackendWindow. The surface is recreated each frame from the raw
//! handles (wgpu::Surface lifetime is tied to the window; this avoids
//! transmute and platform staleness when the window is dragged/resized).

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use scene_api::{
    ExtractedScene, ExtractedView, PresentationMode, RenderBackend, RenderBackendWindow,
    RenderError,
};
use wgpu::SurfaceTargetUnsafe;

use crate::plugin::PrismPlugin;
use prism_renderer::RendererConfig;

/// Backend that owns the wgpu Instance and PrismPlugin; presents to a window.
pub struct PrismWindowBackend {
    instance: wgpu::Instance,
    plugin: PrismPlugin,
}

impl PrismWindowBackend {
    /// Create a window-capable backend from a window (e.g. winit). The
    /// window is only used for raw handles and adapter selection; the host
    /// must keep it alive and pass its handles to `render_frame_to_window`
    /// each frame.
    pub fn from_window(
        window: &(impl HasWindowHandle + HasDisplayHandle),
    ) -> Result<Box<dyn RenderBackendWindow>, RenderError> {
        let (raw_window, raw_display) = {
            let wh = window
                .window_handle()
                .map_err(|e| RenderError::Surface(e.to_string()))?;
            let dh = window
                .display_handle()
                .map_err(|e| RenderError::Surface(e.to_string()))?;
            (wh.as_raw(), dh.as_raw())
        };
        let backend = pollster::block_on(Self::from_raw_handles_async(raw_window, raw_display))?;
        Ok(Box::new(backend))
    }

    async fn from_raw_handles_async(
        raw_window_handle: raw_window_handle::RawWindowHandle,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let target = SurfaceTargetUnsafe::RawHandle {
            raw_window_handle,
            raw_display_handle,
        };
        let surface = unsafe {
            instance
                .create_surface_unsafe(target)
                .map_err(|e| RenderError::Surface(e.to_string()))?
        };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::Configuration {
                stage: "adapter",
                reason: "no compatible graphics adapter".to_string(),
            })?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .map_err(|e| RenderError::Configuration {
                stage: "device",
                reason: e.to_string(),
            })?;
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .first()
            .copied()
            .unwrap_or(wgpu::TextureFormat::Rgba8Unorm);
        log::info!("prism window backend on {:?} ({format:?})", adapter.get_info().name);
        let config = RendererConfig {
            output_format: format,
            ..RendererConfig::default()
        };
        let plugin = PrismPlugin::new_with_config(device, queue, config)?;
        drop(surface);
        Ok(Self { instance, plugin })
    }

    fn surface_config(
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::SurfaceConfiguration {
        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }
}

impl RenderBackend for PrismWindowBackend {
    fn prepare(&mut self, extracted: &ExtractedScene) {
        self.plugin.prepare(extracted);
    }

    fn render_frame(&mut self, view: &ExtractedView) -> Result<(), RenderError> {
        self.plugin.render_frame(view)
    }

    fn select_mode(&mut self, mode: PresentationMode) {
        self.plugin.select_mode(mode);
    }
}

impl RenderBackendWindow for PrismWindowBackend {
    fn render_frame_to_window(
        &mut self,
        view: &ExtractedView,
        raw_window_handle: raw_window_handle::RawWindowHandle,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<(), RenderError> {
        let target = SurfaceTargetUnsafe::RawHandle {
            raw_window_handle,
            raw_display_handle,
        };
        let surface = unsafe {
            self.instance
                .create_surface_unsafe(target)
                .map_err(|e| RenderError::Surface(e.to_string()))?
        };
        let (width, height) = view.viewport_size;
        let format = self.plugin.renderer().config().output_format;
        let config = Self::surface_config(format, width.max(1), height.max(1));
        surface.configure(self.plugin.device(), &config);

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                surface.configure(self.plugin.device(), &config);
                surface
                    .get_current_texture()
                    .map_err(|e| RenderError::Surface(e.to_string()))?
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let output_view = frame.texture.create_view(&Default::default());
        self.plugin.render_frame_to_view(view, &output_view)?;
        frame.present();
        Ok(())
    }
}
