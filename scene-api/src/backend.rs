//! Trait for render backends. The host uses this to call prepare/render_frame
//! uniformly without holding any GPU types.

use crate::{ExtractedScene, ExtractedView, PresentationMode, RenderError};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

pub trait RenderBackend: Send {
    /// Prepare phase: upload extracted instances and lights to the GPU.
    fn prepare(&mut self, extracted: &ExtractedScene);

    /// Render one frame offscreen. Submits work internally.
    fn render_frame(&mut self, view: &ExtractedView) -> Result<(), RenderError>;

    /// Switch the displayed buffer. Takes effect on the next present.
    fn select_mode(&mut self, mode: PresentationMode);
}

/// Extension for backends that can present to a window. The host passes raw
/// handles (e.g. from winit); the backend owns surface configuration and
/// performs acquire + present internally.
pub trait RenderBackendWindow: RenderBackend + Send {
    fn render_frame_to_window(
        &mut self,
        view: &ExtractedView,
        raw_window_handle: RawWindowHandle,
        raw_display_handle: RawDisplayHandle,
    ) -> Result<(), RenderError>;
}
