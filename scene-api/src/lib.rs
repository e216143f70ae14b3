//! Shared scene API for the prism deferred viewer.
//! Defines extraction types, the presentation-mode vocabulary, the error
//! taxonomy, and the RenderBackend trait so a host can drive the pipeline
//! without touching wgpu types directly.

mod backend;
mod error;
mod extract;
mod mode;

pub use backend::{RenderBackend, RenderBackendWindow};
pub use error::RenderError;
pub use extract::{
    ExtractedInstance, ExtractedScene, ExtractedView, InstanceMaterial, PointLight, ViewSnapshot,
};
pub use mode::{DeferredChannel, PresentationMode, ViewerCommand};
pub use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
