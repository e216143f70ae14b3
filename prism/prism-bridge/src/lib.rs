//! Prism bridge: implements the scene-api backend traits on top of the
//! prism renderer, including window/surface management.

mod plugin;
mod window_backend;

pub use plugin::PrismPlugin;
pub use window_backend::PrismWindowBackend;
