//! Data types for extraction from the host into the render world.
//! The host fills these each frame; the backend never inspects geometry
//! beyond the agreed vertex layout (position + normal, 24-byte stride).

use std::collections::HashMap;

/// Surface material for one drawable instance.
#[derive(Clone, Copy, Debug)]
pub struct InstanceMaterial {
    /// Diffuse reflectance (RGB).
    pub diffuse: [f32; 3],
    /// Specular reflectance (RGB).
    pub specular: [f32; 3],
    /// Blinn-Phong exponent.
    pub specular_exponent: f32,
}

impl Default for InstanceMaterial {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8],
            specular: [0.5, 0.5, 0.5],
            specular_exponent: 16.0,
        }
    }
}

/// Per-instance data extracted from the host world.
#[derive(Clone, Debug)]
pub struct ExtractedInstance {
    /// Host-defined entity or instance id.
    pub entity_id: u64,
    /// Vertex data (position + normal interleaved) in the agreed layout.
    pub vertex_data: Vec<u8>,
    /// Index data (u32 indices).
    pub index_data: Vec<u8>,
    /// World transform this frame: column-major 4x4 matrix.
    pub transform: [f32; 16],
    /// World transform last frame; drives the velocity channel.
    pub prev_transform: [f32; 16],
    pub material: InstanceMaterial,
    pub visible: bool,
}

/// A point light: proxy-volume lit, never destroyed during a run.
#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    /// World-space position.
    pub position: [f32; 3],
    /// Emitted color (RGB).
    pub color: [f32; 3],
    /// Radius of effect; contribution reaches zero here.
    pub radius: f32,
    /// Falloff exponent applied to the normalized distance attenuation.
    pub falloff_exponent: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            color: [1.0, 1.0, 1.0],
            radius: 10.0,
            falloff_exponent: 1.0,
        }
    }
}

/// All extracted scene content for the current frame.
#[derive(Default, Debug)]
pub struct ExtractedScene {
    pub instances: HashMap<u64, ExtractedInstance>,
    pub lights: Vec<PointLight>,
}

/// Immutable camera state captured at one instant. The orchestrator keeps two
/// of these (current and previous frame) and swaps them at frame start.
#[derive(Clone, Copy, Debug)]
pub struct ViewSnapshot {
    /// View matrix (world -> view), column-major.
    pub view: [f32; 16],
    /// Projection matrix (view -> clip), column-major.
    pub projection: [f32; 16],
}

impl Default for ViewSnapshot {
    fn default() -> Self {
        let identity = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        Self {
            view: identity,
            projection: identity,
        }
    }
}

/// View/camera data for the current frame.
#[derive(Clone, Copy, Debug)]
pub struct ExtractedView {
    pub snapshot: ViewSnapshot,
    pub viewport_size: (u32, u32),
}

impl Default for ExtractedView {
    fn default() -> Self {
        Self {
            snapshot: ViewSnapshot::default(),
            viewport_size: (800, 600),
        }
    }
}
