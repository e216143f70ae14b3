//! Frame uniform block: camera/projection matrices for the current and
//! previous frame plus global constants. One shared buffer, written exactly
//! once per frame before any draw, read by every pass.

use bytemuck::{Pod, Zeroable};
use scene_api::ViewSnapshot;

use crate::math::{mat4_invert, mat4_mul, MAT4_IDENTITY};

/// Byte size of the uniform buffer binding (content plus the tail pad that
/// rounds a WGSL uniform struct up to 16-byte alignment).
pub const FRAME_UNIFORMS_SIZE: u64 = std::mem::size_of::<FrameUniforms>() as u64;

/// Fixed-layout block shared by all shader stages. Field order and offsets
/// are binary contracts: ten column-major matrices, the ambient color, then
/// five scalars. Any consumer must agree on this exact layout.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [f32; 16],
    pub projection: [f32; 16],
    pub view_proj: [f32; 16],
    pub view_inv: [f32; 16],
    pub projection_inv: [f32; 16],
    pub view_proj_inv: [f32; 16],
    pub prev_view: [f32; 16],
    pub prev_view_proj: [f32; 16],
    pub prev_view_inv: [f32; 16],
    pub prev_view_proj_inv: [f32; 16],
    pub ambient_color: [f32; 4],
    pub depth_far: f32,
    pub depth_near: f32,
    pub depth_diff: f32,
    pub width: f32,
    pub height: f32,
    _pad: [f32; 3],
}

impl FrameUniforms {
    /// Derive the full block from the two camera snapshots. Singular matrices
    /// fall back to identity rather than poisoning the block.
    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        current: &ViewSnapshot,
        previous: &ViewSnapshot,
        ambient_color: [f32; 4],
        depth_near: f32,
        depth_far: f32,
        width: f32,
        height: f32,
    ) -> Self {
        let invert = |m: &[f32; 16]| mat4_invert(m).unwrap_or(MAT4_IDENTITY);
        let view_proj = mat4_mul(&current.projection, &current.view);
        let prev_view_proj = mat4_mul(&previous.projection, &previous.view);
        Self {
            view: current.view,
            projection: current.projection,
            view_proj,
            view_inv: invert(&current.view),
            projection_inv: invert(&current.projection),
            view_proj_inv: invert(&view_proj),
            prev_view: previous.view,
            prev_view_proj,
            prev_view_inv: invert(&previous.view),
            prev_view_proj_inv: invert(&prev_view_proj),
            ambient_color,
            depth_far,
            depth_near,
            depth_diff: depth_far - depth_near,
            width,
            height,
            _pad: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn layout_offsets_are_fixed() {
        // Ten matrices at 64-byte strides, then ambient, then scalars.
        assert_eq!(offset_of!(FrameUniforms, view), 0);
        assert_eq!(offset_of!(FrameUniforms, projection), 64);
        assert_eq!(offset_of!(FrameUniforms, view_proj), 128);
        assert_eq!(offset_of!(FrameUniforms, view_inv), 192);
        assert_eq!(offset_of!(FrameUniforms, projection_inv), 256);
        assert_eq!(offset_of!(FrameUniforms, view_proj_inv), 320);
        assert_eq!(offset_of!(FrameUniforms, prev_view), 384);
        assert_eq!(offset_of!(FrameUniforms, prev_view_proj), 448);
        assert_eq!(offset_of!(FrameUniforms, prev_view_inv), 512);
        assert_eq!(offset_of!(FrameUniforms, prev_view_proj_inv), 576);
        assert_eq!(offset_of!(FrameUniforms, ambient_color), 640);
        assert_eq!(offset_of!(FrameUniforms, depth_far), 656);
        assert_eq!(offset_of!(FrameUniforms, depth_near), 660);
        assert_eq!(offset_of!(FrameUniforms, depth_diff), 664);
        assert_eq!(offset_of!(FrameUniforms, width), 668);
        assert_eq!(offset_of!(FrameUniforms, height), 672);
        // (160 + 4 + 5) floats of content, padded to 16-byte alignment.
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 688);
    }

    #[test]
    fn bytes_round_trip_at_field_offsets() {
        let mut view = [0.0f32; 16];
        let mut projection = [0.0f32; 16];
        for i in 0..16 {
            view[i] = i as f32 + 1.0;
            projection[i] = 100.0 + i as f32;
        }
        let snapshot = ViewSnapshot { view, projection };
        let block = FrameUniforms::compose(
            &snapshot,
            &ViewSnapshot::default(),
            [0.2, 0.3, 0.4, 1.0],
            0.1,
            1000.0,
            800.0,
            600.0,
        );
        let bytes = bytemuck::bytes_of(&block);
        let view_bytes: &[u8] = bytemuck::cast_slice(&view);
        assert_eq!(&bytes[0..64], view_bytes);
        let proj_bytes: &[u8] = bytemuck::cast_slice(&projection);
        assert_eq!(&bytes[64..128], proj_bytes);
        let ambient: [f32; 4] = *bytemuck::from_bytes(&bytes[640..656]);
        assert_eq!(ambient, [0.2, 0.3, 0.4, 1.0]);
        let far: f32 = *bytemuck::from_bytes(&bytes[656..660]);
        let near: f32 = *bytemuck::from_bytes(&bytes[660..664]);
        let diff: f32 = *bytemuck::from_bytes(&bytes[664..668]);
        assert_eq!(far, 1000.0);
        assert_eq!(near, 0.1);
        assert_eq!(diff, 1000.0 - 0.1);
        let width: f32 = *bytemuck::from_bytes(&bytes[668..672]);
        let height: f32 = *bytemuck::from_bytes(&bytes[672..676]);
        assert_eq!(width, 800.0);
        assert_eq!(height, 600.0);
    }

    #[test]
    fn compose_derives_products_and_inverses() {
        let view = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 3.0, -2.0, 5.0, 1.0,
        ];
        let projection = [
            2.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, -1.0, -1.0, 0.0, 0.0, -0.2, 0.0,
        ];
        let current = ViewSnapshot { view, projection };
        let block = FrameUniforms::compose(
            &current,
            &current,
            [0.0; 4],
            0.1,
            100.0,
            640.0,
            480.0,
        );
        assert_eq!(block.view_proj, mat4_mul(&projection, &view));
        let product = mat4_mul(&block.view_proj, &block.view_proj_inv);
        for (i, expected) in MAT4_IDENTITY.iter().enumerate() {
            assert!((product[i] - expected).abs() < 1e-4);
        }
        // Previous-frame block mirrors the snapshot it was given.
        assert_eq!(block.prev_view, view);
        assert_eq!(block.prev_view_proj, block.view_proj);
    }
}
