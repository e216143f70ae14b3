//! Headless single-frame driver: renders one frame offscreen through every
//! presentation mode and reports. Useful as a no-display smoke check.
//! Run: cargo run -p debug --bin headless_frame

use std::collections::HashMap;

use prism_bridge::PrismPlugin;
use scene_api::{
    ExtractedInstance, ExtractedScene, ExtractedView, InstanceMaterial, PointLight,
    PresentationMode, RenderBackend, ViewSnapshot,
};

fn main() {
    env_logger::init();
    pollster::block_on(async {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .expect("No adapter");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .expect("No device");

        let output = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("headless_output"),
            size: wgpu::Extent3d {
                width: 800,
                height: 600,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let output_view = output.create_view(&Default::default());

        let mut plugin = PrismPlugin::new(device, queue).expect("PrismPlugin::new");

        let vertex_data: Vec<u8> = bytemuck::cast_slice(&[
            0.0f32, 0.5, 0.0, 0.0, 0.0, 1.0, //
            -0.5, -0.5, 0.0, 0.0, 0.0, 1.0, //
            0.5, -0.5, 0.0, 0.0, 0.0, 1.0,
        ])
        .to_vec();
        let index_data: Vec<u8> = bytemuck::cast_slice(&[0u32, 1, 2]).to_vec();
        let identity: [f32; 16] = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        let mut instances = HashMap::new();
        instances.insert(
            1u64,
            ExtractedInstance {
                entity_id: 1,
                vertex_data,
                index_data,
                transform: identity,
                prev_transform: identity,
                material: InstanceMaterial {
                    diffuse: [1.0, 0.0, 0.0],
                    ..InstanceMaterial::default()
                },
                visible: true,
            },
        );
        let extracted = ExtractedScene {
            instances,
            lights: vec![PointLight {
                position: [0.0, 0.0, 2.0],
                ..PointLight::default()
            }],
        };
        plugin.prepare(&extracted);

        let view = ExtractedView {
            snapshot: ViewSnapshot::default(),
            viewport_size: (800, 600),
        };
        for mode in PresentationMode::ALL {
            plugin.select_mode(mode);
            plugin
                .render_frame_to_view(&view, &output_view)
                .unwrap_or_else(|e| panic!("frame in {mode:?} failed: {e}"));
        }
        let _ = plugin.device().poll(wgpu::Maintain::Wait);
        println!("prism headless_frame: all {} modes OK", PresentationMode::ALL.len());
    });
}
