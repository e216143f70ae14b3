//! Windowed deferred viewer: floor + ring of spheres, orbiting point lights,
//! number keys 1..9,0 switch the displayed buffer, space pauses, O reloads
//! the ring mesh from the OBJ path given on the command line.
//! Run: cargo run -p debug --bin deferred_window [-- model.obj]

use std::path::PathBuf;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use scene_api::{
    ExtractedInstance, ExtractedScene, ExtractedView, InstanceMaterial, PointLight,
    PresentationMode, RenderBackendWindow, ViewSnapshot, ViewerCommand,
};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use prism_renderer::math::mat4_mul;

/// Build perspective projection matrix (column-major, WebGPU NDC z in [0,1]).
fn perspective_projection(fov_y_rad: f32, aspect: f32, near: f32, far: f32) -> [f32; 16] {
    let t = (fov_y_rad / 2.0).tan();
    let sy = 1.0 / t;
    let sx = sy / aspect;
    let a = far / (near - far);
    let b = (near * far) / (near - far);
    [
        sx, 0.0, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 0.0, a, -1.0, 0.0, 0.0, b, 0.0,
    ]
}

/// Build look-at view matrix (column-major). Camera at eye looking at center.
fn look_at(eye: [f32; 3], center: [f32; 3], up: [f32; 3]) -> [f32; 16] {
    let sub = |a: [f32; 3], b: [f32; 3]| [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    let dot = |a: [f32; 3], b: [f32; 3]| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let cross = |a: [f32; 3], b: [f32; 3]| {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    };
    let normalize = |v: [f32; 3]| {
        let len = dot(v, v).sqrt();
        [v[0] / len, v[1] / len, v[2] / len]
    };
    let f = normalize(sub(center, eye));
    let s = normalize(cross(f, up));
    let u = cross(s, f);
    [
        s[0],
        u[0],
        -f[0],
        0.0,
        s[1],
        u[1],
        -f[1],
        0.0,
        s[2],
        u[2],
        -f[2],
        0.0,
        -dot(s, eye),
        -dot(u, eye),
        dot(f, eye),
        1.0,
    ]
}

fn translation_scale(translation: [f32; 3], scale: f32) -> [f32; 16] {
    [
        scale,
        0.0,
        0.0,
        0.0,
        0.0,
        scale,
        0.0,
        0.0,
        0.0,
        0.0,
        scale,
        0.0,
        translation[0],
        translation[1],
        translation[2],
        1.0,
    ]
}

fn rotation_y(angle: f32) -> [f32; 16] {
    let (sin, cos) = angle.sin_cos();
    [
        cos, 0.0, -sin, 0.0, 0.0, 1.0, 0.0, 0.0, sin, 0.0, cos, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]
}

/// Interleaved position+normal UV sphere (24-byte stride).
fn sphere_mesh(stacks: u32, slices: u32) -> (Vec<u8>, Vec<u8>) {
    let mut vertices: Vec<f32> = Vec::new();
    for stack in 0..=stacks {
        let theta = stack as f32 * std::f32::consts::PI / stacks as f32;
        for slice in 0..=slices {
            let phi = slice as f32 * 2.0 * std::f32::consts::PI / slices as f32;
            let x = theta.sin() * phi.cos();
            let y = theta.cos();
            let z = theta.sin() * phi.sin();
            vertices.extend_from_slice(&[x, y, z, x, y, z]);
        }
    }
    let mut indices: Vec<u32> = Vec::new();
    let row = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let v00 = stack * row + slice;
            let v10 = (stack + 1) * row + slice;
            let v11 = (stack + 1) * row + slice + 1;
            let v01 = stack * row + slice + 1;
            indices.extend_from_slice(&[v00, v11, v10, v00, v01, v11]);
        }
    }
    (
        bytemuck::cast_slice(&vertices).to_vec(),
        bytemuck::cast_slice(&indices).to_vec(),
    )
}

/// Unit floor quad in the xz plane, normal up.
fn floor_mesh() -> (Vec<u8>, Vec<u8>) {
    let vertices: [f32; 24] = [
        -1.0, 0.0, -1.0, 0.0, 1.0, 0.0, //
        -1.0, 0.0, 1.0, 0.0, 1.0, 0.0, //
        1.0, 0.0, 1.0, 0.0, 1.0, 0.0, //
        1.0, 0.0, -1.0, 0.0, 1.0, 0.0,
    ];
    let indices: [u32; 6] = [0, 1, 2, 0, 2, 3];
    (
        bytemuck::cast_slice(&vertices).to_vec(),
        bytemuck::cast_slice(&indices).to_vec(),
    )
}

/// Load an OBJ into the agreed position+normal layout.
fn load_obj_mesh(path: &std::path::Path) -> Result<(Vec<u8>, Vec<u8>), String> {
    let (models, _) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| e.to_string())?;
    let model = models.first().ok_or("OBJ contains no mesh")?;
    let mesh = &model.mesh;
    let vertex_count = mesh.positions.len() / 3;
    let mut vertices: Vec<f32> = Vec::with_capacity(vertex_count * 6);
    for i in 0..vertex_count {
        vertices.extend_from_slice(&mesh.positions[i * 3..i * 3 + 3]);
        if mesh.normals.len() >= (i + 1) * 3 {
            vertices.extend_from_slice(&mesh.normals[i * 3..i * 3 + 3]);
        } else {
            vertices.extend_from_slice(&[0.0, 1.0, 0.0]);
        }
    }
    Ok((
        bytemuck::cast_slice(&vertices).to_vec(),
        bytemuck::cast_slice(&mesh.indices).to_vec(),
    ))
}

const FLOOR_ID: u64 = 1;
const RING_BASE_ID: u64 = 10;
const RING_COUNT: usize = 12;
const LIGHT_COUNT: usize = 10;

struct RingEntity {
    id: u64,
    orbit_angle: f32,
    spin: f32,
    spin_step: f32,
    transform: [f32; 16],
    prev_transform: [f32; 16],
    material: InstanceMaterial,
}

/// The demo scene. Owns its instance count explicitly; nothing global.
struct Scene {
    ring_mesh: (Vec<u8>, Vec<u8>),
    floor_mesh: (Vec<u8>, Vec<u8>),
    ring: Vec<RingEntity>,
    lights: Vec<PointLight>,
    light_phase: f32,
    instance_count: usize,
    paused: bool,
}

impl Scene {
    fn new() -> Self {
        let mut ring = Vec::with_capacity(RING_COUNT);
        for k in 0..RING_COUNT {
            let orbit_angle = k as f32 * 2.0 * std::f32::consts::PI / RING_COUNT as f32;
            let fraction = k as f32 / RING_COUNT as f32;
            let transform = mat4_mul(
                &translation_scale(
                    [orbit_angle.cos() * 15.0, 0.0, orbit_angle.sin() * 15.0],
                    1.0,
                ),
                &rotation_y(0.0),
            );
            ring.push(RingEntity {
                id: RING_BASE_ID + k as u64,
                orbit_angle,
                spin: 0.0,
                spin_step: 0.01 + 0.002 * k as f32,
                transform,
                prev_transform: transform,
                material: InstanceMaterial {
                    diffuse: [fraction, 1.0 - fraction, 0.0],
                    specular: [1.0, 1.0, 1.0],
                    specular_exponent: 16.0,
                },
            });
        }
        let lights = (0..LIGHT_COUNT)
            .map(|_| PointLight {
                radius: 10.0,
                ..PointLight::default()
            })
            .collect();
        let mut scene = Self {
            ring_mesh: sphere_mesh(16, 24),
            floor_mesh: floor_mesh(),
            ring,
            lights,
            light_phase: 0.0,
            instance_count: RING_COUNT + 1,
            paused: false,
        };
        scene.place_lights();
        scene
    }

    fn place_lights(&mut self) {
        let count = self.lights.len();
        for (k, light) in self.lights.iter_mut().enumerate() {
            let angle = self.light_phase + k as f32 * 2.0 * std::f32::consts::PI / count as f32;
            light.position = [angle.cos() * 17.0, 0.0, angle.sin() * 17.0];
        }
    }

    fn update(&mut self) {
        for entity in &mut self.ring {
            entity.prev_transform = entity.transform;
            entity.spin += entity.spin_step;
            entity.transform = mat4_mul(
                &translation_scale(
                    [
                        entity.orbit_angle.cos() * 15.0,
                        0.0,
                        entity.orbit_angle.sin() * 15.0,
                    ],
                    1.0,
                ),
                &rotation_y(entity.spin),
            );
        }
        self.light_phase += 0.0016;
        self.place_lights();
    }

    fn reload_ring_mesh(&mut self, path: &std::path::Path) {
        match load_obj_mesh(path) {
            Ok(mesh) => {
                log::info!("reloaded ring mesh from {}", path.display());
                self.ring_mesh = mesh;
            }
            Err(e) => log::error!("failed to load {}: {e}", path.display()),
        }
    }

    fn extract(&self) -> ExtractedScene {
        let mut scene = ExtractedScene::default();
        let floor_transform = translation_scale([0.0, -2.0, 0.0], 100.0);
        scene.instances.insert(
            FLOOR_ID,
            ExtractedInstance {
                entity_id: FLOOR_ID,
                vertex_data: self.floor_mesh.0.clone(),
                index_data: self.floor_mesh.1.clone(),
                transform: floor_transform,
                prev_transform: floor_transform,
                material: InstanceMaterial {
                    diffuse: [0.0, 0.0, 1.0],
                    specular: [0.5, 0.5, 0.5],
                    specular_exponent: 1.0,
                },
                visible: true,
            },
        );
        for entity in &self.ring {
            scene.instances.insert(
                entity.id,
                ExtractedInstance {
                    entity_id: entity.id,
                    vertex_data: self.ring_mesh.0.clone(),
                    index_data: self.ring_mesh.1.clone(),
                    transform: entity.transform,
                    prev_transform: entity.prev_transform,
                    material: entity.material,
                    visible: true,
                },
            );
        }
        scene.lights = self.lights.clone();
        scene
    }
}

struct App {
    window: Option<winit::window::Window>,
    backend: Option<Box<dyn RenderBackendWindow>>,
    size: (u32, u32),
    scene: Scene,
    obj_path: Option<PathBuf>,
}

impl App {
    fn new(obj_path: Option<PathBuf>) -> Self {
        Self {
            window: None,
            backend: None,
            size: (800, 600),
            scene: Scene::new(),
            obj_path,
        }
    }

    fn snapshot(&self) -> ViewSnapshot {
        let (w, h) = self.size;
        let aspect = if h > 0 { w as f32 / h as f32 } else { 1.0 };
        ViewSnapshot {
            view: look_at([0.0, 12.0, 40.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            projection: perspective_projection(
                std::f32::consts::FRAC_PI_4,
                aspect,
                0.1,
                1000.0,
            ),
        }
    }

    fn dispatch(&mut self, command: ViewerCommand) {
        match command {
            ViewerCommand::SelectMode(mode) => {
                log::info!("presentation mode: {mode:?}");
                if let Some(backend) = &mut self.backend {
                    backend.select_mode(mode);
                }
            }
            ViewerCommand::ReloadScene(path) => self.scene.reload_ring_mesh(&path),
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        let digit = match code {
            KeyCode::Digit1 => Some(0),
            KeyCode::Digit2 => Some(1),
            KeyCode::Digit3 => Some(2),
            KeyCode::Digit4 => Some(3),
            KeyCode::Digit5 => Some(4),
            KeyCode::Digit6 => Some(5),
            KeyCode::Digit7 => Some(6),
            KeyCode::Digit8 => Some(7),
            KeyCode::Digit9 => Some(8),
            KeyCode::Digit0 => Some(9),
            _ => None,
        };
        if let Some(index) = digit {
            if let Some(mode) = PresentationMode::from_index(index) {
                self.dispatch(ViewerCommand::SelectMode(mode));
            }
            return;
        }
        match code {
            KeyCode::Space => self.scene.paused = !self.scene.paused,
            KeyCode::KeyO => {
                if let Some(path) = self.obj_path.clone() {
                    self.dispatch(ViewerCommand::ReloadScene(path));
                } else {
                    log::warn!("no OBJ path on the command line, nothing to reload");
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = winit::window::WindowAttributes::default()
            .with_title("Prism deferred viewer (keys 1-9,0 select buffer)")
            .with_inner_size(winit::dpi::LogicalSize::new(800, 600));
        let window = event_loop.create_window(attrs).expect("create window");
        let phys = window.inner_size();
        self.size = (phys.width, phys.height);
        self.window = Some(window);
        if let Some(ref w) = self.window {
            w.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical) => {
                self.size = (physical.width.max(1), physical.height.max(1));
                if let Some(ref w) = self.window {
                    w.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.handle_key(code);
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let window = match &self.window {
                    Some(w) => w,
                    None => return,
                };
                self.size = {
                    let phys = window.inner_size();
                    (phys.width.max(1), phys.height.max(1))
                };
                if self.backend.is_none() {
                    match prism_bridge::PrismWindowBackend::from_window(window) {
                        Ok(backend) => self.backend = Some(backend),
                        Err(e) => {
                            log::error!("PrismWindowBackend::from_window failed: {e}");
                            event_loop.exit();
                            return;
                        }
                    }
                }
                // A paused frame skips the whole pipeline invocation.
                if !self.scene.paused {
                    self.scene.update();
                    let (raw_window, raw_display) =
                        match (window.window_handle(), window.display_handle()) {
                            (Ok(wh), Ok(dh)) => (wh.as_raw(), dh.as_raw()),
                            _ => return,
                        };
                    let extracted = self.scene.extract();
                    let view = ExtractedView {
                        snapshot: self.snapshot(),
                        viewport_size: self.size,
                    };
                    let backend = match &mut self.backend {
                        Some(b) => b,
                        None => return,
                    };
                    backend.prepare(&extracted);
                    if let Err(e) = backend.render_frame_to_window(&view, raw_window, raw_display)
                    {
                        log::error!("frame failed: {e}");
                        event_loop.exit();
                    }
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() -> Result<(), String> {
    env_logger::init();
    let obj_path = std::env::args().nth(1).map(PathBuf::from);
    let event_loop = winit::event_loop::EventLoop::new().map_err(|e| e.to_string())?;
    let mut app = App::new(obj_path);
    event_loop.run_app(&mut app).map_err(|e| e.to_string())?;
    Ok(())
}
