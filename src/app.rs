//! Windowed host for the pipeline.
//!
//! [`run`] opens a window, builds the GPU context and scene, and drives
//! [`Renderer::render`] from winit's redraw loop. Settings are loaded from the configured
//! store at start-up and written back on exit.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::camera::Camera;
use crate::error::{AppError, SettingsError};
use crate::gpu::GpuContext;
use crate::pipeline::Pipeline;
use crate::scene::Scene;
use crate::settings::{JsonFileStore, MemorySettingsStore, Settings, SettingsStore};

/// Configuration for the app window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Where settings persist between runs; `None` keeps them in memory only.
    pub settings_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Vapor".to_string(),
            width: 800,
            height: 600,
            vsync: true,
            settings_path: None,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    fn store(&self) -> Box<dyn SettingsStore> {
        match &self.settings_path {
            Some(path) => Box::new(JsonFileStore::new(path.clone())),
            None => Box::new(MemorySettingsStore::new()),
        }
    }
}

/// Circles the camera around a point at constant height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoOrbit {
    pub center: Vec3,
    pub radius: f32,
    pub height: f32,
    /// Radians per second.
    pub speed: f32,
}

impl Default for AutoOrbit {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 0.5, 0.0),
            radius: 7.0,
            height: 2.5,
            speed: 0.2,
        }
    }
}

impl AutoOrbit {
    pub fn position(&self, time: f32) -> Vec3 {
        let angle = time * self.speed;
        self.center + Vec3::new(angle.sin() * self.radius, self.height, angle.cos() * self.radius)
    }

    pub fn apply(&self, camera: &mut Camera, time: f32) {
        camera.position = self.position(time);
        camera.target = self.center;
    }
}

/// Owns the GPU context, camera, pipeline and scene of one window.
pub struct Renderer {
    window: Arc<Window>,
    gpu: GpuContext,
    camera: Camera,
    orbit: Option<AutoOrbit>,
    pipeline: Pipeline,
    scene: Rc<RefCell<Scene>>,
    store: Box<dyn SettingsStore>,
    start_time: Instant,
    shut_down: bool,
}

impl Renderer {
    /// Bring up the GPU for `window`, load settings from `store` and bind `scene`.
    ///
    /// Unreadable settings are logged and replaced by defaults.
    pub fn new(
        window: Arc<Window>,
        vsync: bool,
        store: Box<dyn SettingsStore>,
        build_scene: impl FnOnce(&GpuContext) -> Scene,
    ) -> Result<Self, AppError> {
        let gpu = GpuContext::new(window.clone(), vsync)?;

        let settings = match store.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(err) => {
                tracing::warn!(error = %err, "could not load settings, using defaults");
                Settings::default()
            }
        };

        let mut pipeline = Pipeline::new(&gpu, settings);
        pipeline.update_targets(&gpu, gpu.width(), gpu.height());

        let scene = Rc::new(RefCell::new(build_scene(&gpu)));
        pipeline.set_scene(Rc::clone(&scene));

        let camera = Camera::new().with_aspect(gpu.aspect());

        Ok(Self {
            window,
            gpu,
            camera,
            orbit: Some(AutoOrbit::default()),
            pipeline,
            scene,
            store,
            start_time: Instant::now(),
            shut_down: false,
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Replace the camera animation; `None` leaves the camera where it is.
    pub fn set_orbit(&mut self, orbit: Option<AutoOrbit>) {
        self.orbit = orbit;
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn scene(&self) -> Rc<RefCell<Scene>> {
        Rc::clone(&self.scene)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.camera.aspect = self.gpu.aspect();
        self.pipeline.update_targets(&self.gpu, width, height);
    }

    pub fn render(&mut self) {
        let time = self.start_time.elapsed().as_secs_f32();
        if let Some(orbit) = &self.orbit {
            orbit.apply(&mut self.camera, time);
        }
        self.pipeline.render(&self.gpu, &self.camera, time);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Save settings and release GPU resources. Only the first call does anything.
    pub fn shutdown(&mut self) -> Result<(), SettingsError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        let saved = self.store.save(self.pipeline.settings());
        self.pipeline.dispose();
        saved
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(error = %err, "settings not saved");
        }
    }
}

type SceneBuilder = Box<dyn FnOnce(&GpuContext) -> Scene>;

struct VaporApp {
    config: AppConfig,
    build_scene: Option<SceneBuilder>,
    renderer: Option<Renderer>,
    error: Option<AppError>,
}

impl VaporApp {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let Some(build_scene) = self.build_scene.take() else {
            return Ok(());
        };
        let attrs = WindowAttributes::default()
            .with_title(&self.config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.width,
                self.config.height,
            ));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let renderer = Renderer::new(
            window.clone(),
            self.config.vsync,
            self.config.store(),
            build_scene,
        )?;
        window.request_redraw();
        self.renderer = Some(renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        tracing::error!(error = %err, "shutting down");
        self.error.get_or_insert(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for VaporApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                tracing::info!(width = size.width, height = size.height, "window resized");
                renderer.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                renderer.render();
                renderer.request_redraw();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut renderer) = self.renderer.take() {
            if let Err(err) = renderer.shutdown() {
                self.error.get_or_insert(err.into());
            }
        }
    }
}

/// Open a window and render the scene made by `build_scene` until it is closed.
///
/// # Example
///
/// ```no_run
/// use vapor::{AppConfig, Material, Mesh, Scene, Transform, Vec3};
///
/// vapor::run(AppConfig::new().title("Fog").settings_path("vapor.json"), |gpu| {
///     let mut scene = Scene::new();
///     let cube = scene.add_mesh(Mesh::cube(gpu));
///     let grey = scene.add_material(Material::opaque(Vec3::splat(0.6)));
///     scene.spawn(Transform::new(), cube, grey);
///     scene
/// })
/// .expect("renderer failed");
/// ```
pub fn run(
    config: AppConfig,
    build_scene: impl FnOnce(&GpuContext) -> Scene + 'static,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = VaporApp {
        config,
        build_scene: Some(Box::new(build_scene)),
        renderer: None,
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_keeps_radius_and_height() {
        let orbit = AutoOrbit::default();
        for t in [0.0, 1.3, 10.0, 123.4] {
            let p = orbit.position(t) - orbit.center;
            assert!((Vec3::new(p.x, 0.0, p.z).length() - orbit.radius).abs() < 1e-4);
            assert!((p.y - orbit.height).abs() < 1e-6);
        }

        let mut camera = Camera::new();
        orbit.apply(&mut camera, 2.0);
        assert_eq!(camera.target, orbit.center);
        assert_eq!(camera.position, orbit.position(2.0));
    }

    #[test]
    fn config_builder_sets_fields() {
        let config = AppConfig::new()
            .title("t")
            .size(320, 240)
            .vsync(false)
            .settings_path("s.json");
        assert_eq!(config.title, "t");
        assert_eq!((config.width, config.height), (320, 240));
        assert!(!config.vsync);
        assert_eq!(config.settings_path, Some(PathBuf::from("s.json")));
    }

    #[test]
    fn default_config_keeps_settings_in_memory() {
        let mut store = AppConfig::new().store();
        assert!(matches!(store.load(), Ok(None)));
        store.save(&Settings::default()).expect("memory store saves");
        assert_eq!(store.load().expect("loads"), Some(Settings::default()));
    }
}
