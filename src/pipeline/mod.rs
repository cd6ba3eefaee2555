//! The multi-pass frame pipeline.
//!
//! [`Pipeline`] owns every render target and pass. Each frame it asks the
//! [`FrameState`] for a [`FramePlan`](crate::render_graph::FramePlan) and executes it in
//! order into one command encoder:
//!
//! ```text
//! shadow ─▶ scene colour ─▶ (velocity ─▶ TAA) ─▶ stochastic depth ─▶ fog march
//!        ─▶ fog blend ─▶ compose ─▶ surface
//! ```
//!
//! The plan is pure data; this module only turns target ids into views and calls the
//! matching pass.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(gpu: &vapor::GpuContext) {
//! use std::{cell::RefCell, rc::Rc};
//! use vapor::{Camera, Pipeline, Scene, Settings};
//!
//! let mut pipeline = Pipeline::new(gpu, Settings::default());
//! pipeline.update_targets(gpu, gpu.width(), gpu.height());
//! pipeline.set_scene(Rc::new(RefCell::new(Scene::new())));
//! pipeline.render(gpu, &Camera::new(), 0.0);
//! # }
//! ```

mod planner;

pub use planner::{
    DEPTH_FORMAT, FrameInputs, FrameState, PlannedFrame, SCENE_COLOR_FORMAT, TargetRoles,
};

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec2};

use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::passes::{
    ComposePass, ComposeUniforms, FogBlendPass, FogLight, FogPass, FogUniforms, FrameUniforms,
    ScenePass, ScenePassKind, SceneTargets, TaaInputs, TaaResolvePass, TaaUniforms, VelocityPass,
    VelocityUniforms,
};
use crate::render_graph::{PassKind, PassRecord, Resolution, TargetId, TargetPool};
use crate::scene::{MaterialSubstitution, Scene, TransparentRegistry};
use crate::settings::{PipelineVariant, Settings, SettingsChange};
use crate::stochastic::{DitherMatrix, DitherSize};
use crate::temporal::CameraJitter;

struct Passes {
    shadow: ScenePass,
    color: ScenePass,
    stochastic_depth: ScenePass,
    velocity: VelocityPass,
    taa: TaaResolvePass,
    fog: FogPass,
    fog_blend: FogBlendPass,
    compose: ComposePass,
}

impl Passes {
    fn new(gpu: &GpuContext) -> Self {
        Self {
            shadow: ScenePass::new(gpu, ScenePassKind::Shadow, SCENE_COLOR_FORMAT),
            color: ScenePass::new(gpu, ScenePassKind::Color, SCENE_COLOR_FORMAT),
            stochastic_depth: ScenePass::new(
                gpu,
                ScenePassKind::StochasticDepth,
                SCENE_COLOR_FORMAT,
            ),
            velocity: VelocityPass::new(gpu),
            taa: TaaResolvePass::new(gpu, SCENE_COLOR_FORMAT),
            fog: FogPass::new(gpu),
            fog_blend: FogBlendPass::new(gpu),
            compose: ComposePass::new(gpu),
        }
    }

    fn clear_material_caches(&mut self) {
        for pass in [&mut self.shadow, &mut self.color, &mut self.stochastic_depth] {
            pass.clear_material_cache();
        }
    }
}

/// Camera matrices for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FrameView {
    /// What the colour pass rasterizes with; jittered in the supersampled variant.
    color_view_proj: Mat4,
    /// Unjittered, for the depth passes.
    view_proj: Mat4,
    jitter_ndc: Vec2,
    prev_jitter_ndc: Vec2,
}

impl FrameView {
    fn new(
        camera: &Camera,
        frame: &PlannedFrame,
        variant: PipelineVariant,
        (w, h): (u32, u32),
    ) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let (jitter_ndc, prev_jitter_ndc) = match variant {
            PipelineVariant::Simple => (Vec2::ZERO, Vec2::ZERO),
            PipelineVariant::Supersampled => (
                CameraJitter::ndc_offset(frame.camera_jitter, w, h),
                CameraJitter::ndc_offset(frame.previous_camera_jitter, w, h),
            ),
        };
        Self {
            color_view_proj: CameraJitter::jittered(projection, jitter_ndc) * view,
            view_proj: projection * view,
            jitter_ndc,
            prev_jitter_ndc,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn frame_uniforms(
    view_proj: Mat4,
    camera: &Camera,
    light: &FogLight,
    shadows: bool,
    dither: &DitherMatrix,
    dither_index: u32,
    particle_brightness: f32,
    time: f32,
) -> FrameUniforms {
    FrameUniforms {
        view_proj: view_proj.to_cols_array_2d(),
        shadow_matrix: light.shadow_matrix.to_cols_array_2d(),
        camera_position: camera.position.extend(time).to_array(),
        light_direction: light.direction.extend(light.intensity).to_array(),
        light_color: light.color.extend(if shadows { 1.0 } else { 0.0 }).to_array(),
        dither: dither.packed(),
        dither_params: [
            dither.size().edge() as f32,
            dither_index as f32,
            dither.half_step(),
            particle_brightness,
        ],
    }
}

/// Velocity inputs for `view`. Without a previous frame the camera counts as still.
fn velocity_uniforms(
    view: &FrameView,
    prev_view_proj: Option<Mat4>,
    camera: &Camera,
    resolution: (u32, u32),
) -> VelocityUniforms {
    VelocityUniforms::new(
        view.color_view_proj,
        prev_view_proj.unwrap_or(view.color_view_proj),
        view.jitter_ndc,
        view.prev_jitter_ndc,
        (camera.near, camera.far),
        resolution,
    )
}

fn views<'a>(pool: &'a TargetPool, ids: &[TargetId]) -> Option<Vec<&'a wgpu::TextureView>> {
    ids.iter().map(|&id| pool.view(id)).collect()
}

/// Owns the render targets, passes and temporal state of the frame pipeline.
pub struct Pipeline {
    settings: Settings,
    pool: TargetPool,
    state: FrameState,
    resolution: Resolution,
    passes: Option<Passes>,
    scene: Option<Rc<RefCell<Scene>>>,
    registry: TransparentRegistry,
    dither: DitherMatrix,
    light: FogLight,
    prev_view_proj: Option<Mat4>,
}

impl Pipeline {
    /// Build every pass. Targets are allocated by the first
    /// [`update_targets`](Self::update_targets); until then `render` does nothing.
    pub fn new(gpu: &GpuContext, settings: Settings) -> Self {
        let settings = settings.sanitized();
        let mut pool = TargetPool::new();
        let roles = TargetRoles::describe(&mut pool);
        let technique = &settings.technique;
        let state = FrameState::new(roles, technique.variant, technique.dither_size);
        let dither = DitherMatrix::bayer(technique.dither_size);

        tracing::info!(
            variant = ?technique.variant,
            dither = technique.dither_size.edge(),
            targets = pool.len(),
            "pipeline created"
        );

        Self {
            resolution: Resolution::new(gpu.width(), gpu.height(), settings.downsampling),
            settings,
            pool,
            state,
            passes: Some(Passes::new(gpu)),
            scene: None,
            registry: TransparentRegistry::new(),
            dither,
            light: FogLight::default(),
            prev_view_proj: None,
        }
    }

    pub fn set_scene(&mut self, scene: Rc<RefCell<Scene>>) {
        match scene.try_borrow() {
            Ok(s) => self.registry.rebuild(&s),
            Err(_) => {
                tracing::debug!("scene borrowed while binding, registry deferred to next frame");
                self.registry.clear();
            }
        }
        self.scene = Some(scene);
        if let Some(passes) = self.passes.as_mut() {
            passes.clear_material_caches();
        }
        self.reset_history();
    }

    pub fn clear_scene(&mut self) {
        self.scene = None;
        self.registry.clear();
        if let Some(passes) = self.passes.as_mut() {
            passes.clear_material_caches();
        }
    }

    pub fn has_scene(&self) -> bool {
        self.scene.is_some()
    }

    fn reset_history(&mut self) {
        self.state.reset();
        self.prev_view_proj = None;
        tracing::debug!("history reset");
    }

    /// Draw one frame to the surface.
    ///
    /// Frames are skipped (never failed) when no scene is bound, targets are not
    /// allocated, or the surface cannot be acquired.
    pub fn render(&mut self, gpu: &GpuContext, camera: &Camera, time: f32) {
        let Some(shared) = self.scene.clone() else {
            return;
        };
        if self.passes.is_none() {
            return;
        }
        if !self.state.is_ready() {
            tracing::debug!("targets not allocated, frame skipped");
            return;
        }

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                tracing::warn!(error = %err, "surface needs reconfiguring, frame skipped");
                gpu.reconfigure();
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "surface unavailable, frame skipped");
                return;
            }
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let Ok(mut scene) = shared.try_borrow_mut() else {
            tracing::warn!("scene is borrowed elsewhere, frame skipped");
            return;
        };
        self.registry.refresh(&scene);

        let light = scene.light().copied();
        if let Some(l) = &light {
            self.light = FogLight {
                direction: l.direction(),
                color: l.color,
                intensity: l.intensity,
                shadow_matrix: l.shadow_matrix(),
            };
        }
        let casts_shadow = light.is_some_and(|l| l.casts_shadow);

        let inputs = FrameInputs {
            casts_shadow,
            fog_weights: self.settings.fog.blend_policy().weights(0.0),
        };
        let Some(frame) = self.state.plan_frame(&inputs) else {
            tracing::debug!("no frame plan, frame skipped");
            return;
        };

        let view = FrameView::new(camera, &frame, self.state.variant(), self.resolution.full());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pipeline Encoder"),
            });

        for record in frame.plan.iter() {
            if !record.kind.draws() {
                continue;
            }
            let executed = self.execute(
                gpu,
                &mut encoder,
                record,
                &mut scene,
                camera,
                &view,
                &frame,
                casts_shadow,
                time,
                &surface_view,
            );
            if executed.is_none() {
                tracing::debug!(pass = record.kind.label(), "pass inputs missing, skipped");
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.prev_view_proj = Some(view.color_view_proj);
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        record: &PassRecord,
        scene: &mut Scene,
        camera: &Camera,
        view: &FrameView,
        frame: &PlannedFrame,
        shadows: bool,
        time: f32,
        surface: &wgpu::TextureView,
    ) -> Option<()> {
        let passes = self.passes.as_mut()?;
        let reads = views(&self.pool, &record.reads)?;
        let writes: Vec<&wgpu::TextureView> = record
            .writes
            .iter()
            .map(|&id| if id.is_surface() { Some(surface) } else { self.pool.view(id) })
            .collect::<Option<_>>()?;
        let read = |i: usize| reads.get(i).copied();
        let write = |i: usize| writes.get(i).copied();
        let uniforms = |view_proj| {
            frame_uniforms(
                view_proj,
                camera,
                &self.light,
                shadows,
                &self.dither,
                frame.dither_index,
                self.settings.particle_brightness,
                time,
            )
        };

        match record.kind {
            PassKind::Shadow => {
                let items = scene.draw_items();
                let targets = SceneTargets {
                    color: None,
                    depth: write(0)?,
                    shadow_map: None,
                };
                let u = uniforms(self.light.shadow_matrix);
                passes.shadow.draw(gpu, encoder, scene, &items, &u, targets);
            }
            PassKind::SceneColor => {
                let items = scene.color_order(camera.position);
                let targets = SceneTargets {
                    color: Some(write(0)?),
                    depth: write(1)?,
                    shadow_map: Some(read(0)?),
                };
                let u = uniforms(view.color_view_proj);
                passes.color.draw(gpu, encoder, scene, &items, &u, targets);
            }
            PassKind::Velocity => {
                let u =
                    velocity_uniforms(view, self.prev_view_proj, camera, self.resolution.full());
                passes.velocity.draw(gpu, encoder, write(0)?, read(0)?, &u);
            }
            PassKind::TaaResolve => {
                let u = TaaUniforms::new(&self.settings.technique.taa, self.resolution.full());
                let inputs = TaaInputs {
                    current: read(0)?,
                    history: read(1)?,
                    velocity: read(2)?,
                    prev_velocity: read(3)?,
                };
                passes.taa.draw(gpu, encoder, write(0)?, inputs, &u);
            }
            PassKind::StochasticDepth { .. } => {
                let targets = SceneTargets {
                    color: None,
                    depth: write(0)?,
                    shadow_map: None,
                };
                let u = uniforms(view.view_proj);
                let substitution = MaterialSubstitution::apply(scene, &self.registry);
                let items = substitution.scene().draw_items();
                passes
                    .stochastic_depth
                    .draw(gpu, encoder, substitution.scene(), &items, &u, targets);
            }
            PassKind::FogMarch => {
                let u = FogUniforms::new(
                    camera,
                    &self.light,
                    shadows,
                    &self.settings.fog,
                    time,
                    self.resolution.reduced(),
                );
                passes.fog.draw(gpu, encoder, write(0)?, read(0)?, read(1)?, &u);
            }
            PassKind::FogBlend { weights } => {
                passes
                    .fog_blend
                    .draw(gpu, encoder, write(0)?, read(0)?, read(1)?, weights);
            }
            PassKind::Compose => {
                let u = ComposeUniforms::new(&self.settings, self.resolution.reduced());
                passes.compose.draw(gpu, encoder, write(0)?, read(0)?, read(1)?, &u);
            }
            PassKind::TaaSeed | PassKind::FogSeed => {}
        }
        Some(())
    }

    /// Resize every target for a `width`×`height` window and restart history.
    pub fn update_targets(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.resolution = Resolution::new(width, height, self.settings.downsampling);
        self.pool.resize(gpu, &self.resolution);
        self.state.on_resize();
        self.prev_view_proj = None;
        tracing::info!(
            full = ?self.resolution.full(),
            reduced = ?self.resolution.reduced(),
            "render targets updated"
        );
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Set the fog and depth downsampling divisor. Unsupported values snap to 1, 2 or 4.
    pub fn set_downsampling_factor(&mut self, gpu: &GpuContext, factor: u32) {
        self.settings.set_downsampling_factor(factor);
        let (width, height) = self.resolution.full();
        self.update_targets(gpu, width, height);
    }

    pub fn downsampling_factor(&self) -> u32 {
        self.settings.downsampling.factor()
    }

    pub fn variant(&self) -> PipelineVariant {
        self.state.variant()
    }

    pub fn set_variant(&mut self, variant: PipelineVariant) {
        self.settings.technique.variant = variant;
        self.state.set_variant(variant);
        self.prev_view_proj = None;
    }

    pub fn dither_size(&self) -> DitherSize {
        self.state.dither_size()
    }

    pub fn set_dither_size(&mut self, size: DitherSize) {
        self.settings.technique.dither_size = size;
        self.dither = DitherMatrix::bayer(size);
        self.state.set_dither_size(size);
        self.prev_view_proj = None;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace all settings at once. Values are sanitized first; changes that affect
    /// targets or history go through the same paths as their individual setters.
    pub fn apply_settings(&mut self, gpu: &GpuContext, settings: Settings) {
        let settings = settings.sanitized();
        let change = SettingsChange::between(&self.settings, &settings);
        self.settings = settings;
        self.state.apply_change(&change);

        if let Some(size) = change.dither_size {
            self.dither = DitherMatrix::bayer(size);
        }
        if change.resets_history() {
            self.prev_view_proj = None;
        }
        if change.downsampling.is_some() && self.state.is_ready() {
            let (width, height) = self.resolution.full();
            self.update_targets(gpu, width, height);
        }
    }

    /// Destroy every target and pass. Safe to call more than once; `render` is a no-op
    /// afterwards.
    pub fn dispose(&mut self) {
        let had_passes = self.passes.take().is_some();
        let had_targets = self.pool.is_allocated();
        self.pool.release();
        self.state.release();
        self.clear_scene();
        if had_passes || had_targets {
            tracing::info!("pipeline disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.passes.is_none()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

macro_rules! passthrough {
    ($($get:ident, $set:ident: $ty:ty => $($field:ident).+;)*) => {
        impl Pipeline {
            $(
                pub fn $get(&self) -> $ty {
                    self.settings.$($field).+
                }

                pub fn $set(&mut self, value: $ty) {
                    self.settings.$($field).+ = value;
                }
            )*
        }
    };
}

passthrough! {
    fog_blend_factor, set_fog_blend_factor: f32 => fog.blend_factor;
    fog_blur, set_fog_blur: f32 => fog.fog_blur;
    fog_light_multiplier, set_fog_light_multiplier: f32 => fog.light_multiplier;
    warp_speed, set_warp_speed: f32 => fog.warp_speed;
    fog_steps, set_fog_steps: u32 => fog.fog_steps;
    ray_noise_scale, set_ray_noise_scale: f32 => fog.ray_noise_scale;
    fog_density, set_fog_density: f32 => fog.density;
    fog_max_distance, set_fog_max_distance: f32 => fog.max_distance;
    fog_sphere_center, set_fog_sphere_center: [f32; 3] => fog.sphere_center;
    fog_sphere_radius, set_fog_sphere_radius: f32 => fog.sphere_radius;
    particle_brightness, set_particle_brightness: f32 => particle_brightness;
    vignette_intensity, set_vignette_intensity: f32 => post.vignette_intensity;
    vignette_radius, set_vignette_radius: f32 => post.vignette_radius;
    exposure, set_exposure: f32 => post.exposure;
    contrast, set_contrast: f32 => post.contrast;
    saturation, set_saturation: f32 => post.saturation;
    brightness, set_brightness: f32 => post.brightness;
    background, set_background: [f32; 3] => background;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::TargetPool;
    use crate::temporal::{BlendWeights, Reprojection};

    fn planned(variant: PipelineVariant, frames: usize) -> PlannedFrame {
        let mut pool = TargetPool::new();
        let roles = TargetRoles::describe(&mut pool);
        let mut state = FrameState::new(roles, variant, DitherSize::Four);
        state.on_resize();
        let inputs = FrameInputs {
            casts_shadow: false,
            fog_weights: BlendWeights::from_history(0.85),
        };
        let mut last = None;
        for _ in 0..frames {
            last = state.plan_frame(&inputs);
        }
        last.expect("state is ready")
    }

    #[test]
    fn simple_variant_renders_without_jitter() {
        let camera = Camera::new();
        let frame = planned(PipelineVariant::Simple, 3);
        let view = FrameView::new(&camera, &frame, PipelineVariant::Simple, (800, 600));
        assert_eq!(view.color_view_proj, camera.view_projection());
        assert_eq!(view.jitter_ndc, Vec2::ZERO);
    }

    #[test]
    fn supersampled_colour_is_jittered_by_a_subpixel_amount() {
        let camera = Camera::new();
        let frame = planned(PipelineVariant::Supersampled, 3);
        let view = FrameView::new(&camera, &frame, PipelineVariant::Supersampled, (800, 600));
        assert_eq!(view.view_proj, camera.view_projection());
        assert_ne!(view.color_view_proj, view.view_proj);
        assert!(view.jitter_ndc.x.abs() <= 1.0 / 800.0 + 1e-6);
        assert!(view.jitter_ndc.y.abs() <= 1.0 / 600.0 + 1e-6);
        assert_ne!(view.jitter_ndc, view.prev_jitter_ndc);
    }

    #[test]
    fn still_camera_has_no_velocity_across_jittered_frames() {
        let camera = Camera::new().at(1.0, 2.0, 6.0);
        let mut pool = TargetPool::new();
        let roles = TargetRoles::describe(&mut pool);
        let mut state = FrameState::new(roles, PipelineVariant::Supersampled, DitherSize::Four);
        state.on_resize();
        let inputs = FrameInputs {
            casts_shadow: false,
            fog_weights: BlendWeights::from_history(0.85),
        };

        let size = (800, 600);
        let mut prev_view_proj = None;
        for frame in 0..4 {
            let planned = state.plan_frame(&inputs).expect("state is ready");
            let view = FrameView::new(&camera, &planned, PipelineVariant::Supersampled, size);
            let u = velocity_uniforms(&view, prev_view_proj, &camera, size);
            let r = Reprojection {
                inv_view_proj: Mat4::from_cols_array_2d(&u.inv_view_proj),
                prev_view_proj: Mat4::from_cols_array_2d(&u.prev_view_proj),
                jitter: Vec2::new(u.jitter[0], u.jitter[1]),
                prev_jitter: Vec2::new(u.jitter[2], u.jitter[3]),
            };
            if frame > 0 {
                assert_ne!(view.jitter_ndc, view.prev_jitter_ndc);
            }
            let v = r.velocity(Vec2::new(0.3, 0.7), 0.97);
            assert!(v.length() < 1e-4, "frame {frame}: {v}");
            prev_view_proj = Some(view.color_view_proj);
        }
    }

    #[test]
    fn frame_uniforms_pack_dither_and_light() {
        let dither = DitherMatrix::bayer(DitherSize::Eight);
        let light = FogLight::default();
        let camera = Camera::new();
        let u = frame_uniforms(Mat4::IDENTITY, &camera, &light, false, &dither, 5, 2.0, 1.5);
        assert_eq!(u.dither_params, [8.0, 5.0, 0.5 / 64.0, 2.0]);
        assert_eq!(u.light_color[3], 0.0);
        assert_eq!(u.camera_position[3], 1.5);
        assert_eq!(u.dither, dither.packed());
    }
}
