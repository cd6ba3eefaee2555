//! Velocity and reprojecting resolve for the supersampled variant.
//!
//! The velocity buffer stores UV motion in `xy` and linear depth in `z`, so the resolve
//! can compare this frame's depth with the one stored alongside last frame's velocity.

use glam::{Mat4, Vec2};

use crate::gpu::GpuContext;
use crate::render_graph::{FullscreenPass, PassInput};
use crate::settings::TaaSettings;
use crate::temporal::BlendPolicy;

pub const VELOCITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VelocityUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub prev_view_proj: [[f32; 4]; 4],
    /// xy = this frame, zw = previous frame, in NDC
    pub jitter: [f32; 4],
    pub clip: [f32; 4],
    pub resolution: [f32; 4],
}

impl VelocityUniforms {
    pub fn new(
        view_proj: Mat4,
        prev_view_proj: Mat4,
        jitter: Vec2,
        prev_jitter: Vec2,
        (near, far): (f32, f32),
        (width, height): (u32, u32),
    ) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            prev_view_proj: prev_view_proj.to_cols_array_2d(),
            jitter: [jitter.x, jitter.y, prev_jitter.x, prev_jitter.y],
            clip: [near, far, 0.0, 0.0],
            resolution: [w, h, 1.0 / w, 1.0 / h],
        }
    }
}

pub struct VelocityPass {
    pass: FullscreenPass<VelocityUniforms>,
}

impl VelocityPass {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Velocity Pass",
                include_str!("../shaders/velocity.wgsl"),
                &[PassInput::Depth],
                VELOCITY_FORMAT,
            ),
        }
    }

    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        uniforms: &VelocityUniforms,
    ) {
        self.pass
            .draw(gpu, encoder, target, &[depth], uniforms, wgpu::Color::TRANSPARENT);
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TaaUniforms {
    /// max history weight, base blend, velocity scale, depth threshold
    pub params: [f32; 4],
    pub resolution: [f32; 4],
}

impl TaaUniforms {
    pub fn new(taa: &TaaSettings, (width, height): (u32, u32)) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        // a fixed weight is an adaptive one that ignores motion
        let (max_history, base_blend, velocity_scale) = match taa.blend_policy() {
            BlendPolicy::Fixed { history_weight } => (history_weight, 1.0 - history_weight, 0.0),
            BlendPolicy::MotionAdaptive {
                max_history_weight,
                velocity_scale,
                base_blend,
            } => (max_history_weight, base_blend, velocity_scale),
        };
        Self {
            params: [max_history, base_blend, velocity_scale, taa.depth_threshold],
            resolution: [w, h, 1.0 / w, 1.0 / h],
        }
    }
}

/// Inputs of one resolve, all full resolution.
pub struct TaaInputs<'a> {
    pub current: &'a wgpu::TextureView,
    pub history: &'a wgpu::TextureView,
    pub velocity: &'a wgpu::TextureView,
    pub prev_velocity: &'a wgpu::TextureView,
}

pub struct TaaResolvePass {
    pass: FullscreenPass<TaaUniforms>,
}

impl TaaResolvePass {
    pub fn new(gpu: &GpuContext, format: wgpu::TextureFormat) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "TAA Resolve Pass",
                include_str!("../shaders/taa_resolve.wgsl"),
                &[PassInput::Color; 4],
                format,
            ),
        }
    }

    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        inputs: TaaInputs,
        uniforms: &TaaUniforms,
    ) {
        self.pass.draw(
            gpu,
            encoder,
            target,
            &[inputs.current, inputs.history, inputs.velocity, inputs.prev_velocity],
            uniforms,
            wgpu::Color::TRANSPARENT,
        );
    }
}
