use crate::gpu::GpuContext;
use crate::passes::fog::FOG_FORMAT;
use crate::render_graph::{FullscreenPass, PassInput};
use crate::temporal::BlendWeights;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FogBlendUniforms {
    /// x = history, y = current
    pub weights: [f32; 4],
}

impl From<BlendWeights> for FogBlendUniforms {
    fn from(w: BlendWeights) -> Self {
        Self {
            weights: [w.history(), w.current(), 0.0, 0.0],
        }
    }
}

/// Writes `history * h + current * c` into the history write slot.
pub struct FogBlendPass {
    pass: FullscreenPass<FogBlendUniforms>,
}

impl FogBlendPass {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Fog Blend Pass",
                include_str!("../shaders/fog_blend.wgsl"),
                &[PassInput::Color, PassInput::Color],
                FOG_FORMAT,
            ),
        }
    }

    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        current: &wgpu::TextureView,
        history: &wgpu::TextureView,
        weights: BlendWeights,
    ) {
        self.pass.draw(
            gpu,
            encoder,
            target,
            &[current, history],
            &FogBlendUniforms::from(weights),
            wgpu::Color::TRANSPARENT,
        );
    }
}
