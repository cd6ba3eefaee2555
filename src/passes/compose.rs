//! Final composite onto the surface.
//!
//! [`compose_pixel`], [`grade`] and [`vignette`] mirror `compose.wgsl` so the per-pixel
//! arithmetic can be checked without a device.

use glam::Vec3;

use crate::gpu::GpuContext;
use crate::render_graph::{FullscreenPass, PassInput};
use crate::settings::{PostSettings, Settings};

/// Scene alpha below which a pixel counts as empty and shows the background.
pub const BACKGROUND_ALPHA_EPSILON: f32 = 1e-3;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ComposeUniforms {
    pub background: [f32; 4],
    pub grade: [f32; 4],
    pub vignette: [f32; 4],
    pub fog_texel: [f32; 4],
}

impl ComposeUniforms {
    pub fn new(settings: &Settings, (fog_width, fog_height): (u32, u32)) -> Self {
        let post = &settings.post;
        let [r, g, b] = settings.background;
        Self {
            background: [r, g, b, BACKGROUND_ALPHA_EPSILON],
            grade: [post.exposure, post.contrast, post.saturation, post.brightness],
            vignette: [
                post.vignette_intensity,
                post.vignette_radius,
                settings.fog.fog_blur,
                0.0,
            ],
            fog_texel: [
                1.0 / fog_width.max(1) as f32,
                1.0 / fog_height.max(1) as f32,
                0.0,
                0.0,
            ],
        }
    }
}

pub struct ComposePass {
    pass: FullscreenPass<ComposeUniforms>,
}

impl ComposePass {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Compose Pass",
                include_str!("../shaders/compose.wgsl"),
                &[PassInput::Color, PassInput::Color],
                gpu.surface_format(),
            ),
        }
    }

    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        surface: &wgpu::TextureView,
        scene: &wgpu::TextureView,
        fog: &wgpu::TextureView,
        uniforms: &ComposeUniforms,
    ) {
        self.pass.draw(
            gpu,
            encoder,
            surface,
            &[scene, fog],
            uniforms,
            wgpu::Color::BLACK,
        );
    }
}

/// Combine one scene sample with one (already blurred) fog sample, before vignette and
/// grading. Both are premultiplied RGBA.
pub fn compose_pixel(scene: [f32; 4], fog: [f32; 4], background: Vec3, epsilon: f32) -> Vec3 {
    let fog_rgb = Vec3::new(fog[0], fog[1], fog[2]);
    if scene[3] < epsilon {
        background + fog_rgb
    } else {
        Vec3::new(scene[0], scene[1], scene[2]) * (1.0 - fog[3]) + fog_rgb
    }
}

pub fn grade(color: Vec3, post: &PostSettings) -> Vec3 {
    let c = color * post.exposure;
    let c = (c - Vec3::splat(0.5)) * post.contrast + Vec3::splat(0.5);
    let luma = c.dot(Vec3::new(0.2126, 0.7152, 0.0722));
    let c = Vec3::splat(luma).lerp(c, post.saturation);
    (c + Vec3::splat(post.brightness)).max(Vec3::ZERO)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Vignette multiplier at `uv`; the screen corners sit at distance 1.
pub fn vignette(uv: glam::Vec2, post: &PostSettings) -> f32 {
    let d = uv.distance(glam::Vec2::splat(0.5)) * std::f32::consts::SQRT_2;
    let edge = post.vignette_radius.max(0.0);
    1.0 - post.vignette_intensity * smoothstep(edge, edge + 0.5, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn empty_scene_pixels_show_background_plus_fog() {
        let background = Vec3::new(0.02, 0.02, 0.04);
        let fog = [0.25, 0.125, 0.5, 0.6];
        let out = compose_pixel([0.9, 0.9, 0.9, 0.0], fog, background, BACKGROUND_ALPHA_EPSILON);
        assert_eq!(out, background + Vec3::new(0.25, 0.125, 0.5));
    }

    #[test]
    fn covered_pixels_are_attenuated_by_fog() {
        let out = compose_pixel(
            [1.0, 0.5, 0.0, 1.0],
            [0.1, 0.1, 0.1, 0.5],
            Vec3::ONE,
            BACKGROUND_ALPHA_EPSILON,
        );
        assert!((out - Vec3::new(0.6, 0.35, 0.1)).length() < 1e-6);
    }

    #[test]
    fn neutral_grade_is_identity() {
        let post = PostSettings {
            exposure: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            brightness: 0.0,
            ..PostSettings::default()
        };
        let c = Vec3::new(0.3, 0.6, 0.9);
        assert!((grade(c, &post) - c).length() < 1e-6);

        let grey = PostSettings { saturation: 0.0, ..post };
        let g = grade(c, &grey);
        assert!((g.x - g.y).abs() < 1e-6 && (g.y - g.z).abs() < 1e-6);
    }

    #[test]
    fn vignette_darkens_corners_only() {
        let post = PostSettings {
            vignette_intensity: 0.8,
            vignette_radius: 0.4,
            ..PostSettings::default()
        };
        assert_eq!(vignette(Vec2::splat(0.5), &post), 1.0);
        assert!((vignette(Vec2::ZERO, &post) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn uniforms_carry_background_and_fog_texel() {
        let settings = Settings::default();
        let u = ComposeUniforms::new(&settings, (400, 300));
        assert_eq!(u.background[..3], settings.background);
        assert_eq!(u.background[3], BACKGROUND_ALPHA_EPSILON);
        assert_eq!(u.fog_texel[..2], [1.0 / 400.0, 1.0 / 300.0]);
    }
}
