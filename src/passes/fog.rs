//! Volumetric fog march.
//!
//! The march runs at reduced resolution against the stochastic depth buffer. Every pixel
//! integrates density along its view ray through the fog sphere, stopping at the first
//! surface or at the maximum fog distance:
//!
//! ```text
//! T = Π exp(-σ(p_i)·Δt)          transmittance
//! L = Σ T_i (1 - exp(-σ_i·Δt)) E  in-scattered light, E = light radiance × visibility
//! out = (L, 1 - T)                premultiplied
//! ```
//!
//! [`integrate_ray`] evaluates the same sum on the CPU.

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::gpu::GpuContext;
use crate::render_graph::{FullscreenPass, PassInput};
use crate::settings::FogSettings;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FogUniforms {
    pub inv_projection: [[f32; 4]; 4],
    pub camera_world: [[f32; 4]; 4],
    pub shadow_matrix: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    pub sphere: [f32; 4],
    pub params: [f32; 4],
    pub march: [f32; 4],
    pub resolution: [f32; 4],
}

/// Light state as last seen by the fog. Kept when the scene loses its light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FogLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub shadow_matrix: Mat4,
}

impl Default for FogLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
            shadow_matrix: Mat4::IDENTITY,
        }
    }
}

impl FogUniforms {
    pub fn new(
        camera: &Camera,
        light: &FogLight,
        shadows: bool,
        fog: &FogSettings,
        time: f32,
        (width, height): (u32, u32),
    ) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            inv_projection: camera.projection_matrix().inverse().to_cols_array_2d(),
            camera_world: camera.world_matrix().to_cols_array_2d(),
            shadow_matrix: light.shadow_matrix.to_cols_array_2d(),
            camera_position: camera.position.extend(time).to_array(),
            light_direction: light.direction.extend(light.intensity).to_array(),
            light_color: light.color.extend(fog.light_multiplier).to_array(),
            sphere: Vec3::from(fog.sphere_center)
                .extend(fog.sphere_radius)
                .to_array(),
            params: [fog.density, fog.max_distance, fog.ray_noise_scale, fog.warp_speed],
            march: [
                fog.fog_steps as f32,
                if shadows { 1.0 } else { 0.0 },
                camera.near,
                camera.far,
            ],
            resolution: [w, h, 1.0 / w, 1.0 / h],
        }
    }
}

pub struct FogPass {
    pass: FullscreenPass<FogUniforms>,
}

pub const FOG_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

impl FogPass {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            pass: FullscreenPass::new(
                gpu,
                "Fog March Pass",
                include_str!("../shaders/fog.wgsl"),
                &[PassInput::Depth, PassInput::Depth],
                FOG_FORMAT,
            ),
        }
    }

    /// March into `target`, which is cleared to transparent black first.
    pub fn draw(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        shadow_map: &wgpu::TextureView,
        uniforms: &FogUniforms,
    ) {
        self.pass.draw(
            gpu,
            encoder,
            target,
            &[depth, shadow_map],
            uniforms,
            wgpu::Color::TRANSPARENT,
        );
    }
}

/// Entry and exit distances of a ray through a sphere, clipped to `t >= 0`.
pub fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<(f32, f32)> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc <= 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let (t0, t1) = ((-b - root).max(0.0), -b + root);
    (t1 > t0).then_some((t0, t1))
}

/// The fog volume a ray is marched through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FogVolume {
    pub center: Vec3,
    pub radius: f32,
    pub max_distance: f32,
    pub steps: u32,
}

impl From<&FogSettings> for FogVolume {
    fn from(fog: &FogSettings) -> Self {
        Self {
            center: Vec3::from(fog.sphere_center),
            radius: fog.sphere_radius,
            max_distance: fog.max_distance,
            steps: fog.fog_steps,
        }
    }
}

impl FogVolume {
    /// Density with the shader's quadratic radial falloff and no noise.
    pub fn smooth_density(&self, density: f32) -> impl Fn(Vec3) -> f32 + '_ {
        move |p| {
            let r = (p - self.center).length() / self.radius;
            if r >= 1.0 { 0.0 } else { density * (1.0 - r * r) }
        }
    }
}

/// Result of marching one ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FogSample {
    pub optical_depth: f32,
    pub transmittance: f32,
    /// Unshadowed in-scattered fraction of the light's radiance.
    pub in_scatter: f32,
}

impl FogSample {
    pub fn alpha(&self) -> f32 {
        1.0 - self.transmittance
    }
}

/// March `dir` from `origin` through `volume` up to the first surface at `surface`
/// distance, with midpoint samples of `density`.
pub fn integrate_ray(
    volume: &FogVolume,
    origin: Vec3,
    dir: Vec3,
    surface: f32,
    density: impl Fn(Vec3) -> f32,
) -> FogSample {
    let empty = FogSample {
        optical_depth: 0.0,
        transmittance: 1.0,
        in_scatter: 0.0,
    };
    let dir = dir.normalize_or_zero();
    let Some((t0, t1)) = ray_sphere(origin, dir, volume.center, volume.radius) else {
        return empty;
    };
    let t1 = t1.min(surface).min(volume.max_distance);
    if t1 <= t0 {
        return empty;
    }

    let steps = volume.steps.max(1);
    let dt = (t1 - t0) / steps as f32;
    let mut sample = empty;
    for i in 0..steps {
        let p = origin + dir * (t0 + (i as f32 + 0.5) * dt);
        let sigma = density(p).max(0.0);
        let step_transmittance = (-sigma * dt).exp();
        sample.in_scatter += sample.transmittance * (1.0 - step_transmittance);
        sample.transmittance *= step_transmittance;
        sample.optical_depth += sigma * dt;
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::{Downsampling, Resolution};
    use glam::{Vec2, Vec4};

    /// The volume and density the march shader reads out of `u`.
    fn packed_volume(u: &FogUniforms) -> (FogVolume, f32) {
        let volume = FogVolume {
            center: Vec3::new(u.sphere[0], u.sphere[1], u.sphere[2]),
            radius: u.sphere[3],
            max_distance: u.params[1],
            steps: u.march[0] as u32,
        };
        (volume, u.params[0])
    }

    /// Ray origin, direction and surface distance as the march shader rebuilds them.
    fn packed_ray(u: &FogUniforms, uv: Vec2, depth: f32) -> (Vec3, Vec3, f32) {
        let ndc = Vec4::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
        let view_h = Mat4::from_cols_array_2d(&u.inv_projection) * ndc;
        let view_pos = view_h.truncate() / view_h.w;
        let world = Mat4::from_cols_array_2d(&u.camera_world);
        let dir = world.transform_vector3(view_pos.normalize()).normalize();
        let surface = if depth >= 1.0 { f32::INFINITY } else { view_pos.length() };
        let origin = Vec3::new(u.camera_position[0], u.camera_position[1], u.camera_position[2]);
        (origin, dir, surface)
    }

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<FogUniforms>(), 3 * 64 + 7 * 16);
    }

    #[test]
    fn centre_ray_through_sphere_is_partially_opaque() {
        let resolution = Resolution::new(800, 600, Downsampling::Half);
        assert_eq!(resolution.reduced(), (400, 300));

        let fog = FogSettings {
            sphere_center: [0.0, 1.0, 0.0],
            sphere_radius: 3.5,
            max_distance: 9.0,
            ..FogSettings::default()
        };
        let volume = FogVolume::from(&fog);
        let camera = Camera::new().at(0.0, 0.0, 5.0).looking_at(0.0, 0.0, 0.0);

        let sample = integrate_ray(
            &volume,
            camera.position,
            camera.forward(),
            f32::INFINITY,
            volume.smooth_density(fog.density),
        );

        assert!(sample.optical_depth > 0.0);
        assert!(sample.alpha() > 0.0 && sample.alpha() < 1.0);
        let expected = 1.0 - (-sample.optical_depth).exp();
        assert!((sample.alpha() - expected).abs() < 1e-5);
    }

    #[test]
    fn uploaded_uniforms_reproduce_the_centre_ray() {
        let resolution = Resolution::new(800, 600, Downsampling::Half);
        let fog = FogSettings {
            sphere_center: [0.0, 1.0, 0.0],
            sphere_radius: 3.5,
            light_multiplier: 1.5,
            ..FogSettings::default()
        };
        let camera = Camera::new().at(0.0, 0.0, 5.0).looking_at(0.0, 0.0, 0.0);
        let light = FogLight::default();
        let u = FogUniforms::new(&camera, &light, true, &fog, 2.5, resolution.reduced());

        assert_eq!(u.resolution, [400.0, 300.0, 1.0 / 400.0, 1.0 / 300.0]);
        assert_eq!(
            u.params,
            [fog.density, fog.max_distance, fog.ray_noise_scale, fog.warp_speed]
        );
        assert_eq!(u.march, [fog.fog_steps as f32, 1.0, camera.near, camera.far]);
        assert_eq!(u.sphere, [0.0, 1.0, 0.0, 3.5]);
        assert_eq!(u.camera_position[3], 2.5);
        assert_eq!(u.light_direction[3], light.intensity);
        assert_eq!(u.light_color[3], 1.5);

        let (volume, density) = packed_volume(&u);
        assert_eq!(volume, FogVolume::from(&fog));
        let (origin, dir, surface) = packed_ray(&u, Vec2::splat(0.5), 1.0);
        assert!((dir - camera.forward()).length() < 1e-4);

        let sample = integrate_ray(&volume, origin, dir, surface, volume.smooth_density(density));
        assert!(sample.alpha() > 0.0 && sample.alpha() < 1.0);
        assert!((sample.alpha() - (1.0 - (-sample.optical_depth).exp())).abs() < 1e-5);

        let direct = integrate_ray(
            &volume,
            camera.position,
            camera.forward(),
            f32::INFINITY,
            volume.smooth_density(fog.density),
        );
        assert!((sample.optical_depth - direct.optical_depth).abs() < 1e-3);
    }

    #[test]
    fn packed_ray_stops_at_the_depth_buffer_surface() {
        let camera = Camera::new().at(0.0, 0.0, 5.0).looking_at(0.0, 0.0, 0.0);
        let u = FogUniforms::new(
            &camera,
            &FogLight::default(),
            false,
            &FogSettings::default(),
            0.0,
            (400, 300),
        );
        assert_eq!(u.march[1], 0.0);

        let projected = camera.projection_matrix() * Vec4::new(0.0, 0.0, -4.0, 1.0);
        let depth = projected.z / projected.w;
        let (_, _, surface) = packed_ray(&u, Vec2::splat(0.5), depth);
        assert!((surface - 4.0).abs() < 1e-2);
    }

    #[test]
    fn surfaces_and_max_distance_cut_the_ray() {
        let volume = FogVolume {
            center: Vec3::ZERO,
            radius: 2.0,
            max_distance: 100.0,
            steps: 64,
        };
        let origin = Vec3::new(0.0, 0.0, 5.0);
        let constant = |_: Vec3| 0.5;

        let full = integrate_ray(&volume, origin, Vec3::NEG_Z, f32::INFINITY, constant);
        assert!((full.optical_depth - 0.5 * 4.0).abs() < 1e-4);

        let blocked = integrate_ray(&volume, origin, Vec3::NEG_Z, 4.0, constant);
        assert!((blocked.optical_depth - 0.5 * 1.0).abs() < 1e-4);

        let in_front = integrate_ray(&volume, origin, Vec3::NEG_Z, 2.0, constant);
        assert_eq!(in_front.alpha(), 0.0);

        let short = FogVolume {
            max_distance: 3.5,
            ..volume
        };
        let clipped = integrate_ray(&short, origin, Vec3::NEG_Z, f32::INFINITY, constant);
        assert!((clipped.optical_depth - 0.25).abs() < 1e-4);
    }

    #[test]
    fn missing_the_sphere_leaves_no_fog() {
        assert_eq!(ray_sphere(Vec3::new(0.0, 5.0, 5.0), Vec3::NEG_Z, Vec3::ZERO, 1.0), None);
        let sphere_behind = ray_sphere(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, Vec3::ZERO, 1.0);
        assert_eq!(sphere_behind, None);
    }
}
