//! CPU mirror of the velocity and resolve shaders.
//!
//! UV space has its origin at the top-left corner with +Y down; NDC has +Y up.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Relative linear-depth difference above which history is discarded.
pub const DEFAULT_DEPTH_THRESHOLD: f32 = 0.1;

pub fn uv_to_ndc(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

pub fn ndc_to_uv(ndc: Vec2) -> Vec2 {
    Vec2::new((ndc.x + 1.0) * 0.5, (1.0 - ndc.y) * 0.5)
}

/// Matrices needed to reproject one frame into the previous one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reprojection {
    /// Inverse of this frame's jittered view-projection.
    pub inv_view_proj: Mat4,
    /// Last frame's jittered view-projection.
    pub prev_view_proj: Mat4,
    /// This frame's jitter in NDC.
    pub jitter: Vec2,
    /// Last frame's jitter in NDC.
    pub prev_jitter: Vec2,
}

impl Reprojection {
    pub fn world_position(&self, uv: Vec2, ndc_depth: f32) -> Vec3 {
        let ndc = uv_to_ndc(uv);
        let world = self.inv_view_proj * Vec4::new(ndc.x, ndc.y, ndc_depth, 1.0);
        world.truncate() / world.w
    }

    /// UV displacement from this frame to the last, excluding camera jitter. The history
    /// sample for `uv` lives at `uv + velocity`.
    pub fn velocity(&self, uv: Vec2, ndc_depth: f32) -> Vec2 {
        let world = self.world_position(uv, ndc_depth);
        let prev = self.prev_view_proj * world.extend(1.0);
        let prev_uv = ndc_to_uv(prev.truncate().truncate() / prev.w);
        let jitter_delta = self.prev_jitter - self.jitter;
        // NDC → UV flips Y and halves the range
        let jitter_delta_uv = Vec2::new(jitter_delta.x * 0.5, -jitter_delta.y * 0.5);
        prev_uv - uv - jitter_delta_uv
    }
}

/// Whether the history sample at `history_uv` may be blended.
pub fn history_valid(
    history_uv: Vec2,
    current_depth: f32,
    history_depth: f32,
    depth_threshold: f32,
) -> bool {
    let on_screen = (0.0..=1.0).contains(&history_uv.x) && (0.0..=1.0).contains(&history_uv.y);
    if !on_screen {
        return false;
    }
    let relative = (current_depth - history_depth).abs() / current_depth.abs().max(1e-4);
    relative <= depth_threshold
}

/// Per-channel bounds of a 3×3 (or any) neighbourhood.
pub fn neighbourhood_bounds(samples: &[[f32; 4]]) -> ([f32; 4], [f32; 4]) {
    let mut lo = [f32::INFINITY; 4];
    let mut hi = [f32::NEG_INFINITY; 4];
    for s in samples {
        for c in 0..4 {
            lo[c] = lo[c].min(s[c]);
            hi[c] = hi[c].max(s[c]);
        }
    }
    (lo, hi)
}

/// Clamp a history colour into the bounds of the current neighbourhood.
pub fn clamp_history(history: [f32; 4], samples: &[[f32; 4]]) -> [f32; 4] {
    if samples.is_empty() {
        return history;
    }
    let (lo, hi) = neighbourhood_bounds(samples);
    std::array::from_fn(|c| history[c].clamp(lo[c], hi[c]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::temporal::CameraJitter;

    fn reprojection(
        current: &Camera,
        previous: &Camera,
        jitter: Vec2,
        prev_jitter: Vec2,
    ) -> Reprojection {
        let jittered =
            |c: &Camera, j| CameraJitter::jittered(c.projection_matrix(), j) * c.view_matrix();
        let vp = jittered(current, jitter);
        let prev_vp = jittered(previous, prev_jitter);
        Reprojection {
            inv_view_proj: vp.inverse(),
            prev_view_proj: prev_vp,
            jitter,
            prev_jitter,
        }
    }

    #[test]
    fn static_camera_has_zero_velocity_despite_jitter() {
        let camera = Camera::new().at(0.0, 1.0, 5.0).looking_at(0.0, 1.0, 0.0);
        let r = reprojection(&camera, &camera, Vec2::new(0.002, -0.001), Vec2::new(-0.003, 0.004));
        for uv in [Vec2::new(0.5, 0.5), Vec2::new(0.1, 0.8), Vec2::new(0.9, 0.2)] {
            let v = r.velocity(uv, 0.97);
            assert!(v.length() < 1e-4, "uv {uv:?} velocity {v:?}");
        }
    }

    #[test]
    fn sideways_motion_points_history_the_other_way() {
        let previous = Camera::new().at(0.0, 0.0, 5.0).looking_at(0.0, 0.0, 0.0);
        let current = Camera::new().at(0.5, 0.0, 5.0).looking_at(0.5, 0.0, 0.0);
        let r = reprojection(&current, &previous, Vec2::ZERO, Vec2::ZERO);
        // camera moved right, so a fixed point was further right on screen last frame
        let v = r.velocity(Vec2::new(0.5, 0.5), 0.98);
        assert!(v.x > 0.0);
        assert!(v.y.abs() < 1e-4);
    }

    #[test]
    fn history_is_rejected_off_screen_or_across_depth_edges() {
        assert!(history_valid(Vec2::new(0.5, 0.5), 10.0, 10.5, DEFAULT_DEPTH_THRESHOLD));
        assert!(!history_valid(Vec2::new(1.01, 0.5), 10.0, 10.0, DEFAULT_DEPTH_THRESHOLD));
        assert!(!history_valid(Vec2::new(0.5, -0.2), 10.0, 10.0, DEFAULT_DEPTH_THRESHOLD));
        assert!(!history_valid(Vec2::new(0.5, 0.5), 10.0, 12.0, DEFAULT_DEPTH_THRESHOLD));
    }

    #[test]
    fn clamp_pulls_outliers_into_neighbourhood() {
        let samples = [[0.2, 0.2, 0.2, 1.0], [0.4, 0.1, 0.3, 1.0], [0.3, 0.3, 0.25, 1.0]];
        let clamped = clamp_history([0.9, 0.0, 0.26, 1.0], &samples);
        assert_eq!(clamped, [0.4, 0.1, 0.26, 1.0]);
    }

    #[test]
    fn uv_and_ndc_conventions_are_inverse() {
        let uv = Vec2::new(0.25, 0.75);
        assert_eq!(ndc_to_uv(uv_to_ndc(uv)), uv);
        assert_eq!(uv_to_ndc(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, 1.0));
    }
}
