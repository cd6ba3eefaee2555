use glam::{Mat4, Vec3};

/// A perspective camera for 3D scenes.
///
/// The projection returned by [`projection_matrix`](Self::projection_matrix) is the
/// canonical one. Passes that need a sub-pixel jittered projection derive it as a value
/// (see [`CameraJitter`](crate::CameraJitter)) and never write it back, so scene
/// interaction and the other passes always observe the unjittered matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.target = Vec3::new(x, y, z);
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Normalized view direction.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    /// World → view transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// View → world transform (the camera's world matrix).
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Canonical (unjittered) projection with a `[0, 1]` depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Convert a `[0, 1]` NDC depth value back to positive view-space distance along -Z.
    pub fn linear_depth(&self, ndc_depth: f32) -> f32 {
        // perspective_rh: ndc = far * (d - near) / (d * (far - near))
        self.near * self.far / (self.far - ndc_depth * (self.far - self.near))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_depth_round_trips_projection() {
        let camera = Camera::new().with_clip(0.5, 50.0);
        let proj = camera.projection_matrix();
        for distance in [0.5f32, 1.0, 7.25, 49.0] {
            let clip = proj * glam::Vec4::new(0.0, 0.0, -distance, 1.0);
            let ndc = clip.z / clip.w;
            assert!((camera.linear_depth(ndc) - distance).abs() < 1e-3 * distance);
        }
    }

    #[test]
    fn world_matrix_places_camera_at_position() {
        let camera = Camera::new().at(1.0, 2.0, 3.0).looking_at(0.0, 1.0, 0.0);
        let origin = camera.world_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - camera.position).length() < 1e-4);
    }
}
