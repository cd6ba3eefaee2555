//! Scene geometry: the [`Vertex3d`] format, GPU-resident [`Mesh`]es and [`Transform`]s.
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |
//!
//! Every scene pass (shadow, colour, stochastic depth) consumes this layout through
//! [`Vertex3d::LAYOUT`].

use crate::gpu::GpuContext;
use glam::{Mat4, Quat, Vec3};

/// A vertex with position, normal, and texture coordinates (32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    /// Vertex buffer layout shared by every scene pipeline.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// CPU-side geometry before upload. Primitive builders produce this so their output can be
/// inspected without a device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centred at the origin, four vertices per face for flat normals.
    pub fn cube() -> Self {
        // (normal, tangent u, tangent v) per face; u × v points along the normal
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ];

        let mut data = Self::default();
        for (normal, u, v) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let base = data.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (n + u * su + v * sv) * 0.5;
                data.vertices.push(Vertex3d::new(
                    p.to_array(),
                    normal,
                    [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
                ));
            }
            data.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        data
    }

    /// UV sphere of radius 0.5.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut data = Self::default();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let (ring_radius, y) = phi.sin_cos();
            for seg in 0..=segments {
                let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
                let (sin_t, cos_t) = theta.sin_cos();
                let normal = Vec3::new(ring_radius * cos_t, y, ring_radius * sin_t);
                data.vertices.push(Vertex3d::new(
                    (normal * 0.5).to_array(),
                    normal.to_array(),
                    [seg as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        let stride = segments + 1;
        for ring in 0..rings {
            for seg in 0..segments {
                let a = ring * stride + seg;
                let b = a + stride;
                data.indices
                    .extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        data
    }

    /// Square on the XZ plane facing +Y.
    pub fn plane(size: f32) -> Self {
        let h = size * 0.5;
        let up = [0.0, 1.0, 0.0];
        Self {
            vertices: vec![
                Vertex3d::new([-h, 0.0, h], up, [0.0, 1.0]),
                Vertex3d::new([h, 0.0, h], up, [1.0, 1.0]),
                Vertex3d::new([h, 0.0, -h], up, [1.0, 0.0]),
                Vertex3d::new([-h, 0.0, -h], up, [0.0, 0.0]),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }
}

/// GPU-resident mesh geometry.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl Mesh {
    /// Upload vertices and u32 indices.
    pub fn new(gpu: &GpuContext, vertices: &[Vertex3d], indices: &[u32]) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    pub fn from_data(gpu: &GpuContext, data: &MeshData) -> Self {
        Self::new(gpu, &data.vertices, &data.indices)
    }

    pub fn cube(gpu: &GpuContext) -> Self {
        Self::from_data(gpu, &MeshData::cube())
    }

    pub fn sphere(gpu: &GpuContext, segments: u32, rings: u32) -> Self {
        Self::from_data(gpu, &MeshData::sphere(segments, rings))
    }

    pub fn plane(gpu: &GpuContext, size: f32) -> Self {
        Self::from_data(gpu, &MeshData::plane(size))
    }
}

/// Position, rotation, and scale of a mesh entity.
///
/// Converted to a matrix in scale → rotate → translate order.
///
/// ```
/// use vapor::{Transform, Vec3};
///
/// let t = Transform::from_position(Vec3::new(0.0, 0.5, 0.0)).uniform_scale(2.0);
/// assert_eq!(t.matrix().transform_point3(Vec3::ZERO), Vec3::new(0.0, 0.5, 0.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_wind_counter_clockwise_around_their_normal() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);

        for tri in cube.indices.chunks(3) {
            let [a, b, c] =
                [tri[0], tri[1], tri[2]].map(|i| Vec3::from(cube.vertices[i as usize].position));
            let normal = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
        }
    }

    #[test]
    fn cube_spans_unit_extent() {
        let cube = MeshData::cube();
        for v in &cube.vertices {
            for c in v.position {
                assert_eq!(c.abs(), 0.5);
            }
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = MeshData::plane(4.0);
        let p: Vec<Vec3> = plane.vertices.iter().map(|v| Vec3::from(v.position)).collect();
        let n = (p[1] - p[0]).cross(p[2] - p[0]);
        assert!(n.y > 0.0);
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = MeshData::sphere(12, 6);
        for v in &sphere.vertices {
            assert!((Vec3::from(v.position).length() - 0.5).abs() < 1e-5);
        }
        assert_eq!(sphere.indices.len(), (12 * 6 * 6) as usize);
    }
}
