//! The scene the pipeline renders: a `hecs` world plus the GPU assets it references.
//!
//! Renderable entities carry a [`Transform`], a [`MeshHandle`] and a [`MaterialSlot`].
//! Entities that should be rendered with dithered transparency in the fog depth pass also
//! carry the [`StochasticTransparency`] tag.
//!
//! ```no_run
//! # fn demo(gpu: &vapor::GpuContext) {
//! use vapor::{Material, Mesh, Scene, Transform, Vec3};
//!
//! let mut scene = Scene::new();
//! let cube = scene.add_mesh(Mesh::cube(gpu));
//! let glass = scene.add_material(Material::transparent(Vec3::ONE, 0.4));
//! scene.spawn_transparent(Transform::new().position(Vec3::Y), cube, glass);
//! # }
//! ```

mod material;
mod registry;

pub use material::{Material, MaterialId, MaterialLibrary, RenderQueue};
pub use registry::{MaterialSubstitution, TransparentRegistry};

use glam::{Mat4, Vec3};

use crate::mesh::{Mesh, Transform};
use crate::texture::Texture;

/// Handle to a mesh owned by a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Handle to a texture owned by a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Component: which mesh an entity draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshHandle(pub MeshId);

/// Component: which material an entity draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialSlot(pub MaterialId);

/// Tag component: render this entity with stochastic transparency in the depth pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StochasticTransparency;

/// The single directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub casts_shadow: bool,
    /// Half-size of the orthographic shadow frustum in world units.
    pub shadow_extent: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(5.0, 10.0, 5.0),
            target: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            casts_shadow: true,
            shadow_extent: 10.0,
        }
    }
}

impl DirectionalLight {
    /// Unit vector the light travels along.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Y)
    }

    /// World → light clip space for the shadow map.
    pub fn shadow_matrix(&self) -> Mat4 {
        let dir = self.direction();
        let up = if dir.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(self.position, self.position + dir, up);
        let e = self.shadow_extent;
        let far = (self.target - self.position).length() + 2.0 * e;
        Mat4::orthographic_rh(-e, e, -e, e, 0.1, far) * view
    }
}

/// One drawable entity resolved for a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub entity: hecs::Entity,
    pub mesh: MeshId,
    pub material: MaterialId,
    pub model: Mat4,
}

/// Geometry, textures, materials and the light, with the world that ties them together.
///
/// Structural changes (spawning, despawning, tagging) go through the `Scene` methods so
/// the generation counter stays in step with the world.
#[derive(Default)]
pub struct Scene {
    pub(crate) world: hecs::World,
    pub(crate) materials: MaterialLibrary,
    meshes: Vec<Mesh>,
    textures: Vec<Texture>,
    light: Option<DirectionalLight>,
    generation: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Read access to the world. Components can still be edited in place through
    /// `get::<&mut T>`, which leaves the generation untouched.
    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn spawn(
        &mut self,
        transform: Transform,
        mesh: MeshId,
        material: MaterialId,
    ) -> hecs::Entity {
        self.generation += 1;
        self.world
            .spawn((transform, MeshHandle(mesh), MaterialSlot(material)))
    }

    /// Spawn an entity tagged for stochastic transparency.
    pub fn spawn_transparent(
        &mut self,
        transform: Transform,
        mesh: MeshId,
        material: MaterialId,
    ) -> hecs::Entity {
        self.generation += 1;
        self.world.spawn((
            transform,
            MeshHandle(mesh),
            MaterialSlot(material),
            StochasticTransparency,
        ))
    }

    pub fn despawn(&mut self, entity: hecs::Entity) -> bool {
        let removed = self.world.despawn(entity).is_ok();
        if removed {
            self.generation += 1;
        }
        removed
    }

    /// Add or remove the [`StochasticTransparency`] tag.
    pub fn set_stochastic(&mut self, entity: hecs::Entity, enabled: bool) -> bool {
        let changed = if enabled {
            self.world.insert_one(entity, StochasticTransparency).is_ok()
        } else {
            self.world.remove_one::<StochasticTransparency>(entity).is_ok()
        };
        if changed {
            self.generation += 1;
        }
        changed
    }

    /// Structural change counter; bumps whenever entities or tags change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn light(&self) -> Option<&DirectionalLight> {
        self.light.as_ref()
    }

    pub fn set_light(&mut self, light: Option<DirectionalLight>) {
        self.light = light;
    }

    /// Every renderable entity with its current material.
    pub fn draw_items(&self) -> Vec<DrawItem> {
        self.world
            .query::<(&Transform, &MeshHandle, &MaterialSlot)>()
            .iter()
            .map(|(entity, (transform, mesh, material))| DrawItem {
                entity,
                mesh: mesh.0,
                material: material.0,
                model: transform.matrix(),
            })
            .collect()
    }

    /// Draw items ordered for the colour pass: opaque, then transparent back to front,
    /// then emissive. Items whose material is missing are dropped.
    pub fn color_order(&self, eye: Vec3) -> Vec<DrawItem> {
        let mut items: Vec<(RenderQueue, f32, DrawItem)> = self
            .draw_items()
            .into_iter()
            .filter_map(|item| {
                let queue = self.materials.get(item.material)?.queue();
                let distance = item.model.w_axis.truncate().distance_squared(eye);
                Some((queue, distance, item))
            })
            .collect();
        items.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| match a.0 {
                RenderQueue::Transparent => b.1.total_cmp(&a.1),
                _ => std::cmp::Ordering::Equal,
            })
        });
        items.into_iter().map(|(_, _, item)| item).collect()
    }
}
