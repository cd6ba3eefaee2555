//! # Vapor
//!
//! **A multi-pass wgpu render pipeline with stochastic transparency and temporally
//! accumulated volumetric fog.**
//!
//! Every frame runs a fixed sequence of passes over one [`Scene`]:
//!
//! - a shadow map for the single [`DirectionalLight`]
//! - full-resolution scene colour (optionally jittered and resolved with TAA)
//! - a downsampled depth pass where tagged transparent meshes are dithered against a
//!   Bayer matrix, so fog can see through them on average over time
//! - a volumetric fog march against that depth, blended into a ping-pong history
//! - a compose pass with background substitution, vignette and colour grading
//!
//! ## Quick Start
//!
//! ```no_run
//! use vapor::{AppConfig, DirectionalLight, Material, Mesh, Scene, Transform, Vec3};
//!
//! fn main() -> Result<(), vapor::AppError> {
//!     vapor::run(AppConfig::new().title("Fog"), |gpu| {
//!         let mut scene = Scene::new();
//!         let cube = scene.add_mesh(Mesh::cube(gpu));
//!         let glass = scene.add_material(Material::transparent(Vec3::ONE, 0.5));
//!         scene.spawn_transparent(Transform::new().position(Vec3::Y), cube, glass);
//!         scene.set_light(Some(DirectionalLight::default()));
//!         scene
//!     })
//! }
//! ```
//!
//! The [`Pipeline`] can also be driven directly from an existing wgpu/winit host with a
//! [`GpuContext`].

mod app;
mod camera;
mod error;
mod gpu;
mod mesh;
pub mod passes;
mod pipeline;
pub mod render_graph;
pub mod scene;
mod settings;
mod stochastic;
pub mod temporal;
mod texture;

pub use app::{AppConfig, AutoOrbit, Renderer, run};
pub use camera::Camera;
pub use error::{AppError, GpuError, SettingsError};
pub use gpu::GpuContext;
pub use mesh::{Mesh, MeshData, Transform, Vertex3d};
pub use pipeline::{FrameInputs, FrameState, Pipeline, PlannedFrame, TargetRoles};
pub use render_graph::{Downsampling, TargetId};
pub use scene::{DirectionalLight, Material, MaterialId, MeshId, Scene, TextureId};
pub use settings::{
    FogSettings, JsonFileStore, MAX_FOG_STEPS, MemorySettingsStore, PipelineVariant,
    PostSettings, Settings, SettingsChange, SettingsStore, TaaSettings, TechniqueSettings,
};
pub use stochastic::{DitherJitter, DitherMatrix, DitherSize};
pub use temporal::{BlendPolicy, BlendWeights, CameraJitter};
pub use texture::Texture;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

pub use hecs::{Entity, World};
