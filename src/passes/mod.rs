//! The per-technique passes the pipeline executes.
//!
//! Geometry passes live in [`scene_pass`]; everything else is a [`FullscreenPass`]
//! with its own uniform block.
//!
//! [`FullscreenPass`]: crate::render_graph::FullscreenPass

pub mod compose;
pub mod fog;
pub mod fog_blend;
pub mod scene_pass;
pub mod taa;

pub use compose::{ComposePass, ComposeUniforms};
pub use fog::{FogLight, FogPass, FogSample, FogUniforms, FogVolume, integrate_ray};
pub use fog_blend::FogBlendPass;
pub use scene_pass::{FrameUniforms, ScenePass, ScenePassKind, SceneTargets};
pub use taa::{TaaInputs, TaaResolvePass, TaaUniforms, VelocityPass, VelocityUniforms};
