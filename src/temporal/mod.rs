//! Temporal accumulation: history state, blend weights, camera jitter and reprojection.

mod history;
mod jitter;
pub mod reprojection;

pub use history::{BlendPolicy, BlendWeights, HistoryStep, TemporalHistory};
pub use jitter::{halton, CameraJitter, CAMERA_JITTER_PERIOD};
pub use reprojection::{Reprojection, DEFAULT_DEPTH_THRESHOLD};
