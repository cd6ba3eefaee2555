//! Error types for the fallible edges of the pipeline.
//!
//! The per-frame render path never returns errors (a broken frame is logged and
//! skipped), so only start-up and settings persistence surface a [`Result`].

use std::path::PathBuf;

/// Failures while bringing up the GPU context.
#[derive(thiserror::Error, Debug)]
pub enum GpuError {
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

/// Failures while loading or saving [`Settings`](crate::Settings).
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures from the windowed [`run`](crate::run) entry point.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
