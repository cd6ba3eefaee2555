//! User-tunable pipeline settings and their persistence.
//!
//! [`Settings`] is a plain serde value. Every field has a default, so files written by
//! older builds (or hand-edited ones with missing keys) still load. Where settings live is
//! decided by the [`SettingsStore`] handed to the [`Renderer`](crate::Renderer).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::render_graph::Downsampling;
use crate::stochastic::DitherSize;
use crate::temporal::{BlendPolicy, DEFAULT_DEPTH_THRESHOLD};

/// Which frame graph the pipeline runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineVariant {
    /// Scene colour straight into compose.
    #[default]
    Simple,
    /// Jittered scene colour accumulated through a reprojecting resolve.
    Supersampled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSettings {
    pub light_multiplier: f32,
    pub warp_speed: f32,
    /// History weight of the fog blend.
    pub blend_factor: f32,
    /// Blur radius applied when compose samples fog, in fog texels.
    pub fog_blur: f32,
    pub fog_steps: u32,
    pub ray_noise_scale: f32,
    pub density: f32,
    pub max_distance: f32,
    pub sphere_center: [f32; 3],
    pub sphere_radius: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            light_multiplier: 1.0,
            warp_speed: 0.3,
            blend_factor: 0.85,
            fog_blur: 1.0,
            fog_steps: 48,
            ray_noise_scale: 1.0,
            density: 0.35,
            max_distance: 9.0,
            sphere_center: [0.0, 1.0, 0.0],
            sphere_radius: 3.5,
        }
    }
}

impl FogSettings {
    pub fn blend_policy(&self) -> BlendPolicy {
        BlendPolicy::Fixed {
            history_weight: self.blend_factor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    pub vignette_intensity: f32,
    pub vignette_radius: f32,
    pub exposure: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub brightness: f32,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            vignette_intensity: 0.35,
            vignette_radius: 0.75,
            exposure: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            brightness: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaaSettings {
    pub max_history_weight: f32,
    pub base_blend: f32,
    pub velocity_scale: f32,
    pub depth_threshold: f32,
}

impl Default for TaaSettings {
    fn default() -> Self {
        Self {
            max_history_weight: 0.9,
            base_blend: 0.1,
            velocity_scale: 0.25,
            depth_threshold: DEFAULT_DEPTH_THRESHOLD,
        }
    }
}

impl TaaSettings {
    pub fn blend_policy(&self) -> BlendPolicy {
        BlendPolicy::MotionAdaptive {
            max_history_weight: self.max_history_weight,
            velocity_scale: self.velocity_scale,
            base_blend: self.base_blend,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechniqueSettings {
    pub variant: PipelineVariant,
    pub dither_size: DitherSize,
    pub taa: TaaSettings,
}

/// Everything the pipeline exposes for tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub downsampling: Downsampling,
    pub fog: FogSettings,
    pub particle_brightness: f32,
    pub post: PostSettings,
    /// Linear RGB shown where the scene is empty.
    pub background: [f32; 3],
    pub technique: TechniqueSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            downsampling: Downsampling::default(),
            fog: FogSettings::default(),
            particle_brightness: 1.0,
            post: PostSettings::default(),
            background: [0.02, 0.02, 0.04],
            technique: TechniqueSettings::default(),
        }
    }
}

/// Upper bound on fog march steps; beyond this the shader loop stops being interactive.
pub const MAX_FOG_STEPS: u32 = 256;

impl Settings {
    /// Clamp values that would break a pass into their usable range.
    ///
    /// Loaded files go through this; the individual pipeline setters do not.
    pub fn sanitized(mut self) -> Self {
        let steps = self.fog.fog_steps.clamp(1, MAX_FOG_STEPS);
        if steps != self.fog.fog_steps {
            tracing::warn!(
                requested = self.fog.fog_steps,
                used = steps,
                "fog step count out of range"
            );
            self.fog.fog_steps = steps;
        }
        for (name, value) in [
            ("fog.blend_factor", &mut self.fog.blend_factor),
            ("technique.taa.max_history_weight", &mut self.technique.taa.max_history_weight),
            ("technique.taa.base_blend", &mut self.technique.taa.base_blend),
        ] {
            if !(0.0..=1.0).contains(value) {
                tracing::warn!(setting = name, value = *value, "weight outside [0, 1], clamped");
                *value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
            }
        }
        if self.fog.density < 0.0 {
            tracing::warn!(value = self.fog.density, "negative fog density, using 0");
            self.fog.density = 0.0;
        }
        self
    }

    /// Snap `factor` to 1, 2 or 4 and store it. Returns the divisor actually used.
    pub fn set_downsampling_factor(&mut self, factor: u32) -> Downsampling {
        let downsampling = Downsampling::from_factor(factor);
        if downsampling.factor() != factor {
            tracing::debug!(
                requested = factor,
                used = downsampling.factor(),
                "downsampling factor snapped"
            );
        }
        self.downsampling = downsampling;
        downsampling
    }
}

/// The settings that rebuild targets or restart history when they change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub variant: Option<PipelineVariant>,
    pub dither_size: Option<DitherSize>,
    pub downsampling: Option<Downsampling>,
}

impl SettingsChange {
    /// What moving from `old` to `new` changes; `None` fields are unchanged.
    pub fn between(old: &Settings, new: &Settings) -> Self {
        fn differs<T: PartialEq>(a: T, b: T) -> Option<T> {
            (a != b).then_some(b)
        }
        Self {
            variant: differs(old.technique.variant, new.technique.variant),
            dither_size: differs(old.technique.dither_size, new.technique.dither_size),
            downsampling: differs(old.downsampling, new.downsampling),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether any accumulated history is invalid afterwards.
    pub fn resets_history(&self) -> bool {
        !self.is_empty()
    }
}

/// Somewhere settings can be loaded from and saved to.
pub trait SettingsStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Settings>, SettingsError>;

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Keeps settings for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Option<Settings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: Settings) -> Self {
        Self {
            saved: Some(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        self.saved = Some(settings.clone());
        Ok(())
    }
}

/// Pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let settings = serde_json::from_str(&text)?;
        tracing::info!(path = %self.path.display(), "loaded settings");
        Ok(Some(settings))
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        tracing::info!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested").join("settings.json"));
        assert!(store.load().unwrap().is_none());

        let mut settings = Settings::default();
        settings.fog.density = 0.8;
        settings.technique.variant = PipelineVariant::Supersampled;
        settings.technique.dither_size = DitherSize::Eight;
        settings.downsampling = Downsampling::Quarter;
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), Some(settings));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let partial: Settings =
            serde_json::from_str(r#"{ "fog": { "density": 0.5 }, "particle_brightness": 2.0 }"#)
                .unwrap();
        assert_eq!(partial.fog.density, 0.5);
        assert_eq!(partial.fog.sphere_radius, 3.5);
        assert_eq!(partial.particle_brightness, 2.0);
        assert_eq!(partial.post, PostSettings::default());
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::new(path).load().unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn memory_store_returns_what_was_saved() {
        let mut store = MemorySettingsStore::new();
        assert_eq!(store.load().unwrap(), None);
        let mut settings = Settings::default();
        settings.post.exposure = 1.7;
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), Some(settings));
    }

    #[test]
    fn sanitizing_clamps_unusable_values() {
        let mut settings = Settings::default();
        settings.fog.fog_steps = 0;
        settings.fog.blend_factor = 1.4;
        settings.fog.density = -1.0;
        let clean = settings.sanitized();
        assert_eq!(clean.fog.fog_steps, 1);
        assert_eq!(clean.fog.blend_factor, 1.0);
        assert_eq!(clean.fog.density, 0.0);
        assert_eq!(Settings::default().sanitized(), Settings::default());
    }

    #[test]
    fn downsampling_factor_snaps_to_a_supported_divisor() {
        let mut settings = Settings::default();
        for (requested, used) in [(0, 1), (1, 1), (2, 2), (3, 2), (4, 4), (9, 4)] {
            assert_eq!(settings.set_downsampling_factor(requested).factor(), used);
            assert_eq!(settings.downsampling.factor(), used);
        }
    }

    #[test]
    fn settings_change_lists_structural_differences() {
        let old = Settings::default();
        let mut new = old.clone();
        new.fog.density = 0.9;
        new.post.exposure = 2.0;
        assert!(SettingsChange::between(&old, &new).is_empty());

        new.set_downsampling_factor(3);
        new.technique.variant = PipelineVariant::Supersampled;
        let change = SettingsChange::between(&old, &new);
        assert_eq!(change.variant, Some(PipelineVariant::Supersampled));
        assert_eq!(change.dither_size, None);
        assert_eq!(change.downsampling, None);
        assert!(change.resets_history());

        new.set_downsampling_factor(4);
        let change = SettingsChange::between(&old, &new);
        assert_eq!(change.downsampling, Some(Downsampling::Quarter));
    }

    #[test]
    fn applying_the_same_settings_twice_changes_nothing_the_second_time() {
        let mut current = Settings::default();
        let mut next = Settings::default();
        next.technique.dither_size = DitherSize::Eight;
        next.fog.fog_steps = 1000;
        let next = next.sanitized();

        assert!(!SettingsChange::between(&current, &next).is_empty());
        current = next.clone();
        assert!(SettingsChange::between(&current, &next.sanitized()).is_empty());
        assert_eq!(current.fog.fog_steps, MAX_FOG_STEPS);
    }

    #[test]
    fn taa_settings_drive_a_motion_adaptive_blend() {
        let taa = TaaSettings::default();
        let still = taa.blend_policy().weights(0.0);
        assert!((still.history() - taa.max_history_weight).abs() < 1e-6);
        assert!((still.history() + still.current() - 1.0).abs() < 1e-6);

        let fast = taa.blend_policy().weights(100.0);
        assert_eq!(fast.current(), 1.0);
        assert_eq!(fast.history(), 0.0);
    }
}
