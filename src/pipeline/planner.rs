//! Frame planning: which passes run this frame and which targets they touch.
//!
//! Everything here is plain state over [`TargetId`]s, so the whole frame schedule
//! (history seeding, ping-pong flips, jitter sequences) can be exercised without a GPU.

use glam::Vec2;

use crate::render_graph::{
    FramePlan, PassKind, PassRecord, PingPong, TargetDesc, TargetId, TargetPool, TargetScale,
};
use crate::settings::{PipelineVariant, SettingsChange};
use crate::stochastic::{DitherJitter, DitherSize};
use crate::temporal::{BlendWeights, CameraJitter, HistoryStep, TemporalHistory};

const SHADOW_MAP_SIZE: u32 = 1024;

pub const SCENE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Role → target table. History swaps exchange ids in here, never textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetRoles {
    pub scene_color: TargetId,
    pub scene_depth: TargetId,
    pub stochastic_depth: TargetId,
    pub shadow_map: TargetId,
    pub fog_current: TargetId,
    pub fog_history: PingPong<TargetId>,
    pub taa_history: PingPong<TargetId>,
    pub velocity: PingPong<TargetId>,
}

impl TargetRoles {
    /// Register every target the pipeline needs in `pool`.
    pub fn describe(pool: &mut TargetPool) -> Self {
        use TargetScale::{Full, Reduced};
        let mut add = |label, format, scale| pool.describe(TargetDesc::new(label, format, scale));

        let shadow = TargetScale::Fixed(SHADOW_MAP_SIZE, SHADOW_MAP_SIZE);
        Self {
            scene_color: add("Scene Color", SCENE_COLOR_FORMAT, Full),
            scene_depth: add("Scene Depth", DEPTH_FORMAT, Full),
            stochastic_depth: add("Stochastic Depth", DEPTH_FORMAT, Reduced),
            shadow_map: add("Shadow Map", DEPTH_FORMAT, shadow),
            fog_current: add("Fog Current", crate::passes::fog::FOG_FORMAT, Reduced),
            fog_history: PingPong::new(
                add("Fog History A", crate::passes::fog::FOG_FORMAT, Reduced),
                add("Fog History B", crate::passes::fog::FOG_FORMAT, Reduced),
            ),
            taa_history: PingPong::new(
                add("TAA History A", SCENE_COLOR_FORMAT, Full),
                add("TAA History B", SCENE_COLOR_FORMAT, Full),
            ),
            velocity: PingPong::new(
                add("Velocity A", crate::passes::taa::VELOCITY_FORMAT, Full),
                add("Velocity B", crate::passes::taa::VELOCITY_FORMAT, Full),
            ),
        }
    }

    pub fn all(&self) -> Vec<TargetId> {
        let mut ids = vec![
            self.scene_color,
            self.scene_depth,
            self.stochastic_depth,
            self.shadow_map,
            self.fog_current,
        ];
        ids.extend(self.fog_history.iter().copied());
        ids.extend(self.taa_history.iter().copied());
        ids.extend(self.velocity.iter().copied());
        ids
    }
}

/// Per-frame facts the planner needs from the scene and settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInputs {
    pub casts_shadow: bool,
    pub fog_weights: BlendWeights,
}

/// A plan plus the jitter values that were current while it was made.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedFrame {
    pub plan: FramePlan,
    pub dither_index: u32,
    /// This frame's camera jitter, in pixels.
    pub camera_jitter: Vec2,
    /// Last frame's camera jitter, in pixels.
    pub previous_camera_jitter: Vec2,
}

impl PlannedFrame {
    /// The target compose reads scene colour from.
    pub fn compose_source(&self) -> Option<TargetId> {
        self.plan
            .find(|k| matches!(k, PassKind::Compose))
            .and_then(|p| p.read(0))
    }
}

/// Everything that evolves from frame to frame, minus the GPU objects.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameState {
    initial: TargetRoles,
    roles: TargetRoles,
    variant: PipelineVariant,
    fog_history: TemporalHistory,
    taa_history: TemporalHistory,
    dither: DitherJitter,
    camera_jitter: CameraJitter,
    ready: bool,
}

impl FrameState {
    pub fn new(roles: TargetRoles, variant: PipelineVariant, dither_size: DitherSize) -> Self {
        Self {
            initial: roles,
            roles,
            variant,
            fog_history: TemporalHistory::new(),
            taa_history: TemporalHistory::new(),
            dither: DitherJitter::new(dither_size),
            camera_jitter: CameraJitter::new(),
            ready: false,
        }
    }

    pub fn roles(&self) -> &TargetRoles {
        &self.roles
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn dither_size(&self) -> DitherSize {
        self.dither.size()
    }

    pub fn camera_jitter(&self) -> &CameraJitter {
        &self.camera_jitter
    }

    pub fn fog_history(&self) -> &TemporalHistory {
        &self.fog_history
    }

    pub fn taa_history(&self) -> &TemporalHistory {
        &self.taa_history
    }

    /// Targets now match the window; start over from bootstrap.
    pub fn on_resize(&mut self) {
        self.ready = true;
        self.reset();
    }

    /// Drop all history: original role table, bootstrap state, jitters at zero.
    pub fn reset(&mut self) {
        self.roles = self.initial;
        self.fog_history.invalidate();
        self.taa_history.invalidate();
        self.dither.reset();
        self.camera_jitter.reset();
    }

    /// Targets were destroyed; nothing can be planned until the next resize.
    pub fn release(&mut self) {
        self.ready = false;
        self.reset();
    }

    pub fn set_variant(&mut self, variant: PipelineVariant) {
        self.variant = variant;
        self.reset();
    }

    pub fn set_dither_size(&mut self, size: DitherSize) {
        self.dither.set_size(size);
        self.reset();
    }

    /// Follow a bulk settings change. Anything structural restarts history; an empty
    /// change leaves the state untouched.
    pub fn apply_change(&mut self, change: &SettingsChange) {
        if let Some(variant) = change.variant {
            self.variant = variant;
        }
        if let Some(size) = change.dither_size {
            self.dither.set_size(size);
        }
        if change.resets_history() {
            self.reset();
        }
    }

    /// Plan one frame and advance the temporal state past it.
    ///
    /// `None` until targets have been sized.
    pub fn plan_frame(&mut self, inputs: &FrameInputs) -> Option<PlannedFrame> {
        if !self.ready {
            return None;
        }
        let dither_index = self.dither.index();
        let camera_jitter = self.camera_jitter.offset();
        let previous_camera_jitter = self.camera_jitter.previous_offset();
        let mut plan = FramePlan::default();
        let r = &mut self.roles;

        if inputs.casts_shadow {
            plan.push(PassRecord::new(PassKind::Shadow).writes(&[r.shadow_map]));
        }
        plan.push(
            PassRecord::new(PassKind::SceneColor)
                .reads(&[r.shadow_map])
                .writes(&[r.scene_color, r.scene_depth]),
        );

        let source = match self.variant {
            PipelineVariant::Simple => r.scene_color,
            PipelineVariant::Supersampled => {
                plan.push(
                    PassRecord::new(PassKind::Velocity)
                        .reads(&[r.scene_depth])
                        .writes(&[*r.velocity.write()]),
                );
                match self.taa_history.step() {
                    HistoryStep::Seed => {
                        std::mem::swap(&mut r.scene_color, r.taa_history.read_mut());
                        plan.push(
                            PassRecord::new(PassKind::TaaSeed).writes(&[*r.taa_history.read()]),
                        );
                    }
                    HistoryStep::Blend => {
                        plan.push(
                            PassRecord::new(PassKind::TaaResolve)
                                .reads(&[
                                    r.scene_color,
                                    *r.taa_history.read(),
                                    *r.velocity.write(),
                                    *r.velocity.read(),
                                ])
                                .writes(&[*r.taa_history.write()]),
                        );
                        r.taa_history.flip();
                    }
                }
                r.velocity.flip();
                *r.taa_history.read()
            }
        };

        plan.push(
            PassRecord::new(PassKind::StochasticDepth { dither_index })
                .writes(&[r.stochastic_depth]),
        );
        self.dither.advance();

        plan.push(
            PassRecord::new(PassKind::FogMarch)
                .reads(&[r.stochastic_depth, r.shadow_map])
                .writes(&[r.fog_current]),
        );
        match self.fog_history.step() {
            HistoryStep::Seed => {
                std::mem::swap(&mut r.fog_current, r.fog_history.read_mut());
                plan.push(PassRecord::new(PassKind::FogSeed).writes(&[*r.fog_history.read()]));
            }
            HistoryStep::Blend => {
                plan.push(
                    PassRecord::new(PassKind::FogBlend {
                        weights: inputs.fog_weights,
                    })
                    .reads(&[r.fog_current, *r.fog_history.read()])
                    .writes(&[*r.fog_history.write()]),
                );
                r.fog_history.flip();
            }
        }

        plan.push(
            PassRecord::new(PassKind::Compose)
                .reads(&[source, *r.fog_history.read()])
                .writes(&[TargetId::SURFACE]),
        );

        if self.variant == PipelineVariant::Supersampled {
            self.camera_jitter.advance();
        }

        Some(PlannedFrame {
            plan,
            dither_index,
            camera_jitter,
            previous_camera_jitter,
        })
    }
}
