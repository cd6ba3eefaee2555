//! Frame plan records: which pass runs, what it samples and what it writes.

use crate::render_graph::TargetId;
use crate::temporal::BlendWeights;

/// The fixed set of passes a frame can contain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PassKind {
    /// Depth from the directional light's point of view.
    Shadow,
    /// Full-resolution scene with its own materials.
    SceneColor,
    /// Per-pixel motion and linear depth (supersampled variant).
    Velocity,
    /// History seed for the supersampled colour: ids swapped, nothing drawn.
    TaaSeed,
    /// Reprojected colour accumulation.
    TaaResolve,
    /// Downsampled depth with stochastic transparency.
    StochasticDepth { dither_index: u32 },
    /// Volumetric march into the current fog buffer.
    FogMarch,
    /// History seed for fog: ids swapped, nothing drawn.
    FogSeed,
    /// Fixed-weight blend of current fog into history.
    FogBlend { weights: BlendWeights },
    /// Final composite and grading onto the surface.
    Compose,
}

impl PassKind {
    /// Seeds are bookkeeping entries; they issue no GPU work.
    pub fn draws(&self) -> bool {
        !matches!(self, PassKind::TaaSeed | PassKind::FogSeed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PassKind::Shadow => "Shadow Pass",
            PassKind::SceneColor => "Scene Color Pass",
            PassKind::Velocity => "Velocity Pass",
            PassKind::TaaSeed => "TAA Seed",
            PassKind::TaaResolve => "TAA Resolve Pass",
            PassKind::StochasticDepth { .. } => "Stochastic Depth Pass",
            PassKind::FogMarch => "Fog March Pass",
            PassKind::FogSeed => "Fog Seed",
            PassKind::FogBlend { .. } => "Fog Blend Pass",
            PassKind::Compose => "Compose Pass",
        }
    }
}

/// One entry of a frame plan with its resolved attachments and inputs.
#[derive(Clone, Debug, PartialEq)]
pub struct PassRecord {
    pub kind: PassKind,
    pub reads: Vec<TargetId>,
    pub writes: Vec<TargetId>,
}

impl PassRecord {
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn reads(mut self, ids: &[TargetId]) -> Self {
        self.reads.extend_from_slice(ids);
        self
    }

    pub fn writes(mut self, ids: &[TargetId]) -> Self {
        self.writes.extend_from_slice(ids);
        self
    }

    /// Targets that are both sampled and attached in this pass.
    pub fn aliases(&self) -> Vec<TargetId> {
        self.reads
            .iter()
            .copied()
            .filter(|id| self.writes.contains(id))
            .collect()
    }

    pub fn read(&self, index: usize) -> Option<TargetId> {
        self.reads.get(index).copied()
    }

    pub fn write(&self, index: usize) -> Option<TargetId> {
        self.writes.get(index).copied()
    }
}

/// The ordered passes of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    pub passes: Vec<PassRecord>,
}

impl FramePlan {
    pub fn push(&mut self, record: PassRecord) {
        debug_assert!(
            record.aliases().is_empty(),
            "{} samples a target it also writes: {:?}",
            record.kind.label(),
            record.aliases()
        );
        self.passes.push(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PassRecord> {
        self.passes.iter()
    }

    pub fn kinds(&self) -> Vec<PassKind> {
        self.passes.iter().map(|p| p.kind).collect()
    }

    pub fn find(&self, pred: impl Fn(&PassKind) -> bool) -> Option<&PassRecord> {
        self.passes.iter().find(|p| pred(&p.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_reports_overlap() {
        let clean = PassRecord::new(PassKind::FogMarch)
            .reads(&[TargetId(1), TargetId(2)])
            .writes(&[TargetId(3)]);
        assert!(clean.aliases().is_empty());

        let broken = PassRecord::new(PassKind::Compose)
            .reads(&[TargetId(4)])
            .writes(&[TargetId(4)]);
        assert_eq!(broken.aliases(), vec![TargetId(4)]);
    }

    #[test]
    fn seeds_issue_no_draws() {
        assert!(!PassKind::FogSeed.draws());
        assert!(!PassKind::TaaSeed.draws());
        assert!(PassKind::Compose.draws());
    }
}
