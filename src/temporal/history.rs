//! The bootstrap/steady state machine shared by every temporally accumulated buffer.

use serde::{Deserialize, Serialize};

/// Weights of one history blend. Always constructed so that `history + current == 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendWeights {
    history: f32,
    current: f32,
}

impl BlendWeights {
    /// Weights from the share of the current frame, clamped to `[0, 1]`.
    pub fn from_current(current: f32) -> Self {
        let current = current.clamp(0.0, 1.0);
        Self {
            history: 1.0 - current,
            current,
        }
    }

    pub fn from_history(history: f32) -> Self {
        Self::from_current(1.0 - history.clamp(0.0, 1.0))
    }

    pub fn history(&self) -> f32 {
        self.history
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn apply(&self, history: [f32; 4], current: [f32; 4]) -> [f32; 4] {
        std::array::from_fn(|i| history[i] * self.history + current[i] * self.current)
    }
}

/// How the history share is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BlendPolicy {
    /// Constant history weight.
    Fixed { history_weight: f32 },
    /// History weight falls off with pixel motion; the current frame always keeps at
    /// least `base_blend`.
    MotionAdaptive {
        max_history_weight: f32,
        velocity_scale: f32,
        base_blend: f32,
    },
}

impl BlendPolicy {
    /// Weights for a pixel moving `speed` pixels per frame. Fixed policies ignore it.
    pub fn weights(&self, speed: f32) -> BlendWeights {
        match *self {
            BlendPolicy::Fixed { history_weight } => BlendWeights::from_history(history_weight),
            BlendPolicy::MotionAdaptive {
                max_history_weight,
                velocity_scale,
                base_blend,
            } => {
                let history =
                    max_history_weight * (1.0 - speed.abs() * velocity_scale).clamp(0.0, 1.0);
                BlendWeights::from_current((1.0 - history).max(base_blend))
            }
        }
    }
}

/// What a technique does with its history this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HistoryStep {
    /// Adopt the current buffer as history; no blend is drawn and history is not read.
    Seed,
    /// Blend current into history, then flip the pair.
    Blend,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Bootstrap,
    Steady,
}

/// Per-technique history validity.
///
/// Starts in bootstrap. The first [`step`](Self::step) after construction or
/// [`invalidate`](Self::invalidate) returns [`HistoryStep::Seed`]; every later one returns
/// [`HistoryStep::Blend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TemporalHistory {
    phase: Phase,
}

impl TemporalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_first_frame(&self) -> bool {
        self.phase == Phase::Bootstrap
    }

    pub fn step(&mut self) -> HistoryStep {
        match self.phase {
            Phase::Bootstrap => {
                self.phase = Phase::Steady;
                HistoryStep::Seed
            }
            Phase::Steady => HistoryStep::Blend,
        }
    }

    /// Stale history (resize, rebind) must never be blended.
    pub fn invalidate(&mut self) {
        self.phase = Phase::Bootstrap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_seeds_then_blends() {
        let mut history = TemporalHistory::new();
        assert!(history.is_first_frame());
        assert_eq!(history.step(), HistoryStep::Seed);
        assert!(!history.is_first_frame());
        assert_eq!(history.step(), HistoryStep::Blend);
        assert_eq!(history.step(), HistoryStep::Blend);

        history.invalidate();
        assert_eq!(history.step(), HistoryStep::Seed);
    }

    #[test]
    fn fixed_weights_sum_to_one() {
        for i in 0..=100 {
            let w = BlendPolicy::Fixed {
                history_weight: i as f32 / 100.0,
            }
            .weights(0.0);
            assert_eq!(w.history() + w.current(), 1.0);
        }
    }

    #[test]
    fn adaptive_weights_sum_to_one_and_keep_a_floor() {
        let policy = BlendPolicy::MotionAdaptive {
            max_history_weight: 0.95,
            velocity_scale: 0.1,
            base_blend: 0.08,
        };
        for i in 0..200 {
            let speed = i as f32 * 0.173;
            let w = policy.weights(speed);
            assert_eq!(w.history() + w.current(), 1.0, "speed {speed}");
            assert!(w.current() >= 0.08);
            assert!(w.history() <= 0.95);
        }
    }

    #[test]
    fn fast_motion_drops_history() {
        let policy = BlendPolicy::MotionAdaptive {
            max_history_weight: 0.9,
            velocity_scale: 0.5,
            base_blend: 0.1,
        };
        assert_eq!(policy.weights(10.0).current(), 1.0);
        assert!((policy.weights(0.0).history() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn apply_mixes_channels() {
        let w = BlendWeights::from_history(0.75);
        let out = w.apply([1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(out, [0.75, 0.25, 0.0, 0.75]);
    }
}
