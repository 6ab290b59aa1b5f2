//! # Stereo Field Placer
//!
//! Places each voice (and each reflection tap of the damping engine)
//! somewhere between hard left (−1) and hard right (+1) using an
//! equal-power pan law:
//!
//! ```text
//! angle = (p + 1) · π/4          p ∈ [-1, 1]
//! left  = cos(angle)
//! right = sin(angle)             left² + right² = 1
//! ```
//!
//! At the center both gains are `1/√2` (−3 dB), so a voice keeps the same
//! perceived loudness wherever it sits.
//!
//! Positions are assigned deterministically from the voice index. A small
//! seeded jitter can be layered on top for a less regular image; with the
//! same seed the jitter is the same on every run.

use std::f32::consts::FRAC_PI_4;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::smoothing::SmoothedValue;
use crate::engine::MAX_VOICES;

/// How long a position change takes to glide.
pub const PAN_RAMP_MS: f32 = 50.0;

/// Largest jitter amount accepted by [`jitter_table`].
pub const MAX_JITTER: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanLayout {
    /// Evenly from hard left to hard right.
    Linear,
    /// First voice centered, the rest fanned out alternately left and
    /// right, each pair wider than the last.
    CenterFirst,
}

/// Position of voice `voice_index` out of `total_voices`.
///
/// A single voice sits in the center. Indices past the end are treated as
/// the last voice.
pub fn assign_position(voice_index: usize, total_voices: usize, layout: PanLayout) -> f32 {
    if total_voices <= 1 {
        return 0.0;
    }
    let index = voice_index.min(total_voices - 1);

    match layout {
        PanLayout::Linear => -1.0 + 2.0 * index as f32 / (total_voices - 1) as f32,
        PanLayout::CenterFirst => {
            if index == 0 {
                return 0.0;
            }
            let widest = (total_voices - 1).div_ceil(2).max(1);
            let magnitude = index.div_ceil(2) as f32 / widest as f32;
            if index % 2 == 1 {
                -magnitude
            } else {
                magnitude
            }
        }
    }
}

/// Equal-power gains `(left, right)` for position `p`, clamped to
/// `[-1, 1]`.
pub fn pan_gains(position: f32) -> (f32, f32) {
    let p = if position.is_nan() {
        0.0
    } else {
        position.clamp(-1.0, 1.0)
    };
    let angle = (p + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Per-voice position offsets in `[-amount, amount]`, reproducible for a
/// given `seed`. `amount` is clamped to `[0, MAX_JITTER]`; zero gives an
/// all-zero table.
pub fn jitter_table(seed: u64, amount: f32) -> [f32; MAX_VOICES] {
    let amount = if amount.is_finite() {
        amount.clamp(0.0, MAX_JITTER)
    } else {
        0.0
    };
    if amount == 0.0 {
        return [0.0; MAX_VOICES];
    }

    let mut rng = SmallRng::seed_from_u64(seed);
    std::array::from_fn(|_| rng.random_range(-amount..=amount))
}

/// A smoothed pan position for one signal path.
pub struct StereoField {
    position: SmoothedValue,
}

impl StereoField {
    pub fn new() -> Self {
        Self {
            position: SmoothedValue::new(PAN_RAMP_MS, 0.0),
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.position.set_sample_rate(sample_rate);
        self.reset();
    }

    /// Back to the center, with no ramp.
    pub fn reset(&mut self) {
        self.position.reset(0.0);
    }

    /// Glide toward `position`, clamped to `[-1, 1]`.
    pub fn set_position(&mut self, position: f32) {
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(-1.0, 1.0)
        };
        self.position.set_target(position);
    }

    /// Jump to `position` with no ramp.
    pub fn snap_to(&mut self, position: f32) {
        self.position.reset(position.clamp(-1.0, 1.0));
    }

    pub fn target(&self) -> f32 {
        self.position.target()
    }

    /// Advance the glide one sample and return `(left, right)` gains.
    pub fn next_gains(&mut self) -> (f32, f32) {
        pan_gains(self.position.next())
    }

    /// Advance one sample and pan a mono sample.
    pub fn process(&mut self, sample: f32) -> (f32, f32) {
        let (left, right) = self.next_gains();
        (sample * left, sample * right)
    }
}

impl Default for StereoField {
    fn default() -> Self {
        Self::new()
    }
}
