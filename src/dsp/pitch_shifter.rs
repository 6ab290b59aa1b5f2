//! # Pitch Shifter
//!
//! A granular, delay-based pitch shifter. Input goes into a short ring
//! buffer; output comes from two read taps whose delay slides
//! continuously, so the taps sweep through the stored audio faster or
//! slower than it was written:
//!
//! ```text
//! delay change per sample = 1 - factor
//!
//! factor 2.0 → delay shrinks by 1 sample per sample → taps read twice as
//!              fast as the writer → one octave up
//! factor 0.5 → delay grows by ½ sample per sample → taps read at half
//!              speed → one octave down
//! ```
//!
//! A sliding delay eventually hits the end of its grain window and has to
//! jump back. The two taps are half a window apart and each is weighted by
//! a raised-cosine window that is exactly zero at its own jump point:
//!
//! ```text
//! φ ∈ [0, 1) grain phase          tap A delay = φ · W      gain sin²(πφ)
//!                                  tap B delay = (φ+½) · W  gain cos²(πφ)
//! ```
//!
//! `sin² + cos² = 1`, so a steady signal keeps its level while the taps
//! trade places, and neither jump is ever heard.
//!
//! A factor of exactly 1.0 is a bypass: the input is still recorded (so a
//! later switch to another factor starts with real history), but the output
//! is the input sample itself.
//!
//! Changing the factor crossfades from the old read path to the new one
//! over [`FACTOR_CROSSFADE_SAMPLES`], so switching between the bypass and a
//! grain read (which sits about half a window in the past) never steps.

use std::f32::consts::PI;

use nih_plug::prelude::Enum;

use super::delay_line::{DelayLine, Interpolation};
use crate::engine::MAX_VOICES;

/// Grain buffer length in samples.
pub const PITCH_BUFFER_SAMPLES: usize = 4096;

/// Distance the taps travel before wrapping.
pub const GRAIN_WINDOW_SAMPLES: f32 = 2048.0;

/// Taps never read closer than this to the write head.
const MIN_TAP_DELAY: f32 = 2.0;

pub const MIN_SHIFT_FACTOR: f32 = 0.25;
pub const MAX_SHIFT_FACTOR: f32 = 4.0;

/// Length of the crossfade after a factor change.
pub const FACTOR_CROSSFADE_SAMPLES: u32 = 1024;

pub struct PitchShifter {
    buffer: DelayLine,
    shift_factor: f32,
    /// Grain phase in `[0, 1)`.
    phase: f32,

    /// The read path being faded out after a factor change.
    previous_factor: f32,
    previous_phase: f32,
    /// Samples left in the crossfade; the previous path's weight is
    /// `fade_left / FACTOR_CROSSFADE_SAMPLES`.
    fade_left: u32,
}

impl PitchShifter {
    pub fn new() -> Self {
        Self {
            buffer: DelayLine::new(PITCH_BUFFER_SAMPLES, Interpolation::Linear),
            shift_factor: 1.0,
            phase: 0.0,
            previous_factor: 1.0,
            previous_phase: 0.0,
            fade_left: 0,
        }
    }

    /// Pitch ratio: 2.0 is an octave up, 0.5 an octave down.
    ///
    /// Clamped to `[MIN_SHIFT_FACTOR, MAX_SHIFT_FACTOR]`; zero, negative or
    /// non-finite factors fall back to 1.0. Values within 1e-6 of 1.0 snap
    /// to 1.0 so the bypass engages.
    pub fn set_shift_factor(&mut self, factor: f32) {
        let factor = if factor.is_finite() && factor > 0.0 {
            factor.clamp(MIN_SHIFT_FACTOR, MAX_SHIFT_FACTOR)
        } else {
            1.0
        };
        let factor = if (factor - 1.0).abs() < 1e-6 { 1.0 } else { factor };
        if factor != self.shift_factor {
            // A change mid-fade drops whatever was still fading out.
            self.previous_factor = self.shift_factor;
            self.previous_phase = self.phase;
            self.fade_left = FACTOR_CROSSFADE_SAMPLES;
            self.shift_factor = factor;
        }
    }

    pub fn shift_factor(&self) -> f32 {
        self.shift_factor
    }

    pub fn process(&mut self, input: f32) -> f32 {
        self.buffer.write(input);

        let output = read_path(&self.buffer, self.shift_factor, &mut self.phase, input);
        if self.fade_left == 0 {
            return output;
        }

        let previous = read_path(
            &self.buffer,
            self.previous_factor,
            &mut self.previous_phase,
            input,
        );
        self.fade_left -= 1;
        let weight = self.fade_left as f32 / FACTOR_CROSSFADE_SAMPLES as f32;
        output + weight * (previous - output)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.phase = 0.0;
        self.previous_phase = 0.0;
        self.fade_left = 0;
    }
}

/// One sample of the two-tap grain read at `factor`, advancing `phase`.
/// Unity is the bypass and leaves `phase` alone.
fn read_path(buffer: &DelayLine, factor: f32, phase: &mut f32, input: f32) -> f32 {
    if factor == 1.0 {
        return input;
    }

    *phase += (1.0 - factor) / GRAIN_WINDOW_SAMPLES;
    *phase -= phase.floor();
    // `x - floor(x)` can round up to exactly 1.0 for tiny negatives.
    if *phase >= 1.0 {
        *phase = 0.0;
    }

    let phase_b = (*phase + 0.5).fract();
    let tap_a = buffer.read(MIN_TAP_DELAY + *phase * GRAIN_WINDOW_SAMPLES);
    let tap_b = buffer.read(MIN_TAP_DELAY + phase_b * GRAIN_WINDOW_SAMPLES);

    let gain_a = (PI * *phase).sin().powi(2);
    let gain_b = 1.0 - gain_a;

    tap_a * gain_a + tap_b * gain_b
}

impl Default for PitchShifter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────
// Per-voice shift patterns
// ─────────────────────────────────────────────────────────────────────

/// How shift factors are distributed across the voice bank.
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPattern {
    /// Every voice at its original pitch.
    #[name = "Off"]
    Off,
    /// Every fourth voice one octave up.
    #[name = "Every 4th Up"]
    OctaveUpEveryFourth,
    /// Odd voices one octave up.
    #[name = "Alternating Up"]
    Alternating,
    /// Unison, octave up, octave down, repeating.
    #[name = "Shimmer"]
    Shimmer,
    /// Odd voices one octave down.
    #[name = "Alternating Down"]
    OctaveDown,
}

impl ShiftPattern {
    /// Shift factor for the voice at `voice_index`.
    pub fn factor_for(self, voice_index: usize) -> f32 {
        match self {
            ShiftPattern::Off => 1.0,
            ShiftPattern::OctaveUpEveryFourth => {
                if voice_index % 4 == 3 {
                    2.0
                } else {
                    1.0
                }
            }
            ShiftPattern::Alternating => {
                if voice_index % 2 == 1 {
                    2.0
                } else {
                    1.0
                }
            }
            ShiftPattern::Shimmer => match voice_index % 3 {
                0 => 1.0,
                1 => 2.0,
                _ => 0.5,
            },
            ShiftPattern::OctaveDown => {
                if voice_index % 2 == 1 {
                    0.5
                } else {
                    1.0
                }
            }
        }
    }

    /// Factors for the whole voice bank.
    pub fn factors(self) -> [f32; MAX_VOICES] {
        std::array::from_fn(|i| self.factor_for(i))
    }
}
