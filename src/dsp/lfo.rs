//! # Modulation Oscillator
//!
//! Each voice wobbles its delay time with a low-frequency oscillator. The
//! oscillator returns a time offset in **seconds** that the engine adds to
//! the voice's base delay, so a depth of 2 ms sweeps the read head ±2 ms.
//!
//! Two shapes are available:
//!
//! - **Sine**: `depth * sin(phase)`, with `phase` advancing by
//!   `2π * rate / sample_rate` per sample. Changing the rate changes the
//!   increment, never the phase, so the output stays continuous.
//! - **Chaotic**: a logistic map `x ← r·x·(1−x)` iterated once per sample.
//!   Four times per cycle the current map value is latched as the next
//!   glide target and the output slides linearly toward it, so the delay
//!   time wanders without stepping. Once per cycle `r` is redrawn from
//!   `[3.7, 4.0)`, the chaotic region of the map, using a seeded RNG.
//!
//! Depth changes ramp over 50 ms. Switching shape picks up from the last
//! output value: a switch to Chaotic glides away from it, and a switch to
//! Sine resumes at the phase whose sine equals it.
//!
//! Given the same seed and settings, both shapes produce identical output
//! on every run.

use std::f32::consts::TAU;

use nih_plug::prelude::Enum;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::smoothing::SmoothedValue;

#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoShape {
    #[name = "Sine"]
    Sine,
    #[name = "Chaotic"]
    Chaotic,
}

/// Musically spaced modulation rates, picked per voice by index.
pub const PRESET_RATES_HZ: [f32; 8] = [0.13, 0.21, 0.34, 0.55, 0.89, 1.44, 2.33, 3.77];

/// Rate used when a preset index is out of range.
pub const FALLBACK_RATE_HZ: f32 = 0.5;

pub const MIN_RATE_HZ: f32 = 0.01;
pub const MAX_DEPTH_MS: f32 = 50.0;

const DEPTH_RAMP_MS: f32 = 50.0;

/// Glide segments per chaotic cycle.
const CHAOS_STEPS_PER_CYCLE: u32 = 4;
const CHAOS_R_MIN: f32 = 3.7;
const CHAOS_R_MAX: f32 = 4.0;
const CHAOS_X_START: f32 = 0.5;

/// The preset rate for `index`, or [`FALLBACK_RATE_HZ`] if there is none.
pub fn preset_rate(index: usize) -> f32 {
    PRESET_RATES_HZ
        .get(index)
        .copied()
        .unwrap_or(FALLBACK_RATE_HZ)
}

pub struct Lfo {
    shape: LfoShape,
    sample_rate: f32,
    rate: f32,
    /// Peak offset in seconds.
    depth: SmoothedValue,
    /// Last output before depth scaling, in `[-1, 1]`.
    last_unit: f32,

    phase: f32,
    phase_offset: f32,
    phase_increment: f32,

    x: f32,
    r: f32,
    step_len: u32,
    step_pos: u32,
    steps_taken: u32,
    glide_from: f32,
    glide_to: f32,
    seed: u64,
    rng: SmallRng,
}

impl Lfo {
    pub fn new() -> Self {
        let mut lfo = Self {
            shape: LfoShape::Sine,
            sample_rate: 44100.0,
            rate: FALLBACK_RATE_HZ,
            depth: SmoothedValue::new(DEPTH_RAMP_MS, 0.0),
            last_unit: 0.0,
            phase: 0.0,
            phase_offset: 0.0,
            phase_increment: 0.0,
            x: CHAOS_X_START,
            r: CHAOS_R_MIN,
            step_len: 1,
            step_pos: 0,
            steps_taken: 0,
            glide_from: 0.0,
            glide_to: 0.0,
            seed: 0,
            rng: SmallRng::seed_from_u64(0),
        };
        lfo.update_increments();
        lfo.reset();
        lfo
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.depth.set_sample_rate(sample_rate);
        self.update_increments();
        self.reset();
    }

    /// Return to the initial phase and map state, re-seeding the RNG. The
    /// depth jumps to its target.
    pub fn reset(&mut self) {
        self.depth.reset(self.depth.target());
        self.last_unit = 0.0;
        self.phase = self.phase_offset;
        self.x = CHAOS_X_START;
        self.rng = SmallRng::seed_from_u64(self.seed);
        self.r = self.rng.random_range(CHAOS_R_MIN..CHAOS_R_MAX);
        self.step_pos = 0;
        self.steps_taken = 0;
        self.glide_from = 0.0;
        self.glide_to = 0.0;
    }

    /// Rate in Hz, at least [`MIN_RATE_HZ`]. Non-finite input is ignored.
    pub fn set_rate(&mut self, rate_hz: f32) {
        if !rate_hz.is_finite() {
            return;
        }
        let rate = rate_hz.max(MIN_RATE_HZ);
        if rate != self.rate {
            self.rate = rate;
            self.update_increments();
        }
    }

    /// Use the preset rate at `index`, falling back to
    /// [`FALLBACK_RATE_HZ`].
    pub fn set_preset_rate(&mut self, index: usize) {
        self.set_rate(preset_rate(index));
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Peak offset in milliseconds, clamped to `[0, MAX_DEPTH_MS]`.
    pub fn set_depth_ms(&mut self, depth_ms: f32) {
        let depth_ms = if depth_ms.is_finite() { depth_ms } else { 0.0 };
        self.depth
            .set_target(depth_ms.clamp(0.0, MAX_DEPTH_MS) / 1000.0);
    }

    /// Target peak offset in seconds.
    pub fn depth(&self) -> f32 {
        self.depth.target()
    }

    pub fn set_shape(&mut self, shape: LfoShape) {
        if shape == self.shape {
            return;
        }
        self.shape = shape;
        match shape {
            LfoShape::Sine => {
                self.phase = self.last_unit.clamp(-1.0, 1.0).asin().rem_euclid(TAU);
            }
            LfoShape::Chaotic => {
                self.glide_to = self.last_unit;
                self.step_pos = 0;
            }
        }
    }

    /// Seed for the chaotic shape's `r` redraws. Takes effect on the next
    /// [`reset()`](Self::reset).
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Starting phase as a fraction of a cycle, applied on reset.
    pub fn set_phase_offset(&mut self, fraction: f32) {
        self.phase_offset = fraction.rem_euclid(1.0) * TAU;
    }

    /// Advance one sample. Returns an offset in `[-depth, depth]` seconds.
    pub fn next_sample(&mut self) -> f32 {
        self.last_unit = match self.shape {
            LfoShape::Sine => {
                let value = self.phase.sin();
                self.phase += self.phase_increment;
                if self.phase >= TAU {
                    self.phase -= TAU;
                }
                value
            }
            LfoShape::Chaotic => self.next_chaotic(),
        };
        self.last_unit * self.depth.next()
    }

    fn next_chaotic(&mut self) -> f32 {
        self.x = self.r * self.x * (1.0 - self.x);
        // 0 and 1 are fixed points the map never leaves.
        if !(self.x > 1e-6 && self.x < 1.0 - 1e-6) {
            self.x = CHAOS_X_START;
        }

        if self.step_pos == 0 {
            self.glide_from = self.glide_to;
            self.glide_to = 2.0 * self.x - 1.0;
            self.steps_taken += 1;
            if self.steps_taken >= CHAOS_STEPS_PER_CYCLE {
                self.steps_taken = 0;
                self.r = self.rng.random_range(CHAOS_R_MIN..CHAOS_R_MAX);
            }
        }

        self.step_pos += 1;
        let t = self.step_pos as f32 / self.step_len as f32;
        if self.step_pos >= self.step_len {
            self.step_pos = 0;
        }

        self.glide_from + (self.glide_to - self.glide_from) * t
    }

    fn update_increments(&mut self) {
        self.phase_increment = TAU * self.rate / self.sample_rate;
        let samples_per_cycle = self.sample_rate / self.rate;
        self.step_len = ((samples_per_cycle / CHAOS_STEPS_PER_CYCLE as f32) as u32).max(1);
        if self.step_pos >= self.step_len {
            self.step_pos = 0;
        }
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn lfo(shape: LfoShape, rate: f32, depth_ms: f32) -> Lfo {
        let mut lfo = Lfo::new();
        lfo.prepare(48000.0);
        lfo.set_shape(shape);
        lfo.set_rate(rate);
        lfo.set_depth_ms(depth_ms);
        lfo.reset();
        lfo
    }

    fn max_step(lfo: &mut Lfo, previous: &mut f32, samples: usize) -> f32 {
        let mut step = 0.0_f32;
        for _ in 0..samples {
            let v = lfo.next_sample();
            step = step.max((v - *previous).abs());
            *previous = v;
        }
        step
    }

    #[test]
    fn sine_stays_within_depth_and_reaches_peaks() {
        let mut lfo = lfo(LfoShape::Sine, 2.0, 5.0);
        let (mut min, mut max) = (f32::MAX, f32::MIN);
        for _ in 0..48000 {
            let v = lfo.next_sample();
            min = min.min(v);
            max = max.max(v);
        }
        assert!(max <= 0.005 + 1e-7 && min >= -0.005 - 1e-7);
        assert!(max > 0.0049 && min < -0.0049, "peaks {min}..{max}");
    }

    #[test]
    fn sine_period_matches_rate() {
        let mut lfo = lfo(LfoShape::Sine, 100.0, 10.0);
        let first = lfo.next_sample();
        for _ in 0..(480 - 1) {
            lfo.next_sample();
        }
        // 480 samples is exactly one cycle at 100 Hz / 48 kHz.
        assert_abs_diff_eq!(lfo.next_sample(), first, epsilon = 1e-5);
    }

    #[test]
    fn rate_change_keeps_phase_continuous() {
        let mut lfo = lfo(LfoShape::Sine, 1.0, 10.0);
        let mut previous = 0.0;
        for _ in 0..1000 {
            previous = lfo.next_sample();
        }
        lfo.set_rate(3.77);
        let next = lfo.next_sample();
        let max_step = 0.010 * TAU * 3.77 / 48000.0;
        assert!((next - previous).abs() <= max_step * 1.5);
    }

    #[test]
    fn chaotic_is_bounded_and_continuous() {
        let mut lfo = lfo(LfoShape::Chaotic, 5.0, 8.0);
        let depth = 0.008;
        let step_len = (48000.0 / 5.0 / 4.0) as f32;
        let mut previous = 0.0;
        let mut spread = 0.0_f32;
        for _ in 0..96000 {
            let v = lfo.next_sample();
            assert!(v.abs() <= depth + 1e-7, "out of range: {v}");
            assert!((v - previous).abs() <= 2.0 * depth / step_len + 1e-6);
            spread = spread.max(v.abs());
            previous = v;
        }
        assert!(spread > depth * 0.5, "chaotic output barely moved: {spread}");
    }

    #[test]
    fn chaotic_is_reproducible_for_a_seed() {
        let mut a = lfo(LfoShape::Chaotic, 3.0, 4.0);
        let mut b = lfo(LfoShape::Chaotic, 3.0, 4.0);
        a.set_seed(42);
        b.set_seed(42);
        a.reset();
        b.reset();
        for _ in 0..20000 {
            assert_eq!(a.next_sample(), b.next_sample());
        }

        a.reset();
        let replay: Vec<f32> = (0..100).map(|_| a.next_sample()).collect();
        b.reset();
        let again: Vec<f32> = (0..100).map(|_| b.next_sample()).collect();
        assert_eq!(replay, again);
    }

    #[test]
    fn preset_rates_fall_back_out_of_range() {
        assert_eq!(preset_rate(0), PRESET_RATES_HZ[0]);
        assert_eq!(preset_rate(7), PRESET_RATES_HZ[7]);
        assert_eq!(preset_rate(8), FALLBACK_RATE_HZ);
        assert_eq!(preset_rate(usize::MAX), FALLBACK_RATE_HZ);

        let mut lfo = Lfo::new();
        lfo.set_preset_rate(99);
        assert_eq!(lfo.rate(), FALLBACK_RATE_HZ);
    }

    #[test]
    fn setters_clamp_invalid_values() {
        let mut lfo = Lfo::new();
        lfo.set_depth_ms(1000.0);
        assert_abs_diff_eq!(lfo.depth(), MAX_DEPTH_MS / 1000.0);
        lfo.set_depth_ms(-3.0);
        assert_eq!(lfo.depth(), 0.0);
        lfo.set_depth_ms(f32::NAN);
        assert_eq!(lfo.depth(), 0.0);

        lfo.set_rate(0.0);
        assert_eq!(lfo.rate(), MIN_RATE_HZ);
        lfo.set_rate(f32::INFINITY);
        assert_eq!(lfo.rate(), MIN_RATE_HZ);
    }

    #[test]
    fn shape_switch_picks_up_from_the_last_value() {
        let mut lfo = lfo(LfoShape::Sine, 2.0, 10.0);
        let depth = 0.010;
        let sine_step = depth * TAU * 2.0 / 48000.0;
        let glide_step = 2.0 * depth / (48000.0 / 2.0 / 4.0);

        let mut previous = 0.0;
        max_step(&mut lfo, &mut previous, 5000);

        lfo.set_shape(LfoShape::Chaotic);
        let to_chaotic = max_step(&mut lfo, &mut previous, 4000);
        assert!(to_chaotic <= glide_step + 1e-7, "step {to_chaotic} into chaotic");

        lfo.set_shape(LfoShape::Sine);
        let to_sine = max_step(&mut lfo, &mut previous, 4000);
        assert!(to_sine <= sine_step * 1.01 + 1e-7, "step {to_sine} into sine");
    }

    #[test]
    fn depth_change_ramps_instead_of_jumping() {
        let mut lfo = lfo(LfoShape::Sine, 2.0, 0.0);
        let mut previous = 0.0;
        max_step(&mut lfo, &mut previous, 6000);

        lfo.set_depth_ms(20.0);
        // 20 ms spread over a 50 ms ramp, plus the sine's own motion.
        let ramp_step = 0.020 / (0.050 * 48000.0);
        let sine_step = 0.020 * TAU * 2.0 / 48000.0;
        let step = max_step(&mut lfo, &mut previous, 4800);
        assert!(step <= ramp_step + sine_step + 1e-6, "step {step}");

        let (mut min, mut max) = (f32::MAX, f32::MIN);
        for _ in 0..48000 {
            let v = lfo.next_sample();
            min = min.min(v);
            max = max.max(v);
        }
        assert!(max > 0.0199 && min < -0.0199, "peaks {min}..{max}");
    }

    #[test]
    fn zero_depth_is_silent() {
        let mut lfo = lfo(LfoShape::Chaotic, 1.0, 0.0);
        for _ in 0..1000 {
            assert_eq!(lfo.next_sample(), 0.0);
        }
    }
}
