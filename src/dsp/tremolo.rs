//! # Band Tremolo
//!
//! Amplitude modulation of the wet signal, split into two bands so the
//! lows and highs pulse out of step:
//!
//! ```text
//!         ┌─► [biquad LP 1.2 kHz] ──┬──────────► × gain(φ)       ─┐
//! in ─────┤                         ▼                             (+) ─► out
//!         └────────────────────► (in - low) ─► × gain(φ + ¼)   ─┘
//!
//! gain(φ) = 1 - depth · (1 - (½·sin(2πφ) + ½))
//! ```
//!
//! The high band is whatever the low-pass leaves behind, so the two bands
//! always sum back to the input and equal gains give a flat response.
//!
//! The sine comes from a 1024-point lookup table. At depth 0 the input is
//! returned untouched (bit-transparent), but the crossover keeps filtering
//! so raising the depth starts from current state.

use std::f32::consts::{FRAC_1_SQRT_2, TAU};

pub const CROSSOVER_HZ: f32 = 1200.0;

pub const MIN_RATE_HZ: f32 = 0.05;
pub const MAX_RATE_HZ: f32 = 20.0;

const TABLE_SIZE: usize = 1024;
/// Phase lead of the high band, in table entries.
const HIGH_BAND_OFFSET: usize = TABLE_SIZE / 4;

/// RBJ cookbook low-pass biquad, direct form I.
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn set_params(&mut self, freq: f32, q: f32, sample_rate: f32) {
        let w0 = TAU * (freq / sample_rate).min(0.49);
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha;

        self.b0 = ((1.0 - cos_w0) / 2.0) / a0;
        self.b1 = (1.0 - cos_w0) / a0;
        self.b2 = self.b0;
        self.a1 = (-2.0 * cos_w0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Complementary two-band split: `low + high == input` for every sample.
struct Crossover {
    low: Biquad,
}

impl Crossover {
    fn new() -> Self {
        Self { low: Biquad::new() }
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.low.set_params(CROSSOVER_HZ, FRAC_1_SQRT_2, sample_rate);
    }

    /// Returns `(low, high)`.
    fn split(&mut self, input: f32) -> (f32, f32) {
        let low = self.low.process(input);
        (low, input - low)
    }

    fn process(&mut self, input: f32, low_gain: f32, high_gain: f32) -> f32 {
        let (low, high) = self.split(input);
        low * low_gain + high * high_gain
    }

    fn reset(&mut self) {
        self.low.reset();
    }
}

pub struct Tremolo {
    sample_rate: f32,
    rate: f32,
    depth: f32,

    table: [f32; TABLE_SIZE],
    /// Read position in table entries.
    phase: f32,
    increment: f32,

    left: Crossover,
    right: Crossover,
}

impl Tremolo {
    pub fn new() -> Self {
        let mut tremolo = Self {
            sample_rate: 44100.0,
            rate: 2.0,
            depth: 0.0,
            table: std::array::from_fn(|i| (TAU * i as f32 / TABLE_SIZE as f32).sin()),
            phase: 0.0,
            increment: 0.0,
            left: Crossover::new(),
            right: Crossover::new(),
        };
        tremolo.prepare(44100.0);
        tremolo
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.left.prepare(sample_rate);
        self.right.prepare(sample_rate);
        self.update_increment();
        self.reset();
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.left.reset();
        self.right.reset();
    }

    /// Modulation rate in Hz, clamped to `[MIN_RATE_HZ, MAX_RATE_HZ]`.
    pub fn set_rate(&mut self, rate_hz: f32) {
        if !rate_hz.is_finite() {
            return;
        }
        self.rate = rate_hz.clamp(MIN_RATE_HZ, MAX_RATE_HZ);
        self.update_increment();
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Modulation depth in `[0, 1]`. Zero bypasses the stage.
    pub fn set_depth(&mut self, depth: f32) {
        let depth = if depth.is_finite() { depth } else { 0.0 };
        self.depth = depth.clamp(0.0, 1.0);
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.depth == 0.0 {
            self.left.split(left);
            self.right.split(right);
            return (left, right);
        }

        let index = self.phase as usize % TABLE_SIZE;
        let low_gain = self.band_gain(self.table[index]);
        let high_gain = self.band_gain(self.table[(index + HIGH_BAND_OFFSET) % TABLE_SIZE]);

        self.phase += self.increment;
        if self.phase >= TABLE_SIZE as f32 {
            self.phase -= TABLE_SIZE as f32;
        }

        (
            self.left.process(left, low_gain, high_gain),
            self.right.process(right, low_gain, high_gain),
        )
    }

    fn band_gain(&self, sine: f32) -> f32 {
        let lfo = sine * 0.5 + 0.5;
        1.0 - self.depth * (1.0 - lfo)
    }

    fn update_increment(&mut self) {
        self.increment = TABLE_SIZE as f32 * self.rate / self.sample_rate;
    }
}

impl Default for Tremolo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn tremolo(rate: f32, depth: f32) -> Tremolo {
        let mut tremolo = Tremolo::new();
        tremolo.prepare(SAMPLE_RATE);
        tremolo.set_rate(rate);
        tremolo.set_depth(depth);
        tremolo
    }

    #[test]
    fn zero_depth_is_transparent() {
        let mut tremolo = tremolo(5.0, 0.0);
        for n in 0..2000 {
            let x = (n as f32 * 0.03).sin();
            assert_eq!(tremolo.process(x, 0.5 * x), (x, 0.5 * x));
        }
    }

    fn settled_peak(tremolo: &mut Tremolo, freq: f32) -> f32 {
        let mut peak = 0.0_f32;
        for n in 0..SAMPLE_RATE as usize {
            let x = (TAU * freq * n as f32 / SAMPLE_RATE).sin();
            let (l, _) = tremolo.process(x, x);
            if n > 4410 {
                peak = peak.max(l.abs());
            }
        }
        peak
    }

    #[test]
    fn shallow_depth_is_flat_across_the_crossover() {
        // -0.5 dB .. +0.5 dB
        for freq in [200.0, CROSSOVER_HZ, 5000.0] {
            let mut tremolo = tremolo(2.0, 0.01);
            let peak = settled_peak(&mut tremolo, freq);
            assert!(peak > 0.944 && peak < 1.06, "{freq} Hz peaked at {peak}");
        }
    }

    #[test]
    fn crossover_keeps_running_while_bypassed() {
        let mut running = tremolo(2.0, 0.0);
        let mut fresh = tremolo(2.0, 0.0);
        for _ in 0..2000 {
            running.process(1.0, 1.0);
        }
        running.set_depth(0.5);
        fresh.set_depth(0.5);
        fresh.left.low.y1 = 1.0;
        fresh.left.low.y2 = 1.0;
        fresh.left.low.x1 = 1.0;
        fresh.left.low.x2 = 1.0;

        // A crossover that tracked the input during bypass already holds the
        // settled DC state, so it matches one seeded with that state.
        let (l, _) = running.process(1.0, 1.0);
        let (expected, _) = fresh.process(1.0, 1.0);
        assert!((l - expected).abs() < 1e-4, "{l} vs {expected}");
    }

    #[test]
    fn full_depth_swings_low_band_from_silence_to_unity() {
        let mut tremolo = tremolo(2.0, 1.0);
        // Let the crossover settle on DC, which lives in the low band.
        for _ in 0..2000 {
            tremolo.process(1.0, 1.0);
        }
        let (mut min, mut max) = (f32::MAX, f32::MIN);
        for _ in 0..SAMPLE_RATE as usize {
            let (l, r) = tremolo.process(1.0, 1.0);
            assert_eq!(l, r);
            min = min.min(l);
            max = max.max(l);
        }
        assert!(min < 0.05, "trough {min}");
        assert!(max > 0.95 && max < 1.05, "peak {max}");
    }

    #[test]
    fn bands_are_out_of_step() {
        let tremolo = tremolo(1.0, 1.0);
        let low = tremolo.band_gain(tremolo.table[0]);
        let high = tremolo.band_gain(tremolo.table[HIGH_BAND_OFFSET]);
        assert!((low - 0.5).abs() < 1e-6);
        assert!((high - 1.0).abs() < 1e-6);
    }

    #[test]
    fn setters_clamp() {
        let mut tremolo = Tremolo::new();
        tremolo.set_rate(100.0);
        assert_eq!(tremolo.rate(), MAX_RATE_HZ);
        tremolo.set_rate(0.0);
        assert_eq!(tremolo.rate(), MIN_RATE_HZ);
        tremolo.set_rate(f32::NAN);
        assert_eq!(tremolo.rate(), MIN_RATE_HZ);
        tremolo.set_depth(3.0);
        assert_eq!(tremolo.depth(), 1.0);
        tremolo.set_depth(-1.0);
        assert_eq!(tremolo.depth(), 0.0);
    }

    #[test]
    fn reset_restarts_the_cycle() {
        let mut tremolo = tremolo(3.0, 0.7);
        let first: Vec<(f32, f32)> = (0..500).map(|n| tremolo.process(n as f32 * 1e-3, 0.0)).collect();
        tremolo.reset();
        let second: Vec<(f32, f32)> = (0..500).map(|n| tremolo.process(n as f32 * 1e-3, 0.0)).collect();
        assert_eq!(first, second);
    }
}
