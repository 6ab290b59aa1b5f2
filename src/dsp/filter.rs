//! # Filters
//!
//! Two filter designs live here:
//!
//! - [`OnePoleFilter`]: a 6 dB/octave lowpass. The damping engine runs its
//!   summed tail through one per channel to mimic high-frequency
//!   absorption in a room.
//! - [`StateVariableFilter`]: a 12 dB/octave TPT (topology-preserving
//!   transform) state-variable filter with low-pass and high-pass outputs.
//!   [`ToneShaper`] chains a high-pass and a low-pass stereo pair over the
//!   mixed wet signal.
//!
//! ## The One-Pole Equation
//!
//! ```text
//! y[n] = (1 - a) * x[n] + a * y[n-1]        a = e^(-2π * cutoff / sample_rate)
//! ```
//!
//! ## The TPT State-Variable Filter
//!
//! ```text
//! g  = tan(π * cutoff / sample_rate)
//! k  = 1 / Q
//! v1 = (ic1 + g * (x - ic2)) / (1 + g * (g + k))     band-pass
//! v2 = ic2 + g * v1                                  low-pass
//! hp = x - k * v1 - v2                               high-pass
//! ic1 = 2 * v1 - ic1,  ic2 = 2 * v2 - ic2
//! ```
//!
//! The trapezoidal integrators stay stable under fast cutoff changes,
//! which the simpler Chamberlin form does not.

use std::f32::consts::PI;

use super::smoothing::SmoothedValue;

/// A one-pole (6 dB/octave) lowpass filter.
pub struct OnePoleFilter {
    /// Range: 0.0 (no filtering) to ~0.999 (extreme filtering).
    coefficient: f32,

    /// The previous output sample, the filter's only state.
    prev_output: f32,
}

impl OnePoleFilter {
    /// Create a new filter initialized to passthrough (coefficient 0).
    pub fn new() -> Self {
        Self {
            coefficient: 0.0,
            prev_output: 0.0,
        }
    }

    /// Set the cutoff frequency.
    ///
    /// The cutoff is clamped to `[20 Hz, 0.49 * sample_rate]`.
    ///
    /// Example at 44100 Hz:
    /// - cutoff = 20000 Hz → coeff ≈ 0.06
    /// - cutoff = 1000 Hz  → coeff ≈ 0.87
    /// - cutoff = 100 Hz   → coeff ≈ 0.99
    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let safe_cutoff = cutoff_hz.clamp(20.0, sample_rate * 0.49);
        self.coefficient = (-2.0 * PI * safe_cutoff / sample_rate).exp();
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let output = (1.0 - self.coefficient) * input + self.coefficient * self.prev_output;
        self.prev_output = output;
        output
    }

    pub fn reset(&mut self) {
        self.prev_output = 0.0;
    }
}

impl Default for OnePoleFilter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────
// State-variable filter
// ─────────────────────────────────────────────────────────────────────

/// Which output of the state-variable filter is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
}

pub const MIN_RESONANCE: f32 = 0.1;
pub const MAX_RESONANCE: f32 = 10.0;
/// Butterworth Q: flat passband, no peak at the cutoff.
pub const DEFAULT_RESONANCE: f32 = std::f32::consts::FRAC_1_SQRT_2;

pub struct StateVariableFilter {
    filter_type: FilterType,
    sample_rate: f32,
    frequency: f32,
    resonance: f32,

    // Derived coefficients, refreshed only when a parameter changes.
    g: f32,
    k: f32,
    a1: f32,

    ic1eq: f32,
    ic2eq: f32,
}

impl StateVariableFilter {
    pub fn new(filter_type: FilterType, frequency: f32) -> Self {
        let mut filter = Self {
            filter_type,
            sample_rate: 44100.0,
            frequency,
            resonance: DEFAULT_RESONANCE,
            g: 0.0,
            k: 0.0,
            a1: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
        self.reset();
    }

    /// Both outputs come from the same integrator state, so switching type
    /// needs no coefficient update.
    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Clamped to `[10 Hz, 0.49 * sample_rate]` when coefficients are
    /// derived. Non-finite input is ignored.
    pub fn set_frequency(&mut self, frequency: f32) {
        if frequency.is_finite() && frequency != self.frequency {
            self.frequency = frequency;
            self.update_coefficients();
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_resonance(&mut self, q: f32) {
        if !q.is_finite() {
            return;
        }
        let q = q.clamp(MIN_RESONANCE, MAX_RESONANCE);
        if q != self.resonance {
            self.resonance = q;
            self.update_coefficients();
        }
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let v1 = (self.ic1eq + self.g * (input - self.ic2eq)) * self.a1;
        let v2 = self.ic2eq + self.g * v1;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.filter_type {
            FilterType::LowPass => v2,
            FilterType::HighPass => input - self.k * v1 - v2,
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    fn update_coefficients(&mut self) {
        let cutoff = self.frequency.clamp(10.0, self.sample_rate * 0.49);
        self.g = (PI * cutoff / self.sample_rate).tan();
        self.k = 1.0 / self.resonance;
        self.a1 = 1.0 / (1.0 + self.g * (self.g + self.k));
    }
}

/// A left/right pair of identical state-variable filters.
pub struct StereoFilter {
    left: StateVariableFilter,
    right: StateVariableFilter,
}

impl StereoFilter {
    pub fn new(filter_type: FilterType, frequency: f32) -> Self {
        Self {
            left: StateVariableFilter::new(filter_type, frequency),
            right: StateVariableFilter::new(filter_type, frequency),
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.left.prepare(sample_rate);
        self.right.prepare(sample_rate);
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.left.set_type(filter_type);
        self.right.set_type(filter_type);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.left.set_frequency(frequency);
        self.right.set_frequency(frequency);
    }

    pub fn set_resonance(&mut self, q: f32) {
        self.left.set_resonance(q);
        self.right.set_resonance(q);
    }

    pub fn frequency(&self) -> f32 {
        self.left.frequency()
    }

    pub fn process_stereo_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tone shaper
// ─────────────────────────────────────────────────────────────────────

/// Low-cut range. At the bottom of the range the high-pass stage is off.
pub const LOW_CUT_MIN_HZ: f32 = 20.0;
pub const LOW_CUT_MAX_HZ: f32 = 2000.0;
/// High-cut range. At the top of the range the low-pass stage is off.
pub const HIGH_CUT_MIN_HZ: f32 = 500.0;
pub const HIGH_CUT_MAX_HZ: f32 = 20000.0;

/// Ramp for a stage switching in or out at the end of its range.
const STAGE_RAMP_MS: f32 = 20.0;

/// High-pass then low-pass over the wet signal.
///
/// Both stages filter every sample, even while switched out, so their
/// state always follows the signal. Switching a stage in or out
/// crossfades between its input and its output.
pub struct ToneShaper {
    high_pass: StereoFilter,
    low_pass: StereoFilter,
    high_pass_enabled: bool,
    low_pass_enabled: bool,
    high_pass_mix: SmoothedValue,
    low_pass_mix: SmoothedValue,
}

impl ToneShaper {
    pub fn new() -> Self {
        Self {
            high_pass: StereoFilter::new(FilterType::HighPass, LOW_CUT_MIN_HZ),
            low_pass: StereoFilter::new(FilterType::LowPass, HIGH_CUT_MAX_HZ),
            high_pass_enabled: false,
            low_pass_enabled: false,
            high_pass_mix: SmoothedValue::new(STAGE_RAMP_MS, 0.0),
            low_pass_mix: SmoothedValue::new(STAGE_RAMP_MS, 0.0),
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.high_pass.prepare(sample_rate);
        self.low_pass.prepare(sample_rate);
        self.high_pass_mix.set_sample_rate(sample_rate);
        self.low_pass_mix.set_sample_rate(sample_rate);
    }

    /// Low-cut (high-pass) frequency, clamped to its range.
    pub fn set_low_cut(&mut self, frequency: f32) {
        let frequency = clamp_or(frequency, LOW_CUT_MIN_HZ, LOW_CUT_MAX_HZ, LOW_CUT_MIN_HZ);
        self.high_pass_enabled = frequency > LOW_CUT_MIN_HZ;
        self.high_pass_mix
            .set_target(if self.high_pass_enabled { 1.0 } else { 0.0 });
        self.high_pass.set_frequency(frequency);
    }

    /// High-cut (low-pass) frequency, clamped to its range.
    pub fn set_high_cut(&mut self, frequency: f32) {
        let frequency = clamp_or(frequency, HIGH_CUT_MIN_HZ, HIGH_CUT_MAX_HZ, HIGH_CUT_MAX_HZ);
        self.low_pass_enabled = frequency < HIGH_CUT_MAX_HZ;
        self.low_pass_mix
            .set_target(if self.low_pass_enabled { 1.0 } else { 0.0 });
        self.low_pass.set_frequency(frequency);
    }

    pub fn set_resonance(&mut self, q: f32) {
        self.high_pass.set_resonance(q);
        self.low_pass.set_resonance(q);
    }

    pub fn process_stereo_sample(&mut self, left: f32, right: f32) -> (f32, f32) {
        let high_passed = self.high_pass.process_stereo_sample(left, right);
        let (l, r) = blend((left, right), high_passed, self.high_pass_mix.next());
        let low_passed = self.low_pass.process_stereo_sample(l, r);
        blend((l, r), low_passed, self.low_pass_mix.next())
    }

    pub fn reset(&mut self) {
        self.high_pass.reset();
        self.low_pass.reset();
        self.high_pass_mix.reset(self.high_pass_mix.target());
        self.low_pass_mix.reset(self.low_pass_mix.target());
    }
}

/// `dry` at `amount == 0` exactly, `wet` at 1.
fn blend(dry: (f32, f32), wet: (f32, f32), amount: f32) -> (f32, f32) {
    if amount == 0.0 {
        return dry;
    }
    (
        dry.0 + amount * (wet.0 - dry.0),
        dry.1 + amount * (wet.1 - dry.1),
    )
}

impl Default for ToneShaper {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
