//! # Damping / Reflection Engine
//!
//! Layers a decaying, reverberant tail over the discrete delay voices. One
//! control, *damp*, sets how much of the tail is heard and how long and
//! dark it is.
//!
//! ## Signal Flow
//!
//! ```text
//! in ──┬──────────────────────────────────────────── × (1 - damp) ──┐
//!      │                                                            │
//!      └─► [stereo tap buffer] ─► echo taps ──────┐                 │
//!                               └► reflection taps ┴► × mod ─► [LP] ─► × damp ─► (+) ─► out
//! ```
//!
//! - **Echo taps** (up to [`MAX_ECHOES`]) are spread non-linearly over
//!   [`ECHO_SPAN_SECONDS`]; later taps are quieter. More damp activates
//!   more taps.
//! - **Reflection taps** ([`MIN_REFLECTIONS`]..=[`MAX_REFLECTIONS`],
//!   count set by room size) start after a short pre-delay, are spaced
//!   exponentially, decay as `gain · exp(-k · time / decay_time)`, and
//!   alternate across the stereo field.
//! - All taps share one slow modulation factor read from a precomputed
//!   sine table, which keeps the tail from sounding static.
//! - A one-pole lowpass per channel darkens the tail, more so at high
//!   damp.
//!
//! ## Two Update Rates
//!
//! Tap tables are regenerated on a *slow* path: only when the smoothed
//! damp value has moved more than [`REGENERATE_THRESHOLD`] since the last
//! regeneration, or the room size has. Gain normalisation happens there
//! too, so the *fast* per-sample path is just reads, multiplies and adds.
//! The summed gain of all active taps never exceeds [`GAIN_CEILING`].
//!
//! Below [`BYPASS_THRESHOLD`] the tap loop is skipped entirely. The input
//! is still recorded, so the tail has history when damp comes back up.

use std::f32::consts::TAU;

use super::delay_line::{DelayLine, Interpolation};
use super::filter::OnePoleFilter;
use super::smoothing::SmoothedValue;
use super::stereo_field::{assign_position, pan_gains, PanLayout};

pub const MAX_ECHOES: usize = 10;
pub const MAX_REFLECTIONS: usize = 12;
pub const MIN_REFLECTIONS: usize = 4;

/// Upper bound on the summed gain of all active taps.
pub const GAIN_CEILING: f32 = 1.0;

pub const ECHO_SPAN_SECONDS: f32 = 0.25;
pub const BUFFER_SECONDS: f32 = 0.3;

pub const REGENERATE_THRESHOLD: f32 = 0.01;
pub const BYPASS_THRESHOLD: f32 = 0.001;

const DAMP_RAMP_MS: f32 = 100.0;

const ECHO_BASE_GAIN: f32 = 0.7;

const REFLECTION_PRE_DELAY_SECONDS: f32 = 0.012;
const REFLECTION_SPAN_SECONDS: f32 = 0.18;
/// Curvature of the exponential reflection spacing.
const REFLECTION_SPACING: f32 = 2.5;
const REFLECTION_BASE_GAIN: f32 = 0.8;
const REFLECTION_DECAY_K: f32 = 3.0;

const ABSORPTION_OPEN_HZ: f32 = 12000.0;
const ABSORPTION_CLOSED_HZ: f32 = 1500.0;

const MOD_TABLE_SIZE: usize = 512;
const MOD_RATE_HZ: f32 = 0.37;
const MOD_AMOUNT: f32 = 0.15;

/// One read point into the tap buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tap {
    /// Whole samples behind the write head.
    pub delay: f32,
    pub gain: f32,
    pub left: f32,
    pub right: f32,
}

pub struct DampingEngine {
    sample_rate: f32,

    left_line: DelayLine,
    right_line: DelayLine,

    damp: SmoothedValue,
    room_size: f32,
    regenerated_damp: f32,
    regenerated_room: f32,

    echoes: [Tap; MAX_ECHOES],
    active_echoes: usize,
    reflections: [Tap; MAX_REFLECTIONS],
    active_reflections: usize,

    mod_table: [f32; MOD_TABLE_SIZE],
    mod_phase: f32,
    mod_increment: f32,

    absorb_left: OnePoleFilter,
    absorb_right: OnePoleFilter,
}

impl DampingEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            sample_rate: 44100.0,
            left_line: DelayLine::new(4, Interpolation::Linear),
            right_line: DelayLine::new(4, Interpolation::Linear),
            damp: SmoothedValue::new(DAMP_RAMP_MS, 0.0),
            room_size: 0.5,
            regenerated_damp: 0.0,
            regenerated_room: 0.5,
            echoes: [Tap::default(); MAX_ECHOES],
            active_echoes: 0,
            reflections: [Tap::default(); MAX_REFLECTIONS],
            active_reflections: 0,
            mod_table: std::array::from_fn(|i| (TAU * i as f32 / MOD_TABLE_SIZE as f32).sin()),
            mod_phase: 0.0,
            mod_increment: 0.0,
            absorb_left: OnePoleFilter::new(),
            absorb_right: OnePoleFilter::new(),
        };
        engine.prepare(44100.0);
        engine
    }

    /// Size the tap buffer for `sample_rate` and rebuild the tap tables.
    /// Allocates.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let capacity = (BUFFER_SECONDS * sample_rate) as usize + 1;
        self.left_line.configure(capacity);
        self.right_line.configure(capacity);
        self.damp.set_sample_rate(sample_rate);
        self.mod_increment = MOD_TABLE_SIZE as f32 * MOD_RATE_HZ / sample_rate;
        self.reset();
    }

    /// Silence the buffer, settle damp on its target, rebuild the taps.
    pub fn reset(&mut self) {
        self.left_line.clear();
        self.right_line.clear();
        self.absorb_left.reset();
        self.absorb_right.reset();
        self.mod_phase = 0.0;
        let damp = self.damp.target();
        self.damp.reset(damp);
        self.update_parameters(damp);
    }

    /// Damp amount in `[0, 1]`; ramps over 100 ms.
    pub fn set_damp(&mut self, amount: f32) {
        let amount = if amount.is_finite() { amount } else { 0.0 };
        self.damp.set_target(amount.clamp(0.0, 1.0));
    }

    /// Room size in `[0, 1]`. Regenerates the taps once it has moved more
    /// than [`REGENERATE_THRESHOLD`].
    pub fn set_room_size(&mut self, size: f32) {
        let size = if size.is_finite() { size } else { 0.5 };
        self.room_size = size.clamp(0.0, 1.0);
        if (self.room_size - self.regenerated_room).abs() > REGENERATE_THRESHOLD {
            self.update_parameters(self.damp.current());
        }
    }

    /// Rebuild echo and reflection tables for `damp` and the current room
    /// size.
    pub fn update_parameters(&mut self, damp: f32) {
        let max_delay = self.left_line.max_delay();
        let to_samples = |seconds: f32| (seconds * self.sample_rate).round().clamp(1.0, max_delay);

        let active_echoes = ((damp * MAX_ECHOES as f32) as usize + 1).min(MAX_ECHOES);
        for (i, tap) in self.echoes.iter_mut().enumerate() {
            *tap = if i < active_echoes {
                let t = if active_echoes > 1 {
                    i as f32 / (active_echoes - 1) as f32
                } else {
                    0.0
                };
                let spacing = 0.1 + 0.9 * t.powf(0.8);
                Tap {
                    delay: to_samples(spacing * ECHO_SPAN_SECONDS),
                    gain: ECHO_BASE_GAIN * (1.0 - t).powf(1.5),
                    left: 1.0,
                    right: 1.0,
                }
            } else {
                Tap::default()
            };
        }

        let active_reflections = ((self.room_size * MAX_REFLECTIONS as f32).round() as usize)
            .clamp(MIN_REFLECTIONS, MAX_REFLECTIONS);
        let room_span = REFLECTION_SPAN_SECONDS * (0.2 + 0.8 * self.room_size);
        let decay_time = 0.1 + 0.4 * damp;
        let curve_norm = REFLECTION_SPACING.exp() - 1.0;
        for (k, tap) in self.reflections.iter_mut().enumerate() {
            *tap = if k < active_reflections {
                let u = (k + 1) as f32 / active_reflections as f32;
                let time = REFLECTION_PRE_DELAY_SECONDS
                    + room_span * ((REFLECTION_SPACING * u).exp() - 1.0) / curve_norm;
                let position = assign_position(k, active_reflections, PanLayout::Linear);
                let position = if k % 2 == 0 { position } else { -position };
                let (left, right) = pan_gains(position);
                Tap {
                    delay: to_samples(time),
                    gain: REFLECTION_BASE_GAIN * (-REFLECTION_DECAY_K * time / decay_time).exp(),
                    left,
                    right,
                }
            } else {
                Tap::default()
            };
        }

        self.active_echoes = active_echoes;
        self.active_reflections = active_reflections;

        let total = self.total_tap_gain();
        if total > GAIN_CEILING {
            let scale = GAIN_CEILING / total;
            for tap in self.echoes.iter_mut().chain(self.reflections.iter_mut()) {
                tap.gain *= scale;
            }
        }

        let cutoff = ABSORPTION_OPEN_HZ + (ABSORPTION_CLOSED_HZ - ABSORPTION_OPEN_HZ) * damp;
        self.absorb_left.set_cutoff(cutoff, self.sample_rate);
        self.absorb_right.set_cutoff(cutoff, self.sample_rate);

        self.regenerated_damp = damp;
        self.regenerated_room = self.room_size;
    }

    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let damp = self.damp.next();
        if (damp - self.regenerated_damp).abs() > REGENERATE_THRESHOLD {
            self.update_parameters(damp);
        }

        if damp < BYPASS_THRESHOLD {
            self.left_line.write(left);
            self.right_line.write(right);
            return (left, right);
        }

        let mut wet_left = 0.0;
        let mut wet_right = 0.0;

        for tap in &self.echoes[..self.active_echoes] {
            wet_left += tap.gain * self.left_line.read(tap.delay);
            wet_right += tap.gain * self.right_line.read(tap.delay);
        }

        for tap in &self.reflections[..self.active_reflections] {
            let mono = 0.5 * (self.left_line.read(tap.delay) + self.right_line.read(tap.delay));
            wet_left += tap.gain * tap.left * mono;
            wet_right += tap.gain * tap.right * mono;
        }

        let modulation = 1.0 + MOD_AMOUNT * self.next_modulation();
        let wet_left = self.absorb_left.process(wet_left * modulation);
        let wet_right = self.absorb_right.process(wet_right * modulation);

        self.left_line.write(left);
        self.right_line.write(right);

        (
            left * (1.0 - damp) + wet_left * damp,
            right * (1.0 - damp) + wet_right * damp,
        )
    }

    /// Summed gain of every active tap.
    pub fn total_tap_gain(&self) -> f32 {
        let echoes: f32 = self.echoes[..self.active_echoes].iter().map(|t| t.gain).sum();
        let reflections: f32 = self.reflections[..self.active_reflections]
            .iter()
            .map(|t| t.gain)
            .sum();
        echoes + reflections
    }

    pub fn active_echoes(&self) -> &[Tap] {
        &self.echoes[..self.active_echoes]
    }

    pub fn active_reflections(&self) -> &[Tap] {
        &self.reflections[..self.active_reflections]
    }

    /// Samples until an input sample has left every tap.
    pub fn tail_samples(&self) -> u32 {
        self.active_echoes()
            .iter()
            .chain(self.active_reflections())
            .map(|t| t.delay as u32)
            .max()
            .unwrap_or(0)
    }

    fn next_modulation(&mut self) -> f32 {
        let value = self.mod_table[self.mod_phase as usize % MOD_TABLE_SIZE];
        self.mod_phase += self.mod_increment;
        if self.mod_phase >= MOD_TABLE_SIZE as f32 {
            self.mod_phase -= MOD_TABLE_SIZE as f32;
        }
        value
    }
}

impl Default for DampingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn settled(damp: f32, room: f32) -> DampingEngine {
        let mut engine = DampingEngine::new();
        engine.prepare(SAMPLE_RATE);
        engine.set_room_size(room);
        engine.set_damp(damp);
        engine.reset();
        engine
    }

    #[test]
    fn zero_damp_is_transparent() {
        let mut engine = settled(0.0, 0.5);
        for n in 0..5000 {
            let x = (n as f32 * 0.01).sin();
            assert_eq!(engine.process(x, -x), (x, -x));
        }
    }

    #[test]
    fn tap_gains_never_exceed_ceiling() {
        for damp_step in 0..=20 {
            for room_step in 0..=10 {
                let damp = damp_step as f32 / 20.0;
                let room = room_step as f32 / 10.0;
                let engine = settled(damp, room);
                let total = engine.total_tap_gain();
                assert!(
                    total <= GAIN_CEILING + 1e-5,
                    "damp {damp} room {room}: total gain {total}"
                );
                assert!(engine.active_echoes().iter().all(|t| t.gain >= 0.0));
            }
        }
    }

    #[test]
    fn more_damp_activates_more_echoes_and_longer_reflections() {
        let light = settled(0.05, 0.5);
        let heavy = settled(1.0, 0.5);
        assert_eq!(light.active_echoes().len(), 1);
        assert_eq!(heavy.active_echoes().len(), MAX_ECHOES);

        // Same positions, slower decay: the last reflection is relatively
        // louder compared to the first one.
        let ratio = |e: &DampingEngine| {
            let r = e.active_reflections();
            r[r.len() - 1].gain / r[0].gain
        };
        assert!(ratio(&heavy) > ratio(&light));
    }

    #[test]
    fn room_size_sets_reflection_count_and_spread() {
        let small = settled(0.5, 0.0);
        let large = settled(0.5, 1.0);
        assert_eq!(small.active_reflections().len(), MIN_REFLECTIONS);
        assert_eq!(large.active_reflections().len(), MAX_REFLECTIONS);

        let last = |e: &DampingEngine| e.active_reflections().last().map(|t| t.delay).unwrap_or(0.0);
        assert!(last(&large) > last(&small));

        let first = small.active_reflections()[0].delay;
        assert!(first >= (REFLECTION_PRE_DELAY_SECONDS * SAMPLE_RATE).floor());
    }

    #[test]
    fn reflections_are_spaced_exponentially_and_alternate_sides() {
        let engine = settled(0.5, 1.0);
        let taps = engine.active_reflections();
        let gaps: Vec<f32> = taps.windows(2).map(|w| w[1].delay - w[0].delay).collect();
        assert!(gaps.windows(2).all(|g| g[1] >= g[0]), "gaps should widen: {gaps:?}");
        assert!(taps.windows(2).all(|w| w[1].gain <= w[0].gain));

        for tap in taps {
            assert!((tap.left * tap.left + tap.right * tap.right - 1.0).abs() < 1e-5);
        }
        assert!(taps[0].left > taps[0].right);
        assert!(taps[1].right > taps[1].left);
    }

    #[test]
    fn impulse_spreads_into_a_filtered_tail() {
        let mut engine = settled(1.0, 0.7);
        let total = (BUFFER_SECONDS * SAMPLE_RATE) as usize;
        let mut nonzero = 0;
        let mut peak = 0.0_f32;
        for n in 0..total {
            let x = if n == 0 { 1.0 } else { 0.0 };
            let (l, r) = engine.process(x, x);
            if n > 0 && (l.abs() > 1e-4 || r.abs() > 1e-4) {
                nonzero += 1;
            }
            peak = peak.max(l.abs()).max(r.abs());
        }
        assert!(nonzero > 200, "tail too sparse: {nonzero} samples");
        assert!(peak <= 1.0 + 1e-5);
    }

    #[test]
    fn regeneration_follows_the_smoothed_damp() {
        let mut engine = settled(0.0, 0.5);
        assert_eq!(engine.active_echoes().len(), 1);
        engine.set_damp(1.0);
        for _ in 0..(SAMPLE_RATE * 0.2) as usize {
            engine.process(0.0, 0.0);
        }
        assert_eq!(engine.active_echoes().len(), MAX_ECHOES);
        assert!((engine.regenerated_damp - 1.0).abs() <= REGENERATE_THRESHOLD);
    }

    #[test]
    fn bypass_still_records_history() {
        let mut engine = settled(0.0, 0.5);
        engine.set_damp(1.0);
        // The first sample of the ramp is still below the bypass threshold.
        assert_eq!(engine.process(1.0, 1.0), (1.0, 1.0));

        let ramp = (0.1 * SAMPLE_RATE) as usize;
        let mut late_energy = 0.0;
        for n in 1..(BUFFER_SECONDS * SAMPLE_RATE) as usize {
            let (l, r) = engine.process(0.0, 0.0);
            if n > ramp {
                late_energy += l * l + r * r;
            }
        }
        assert!(late_energy > 0.0, "impulse written during bypass was lost");
    }

    #[test]
    fn reset_is_deterministic() {
        let run = |engine: &mut DampingEngine| -> Vec<(f32, f32)> {
            (0..3000)
                .map(|n| {
                    let x = if n % 700 == 0 { 1.0 } else { 0.0 };
                    engine.process(x, -x)
                })
                .collect()
        };
        let mut engine = settled(0.8, 0.4);
        let first = run(&mut engine);
        engine.reset();
        let second = run(&mut engine);
        assert_eq!(first, second);
    }

    #[test]
    fn tail_covers_longest_tap() {
        let engine = settled(1.0, 1.0);
        let longest = engine
            .active_echoes()
            .iter()
            .map(|t| t.delay)
            .fold(0.0, f32::max);
        assert!(engine.tail_samples() as f32 >= longest);
        assert!(engine.tail_samples() as f32 <= BUFFER_SECONDS * SAMPLE_RATE);
    }
}
