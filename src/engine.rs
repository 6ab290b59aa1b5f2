//! # Signal-Chain Orchestrator
//!
//! The [`Engine`] owns every stage and runs them in order, once per sample:
//!
//! ```text
//!                  ┌──────────────── voice 0 ─────────────────┐
//!                  │  (+)─► [delay line] ─┬─► [pitch] ─► [pan]─┼─┐
//!                  │   ▲                  │                    │ │
//!  L ─┐            │   └──── × feedback ◄─┘                    │ │
//!     ├─► ½(L+R) ──┼──────── voice 1 … voice 7 ────────────────┼─┤
//!  R ─┘            └───────────────────────────────────────────┘ │
//!     │                                                          ▼
//!     │                                    Σ weighted / active count
//!     │                                                          │
//!     │                     [damping] ─► [low/high cut] ─► [tremolo]
//!     │                                                          │
//!     └──── dry ───────────────────────────────► (+) ◄── × mix ──┘ ─► out
//! ```
//!
//! ## Voices
//!
//! Up to [`MAX_VOICES`] voices each run their own feedback delay. Voice `i`
//! uses `delay · spread^i`, so successive voices come in earlier and
//! stagger against each other. Each voice wobbles its delay with its own
//! LFO (a different preset rate and start phase per voice), may be
//! pitch-shifted by the active [`ShiftPattern`], and is panned into place.
//!
//! ## Active voice count
//!
//! The count glides over 300 ms. At a fractional count such as 2.4,
//! voices 0 and 1 play at full weight and voice 2 at weight 0.4. The sum
//! is divided by the count, so the level of a signal the voices carry in
//! phase stays put while voices fade in and out. Voices at staggered
//! delays interfere with each other, so on a tone their sum can sit below
//! the single-voice level, never above it. Silent voices keep recording
//! the input (without feedback) so they never start from an empty buffer.
//!
//! Pan positions are laid out over every voice still sounding, so voices
//! that are fading out stay where they were.
//!
//! ## Control flow
//!
//! Setters only store clamped values in [`Controls`]. At the start of each
//! [`process_block()`](Engine::process_block) the stored values become
//! smoother targets; the smoothers then advance every sample.

use nih_plug::{nih_debug_assert, nih_log};

use crate::dsp::damping::DampingEngine;
use crate::dsp::delay_line::{DelayLine, Interpolation};
use crate::dsp::filter::{
    ToneShaper, DEFAULT_RESONANCE, HIGH_CUT_MAX_HZ, HIGH_CUT_MIN_HZ, LOW_CUT_MAX_HZ,
    LOW_CUT_MIN_HZ, MAX_RESONANCE, MIN_RESONANCE,
};
use crate::dsp::lfo::{Lfo, LfoShape, MAX_DEPTH_MS};
use crate::dsp::pitch_shifter::{PitchShifter, ShiftPattern};
use crate::dsp::smoothing::SmoothedValue;
use crate::dsp::stereo_field::{assign_position, jitter_table, PanLayout, StereoField};
use crate::dsp::tremolo::{self, Tremolo};

pub const MAX_VOICES: usize = 8;

pub const MAX_DELAY_SECONDS: f32 = 2.0;
/// Room past the longest delay for LFO excursions.
const DELAY_HEADROOM_SECONDS: f32 = 0.1;
/// Voices never read closer than this to their write head.
const MIN_VOICE_DELAY_SAMPLES: f32 = 2.0;

pub const MAX_FEEDBACK: f32 = 0.95;
pub const MIN_SPREAD: f32 = 0.1;
pub const MAX_SPREAD: f32 = 1.0;

const DELAY_RAMP_MS: f32 = 50.0;
const FEEDBACK_RAMP_MS: f32 = 20.0;
const MIX_RAMP_MS: f32 = 20.0;
const VOICE_COUNT_RAMP_MS: f32 = 300.0;

const DEFAULT_SAMPLE_RATE: f32 = 44100.0;
const DEFAULT_MAX_BLOCK_SIZE: usize = 1024;

/// Golden-ratio increment, spreads per-voice LFO seeds across `u64`.
const LFO_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Every user-facing control of the engine, in engine units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub mix: f32,
    /// Seconds.
    pub delay_time: f32,
    pub feedback: f32,
    pub active_voices: usize,
    pub modulation_depth_ms: f32,
    pub modulation_shape: LfoShape,
    pub spread: f32,
    pub stereo_width: f32,
    pub jitter_seed: u64,
    pub jitter_amount: f32,
    pub shift_pattern: ShiftPattern,
    pub damp: f32,
    pub room_size: f32,
    pub low_cut: f32,
    pub high_cut: f32,
    pub filter_resonance: f32,
    pub tremolo_rate: f32,
    pub tremolo_depth: f32,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            mix: 0.5,
            delay_time: 0.5,
            feedback: 0.5,
            active_voices: 1,
            modulation_depth_ms: 2.0,
            modulation_shape: LfoShape::Sine,
            spread: 0.75,
            stereo_width: 1.0,
            jitter_seed: 0,
            jitter_amount: 0.0,
            shift_pattern: ShiftPattern::Off,
            damp: 0.0,
            room_size: 0.5,
            low_cut: LOW_CUT_MIN_HZ,
            high_cut: HIGH_CUT_MAX_HZ,
            filter_resonance: DEFAULT_RESONANCE,
            tremolo_rate: 2.0,
            tremolo_depth: 0.0,
        }
    }
}

/// Everything about a voice that depends only on its index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceConfig {
    pub shift_factor: f32,
    pub pan_jitter: f32,
    pub lfo_preset: usize,
    pub lfo_seed: u64,
}

fn build_voice_configs(
    pattern: ShiftPattern,
    jitter_seed: u64,
    jitter_amount: f32,
) -> [VoiceConfig; MAX_VOICES] {
    let factors = pattern.factors();
    let jitter = jitter_table(jitter_seed, jitter_amount);
    std::array::from_fn(|i| VoiceConfig {
        shift_factor: factors[i],
        pan_jitter: jitter[i],
        lfo_preset: i,
        lfo_seed: (i as u64 + 1).wrapping_mul(LFO_SEED_STRIDE),
    })
}

struct Voice {
    line: DelayLine,
    /// Base delay in seconds, before modulation.
    delay: SmoothedValue,
    feedback: SmoothedValue,
    field: StereoField,
    shifter: PitchShifter,
    lfo: Lfo,
}

impl Voice {
    fn new() -> Self {
        Self {
            line: DelayLine::new(4, Interpolation::Cubic),
            delay: SmoothedValue::new(DELAY_RAMP_MS, 0.0),
            feedback: SmoothedValue::new(FEEDBACK_RAMP_MS, 0.0),
            field: StereoField::new(),
            shifter: PitchShifter::new(),
            lfo: Lfo::new(),
        }
    }

    fn prepare(&mut self, sample_rate: f32, capacity: usize) {
        self.line.configure(capacity);
        self.delay.set_sample_rate(sample_rate);
        self.feedback.set_sample_rate(sample_rate);
        self.field.prepare(sample_rate);
        self.lfo.prepare(sample_rate);
        self.shifter.reset();
    }

    fn configure(&mut self, config: &VoiceConfig) {
        self.shifter.set_shift_factor(config.shift_factor);
        self.lfo.set_preset_rate(config.lfo_preset);
        self.lfo.set_seed(config.lfo_seed);
        self.lfo
            .set_phase_offset(config.lfo_preset as f32 / MAX_VOICES as f32);
    }

    fn reset(&mut self) {
        self.line.clear();
        self.shifter.reset();
        self.lfo.reset();
        self.delay.reset(self.delay.target());
        self.feedback.reset(self.feedback.target());
        self.field.snap_to(self.field.target());
    }

    /// Full path: read, feed back, shift, pan.
    fn process(&mut self, mono_in: f32, sample_rate: f32, max_delay: f32) -> (f32, f32) {
        let delay = self.delay.next() + self.lfo.next_sample();
        let delay_samples = (delay * sample_rate).clamp(MIN_VOICE_DELAY_SAMPLES, max_delay);
        let feedback = self.feedback.next();

        let delayed = self.line.read(delay_samples);
        self.line.write(mono_in + feedback * delayed);

        let shifted = self.shifter.process(delayed);
        self.field.process(shifted)
    }

    /// Keep a silent voice's history and ramps current without producing
    /// output.
    fn record(&mut self, mono_in: f32) {
        self.delay.next();
        self.feedback.next();
        self.lfo.next_sample();
        self.field.next_gains();
        self.line.write(mono_in);
    }
}

pub struct Engine {
    sample_rate: f32,
    max_block_size: usize,
    max_voice_delay: f32,

    controls: Controls,
    voice_configs: [VoiceConfig; MAX_VOICES],

    voices: [Voice; MAX_VOICES],
    voice_count: SmoothedValue,
    mix: SmoothedValue,

    damping: DampingEngine,
    tone: ToneShaper,
    tremolo: Tremolo,
}

impl Engine {
    /// An engine with default controls, prepared for 44.1 kHz.
    pub fn new() -> Self {
        let controls = Controls::default();
        let mut engine = Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            max_voice_delay: MIN_VOICE_DELAY_SAMPLES,
            controls,
            voice_configs: build_voice_configs(
                controls.shift_pattern,
                controls.jitter_seed,
                controls.jitter_amount,
            ),
            voices: std::array::from_fn(|_| Voice::new()),
            voice_count: SmoothedValue::new(VOICE_COUNT_RAMP_MS, 1.0),
            mix: SmoothedValue::new(MIX_RAMP_MS, controls.mix),
            damping: DampingEngine::new(),
            tone: ToneShaper::new(),
            tremolo: Tremolo::new(),
        };
        engine.prepare(DEFAULT_SAMPLE_RATE, DEFAULT_MAX_BLOCK_SIZE);
        engine
    }

    /// Size every buffer for `sample_rate` and return to a silent initial
    /// state. Allocates; never call from the audio callback.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        let capacity = ((MAX_DELAY_SECONDS + DELAY_HEADROOM_SECONDS) * sample_rate) as usize + 4;
        self.max_voice_delay = (capacity - 2) as f32;

        for (voice, config) in self.voices.iter_mut().zip(&self.voice_configs) {
            voice.prepare(sample_rate, capacity);
            voice.configure(config);
        }
        self.voice_count.set_sample_rate(sample_rate);
        self.mix.set_sample_rate(sample_rate);

        self.damping.prepare(sample_rate);
        self.tone.prepare(sample_rate);
        self.tremolo.prepare(sample_rate);

        self.reset();

        nih_log!(
            "engine prepared: {sample_rate} Hz, {max_block_size} samples/block, {capacity} samples/voice"
        );
    }

    /// Clear all audio history and settle every ramp on its target.
    pub fn reset(&mut self) {
        self.voice_count.reset(self.controls.active_voices as f32);
        self.update_targets();
        for voice in &mut self.voices {
            voice.reset();
        }
        self.mix.reset(self.mix.target());
        self.damping.reset();
        self.tone.reset();
        self.tremolo.reset();
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn voice_configs(&self) -> &[VoiceConfig; MAX_VOICES] {
        &self.voice_configs
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    // ─────────────────────────────────────────────────────────────────
    // Setters
    // ─────────────────────────────────────────────────────────────────

    pub fn apply_controls(&mut self, controls: &Controls) {
        self.set_mix(controls.mix);
        self.set_delay_time(controls.delay_time);
        self.set_feedback(controls.feedback);
        self.set_active_voices(controls.active_voices);
        self.set_modulation_depth(controls.modulation_depth_ms);
        self.set_modulation_shape(controls.modulation_shape);
        self.set_spread(controls.spread);
        self.set_stereo_width(controls.stereo_width);
        self.set_pan_jitter(controls.jitter_seed, controls.jitter_amount);
        self.set_shift_pattern(controls.shift_pattern);
        self.set_damp(controls.damp);
        self.set_room_size(controls.room_size);
        self.set_low_cut(controls.low_cut);
        self.set_high_cut(controls.high_cut);
        self.set_filter_resonance(controls.filter_resonance);
        self.set_tremolo_rate(controls.tremolo_rate);
        self.set_tremolo_depth(controls.tremolo_depth);
    }

    /// Wet level in `[0, 1]`, added on top of the dry signal.
    pub fn set_mix(&mut self, mix: f32) {
        self.controls.mix = finite_or(mix, 0.5).clamp(0.0, 1.0);
    }

    /// Base delay in seconds, `[0, MAX_DELAY_SECONDS]`.
    pub fn set_delay_time(&mut self, seconds: f32) {
        self.controls.delay_time = finite_or(seconds, 0.5).clamp(0.0, MAX_DELAY_SECONDS);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.controls.feedback = finite_or(feedback, 0.0).clamp(0.0, MAX_FEEDBACK);
    }

    pub fn set_active_voices(&mut self, count: usize) {
        self.controls.active_voices = count.clamp(1, MAX_VOICES);
    }

    /// Peak delay modulation in milliseconds, `[0, MAX_DEPTH_MS]`.
    pub fn set_modulation_depth(&mut self, depth_ms: f32) {
        self.controls.modulation_depth_ms = finite_or(depth_ms, 0.0).clamp(0.0, MAX_DEPTH_MS);
    }

    pub fn set_modulation_shape(&mut self, shape: LfoShape) {
        self.controls.modulation_shape = shape;
    }

    /// Per-voice delay ratio in `[MIN_SPREAD, MAX_SPREAD]`.
    pub fn set_spread(&mut self, spread: f32) {
        self.controls.spread = finite_or(spread, 0.75).clamp(MIN_SPREAD, MAX_SPREAD);
    }

    /// Scale on voice pan positions; 0 puts every voice in the center.
    pub fn set_stereo_width(&mut self, width: f32) {
        self.controls.stereo_width = finite_or(width, 1.0).clamp(0.0, 1.0);
    }

    /// Seeded random offset on each voice's pan position. An amount of 0
    /// disables it.
    pub fn set_pan_jitter(&mut self, seed: u64, amount: f32) {
        let amount = finite_or(amount, 0.0).max(0.0);
        if seed != self.controls.jitter_seed || amount != self.controls.jitter_amount {
            self.controls.jitter_seed = seed;
            self.controls.jitter_amount = amount;
            self.rebuild_voice_configs();
        }
    }

    pub fn set_shift_pattern(&mut self, pattern: ShiftPattern) {
        if pattern != self.controls.shift_pattern {
            self.controls.shift_pattern = pattern;
            self.rebuild_voice_configs();
        }
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.controls.damp = finite_or(damp, 0.0).clamp(0.0, 1.0);
    }

    pub fn set_room_size(&mut self, size: f32) {
        self.controls.room_size = finite_or(size, 0.5).clamp(0.0, 1.0);
    }

    pub fn set_low_cut(&mut self, frequency: f32) {
        self.controls.low_cut =
            finite_or(frequency, LOW_CUT_MIN_HZ).clamp(LOW_CUT_MIN_HZ, LOW_CUT_MAX_HZ);
    }

    pub fn set_high_cut(&mut self, frequency: f32) {
        self.controls.high_cut =
            finite_or(frequency, HIGH_CUT_MAX_HZ).clamp(HIGH_CUT_MIN_HZ, HIGH_CUT_MAX_HZ);
    }

    pub fn set_filter_resonance(&mut self, q: f32) {
        self.controls.filter_resonance =
            finite_or(q, DEFAULT_RESONANCE).clamp(MIN_RESONANCE, MAX_RESONANCE);
    }

    pub fn set_tremolo_rate(&mut self, rate_hz: f32) {
        self.controls.tremolo_rate =
            finite_or(rate_hz, 2.0).clamp(tremolo::MIN_RATE_HZ, tremolo::MAX_RATE_HZ);
    }

    pub fn set_tremolo_depth(&mut self, depth: f32) {
        self.controls.tremolo_depth = finite_or(depth, 0.0).clamp(0.0, 1.0);
    }

    // ─────────────────────────────────────────────────────────────────
    // Processing
    // ─────────────────────────────────────────────────────────────────

    /// Process `min(left.len(), right.len())` samples in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        nih_debug_assert!(left.len().min(right.len()) <= self.max_block_size);

        self.update_targets();

        let sample_rate = self.sample_rate;
        let max_delay = self.max_voice_delay;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (dry_l, dry_r) = (*l, *r);
            let mono_in = 0.5 * (dry_l + dry_r);

            let count = self.voice_count.next();
            let full = (count.floor() as usize).min(MAX_VOICES);
            let partial = count - full as f32;

            let mut wet_l = 0.0;
            let mut wet_r = 0.0;
            for (i, voice) in self.voices.iter_mut().enumerate() {
                let weight = if i < full {
                    1.0
                } else if i == full && partial > 0.0 {
                    partial
                } else {
                    0.0
                };

                if weight > 0.0 {
                    let (vl, vr) = voice.process(mono_in, sample_rate, max_delay);
                    wet_l += weight * vl;
                    wet_r += weight * vr;
                } else {
                    voice.record(mono_in);
                }
            }

            let norm = count.max(1.0);
            let (wet_l, wet_r) = self.damping.process(wet_l / norm, wet_r / norm);
            let (wet_l, wet_r) = self.tone.process_stereo_sample(wet_l, wet_r);
            let (wet_l, wet_r) = self.tremolo.process(wet_l, wet_r);

            let mix = self.mix.next();
            *l = dry_l + mix * wet_l;
            *r = dry_r + mix * wet_r;
        }
    }

    /// How long output continues after the input goes silent.
    ///
    /// The feedback loop needs `log(0.001) / log(feedback)` repeats to
    /// fall 60 dB; the damping tail adds its longest tap on top.
    pub fn tail_samples(&self) -> u32 {
        let longest = (self.controls.delay_time + self.controls.modulation_depth_ms / 1000.0)
            * self.sample_rate;
        let feedback = self.controls.feedback;
        let repeats = if feedback > 0.001 {
            -3.0 / feedback.log10()
        } else {
            1.0
        };
        (repeats * longest) as u32 + self.damping.tail_samples()
    }

    fn rebuild_voice_configs(&mut self) {
        self.voice_configs = build_voice_configs(
            self.controls.shift_pattern,
            self.controls.jitter_seed,
            self.controls.jitter_amount,
        );
        for (voice, config) in self.voices.iter_mut().zip(&self.voice_configs) {
            voice.shifter.set_shift_factor(config.shift_factor);
        }
    }

    /// Push the stored controls into every stage as new targets.
    fn update_targets(&mut self) {
        let c = self.controls;

        self.mix.set_target(c.mix);
        self.voice_count.set_target(c.active_voices as f32);

        // Voices still fading out keep their slot in the layout.
        let sounding = self.voice_count.current().ceil() as usize;
        let layout_voices = c.active_voices.max(sounding).clamp(1, MAX_VOICES);

        let mut delay = c.delay_time;
        for (i, (voice, config)) in self.voices.iter_mut().zip(&self.voice_configs).enumerate() {
            voice.delay.set_target(delay);
            delay *= c.spread;

            voice.feedback.set_target(c.feedback);
            voice.lfo.set_depth_ms(c.modulation_depth_ms);
            voice.lfo.set_shape(c.modulation_shape);

            let position = assign_position(i, layout_voices, PanLayout::Linear);
            voice
                .field
                .set_position(position * c.stereo_width + config.pan_jitter);
        }

        self.damping.set_damp(c.damp);
        self.damping.set_room_size(c.room_size);

        self.tone.set_low_cut(c.low_cut);
        self.tone.set_high_cut(c.high_cut);
        self.tone.set_resonance(c.filter_resonance);

        self.tremolo.set_rate(c.tremolo_rate);
        self.tremolo.set_depth(c.tremolo_depth);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
