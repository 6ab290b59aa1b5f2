//! # Plugin Parameters
//!
//! The knobs the DAW shows. Each one has a stable `#[id]` that presets and
//! automation refer to; never rename an id once it has shipped.
//!
//! Unlike a simple effect, these parameters carry no nih-plug smoothers.
//! The engine reads plain values once per block (see [`QuantaParams::controls`])
//! and ramps them itself, so each control gets the ramp time that suits
//! the stage it drives (50 ms for delay time, 300 ms for the voice count,
//! and so on).

use nih_plug::prelude::*;

use crate::dsp::filter::{
    DEFAULT_RESONANCE, HIGH_CUT_MAX_HZ, HIGH_CUT_MIN_HZ, LOW_CUT_MAX_HZ, LOW_CUT_MIN_HZ,
    MAX_RESONANCE, MIN_RESONANCE,
};
use crate::dsp::lfo::{LfoShape, MAX_DEPTH_MS};
use crate::dsp::pitch_shifter::ShiftPattern;
use crate::dsp::tremolo;
use crate::engine::{Controls, MAX_DELAY_SECONDS, MAX_FEEDBACK, MAX_SPREAD, MAX_VOICES, MIN_SPREAD};

#[derive(Params)]
pub struct QuantaParams {
    /// Wet level added on top of the dry signal.
    #[id = "mix"]
    pub mix: FloatParam,

    /// Delay time of the first voice, in milliseconds. Later voices are
    /// shorter by the spread ratio.
    #[id = "delay"]
    pub delay_time: FloatParam,

    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// Number of active delay lines (voices).
    #[id = "lines"]
    pub lines: IntParam,

    /// Peak delay-time modulation in milliseconds.
    #[id = "depth"]
    pub mod_depth: FloatParam,

    #[id = "shape"]
    pub mod_shape: EnumParam<LfoShape>,

    /// Ratio between successive voices' delay times.
    #[id = "sprd"]
    pub spread: FloatParam,

    #[id = "width"]
    pub width: FloatParam,

    #[id = "pitch"]
    pub shift_pattern: EnumParam<ShiftPattern>,

    /// How much of the reflection tail is heard, and how long and dark it
    /// is.
    #[id = "damp"]
    pub damp: FloatParam,

    #[id = "room"]
    pub room_size: FloatParam,

    #[id = "lowcut"]
    pub low_cut: FloatParam,

    #[id = "hicut"]
    pub high_cut: FloatParam,

    #[id = "reso"]
    pub resonance: FloatParam,

    #[id = "trate"]
    pub tremolo_rate: FloatParam,

    #[id = "tdepth"]
    pub tremolo_depth: FloatParam,
}

impl QuantaParams {
    /// Snapshot of the current values in engine units.
    pub fn controls(&self) -> Controls {
        Controls {
            mix: self.mix.value(),
            delay_time: self.delay_time.value() / 1000.0,
            feedback: self.feedback.value(),
            active_voices: self.lines.value().max(1) as usize,
            modulation_depth_ms: self.mod_depth.value(),
            modulation_shape: self.mod_shape.value(),
            spread: self.spread.value(),
            stereo_width: self.width.value(),
            shift_pattern: self.shift_pattern.value(),
            damp: self.damp.value(),
            room_size: self.room_size.value(),
            low_cut: self.low_cut.value(),
            high_cut: self.high_cut.value(),
            filter_resonance: self.resonance.value(),
            tremolo_rate: self.tremolo_rate.value(),
            tremolo_depth: self.tremolo_depth.value(),
            ..Controls::default()
        }
    }
}

fn percentage(name: &str, default: f32, max: f32) -> FloatParam {
    FloatParam::new(name, default, FloatRange::Linear { min: 0.0, max })
        .with_unit("%")
        .with_value_to_string(formatters::v2s_f32_percentage(1))
        .with_string_to_value(formatters::s2v_f32_percentage())
}

fn frequency(name: &str, default: f32, min: f32, max: f32) -> FloatParam {
    FloatParam::new(
        name,
        default,
        FloatRange::Skewed {
            min,
            max,
            factor: FloatRange::skew_factor(-2.0),
        },
    )
    .with_value_to_string(formatters::v2s_f32_hz_then_khz(0))
    .with_string_to_value(formatters::s2v_f32_hz_then_khz())
}

impl Default for QuantaParams {
    fn default() -> Self {
        let defaults = Controls::default();

        Self {
            mix: percentage("Mix", defaults.mix, 1.0),

            delay_time: FloatParam::new(
                "Delay Time",
                defaults.delay_time * 1000.0,
                FloatRange::Skewed {
                    min: 0.0,
                    max: MAX_DELAY_SECONDS * 1000.0,
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),

            feedback: percentage("Feedback", defaults.feedback, MAX_FEEDBACK),

            lines: IntParam::new(
                "Lines",
                defaults.active_voices as i32,
                IntRange::Linear {
                    min: 1,
                    max: MAX_VOICES as i32,
                },
            ),

            mod_depth: FloatParam::new(
                "Mod Depth",
                defaults.modulation_depth_ms,
                FloatRange::Skewed {
                    min: 0.0,
                    max: MAX_DEPTH_MS,
                    factor: FloatRange::skew_factor(-1.5),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.01),

            mod_shape: EnumParam::new("Mod Shape", defaults.modulation_shape),

            spread: FloatParam::new(
                "Spread",
                defaults.spread,
                FloatRange::Linear {
                    min: MIN_SPREAD,
                    max: MAX_SPREAD,
                },
            )
            .with_step_size(0.01),

            width: percentage("Width", defaults.stereo_width, 1.0),

            shift_pattern: EnumParam::new("Pitch", defaults.shift_pattern),

            damp: percentage("Damp", defaults.damp, 1.0),

            room_size: percentage("Room", defaults.room_size, 1.0),

            low_cut: frequency("Low Cut", defaults.low_cut, LOW_CUT_MIN_HZ, LOW_CUT_MAX_HZ),

            high_cut: frequency(
                "High Cut",
                defaults.high_cut,
                HIGH_CUT_MIN_HZ,
                HIGH_CUT_MAX_HZ,
            ),

            resonance: FloatParam::new(
                "Resonance",
                DEFAULT_RESONANCE,
                FloatRange::Skewed {
                    min: MIN_RESONANCE,
                    max: MAX_RESONANCE,
                    factor: FloatRange::skew_factor(-1.5),
                },
            )
            .with_step_size(0.01),

            tremolo_rate: FloatParam::new(
                "Tremolo Rate",
                defaults.tremolo_rate,
                FloatRange::Skewed {
                    min: tremolo::MIN_RATE_HZ,
                    max: tremolo::MAX_RATE_HZ,
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" Hz")
            .with_step_size(0.01),

            tremolo_depth: percentage("Tremolo Depth", defaults.tremolo_depth, 1.0),
        }
    }
}
