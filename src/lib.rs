//! # Quanta Delay — A Multi-Line Modulated Delay (AU/VST3/CLAP)
//!
//! Up to eight feedback delay lines ("voices") running side by side, each
//! with its own modulation, pitch shift and place in the stereo field,
//! followed by a reflection tail, tone filters and a band tremolo. Built
//! with [nih-plug](https://github.com/robbert-vdh/nih-plug); one codebase
//! produces Audio Unit (AUv2), VST3 and CLAP builds.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬───────────────────────────────────────────────────────────────┐
//!         │                                                               │
//!         ▼                                                               │
//!     ½(L + R) ──► voices 0..N  (delay · spread^i, LFO, pitch, pan) ──┐   │
//!                                                                     │   │
//!                      ┌──────────────────────────────────────────────┘   │
//!                      ▼                                                  │
//!                 [damping tail] ─► [low cut / high cut] ─► [tremolo]     │
//!                                                               │         │
//!                                                               × mix     │
//!                                                               │         │
//!                                                               └──►(+)◄──┘──► Output
//! ```
//!
//! The DSP lives in [`engine`] and [`dsp`] and knows nothing about
//! plugins; this file only forwards parameter values and buffers.

pub mod dsp;
pub mod engine;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use engine::Engine;
use nih_plug::prelude::*;
use params::QuantaParams;

struct QuantaDelay {
    params: Arc<QuantaParams>,

    /// Owned by the audio thread; sized in `initialize()`.
    engine: Engine,
}

impl Default for QuantaDelay {
    fn default() -> Self {
        Self {
            params: Arc::new(QuantaParams::default()),
            // Prepared for 44.1 kHz until the host tells us otherwise.
            engine: Engine::new(),
        }
    }
}

impl Plugin for QuantaDelay {
    const NAME: &'static str = "Quanta Delay";
    const VENDOR: &'static str = "Quanta Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // The voices pan across the stereo field, so stereo only.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        aux_input_ports: &[],
        aux_output_ports: &[],
        names: PortNames::const_default(),
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Controls are read once per block and ramped inside the engine, so
    // blocks are never split at automation points.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocates every delay buffer for the host's sample rate. Called
    /// off the audio thread, so allocation is fine here.
    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        self.engine.apply_controls(&self.params.controls());
        self.engine.prepare(
            buffer_config.sample_rate,
            buffer_config.max_buffer_size as usize,
        );

        nih_log!(
            "{} initialized at {} Hz",
            Self::NAME,
            buffer_config.sample_rate
        );

        true
    }

    /// Clears all delay history so stale echoes don't play after a
    /// transport stop.
    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.engine.apply_controls(&self.params.controls());

        if let [left, right, ..] = buffer.as_slice() {
            self.engine.process_block(left, right);
        }

        // Keep the host calling process() until the feedback loop and the
        // reflection tail have decayed by 60 dB.
        ProcessStatus::Tail(self.engine.tail_samples())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for QuantaDelay {
    const CLAP_ID: &'static str = "com.quanta-audio.quanta-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Multi-line modulated delay with pitch shimmer and a reflection tail");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Delay,
        ClapFeature::Reverb,
    ];
}

impl Vst3Plugin for QuantaDelay {
    const VST3_CLASS_ID: [u8; 16] = *b"QuantaDelay_v001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Delay,
        Vst3SubCategory::Stereo,
    ];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────

nih_export_clap!(QuantaDelay);
nih_export_vst3!(QuantaDelay);

// AUv2 entry point for Logic Pro, wrapped around the CLAP build.
clap_wrapper::export_auv2!();
