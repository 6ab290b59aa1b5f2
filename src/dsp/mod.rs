//! # DSP Building Blocks
//!
//! Everything the engine wires together, each usable on its own:
//!
//! - **`delay_line`**: ring buffer with fractional (linear or cubic) reads.
//!   The heart of every voice and of the damping tail.
//!
//! - **`smoothing`**: linear parameter ramps so knob moves never click.
//!
//! - **`lfo`**: per-voice delay-time modulation, sine or chaotic.
//!
//! - **`pitch_shifter`**: two-tap granular shifter for octave shimmer.
//!
//! - **`stereo_field`**: equal-power panning and voice placement.
//!
//! - **`damping`**: multi-tap echo and early-reflection tail.
//!
//! - **`filter`**: one-pole lowpass, state-variable filters and the
//!   low-cut/high-cut tone shaper.
//!
//! - **`tremolo`**: two-band amplitude modulation.

pub mod damping;
pub mod delay_line;
pub mod filter;
pub mod lfo;
pub mod pitch_shifter;
pub mod smoothing;
pub mod stereo_field;
pub mod tremolo;
