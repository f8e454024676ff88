//! DSP — pure numeric code for synthesis and loop preparation.
//!
//! Nothing in here touches devices or threads, so the same code runs in the
//! native playback path, in WASM, and in offline WAV export.

pub mod loop_buffer;
pub mod oscillator;
pub mod ramp;
pub mod renderer;
