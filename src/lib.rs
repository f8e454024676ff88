pub mod collection;
pub mod config;
pub mod dsp;
pub mod error;
pub mod playback;
pub mod wave;

use serde::Serialize;
use wasm_bindgen::prelude::*;

pub use crate::collection::{WaveCollection, WaveProperty};
pub use crate::config::EngineConfig;
pub use crate::dsp::loop_buffer::{LoopBuffer, LoopBufferBuilder};
pub use crate::dsp::oscillator::Waveform;
pub use crate::error::WavesError;
pub use crate::playback::{OfflineOutput, OutputBackend, PlaybackController, PlaybackState};
pub use crate::wave::{Wave, WaveId};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Loop metadata handed to JavaScript alongside the samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopInfo {
    pub sample_rate: u32,
    pub length: usize,
    pub loop_start: usize,
    pub loop_end: usize,
    pub loop_start_seconds: f64,
    pub loop_end_seconds: f64,
}

impl From<&LoopBuffer> for LoopInfo {
    fn from(buffer: &LoopBuffer) -> Self {
        LoopInfo {
            sample_rate: buffer.sample_rate(),
            length: buffer.len(),
            loop_start: buffer.loop_start(),
            loop_end: buffer.loop_end(),
            loop_start_seconds: buffer.loop_start_seconds(),
            loop_end_seconds: buffer.loop_end_seconds(),
        }
    }
}

/// WASM-exposed: return the additive_waves version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Build a loop buffer from a JSON array of waves with the default engine settings.
///
/// Amplitudes in the JSON are ignored; they are re-derived from the mute flags.
pub fn build_loop(waves_json: &str) -> Result<LoopBuffer, WavesError> {
    build_loop_with(waves_json, &EngineConfig::default())
}

/// Build a loop buffer from a JSON array of waves.
pub fn build_loop_with(waves_json: &str, config: &EngineConfig) -> Result<LoopBuffer, WavesError> {
    let waves: Vec<Wave> = serde_json::from_str(waves_json)?;
    let collection = WaveCollection::from_waves(waves)?;
    LoopBufferBuilder::from_config(config).build(collection.waves())
}

/// WASM-exposed: synthesize the loop buffer for a JSON wave list.
/// Returns the raw mono samples for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_loop_samples(waves_json: &str) -> Result<Vec<f32>, JsValue> {
    let buffer = build_loop(waves_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(buffer.samples().to_vec())
}

/// WASM-exposed: loop metadata (`{ sampleRate, length, loopStart, loopEnd, ... }`).
#[wasm_bindgen]
pub fn describe_loop(waves_json: &str) -> Result<JsValue, JsValue> {
    let buffer = build_loop(waves_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&LoopInfo::from(&buffer))
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render one loop of a JSON wave list to a WAV byte array.
#[wasm_bindgen]
pub fn render_loop_wav(waves_json: &str) -> Result<Vec<u8>, JsValue> {
    let buffer = build_loop(waves_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    Ok(dsp::renderer::render_wav(&buffer))
}
