//! Output backends — where the bus renderer's audio ends up.

use std::sync::Arc;

use parking_lot::Mutex;

use super::bus::BusRenderer;
use crate::error::WavesError;

/// Negotiated output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub device_name: String,
}

/// An audio sink that drives a [`BusRenderer`] on its own schedule.
pub trait OutputBackend {
    /// Acquire the output and start pulling audio from `renderer`.
    fn open(&mut self, renderer: BusRenderer) -> Result<OutputInfo, WavesError>;

    /// Stop pulling audio and release the output. Idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Pull-driven backend: whoever holds a clone calls [`OfflineOutput::render`].
///
/// Used for offline rendering, tests, and hosts that own their audio
/// callback (an AudioWorklet, a plugin host).
#[derive(Clone)]
pub struct OfflineOutput {
    sample_rate: u32,
    channels: u16,
    renderer: Arc<Mutex<Option<BusRenderer>>>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        OfflineOutput {
            sample_rate,
            channels: channels.max(1),
            renderer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Fill an interleaved block. Returns the number of frames rendered;
    /// zero (and silence) while closed.
    pub fn render(&self, out: &mut [f32]) -> usize {
        let mut slot = self.renderer.lock();
        match slot.as_mut() {
            Some(renderer) => {
                renderer.render(out, self.channels as usize);
                out.len() / self.channels as usize
            }
            None => {
                out.fill(0.0);
                0
            }
        }
    }

    /// Render `frames` frames into a fresh buffer.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels as usize];
        self.render(&mut out);
        out
    }

    /// Render `seconds` of audio and discard it, letting ramps advance.
    pub fn advance(&self, seconds: f64) {
        let frames = (seconds * self.sample_rate as f64).ceil() as usize;
        self.render_frames(frames);
    }
}

impl OutputBackend for OfflineOutput {
    fn open(&mut self, mut renderer: BusRenderer) -> Result<OutputInfo, WavesError> {
        renderer.configure(self.sample_rate);
        *self.renderer.lock() = Some(renderer);
        Ok(OutputInfo {
            sample_rate: self.sample_rate,
            channels: self.channels,
            device_name: "offline".to_string(),
        })
    }

    fn close(&mut self) {
        self.renderer.lock().take();
    }

    fn is_open(&self) -> bool {
        self.renderer.lock().is_some()
    }
}
