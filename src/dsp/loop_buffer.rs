//! Loop buffer builder — synthesizes a fixed-length mono buffer from a wave
//! snapshot, fades its edges and picks a click-free loop point.
//!
//! The builder is pure: it reads only the snapshot it is handed, keeps no
//! state between calls, and equal snapshots produce bit-identical buffers.

use crate::config::{EngineConfig, MAX_DURATION_SECS, MAX_SAMPLE_RATE};
use crate::error::WavesError;
use crate::wave::Wave;

/// A synthesized buffer plus its loop region, in samples.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    loop_start: usize,
    loop_end: usize,
}

impl LoopBuffer {
    /// Wrap already-prepared samples; `loop_end` is clamped to the buffer length.
    pub fn new(samples: Vec<f32>, sample_rate: u32, loop_end: usize) -> Self {
        let loop_end = loop_end.min(samples.len());
        LoopBuffer {
            samples,
            sample_rate,
            loop_start: 0,
            loop_end,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    pub fn loop_end(&self) -> usize {
        self.loop_end
    }

    pub fn loop_start_seconds(&self) -> f64 {
        self.loop_start as f64 / self.sample_rate as f64
    }

    pub fn loop_end_seconds(&self) -> f64 {
        self.loop_end as f64 / self.sample_rate as f64
    }

    /// The playable loop region; the whole buffer when the loop is degenerate.
    pub fn loop_region(&self) -> (usize, usize) {
        if self.loop_end > self.loop_start {
            (self.loop_start, self.loop_end)
        } else {
            (0, self.samples.len())
        }
    }

    /// Read a sample with linear interpolation at a fractional position.
    pub fn read_interpolated(&self, position: f64) -> f32 {
        if self.samples.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= self.samples.len() - 1 {
            return self.samples.get(idx).copied().unwrap_or(0.0);
        }

        let frac = (position - idx as f64) as f32;
        self.samples[idx] * (1.0 - frac) + self.samples[idx + 1] * frac
    }
}

/// Builds [`LoopBuffer`]s from wave snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBufferBuilder {
    sample_rate: u32,
    duration_secs: f64,
    fade_secs: f64,
    loop_search_secs: f64,
}

impl Default for LoopBufferBuilder {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl LoopBufferBuilder {
    pub fn new(sample_rate: u32, duration_secs: f64) -> Self {
        let defaults = EngineConfig::default();
        LoopBufferBuilder {
            sample_rate,
            duration_secs,
            fade_secs: defaults.fade_secs,
            loop_search_secs: defaults.loop_search_secs,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        LoopBufferBuilder {
            sample_rate: config.sample_rate,
            duration_secs: config.duration_secs,
            fade_secs: config.fade_secs,
            loop_search_secs: config.loop_search_secs,
        }
    }

    pub fn with_fade(mut self, fade_secs: f64) -> Self {
        self.fade_secs = fade_secs;
        self
    }

    pub fn with_loop_search(mut self, loop_search_secs: f64) -> Self {
        self.loop_search_secs = loop_search_secs;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_len(&self) -> usize {
        (self.duration_secs * self.sample_rate as f64) as usize
    }

    pub fn fade_len(&self) -> usize {
        ((self.sample_rate as f64 * self.fade_secs) as usize).min(self.buffer_len())
    }

    /// Index the loop-point search starts from: a small window before the end.
    pub fn loop_search_start(&self) -> usize {
        let len = self.buffer_len();
        let window = self.sample_rate as f64 * self.loop_search_secs;
        let start = (len as f64 - window).floor().max(0.0) as usize;
        start.min(len.saturating_sub(1))
    }

    /// Synthesize, fade and pick the loop point for a wave snapshot.
    pub fn build(&self, waves: &[Wave]) -> Result<LoopBuffer, WavesError> {
        validate(waves)?;

        if !(self.duration_secs.is_finite() && self.duration_secs <= MAX_DURATION_SECS)
            || self.sample_rate > MAX_SAMPLE_RATE
        {
            return Err(WavesError::RegenerationFailed(format!(
                "buffer of {}s at {} Hz exceeds the {MAX_DURATION_SECS}s / {MAX_SAMPLE_RATE} Hz limit",
                self.duration_secs, self.sample_rate
            )));
        }

        let len = self.buffer_len();
        if len == 0 {
            return Err(WavesError::RegenerationFailed(format!(
                "buffer of {}s at {} Hz holds no samples",
                self.duration_secs, self.sample_rate
            )));
        }

        let mut samples = synthesize(waves, self.sample_rate, len);
        if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
            return Err(WavesError::RegenerationFailed(format!(
                "non-finite sample at index {i}"
            )));
        }

        apply_edge_fades(&mut samples, self.fade_len());
        let loop_end = find_loop_end(&samples, self.loop_search_start());

        Ok(LoopBuffer {
            samples,
            sample_rate: self.sample_rate,
            loop_start: 0,
            loop_end,
        })
    }
}

fn validate(waves: &[Wave]) -> Result<(), WavesError> {
    for wave in waves {
        let f = wave.frequency();
        if !(f.is_finite() && f > 0.0) {
            return Err(WavesError::RegenerationFailed(format!(
                "{} has invalid frequency {f}",
                wave.id()
            )));
        }
        if !wave.phase().is_finite() {
            return Err(WavesError::RegenerationFailed(format!(
                "{} has invalid phase {}",
                wave.id(),
                wave.phase()
            )));
        }
    }
    Ok(())
}

/// Sum every wave's audio-domain sample for `len` samples.
pub fn synthesize(waves: &[Wave], sample_rate: u32, len: usize) -> Vec<f32> {
    let rate = sample_rate as f64;
    (0..len)
        .map(|n| {
            let t = n as f64 / rate;
            waves.iter().map(|w| w.audio_sample(t)).sum::<f64>() as f32
        })
        .collect()
}

/// Linear fade-in over the first `fade_len` samples and fade-out over the last.
pub fn apply_edge_fades(samples: &mut [f32], fade_len: usize) {
    let len = samples.len();
    let fade_len = fade_len.min(len);
    if fade_len == 0 {
        return;
    }
    let fade = fade_len as f32;

    for (i, s) in samples[..fade_len].iter_mut().enumerate() {
        *s *= i as f32 / fade;
    }
    for i in len - fade_len..len {
        samples[i] *= (len - i) as f32 / fade;
    }
}

/// First index at or after `start` where adjacent samples change sign or touch
/// zero; `start` itself when the rest of the buffer never crosses.
pub fn find_loop_end(samples: &[f32], start: usize) -> usize {
    if samples.len() < 2 {
        return start;
    }
    (start..samples.len() - 1)
        .find(|&i| samples[i] * samples[i + 1] <= 0.0)
        .unwrap_or(start)
}
