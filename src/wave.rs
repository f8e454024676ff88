//! Wave — a single oscillator with audio-domain and visual-domain generators.

use std::f64::consts::TAU;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dsp::oscillator::{ShapeDomain, Waveform};

/// Lowest frequency a user can dial in, in Hz.
pub const MIN_FREQUENCY: f64 = 50.0;
/// Highest frequency a user can dial in, in Hz.
pub const MAX_FREQUENCY: f64 = 300.0;

static NEXT_WAVE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique wave identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WaveId(u64);

impl WaveId {
    pub fn next() -> Self {
        WaveId(NEXT_WAVE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

// Decoded ids push the counter past themselves so `next` never hands them out again.
impl<'de> Deserialize<'de> for WaveId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = u64::deserialize(deserializer)?;
        NEXT_WAVE_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
        Ok(WaveId(id))
    }
}

impl Default for WaveId {
    fn default() -> Self {
        WaveId::next()
    }
}

impl fmt::Display for WaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wave-{}", self.0)
    }
}

/// Horizontal zoom used by the visual generator.
///
/// The two families read better at very different zoom levels; these are
/// rendering knobs, not physical constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualScale {
    /// Zoom for sine and square.
    pub angular_zoom: f64,
    /// Zoom for sawtooth and triangle.
    pub period_zoom: f64,
}

impl Default for VisualScale {
    fn default() -> Self {
        Self {
            angular_zoom: 10.0,
            period_zoom: 300.0,
        }
    }
}

impl VisualScale {
    fn zoom_for(&self, waveform: Waveform) -> f64 {
        match waveform.domain() {
            ShapeDomain::Angle => self.angular_zoom,
            ShapeDomain::Period => self.period_zoom,
        }
    }
}

/// A single oscillator.
///
/// `amplitude` and `muted` are owned by [`crate::collection::WaveCollection`],
/// which keeps them consistent with its normalization policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wave {
    #[serde(default)]
    id: WaveId,
    #[serde(default)]
    waveform: Waveform,
    frequency: f64,
    phase: f64,
    #[serde(default)]
    visual_phase: f64,
    #[serde(default)]
    amplitude: f64,
    #[serde(default)]
    muted: bool,
    #[serde(default)]
    is_playing: bool,
}

impl Wave {
    pub fn new(waveform: Waveform, frequency: f64, phase: f64) -> Self {
        Wave {
            id: WaveId::next(),
            waveform,
            frequency,
            phase,
            visual_phase: phase,
            amplitude: 0.0,
            muted: false,
            is_playing: false,
        }
    }

    /// A sine wave with a random frequency in the user range and a random phase.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let frequency = rng.random_range(MIN_FREQUENCY..MAX_FREQUENCY);
        let phase = rng.random_range(0.0..TAU);
        Wave::new(Waveform::Sine, frequency, phase)
    }

    pub fn id(&self) -> WaveId {
        self.id
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn visual_phase(&self) -> f64 {
        self.visual_phase
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase;
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    pub(crate) fn set_amplitude(&mut self, amplitude: f64) {
        self.amplitude = amplitude;
    }

    pub(crate) fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub(crate) fn reassign_id(&mut self) {
        self.id = WaveId::next();
    }

    /// Audio-domain sample at `sample_time` seconds.
    pub fn audio_sample(&self, sample_time: f64) -> f64 {
        let x = match self.waveform.domain() {
            ShapeDomain::Angle => TAU * self.frequency * sample_time + self.phase,
            ShapeDomain::Period => self.frequency * sample_time,
        };
        self.waveform.evaluate(x) * self.amplitude
    }

    /// Visual-domain sample for pixel column `x` of a canvas `canvas_width` wide.
    pub fn sample(&self, x: f64, canvas_width: f64, sample_rate: f64) -> f64 {
        self.sample_with(x, canvas_width, sample_rate, &VisualScale::default())
    }

    /// Visual-domain sample with explicit zoom constants.
    pub fn sample_with(
        &self,
        x: f64,
        canvas_width: f64,
        sample_rate: f64,
        scale: &VisualScale,
    ) -> f64 {
        let span = (canvas_width * self.frequency / sample_rate) * scale.zoom_for(self.waveform);
        if !(span.is_finite() && span > 0.0) {
            return 0.0;
        }

        let position = match self.waveform.domain() {
            ShapeDomain::Angle => {
                let sample_number = x * self.frequency / span;
                (sample_number / sample_rate) * (self.frequency * TAU) + self.visual_phase
            }
            ShapeDomain::Period => {
                x * span / sample_rate + self.visual_phase * self.waveform.visual_phase_weight()
            }
        };
        self.waveform.evaluate(position) * self.amplitude
    }

    /// Advance the visual phase by one animation frame (no-op while stopped).
    pub fn update(&mut self) {
        if !self.is_playing {
            return;
        }
        self.visual_phase += self.waveform.visual_phase_step();
    }
}
