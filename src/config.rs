//! Engine configuration — synthesis, loop and playback timing constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WavesError;

/// Longest loop buffer the builder will synthesize, in seconds.
pub const MAX_DURATION_SECS: f64 = 600.0;
/// Highest synthesis sample rate accepted, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Tunables for the loop builder and the playback controller.
///
/// Every field has a default, so a host only needs to override what it cares
/// about: `EngineConfig::from_json(r#"{"durationSecs": 2.0}"#)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sample rate the loop buffer is synthesized at.
    pub sample_rate: u32,
    /// Length of the synthesized loop buffer in seconds.
    pub duration_secs: f64,
    /// Linear fade applied to both buffer edges, in seconds.
    pub fade_secs: f64,
    /// Window before the buffer end where the loop-point search starts.
    pub loop_search_secs: f64,
    /// Quiet period before a burst of edits triggers one rebuild.
    pub debounce_ms: u64,
    /// Gain ramp used for stop, bypass, volume changes and cold starts.
    pub fade_ramp_secs: f64,
    /// Ramp down before a rebuild is swapped in.
    pub regen_fade_out_secs: f64,
    /// Ramp back up to the global volume after a rebuild is installed.
    pub regen_fade_in_secs: f64,
    /// Output device name; `None` picks the host default.
    pub device_name: Option<String>,
    /// Preferred device buffer size in frames.
    pub buffer_size: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            duration_secs: 10.0,
            fade_secs: 0.01,
            loop_search_secs: 0.00001,
            debounce_ms: 100,
            fade_ramp_secs: 0.03,
            regen_fade_out_secs: 0.05,
            regen_fade_in_secs: 0.2,
            device_name: None,
            buffer_size: None,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON object on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, WavesError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject buffer dimensions the builder cannot allocate.
    pub fn validate(&self) -> Result<(), WavesError> {
        if !(self.duration_secs.is_finite()
            && self.duration_secs > 0.0
            && self.duration_secs <= MAX_DURATION_SECS)
        {
            return Err(WavesError::InvalidSnapshot(format!(
                "durationSecs must be in (0, {MAX_DURATION_SECS}], got {}",
                self.duration_secs
            )));
        }
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(WavesError::InvalidSnapshot(format!(
                "sampleRate must be in 1..={MAX_SAMPLE_RATE}, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Number of samples in one synthesized buffer.
    pub fn buffer_len(&self) -> usize {
        (self.duration_secs * self.sample_rate as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_timing() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_len(), 441_000);
        assert_eq!(config.debounce(), Duration::from_millis(100));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json(r#"{"durationSecs": 2.5, "deviceName": "Speakers"}"#)
            .expect("config should parse");
        assert_eq!(config.duration_secs, 2.5);
        assert_eq!(config.device_name.as_deref(), Some("Speakers"));
        assert_eq!(config.fade_secs, 0.01);
    }

    #[test]
    fn oversized_or_invalid_durations_are_rejected() {
        for json in [
            r#"{"durationSecs": 1e300}"#,
            r#"{"durationSecs": 601.0}"#,
            r#"{"durationSecs": 0.0}"#,
            r#"{"durationSecs": -2.0}"#,
            r#"{"sampleRate": 0}"#,
            r#"{"sampleRate": 4000000000}"#,
        ] {
            let err = EngineConfig::from_json(json).unwrap_err();
            assert!(matches!(err, WavesError::InvalidSnapshot(_)), "{json} accepted");
        }
        assert!(EngineConfig::from_json(r#"{"durationSecs": 600.0}"#).is_ok());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = EngineConfig::from_json("{ durationSecs: ").unwrap_err();
        assert!(matches!(err, WavesError::InvalidSnapshot(_)));
    }
}
