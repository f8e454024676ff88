//! WaveCollection — the ordered oscillator set and its amplitude policy.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::WavesError;
use crate::wave::Wave;

/// Maximum number of waves in a collection.
pub const MAX_WAVES: usize = 4;
/// Upper bound of the global volume knob.
pub const MAX_GLOBAL_VOLUME: f64 = 1.5;
/// Amplitude given to a wave when it is the only one sounding.
pub const SOLO_AMPLITUDE: f64 = 0.5;

/// Numeric wave parameters a user can set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveProperty {
    Frequency,
    Phase,
}

/// Ordered set of 1..=4 waves plus the global mix controls.
///
/// Deserializing goes through [`WaveCollection::from_waves`] and
/// [`WaveCollection::set_global_volume`], so a decoded collection always
/// satisfies the same invariants as one built by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CollectionSnapshot")]
pub struct WaveCollection {
    waves: Vec<Wave>,
    global_volume: f64,
    global_bypass: bool,
}

/// Wire shape of a collection before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSnapshot {
    waves: Vec<Wave>,
    #[serde(default = "unity_volume")]
    global_volume: f64,
    #[serde(default)]
    global_bypass: bool,
}

fn unity_volume() -> f64 {
    1.0
}

impl TryFrom<CollectionSnapshot> for WaveCollection {
    type Error = WavesError;

    fn try_from(snapshot: CollectionSnapshot) -> Result<Self, Self::Error> {
        let mut collection = WaveCollection::from_waves(snapshot.waves)?;
        collection.set_global_volume(snapshot.global_volume);
        collection.global_bypass = snapshot.global_bypass;
        Ok(collection)
    }
}

impl WaveCollection {
    /// A collection holding a single wave.
    pub fn with_wave(wave: Wave) -> Self {
        let mut collection = WaveCollection {
            waves: vec![wave],
            global_volume: 1.0,
            global_bypass: false,
        };
        collection.update_amplitudes();
        collection
    }

    /// A collection holding one random sine wave.
    pub fn new_random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_wave(Wave::random(rng))
    }

    /// Rebuild a collection from a wave snapshot, re-deriving every amplitude.
    /// Waves sharing an id with an earlier wave get a fresh one.
    pub fn from_waves(mut waves: Vec<Wave>) -> Result<Self, WavesError> {
        if waves.is_empty() || waves.len() > MAX_WAVES {
            return Err(WavesError::InvalidSnapshot(format!(
                "expected 1 to {MAX_WAVES} waves, got {}",
                waves.len()
            )));
        }
        for i in 1..waves.len() {
            let id = waves[i].id();
            if waves[..i].iter().any(|w| w.id() == id) {
                waves[i].reassign_id();
            }
        }
        let mut collection = WaveCollection {
            waves,
            global_volume: 1.0,
            global_bypass: false,
        };
        collection.update_amplitudes();
        Ok(collection)
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.waves.len() >= MAX_WAVES
    }

    pub fn get(&self, index: usize) -> Option<&Wave> {
        self.waves.get(index)
    }

    pub fn global_volume(&self) -> f64 {
        self.global_volume
    }

    pub fn is_bypassed(&self) -> bool {
        self.global_bypass
    }

    /// Independent copy of the waves for the loop builder.
    pub fn snapshot(&self) -> Vec<Wave> {
        self.waves.clone()
    }

    pub fn add_wave(&mut self, wave: Wave) -> Result<(), WavesError> {
        if self.is_full() {
            return Err(WavesError::CapacityExceeded { capacity: MAX_WAVES });
        }
        self.waves.push(wave);
        self.update_amplitudes();
        Ok(())
    }

    /// Remove the wave at `index`. The last remaining wave cannot be removed.
    pub fn remove_wave(&mut self, index: usize) -> Result<Wave, WavesError> {
        self.check_index(index)?;
        if self.waves.len() == 1 {
            return Err(WavesError::LastWave);
        }
        let removed = self.waves.remove(index);
        self.update_amplitudes();
        Ok(removed)
    }

    pub fn set_muted(&mut self, index: usize, muted: bool) -> Result<(), WavesError> {
        self.check_index(index)?;
        self.waves[index].set_muted(muted);
        self.update_amplitudes();
        Ok(())
    }

    /// Flip the mute flag of the wave at `index`, returning the new state.
    pub fn toggle_mute(&mut self, index: usize) -> Result<bool, WavesError> {
        self.check_index(index)?;
        let muted = !self.waves[index].is_muted();
        self.set_muted(index, muted)?;
        Ok(muted)
    }

    pub fn update_wave(
        &mut self,
        index: usize,
        property: WaveProperty,
        value: f64,
    ) -> Result<(), WavesError> {
        self.check_index(index)?;
        let wave = &mut self.waves[index];
        match property {
            WaveProperty::Frequency => wave.set_frequency(value),
            WaveProperty::Phase => wave.set_phase(value),
        }
        Ok(())
    }

    pub fn set_waveform(&mut self, index: usize, waveform: Waveform) -> Result<(), WavesError> {
        self.check_index(index)?;
        self.waves[index].set_waveform(waveform);
        Ok(())
    }

    /// Clamp to [0, 1.5] and round to two decimals. Non-finite values are ignored.
    pub fn set_global_volume(&mut self, value: f64) {
        if !value.is_finite() {
            log::warn!("Ignoring non-finite global volume {value}");
            return;
        }
        let clamped = value.clamp(0.0, MAX_GLOBAL_VOLUME);
        self.global_volume = (clamped * 100.0).round() / 100.0;
    }

    /// Flip the bypass flag, returning the new state.
    pub fn toggle_global_bypass(&mut self) -> bool {
        self.global_bypass = !self.global_bypass;
        self.global_bypass
    }

    /// Mirror the transport state onto every wave's visual animation flag.
    pub fn set_playing(&mut self, playing: bool) {
        for wave in &mut self.waves {
            wave.set_playing(playing);
        }
    }

    /// Sum of every wave's visual-domain sample at pixel column `x`.
    pub fn preview_sample(&self, x: f64, canvas_width: f64, sample_rate: f64) -> f64 {
        self.waves
            .iter()
            .map(|w| w.sample(x, canvas_width, sample_rate))
            .sum()
    }

    /// Advance every wave's visual phase by one animation frame.
    pub fn advance_visuals(&mut self) {
        for wave in &mut self.waves {
            wave.update();
        }
    }

    /// Re-derive every amplitude from the mute flags.
    ///
    /// No active waves: all zero. One active wave: 0.5. Otherwise each
    /// active wave gets `1 / active` and muted waves get zero.
    pub fn update_amplitudes(&mut self) {
        let active = self.waves.iter().filter(|w| !w.is_muted()).count();
        let shared = match active {
            0 => 0.0,
            1 => SOLO_AMPLITUDE,
            n => 1.0 / n as f64,
        };
        for wave in &mut self.waves {
            let amplitude = if wave.is_muted() { 0.0 } else { shared };
            wave.set_amplitude(amplitude);
        }
    }

    fn check_index(&self, index: usize) -> Result<(), WavesError> {
        if index >= self.waves.len() {
            return Err(WavesError::IndexOutOfRange {
                index,
                len: self.waves.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sine(frequency: f64) -> Wave {
        Wave::new(Waveform::Sine, frequency, 0.0)
    }

    fn active_sum(c: &WaveCollection) -> f64 {
        c.waves()
            .iter()
            .filter(|w| !w.is_muted())
            .map(|w| w.amplitude())
            .sum()
    }

    fn expected_sum(c: &WaveCollection) -> f64 {
        match c.waves().iter().filter(|w| !w.is_muted()).count() {
            0 => 0.0,
            1 => 0.5,
            _ => 1.0,
        }
    }

    #[test]
    fn single_default_wave_gets_half_amplitude() {
        let c = WaveCollection::with_wave(sine(200.0));
        assert_eq!(c.waves()[0].amplitude(), 0.5);
        assert_eq!(c.global_volume(), 1.0);
        assert!(!c.is_bypassed());
    }

    #[test]
    fn two_unmuted_waves_split_evenly() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(150.0)).unwrap();
        assert_eq!(c.waves()[0].amplitude(), 0.5);
        assert_eq!(c.waves()[1].amplitude(), 0.5);
    }

    #[test]
    fn muting_one_of_two_leaves_solo_amplitude() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(150.0)).unwrap();
        c.set_muted(0, true).unwrap();
        assert_eq!(c.waves()[0].amplitude(), 0.0);
        assert_eq!(c.waves()[1].amplitude(), 0.5);
    }

    #[test]
    fn all_muted_is_silent() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(150.0)).unwrap();
        c.set_muted(0, true).unwrap();
        c.set_muted(1, true).unwrap();
        assert!(c.waves().iter().all(|w| w.amplitude() == 0.0));
    }

    #[test]
    fn three_and_four_waves_share_unity() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(120.0)).unwrap();
        c.add_wave(sine(140.0)).unwrap();
        assert!((c.waves()[2].amplitude() - 1.0 / 3.0).abs() < 1e-12);
        c.add_wave(sine(160.0)).unwrap();
        assert!(c.waves().iter().all(|w| w.amplitude() == 0.25));
    }

    #[test]
    fn normalization_holds_through_random_edit_sequences() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut c = WaveCollection::new_random(&mut rng);
        for _ in 0..500 {
            let len = c.len();
            match rng.random_range(0..3) {
                0 => {
                    let _ = c.add_wave(Wave::random(&mut rng));
                }
                1 => {
                    let _ = c.remove_wave(rng.random_range(0..len));
                }
                _ => {
                    c.toggle_mute(rng.random_range(0..len)).unwrap();
                }
            }
            assert!((1..=MAX_WAVES).contains(&c.len()));
            assert!((active_sum(&c) - expected_sum(&c)).abs() < 1e-12);
            assert!(c.waves().iter().filter(|w| w.is_muted()).all(|w| w.amplitude() == 0.0));
        }
    }

    #[test]
    fn fifth_wave_is_rejected_without_change() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        for f in [120.0, 140.0, 160.0] {
            c.add_wave(sine(f)).unwrap();
        }
        let before: Vec<_> = c.waves().iter().map(|w| w.id()).collect();
        let err = c.add_wave(sine(180.0)).unwrap_err();
        assert_eq!(err, WavesError::CapacityExceeded { capacity: 4 });
        assert_eq!(c.len(), 4);
        let after: Vec<_> = c.waves().iter().map(|w| w.id()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn invalid_index_is_reported_without_change() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(150.0)).unwrap();
        assert_eq!(
            c.remove_wave(2).unwrap_err(),
            WavesError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert!(c.set_muted(7, true).is_err());
        assert!(c.update_wave(3, WaveProperty::Phase, 1.0).is_err());
        assert!(c.set_waveform(9, Waveform::Square).is_err());
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn last_wave_cannot_be_removed() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        assert_eq!(c.remove_wave(0).unwrap_err(), WavesError::LastWave);
        assert_eq!(c.len(), 1);
        assert_eq!(c.waves()[0].amplitude(), 0.5);
    }

    #[test]
    fn remove_rebalances_remaining_waves() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(150.0)).unwrap();
        c.add_wave(sine(200.0)).unwrap();
        let removed = c.remove_wave(1).unwrap();
        assert_eq!(removed.frequency(), 150.0);
        assert!(c.waves().iter().all(|w| w.amplitude() == 0.5));
    }

    #[test]
    fn update_wave_sets_frequency_and_phase_only() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.update_wave(0, WaveProperty::Frequency, 275.0).unwrap();
        c.update_wave(0, WaveProperty::Phase, 1.5).unwrap();
        let w = &c.waves()[0];
        assert_eq!(w.frequency(), 275.0);
        assert_eq!(w.phase(), 1.5);
        assert_eq!(w.amplitude(), 0.5);
    }

    #[test]
    fn global_volume_is_clamped_and_rounded() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.set_global_volume(0.456);
        assert_eq!(c.global_volume(), 0.46);
        c.set_global_volume(3.0);
        assert_eq!(c.global_volume(), 1.5);
        c.set_global_volume(-1.0);
        assert_eq!(c.global_volume(), 0.0);
        c.set_global_volume(f64::NAN);
        assert_eq!(c.global_volume(), 0.0);
    }

    #[test]
    fn bypass_does_not_touch_amplitudes() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        assert!(c.toggle_global_bypass());
        assert_eq!(c.waves()[0].amplitude(), 0.5);
        assert!(!c.toggle_global_bypass());
    }

    #[test]
    fn snapshot_is_detached_from_later_edits() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        let snapshot = c.snapshot();
        c.update_wave(0, WaveProperty::Frequency, 250.0).unwrap();
        assert_eq!(snapshot[0].frequency(), 100.0);
    }

    #[test]
    fn preview_sums_visual_samples() {
        let mut c = WaveCollection::with_wave(Wave::new(Waveform::Square, 100.0, 1.0));
        c.add_wave(Wave::new(Waveform::Square, 100.0, 1.0)).unwrap();
        // Both squares are positive at x = 0 with phase 1.0: 0.5 + 0.5.
        assert!((c.preview_sample(0.0, 600.0, 44100.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn advance_visuals_follows_playing_flag() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.advance_visuals();
        assert_eq!(c.waves()[0].visual_phase(), 0.0);
        c.set_playing(true);
        c.advance_visuals();
        assert!(c.waves()[0].visual_phase() > 0.0);
    }

    #[test]
    fn from_waves_renormalizes_snapshot() {
        let json = r#"[
            {"frequency": 100.0, "phase": 0.0, "amplitude": 0.9},
            {"frequency": 200.0, "phase": 0.0, "muted": true, "amplitude": 0.9}
        ]"#;
        let waves: Vec<Wave> = serde_json::from_str(json).unwrap();
        let c = WaveCollection::from_waves(waves).unwrap();
        assert_eq!(c.waves()[0].amplitude(), 0.5);
        assert_eq!(c.waves()[1].amplitude(), 0.0);
    }

    #[test]
    fn from_waves_rejects_bad_counts() {
        assert!(WaveCollection::from_waves(Vec::new()).is_err());
        let five = (0..5).map(|i| sine(100.0 + i as f64)).collect();
        assert!(WaveCollection::from_waves(five).is_err());
    }

    #[test]
    fn decoding_rejects_bad_counts() {
        let empty = r#"{"waves": [], "globalVolume": 1.0, "globalBypass": false}"#;
        assert!(serde_json::from_str::<WaveCollection>(empty).is_err());

        let wave = r#"{"frequency": 100.0, "phase": 0.0, "amplitude": 1.0}"#;
        let five = format!(r#"{{"waves": [{wave},{wave},{wave},{wave},{wave}]}}"#);
        assert!(serde_json::from_str::<WaveCollection>(&five).is_err());
    }

    #[test]
    fn decoding_renormalizes_and_clamps_volume() {
        let json = r#"{
            "waves": [
                {"frequency": 100.0, "phase": 0.0, "amplitude": 1.0},
                {"frequency": 150.0, "phase": 0.0, "amplitude": 1.0},
                {"frequency": 200.0, "phase": 0.0, "amplitude": 1.0}
            ],
            "globalVolume": 9.0,
            "globalBypass": true
        }"#;
        let c: WaveCollection = serde_json::from_str(json).unwrap();
        assert_eq!(c.global_volume(), MAX_GLOBAL_VOLUME);
        assert!(c.is_bypassed());
        assert!((active_sum(&c) - 1.0).abs() < 1e-12);

        let quiet: WaveCollection =
            serde_json::from_str(r#"{"waves": [{"frequency": 90.0, "phase": 0.0}], "globalVolume": 0.456}"#)
                .unwrap();
        assert_eq!(quiet.global_volume(), 0.46);
        assert_eq!(quiet.waves()[0].amplitude(), SOLO_AMPLITUDE);
    }

    #[test]
    fn serialized_collection_decodes_back() {
        let mut c = WaveCollection::with_wave(sine(100.0));
        c.add_wave(sine(180.0)).unwrap();
        c.set_global_volume(0.7);
        let json = serde_json::to_string(&c).unwrap();
        let back: WaveCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.global_volume(), 0.7);
        assert_eq!(back.waves()[1].amplitude(), 0.5);
    }

    #[test]
    fn duplicate_ids_in_a_snapshot_are_replaced() {
        let json = r#"[
            {"id": 7, "frequency": 100.0, "phase": 0.0},
            {"id": 7, "frequency": 200.0, "phase": 0.0}
        ]"#;
        let waves: Vec<Wave> = serde_json::from_str(json).unwrap();
        let c = WaveCollection::from_waves(waves).unwrap();
        assert_ne!(c.waves()[0].id(), c.waves()[1].id());
    }
}
