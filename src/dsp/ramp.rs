//! Exponential gain ramps for click-free level changes.

/// Gain treated as silence. Exponential ramps cannot reach zero, so they
/// bottom out here and the output stage emits true silence at or below it.
pub const SILENT_GAIN: f32 = 0.0001;

/// A per-sample gain value that glides exponentially toward a target.
///
/// Internally tracked in f64 so long ramps do not drift before the final snap.
#[derive(Debug, Clone)]
pub struct GainRamp {
    value: f64,
    target: f64,
    /// Per-sample multiplier while ramping.
    factor: f64,
    /// Samples left in the current ramp.
    remaining: u32,
}

impl GainRamp {
    pub fn new(initial: f32) -> Self {
        let initial = initial.max(SILENT_GAIN) as f64;
        GainRamp {
            value: initial,
            target: initial,
            factor: 1.0,
            remaining: 0,
        }
    }

    pub fn value(&self) -> f32 {
        self.value as f32
    }

    pub fn target(&self) -> f32 {
        self.target as f32
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    /// Start a ramp from the current value to `target` over `samples` samples.
    /// A zero-length ramp jumps immediately.
    pub fn ramp_to(&mut self, target: f32, samples: u32) {
        let to = target.max(SILENT_GAIN) as f64;
        self.target = to;
        if samples == 0 {
            self.value = to;
            self.remaining = 0;
            self.factor = 1.0;
            return;
        }
        let from = self.value.max(SILENT_GAIN as f64);
        self.value = from;
        self.factor = (to / from).powf(1.0 / samples as f64);
        self.remaining = samples;
    }

    /// Current gain, then advance one sample.
    pub fn next_gain(&mut self) -> f32 {
        let out = self.value as f32;
        if self.remaining > 0 {
            self.remaining -= 1;
            self.value = if self.remaining == 0 {
                self.target
            } else {
                self.value * self.factor
            };
        }
        out
    }

    /// Gain to actually apply to audio: exact silence at the floor.
    pub fn audible(gain: f32) -> f32 {
        if gain <= SILENT_GAIN { 0.0 } else { gain }
    }
}

/// Convert a duration in seconds to a whole number of samples.
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> u32 {
    (seconds.max(0.0) * sample_rate as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_settled() {
        let mut ramp = GainRamp::new(0.8);
        assert!(!ramp.is_ramping());
        assert_eq!(ramp.next_gain(), 0.8);
        assert_eq!(ramp.next_gain(), 0.8);
    }

    #[test]
    fn zero_start_is_lifted_to_floor() {
        let ramp = GainRamp::new(0.0);
        assert_eq!(ramp.value(), SILENT_GAIN);
    }

    #[test]
    fn reaches_target_exactly_after_duration() {
        let mut ramp = GainRamp::new(1.0);
        ramp.ramp_to(SILENT_GAIN, 1323);
        for _ in 0..1323 {
            ramp.next_gain();
        }
        assert!(!ramp.is_ramping());
        assert_eq!(ramp.value(), SILENT_GAIN);
    }

    #[test]
    fn exponential_ramp_is_monotonic_and_never_steps() {
        let mut ramp = GainRamp::new(SILENT_GAIN);
        ramp.ramp_to(1.2, 8820);
        let mut last = ramp.next_gain();
        while ramp.is_ramping() {
            let g = ramp.next_gain();
            assert!(g >= last);
            // Per-sample ratio stays small: no clicks.
            assert!(g / last < 1.01);
            last = g;
        }
        assert_eq!(ramp.value(), 1.2);
    }

    #[test]
    fn halfway_point_is_geometric_mean() {
        let mut ramp = GainRamp::new(0.01);
        ramp.ramp_to(1.0, 1000);
        for _ in 0..500 {
            ramp.next_gain();
        }
        assert!((ramp.value() - 0.1).abs() < 1e-3);
    }

    #[test]
    fn zero_target_clamps_to_floor() {
        let mut ramp = GainRamp::new(0.5);
        ramp.ramp_to(0.0, 10);
        assert_eq!(ramp.target(), SILENT_GAIN);
    }

    #[test]
    fn retargeting_mid_ramp_starts_from_current_value() {
        let mut ramp = GainRamp::new(1.0);
        ramp.ramp_to(SILENT_GAIN, 100);
        for _ in 0..50 {
            ramp.next_gain();
        }
        let mid = ramp.value();
        ramp.ramp_to(1.0, 100);
        assert_eq!(ramp.next_gain(), mid);
    }

    #[test]
    fn zero_length_ramp_jumps() {
        let mut ramp = GainRamp::new(1.0);
        ramp.ramp_to(0.25, 0);
        assert_eq!(ramp.next_gain(), 0.25);
    }

    #[test]
    fn floor_is_emitted_as_silence() {
        assert_eq!(GainRamp::audible(SILENT_GAIN), 0.0);
        assert_eq!(GainRamp::audible(0.5), 0.5);
    }

    #[test]
    fn seconds_convert_to_samples() {
        assert_eq!(seconds_to_samples(0.03, 44100), 1323);
        assert_eq!(seconds_to_samples(-1.0, 44100), 0);
    }
}
