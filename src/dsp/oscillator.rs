//! Waveform shapes shared by the audio and visual sample generators.
//!
//! Sine and square are evaluated from an angle in radians; sawtooth and
//! triangle from a position measured in periods. Each generator only decides
//! how to build that argument, the shape math lives here once.

use serde::{Deserialize, Serialize};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// How a waveform interprets its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeDomain {
    /// Argument is an angle in radians.
    Angle,
    /// Argument is a position in periods (1.0 = one full cycle).
    Period,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn domain(self) -> ShapeDomain {
        match self {
            Waveform::Sine | Waveform::Square => ShapeDomain::Angle,
            Waveform::Sawtooth | Waveform::Triangle => ShapeDomain::Period,
        }
    }

    /// Evaluate the unit-amplitude shape at `x` (radians or periods, see [`ShapeDomain`]).
    pub fn evaluate(self, x: f64) -> f64 {
        match self {
            Waveform::Sine => x.sin(),
            Waveform::Square => sign(x.sin()),
            Waveform::Sawtooth => 2.0 * frac(x) - 1.0,
            Waveform::Triangle => {
                let p = frac(x);
                4.0 * (p - (p + 0.75).floor() + 0.25).abs() - 1.0
            }
        }
    }

    /// Visual phase increment applied per animation frame while playing.
    pub fn visual_phase_step(self) -> f64 {
        match self {
            Waveform::Sine | Waveform::Square => 0.03,
            Waveform::Sawtooth => 0.005,
            Waveform::Triangle => 0.002,
        }
    }

    /// Multiplier on the visual phase when building a period position.
    pub(crate) fn visual_phase_weight(self) -> f64 {
        match self {
            Waveform::Triangle => 2.0,
            _ => 1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

/// Fractional part wrapped into [0, 1), also for negative inputs.
pub fn frac(x: f64) -> f64 {
    let r = x.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if r >= 1.0 { 0.0 } else { r }
}

/// Sign that maps zero to zero (unlike `f64::signum`).
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
