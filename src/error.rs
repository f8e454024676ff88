use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum WavesError {
    /// Adding a wave when the collection is already full.
    CapacityExceeded { capacity: usize },
    /// A wave index that does not exist in the collection.
    IndexOutOfRange { index: usize, len: usize },
    /// Removing the only remaining wave.
    LastWave,
    /// The audio output could not be opened or started.
    DeviceUnavailable(String),
    /// Synthesizing a new loop buffer failed; the previous buffer stays live.
    RegenerationFailed(String),
    /// A serialized wave snapshot could not be decoded.
    InvalidSnapshot(String),
}

impl fmt::Display for WavesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WavesError::CapacityExceeded { capacity } => {
                write!(f, "Wave capacity exceeded: at most {capacity} waves")
            }
            WavesError::IndexOutOfRange { index, len } => {
                write!(f, "Wave index {index} out of range (collection has {len})")
            }
            WavesError::LastWave => write!(f, "Cannot remove the last remaining wave"),
            WavesError::DeviceUnavailable(msg) => write!(f, "Audio device unavailable: {msg}"),
            WavesError::RegenerationFailed(msg) => write!(f, "Loop regeneration failed: {msg}"),
            WavesError::InvalidSnapshot(msg) => write!(f, "Invalid wave snapshot: {msg}"),
        }
    }
}

impl std::error::Error for WavesError {}

impl From<serde_json::Error> for WavesError {
    fn from(e: serde_json::Error) -> Self {
        WavesError::InvalidSnapshot(e.to_string())
    }
}
