//! Playback — the real-time side of the engine.
//!
//! The controller runs on the control thread and talks to the audio callback
//! only through the bus; the callback never sees the wave collection.

pub mod backend;
pub mod bus;
pub mod controller;
pub mod debounce;
#[cfg(feature = "device")]
pub mod device;

pub use backend::{OfflineOutput, OutputBackend, OutputInfo};
pub use controller::{PlaybackController, PlaybackState};
#[cfg(feature = "device")]
pub use device::CpalOutput;
