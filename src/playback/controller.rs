//! PlaybackController — transport state machine and the regeneration pipeline.
//!
//! The controller is the single writer of the [`WaveCollection`]. Every edit
//! that changes the audio bumps an edit epoch and, while audible, re-arms the
//! debouncer. When the debouncer fires the output ramps down, a worker thread
//! builds a new [`LoopBuffer`] from a snapshot, and [`PlaybackController::tick`]
//! installs it and ramps back up. Results from an older epoch are dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::backend::OutputBackend;
use super::bus::{self, AfterRamp, BusHandle};
use super::debounce::Debouncer;
use crate::collection::{WaveCollection, WaveProperty};
use crate::config::EngineConfig;
use crate::dsp::loop_buffer::{LoopBuffer, LoopBufferBuilder};
use crate::dsp::oscillator::Waveform;
use crate::dsp::ramp::SILENT_GAIN;
use crate::error::WavesError;
use crate::wave::Wave;

/// Transport state as seen by a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    /// Playing, with output suppressed by the global bypass.
    Bypassed,
}

struct Rebuild {
    epoch: u64,
    handle: JoinHandle<Result<LoopBuffer, WavesError>>,
}

pub struct PlaybackController<B: OutputBackend> {
    config: EngineConfig,
    builder: LoopBufferBuilder,
    collection: WaveCollection,
    backend: B,
    bus: Option<BusHandle>,
    playing: bool,
    debouncer: Debouncer,
    /// Bumped by every edit that changes the synthesized audio.
    epoch: u64,
    rebuild: Option<Rebuild>,
    /// A buffer has been sent to the bus since the last stop.
    has_buffer: bool,
    /// The installed buffer predates an edit made while bypassed.
    stale: bool,
    /// Output was faded down for a rebuild that has not been installed yet.
    faded_for_rebuild: bool,
}

impl<B: OutputBackend> PlaybackController<B> {
    pub fn new(config: EngineConfig, collection: WaveCollection, backend: B) -> Self {
        PlaybackController {
            builder: LoopBufferBuilder::from_config(&config),
            debouncer: Debouncer::new(config.debounce()),
            config,
            collection,
            backend,
            bus: None,
            playing: false,
            epoch: 0,
            rebuild: None,
            has_buffer: false,
            stale: false,
            faded_for_rebuild: false,
        }
    }

    pub fn collection(&self) -> &WaveCollection {
        &self.collection
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> PlaybackState {
        match (self.playing, self.collection.is_bypassed()) {
            (false, _) => PlaybackState::Stopped,
            (true, false) => PlaybackState::Playing,
            (true, true) => PlaybackState::Bypassed,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Output gain as last published by the audio callback.
    pub fn output_gain(&self) -> f32 {
        self.bus.as_ref().map_or(0.0, |bus| bus.gain())
    }

    /// Whether the audio callback currently holds a buffer.
    pub fn has_active_source(&self) -> bool {
        self.bus.as_ref().is_some_and(|bus| bus.has_source())
    }

    /// Buffers installed on the current output since it was opened.
    pub fn install_count(&self) -> u64 {
        self.bus.as_ref().map_or(0, |bus| bus.install_count())
    }

    /// When the pending regeneration will fire, if one is scheduled.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn is_regenerating(&self) -> bool {
        self.rebuild.is_some()
    }

    /// One animation frame: advance every wave's visual phase.
    pub fn advance_visuals(&mut self) {
        self.collection.advance_visuals();
    }

    // ── Edits ────────────────────────────────────────────────

    pub fn add_wave(&mut self, mut wave: Wave) -> Result<(), WavesError> {
        wave.set_playing(self.playing);
        self.collection.add_wave(wave)?;
        self.mark_dirty(Instant::now());
        Ok(())
    }

    pub fn remove_wave(&mut self, index: usize) -> Result<Wave, WavesError> {
        let removed = self.collection.remove_wave(index)?;
        self.mark_dirty(Instant::now());
        Ok(removed)
    }

    pub fn set_muted(&mut self, index: usize, muted: bool) -> Result<(), WavesError> {
        self.collection.set_muted(index, muted)?;
        self.mark_dirty(Instant::now());
        Ok(())
    }

    pub fn toggle_mute(&mut self, index: usize) -> Result<bool, WavesError> {
        let muted = self.collection.toggle_mute(index)?;
        self.mark_dirty(Instant::now());
        Ok(muted)
    }

    pub fn update_wave(
        &mut self,
        index: usize,
        property: WaveProperty,
        value: f64,
    ) -> Result<(), WavesError> {
        self.collection.update_wave(index, property, value)?;
        self.mark_dirty(Instant::now());
        Ok(())
    }

    pub fn set_waveform(&mut self, index: usize, waveform: Waveform) -> Result<(), WavesError> {
        self.collection.set_waveform(index, waveform)?;
        self.mark_dirty(Instant::now());
        Ok(())
    }

    /// Volume is applied on the bus, so it ramps without a rebuild.
    pub fn set_global_volume(&mut self, value: f64) {
        self.collection.set_global_volume(value);
        // A pending rebuild ramps up to the new volume when it lands.
        if self.is_audible() && !self.faded_for_rebuild {
            self.ramp(self.target_gain(), self.config.fade_ramp_secs, AfterRamp::Hold);
        }
    }

    /// Flip the global bypass, returning the new state.
    ///
    /// Turning bypass off while playing may need the output or a fresh
    /// buffer, which is where the error cases come from.
    pub fn toggle_global_bypass(&mut self) -> Result<bool, WavesError> {
        let bypassed = self.collection.toggle_global_bypass();
        log::info!("PlaybackController: bypass {}", if bypassed { "on" } else { "off" });

        if !self.playing {
            return Ok(bypassed);
        }

        if bypassed {
            if self.debouncer.is_pending() || self.rebuild.is_some() {
                self.stale = true;
            }
            self.debouncer.cancel();
            self.rebuild = None;
            self.faded_for_rebuild = false;
            self.ramp(SILENT_GAIN, self.config.fade_ramp_secs, AfterRamp::Hold);
        } else if self.stale || !self.has_buffer {
            self.rebuild_now()?;
        } else {
            self.ramp(self.target_gain(), self.config.fade_ramp_secs, AfterRamp::Hold);
        }
        Ok(bypassed)
    }

    // ── Transport ────────────────────────────────────────────

    /// Start playback. On error the controller stays stopped.
    pub fn play(&mut self) -> Result<(), WavesError> {
        if self.playing {
            return Ok(());
        }

        if self.collection.is_bypassed() {
            log::info!("PlaybackController: play (bypassed, output deferred)");
            self.set_transport(true);
            return Ok(());
        }

        log::info!("PlaybackController: play");
        self.debouncer.cancel();
        self.rebuild = None;
        self.ensure_output()?;
        let buffer = self.builder.build(&self.collection.snapshot())?;
        self.install(buffer, self.config.fade_ramp_secs)?;
        self.set_transport(true);
        Ok(())
    }

    /// Ramp out and release the source. Waves stop animating immediately.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        log::info!("PlaybackController: stop");
        self.set_transport(false);
        self.debouncer.cancel();
        self.rebuild = None;
        self.has_buffer = false;
        self.stale = false;
        self.faded_for_rebuild = false;
        self.ramp(SILENT_GAIN, self.config.fade_ramp_secs, AfterRamp::Release);
    }

    /// Stop and release the output device.
    pub fn shutdown(&mut self) {
        self.stop();
        if self.backend.is_open() {
            self.backend.close();
            log::info!("PlaybackController: output closed");
        }
        self.bus = None;
    }

    // ── Pipeline ─────────────────────────────────────────────

    /// Drive the pipeline: free retired buffers, fire the debouncer and
    /// install a finished rebuild. Call it from the host loop.
    pub fn tick(&mut self, now: Instant) -> Result<(), WavesError> {
        if let Some(bus) = &self.bus {
            bus.collect_retired();
        }
        if self.debouncer.fire(now) {
            self.start_rebuild()?;
        }
        self.poll_rebuild(false)
    }

    /// Fire any pending regeneration now and wait for it to be installed.
    pub fn flush(&mut self) -> Result<(), WavesError> {
        if let Some(bus) = &self.bus {
            bus.collect_retired();
        }
        if self.debouncer.is_pending() {
            self.debouncer.cancel();
            self.start_rebuild()?;
        }
        self.poll_rebuild(true)
    }

    fn is_audible(&self) -> bool {
        self.playing && !self.collection.is_bypassed()
    }

    fn target_gain(&self) -> f32 {
        self.collection.global_volume() as f32
    }

    fn mark_dirty(&mut self, now: Instant) {
        self.epoch += 1;
        if self.is_audible() {
            self.debouncer.schedule(now);
        } else if self.playing {
            self.stale = true;
        }
    }

    fn set_transport(&mut self, playing: bool) {
        self.playing = playing;
        self.collection.set_playing(playing);
    }

    fn ensure_output(&mut self) -> Result<(), WavesError> {
        if self.bus.is_some() && self.backend.is_open() {
            return Ok(());
        }

        let (handle, renderer) = bus::channel(SILENT_GAIN);
        match self.backend.open(renderer) {
            Ok(info) => {
                log::info!(
                    "PlaybackController: output '{}' open at {} Hz, {} channels",
                    info.device_name,
                    info.sample_rate,
                    info.channels
                );
                self.bus = Some(handle);
                self.has_buffer = false;
                Ok(())
            }
            Err(e) => {
                log::error!("PlaybackController: {}", e);
                self.bus = None;
                Err(e)
            }
        }
    }

    fn ramp(&self, target: f32, seconds: f64, then: AfterRamp) {
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.ramp(target, seconds, then) {
                log::error!("PlaybackController: {}", e);
            }
        }
    }

    /// Hand a buffer to the bus and fade up to the global volume.
    fn install(&mut self, buffer: LoopBuffer, fade_in_secs: f64) -> Result<(), WavesError> {
        let bus = self
            .bus
            .as_ref()
            .ok_or_else(|| WavesError::DeviceUnavailable("output is not open".into()))?;

        log::debug!(
            "PlaybackController: installing {} samples, loop end {}",
            buffer.len(),
            buffer.loop_end()
        );
        bus.install(Arc::new(buffer))?;
        if !self.collection.is_bypassed() {
            bus.ramp(self.target_gain(), fade_in_secs, AfterRamp::Hold)?;
        }
        self.has_buffer = true;
        self.stale = false;
        self.faded_for_rebuild = false;
        Ok(())
    }

    /// Synchronous rebuild used when bypass is lifted over a stale buffer.
    fn rebuild_now(&mut self) -> Result<(), WavesError> {
        if let Err(e) = self.ensure_output() {
            self.set_transport(false);
            return Err(e);
        }
        match self.builder.build(&self.collection.snapshot()) {
            Ok(buffer) => self.install(buffer, self.config.fade_ramp_secs),
            Err(e) => {
                log::error!("PlaybackController: regeneration failed: {}", e);
                self.faded_for_rebuild = false;
                if self.has_buffer {
                    self.ramp(self.target_gain(), self.config.fade_ramp_secs, AfterRamp::Hold);
                }
                Err(e)
            }
        }
    }

    fn start_rebuild(&mut self) -> Result<(), WavesError> {
        if !self.is_audible() {
            return Ok(());
        }

        log::debug!("PlaybackController: regenerating (edit {})", self.epoch);
        self.ramp(SILENT_GAIN, self.config.regen_fade_out_secs, AfterRamp::Hold);
        self.faded_for_rebuild = true;

        let builder = self.builder.clone();
        let snapshot = self.collection.snapshot();
        let spawned = thread::Builder::new()
            .name("loop-builder".into())
            .spawn(move || builder.build(&snapshot));

        match spawned {
            Ok(handle) => {
                self.rebuild = Some(Rebuild {
                    epoch: self.epoch,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                let err = WavesError::RegenerationFailed(format!("failed to spawn builder: {e}"));
                log::error!("PlaybackController: {}", err);
                self.faded_for_rebuild = false;
                self.ramp(self.target_gain(), self.config.regen_fade_in_secs, AfterRamp::Hold);
                Err(err)
            }
        }
    }

    fn poll_rebuild(&mut self, wait: bool) -> Result<(), WavesError> {
        let Some(rebuild) = self.rebuild.take() else {
            return Ok(());
        };
        if !wait && !rebuild.handle.is_finished() {
            self.rebuild = Some(rebuild);
            return Ok(());
        }

        let result = rebuild.handle.join().unwrap_or_else(|_| {
            Err(WavesError::RegenerationFailed("loop builder panicked".into()))
        });

        if rebuild.epoch != self.epoch || !self.is_audible() {
            log::debug!(
                "PlaybackController: discarding superseded rebuild (edit {}, now {})",
                rebuild.epoch,
                self.epoch
            );
            return Ok(());
        }

        match result {
            Ok(buffer) => self.install(buffer, self.config.regen_fade_in_secs),
            Err(e) => {
                log::error!("PlaybackController: regeneration failed: {}", e);
                // Keep the last good buffer: fade it back in.
                self.faded_for_rebuild = false;
                self.ramp(self.target_gain(), self.config.regen_fade_in_secs, AfterRamp::Hold);
                Err(e)
            }
        }
    }
}

impl<B: OutputBackend> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        if self.backend.is_open() {
            self.backend.close();
        }
    }
}
