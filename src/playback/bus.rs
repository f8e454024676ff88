//! Mix bus shared between the control thread and the real-time callback.
//!
//! The control side holds a [`BusHandle`] and sends [`BusCommand`]s; the audio
//! callback owns the [`BusRenderer`] and drains them at the top of every
//! block. The renderer only ever reads an immutable, fully built
//! [`LoopBuffer`] behind an `Arc`. Buffers it lets go of are sent back to the
//! control thread so that freeing them never happens in the callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::dsp::loop_buffer::LoopBuffer;
use crate::dsp::ramp::{GainRamp, SILENT_GAIN, seconds_to_samples};
use crate::error::WavesError;

/// Retired buffers waiting for the control thread; the callback never blocks on it.
const RETIRED_CAPACITY: usize = 16;

/// What the renderer does once a ramp reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRamp {
    /// Keep the source installed.
    Hold,
    /// Retire the source (stop).
    Release,
}

#[derive(Debug)]
pub enum BusCommand {
    /// Make `buffer` the active source, looping from its start. If the gain
    /// is ramping down to silence the swap waits until the ramp completes.
    Install(Arc<LoopBuffer>),
    /// Ramp the output gain exponentially to `target` over `seconds`.
    Ramp {
        target: f32,
        seconds: f64,
        then: AfterRamp,
    },
}

/// Lock-free view of the renderer for observers on other threads.
#[derive(Debug)]
pub struct BusStatus {
    gain: AtomicU32,
    has_source: AtomicBool,
    installs: AtomicU64,
}

impl BusStatus {
    fn new(gain: f32) -> Self {
        BusStatus {
            gain: AtomicU32::new(gain.to_bits()),
            has_source: AtomicBool::new(false),
            installs: AtomicU64::new(0),
        }
    }

    /// Output gain at the end of the last rendered block.
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub fn has_source(&self) -> bool {
        self.has_source.load(Ordering::Acquire)
    }

    /// Number of buffers installed so far.
    pub fn install_count(&self) -> u64 {
        self.installs.load(Ordering::Acquire)
    }
}

/// Create a connected handle/renderer pair with the output at `initial_gain`.
pub fn channel(initial_gain: f32) -> (BusHandle, BusRenderer) {
    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_CAPACITY);
    let ramp = GainRamp::new(initial_gain);
    let status = Arc::new(BusStatus::new(ramp.value()));

    let handle = BusHandle {
        commands: command_tx,
        retired: retired_rx,
        status: Arc::clone(&status),
    };
    let renderer = BusRenderer {
        commands: command_rx,
        retired: retired_tx,
        status,
        source: None,
        held: None,
        position: 0.0,
        step: 1.0,
        output_rate: crate::config::EngineConfig::default().sample_rate,
        ramp,
        release_pending: false,
    };
    (handle, renderer)
}

/// Control-thread end of the bus.
#[derive(Debug)]
pub struct BusHandle {
    commands: Sender<BusCommand>,
    retired: Receiver<Arc<LoopBuffer>>,
    status: Arc<BusStatus>,
}

impl BusHandle {
    pub fn install(&self, buffer: Arc<LoopBuffer>) -> Result<(), WavesError> {
        self.send(BusCommand::Install(buffer))
    }

    pub fn ramp(&self, target: f32, seconds: f64, then: AfterRamp) -> Result<(), WavesError> {
        self.send(BusCommand::Ramp {
            target,
            seconds,
            then,
        })
    }

    fn send(&self, command: BusCommand) -> Result<(), WavesError> {
        self.commands
            .send(command)
            .map_err(|_| WavesError::DeviceUnavailable("output stream has shut down".into()))
    }

    /// Drop every buffer the renderer has let go of. Returns how many.
    pub fn collect_retired(&self) -> usize {
        self.retired.try_iter().count()
    }

    pub fn status(&self) -> &BusStatus {
        &self.status
    }

    pub fn gain(&self) -> f32 {
        self.status.gain()
    }

    pub fn has_source(&self) -> bool {
        self.status.has_source()
    }

    pub fn install_count(&self) -> u64 {
        self.status.install_count()
    }
}

/// Real-time end of the bus. Never allocates, locks or logs while rendering.
pub struct BusRenderer {
    commands: Receiver<BusCommand>,
    retired: Sender<Arc<LoopBuffer>>,
    status: Arc<BusStatus>,
    source: Option<Arc<LoopBuffer>>,
    /// Install waiting for a ramp-down to finish.
    held: Option<Arc<LoopBuffer>>,
    /// Read position in source samples.
    position: f64,
    /// Source samples advanced per output frame.
    step: f64,
    output_rate: u32,
    ramp: GainRamp,
    release_pending: bool,
}

impl BusRenderer {
    /// Set the output sample rate the renderer will be driven at.
    pub fn configure(&mut self, output_rate: u32) {
        self.output_rate = output_rate.max(1);
        self.update_step();
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Fill an interleaved block with `channels` channels.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.drain_commands();

        for frame in out.chunks_mut(channels.max(1)) {
            let gain = GainRamp::audible(self.ramp.next_gain());
            if !self.ramp.is_ramping() {
                self.settle();
            }
            let sample = self.next_sample() * gain;
            frame.fill(sample);
        }

        self.publish();
    }

    fn drain_commands(&mut self) {
        while self.held.is_none() {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply(&mut self, command: BusCommand) {
        match command {
            BusCommand::Install(buffer) => {
                self.release_pending = false;
                if self.ramp.is_ramping() && self.ramp.target() <= SILENT_GAIN {
                    self.held = Some(buffer);
                } else {
                    self.swap_in(buffer);
                }
            }
            BusCommand::Ramp {
                target,
                seconds,
                then,
            } => {
                let samples = seconds_to_samples(seconds, self.output_rate);
                self.ramp.ramp_to(target, samples);
                self.release_pending = then == AfterRamp::Release;
                if samples == 0 {
                    self.settle();
                }
            }
        }
    }

    /// Apply whatever was waiting on the current ramp to finish.
    fn settle(&mut self) {
        if self.release_pending {
            self.release_pending = false;
            if let Some(old) = self.source.take() {
                self.retire(old);
            }
        }
        if let Some(buffer) = self.held.take() {
            self.swap_in(buffer);
            self.drain_commands();
        }
    }

    fn swap_in(&mut self, buffer: Arc<LoopBuffer>) {
        let (start, _) = buffer.loop_region();
        if let Some(old) = self.source.replace(buffer) {
            self.retire(old);
        }
        self.position = start as f64;
        self.update_step();
        self.status.installs.fetch_add(1, Ordering::AcqRel);
        self.status.has_source.store(true, Ordering::Release);
    }

    fn retire(&self, buffer: Arc<LoopBuffer>) {
        // Full queue: the control thread is not collecting, drop it here instead.
        let _ = self.retired.try_send(buffer);
    }

    fn update_step(&mut self) {
        if let Some(source) = &self.source {
            self.step = source.sample_rate() as f64 / self.output_rate as f64;
        }
    }

    fn next_sample(&mut self) -> f32 {
        let Some(source) = self.source.as_ref() else {
            return 0.0;
        };
        let (start, end) = source.loop_region();
        let sample = source.read_interpolated(self.position);

        self.position += self.step;
        if self.position >= end as f64 {
            let span = (end - start) as f64;
            self.position = if span > 0.0 {
                start as f64 + (self.position - end as f64) % span
            } else {
                start as f64
            };
        }
        sample
    }

    fn publish(&self) {
        self.status
            .gain
            .store(self.ramp.value().to_bits(), Ordering::Relaxed);
        self.status
            .has_source
            .store(self.source.is_some(), Ordering::Release);
    }
}
