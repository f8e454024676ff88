//! Native audio output via cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::backend::{OutputBackend, OutputInfo};
use super::bus::BusRenderer;
use crate::config::EngineConfig;
use crate::error::WavesError;

/// Channels requested from the device; the mono bus is copied to both.
const PREFERRED_CHANNELS: u16 = 2;

/// Output backend that runs the bus renderer inside a cpal stream callback.
pub struct CpalOutput {
    device_name: Option<String>,
    sample_rate: u32,
    buffer_size: Option<u32>,
    stream: Option<cpal::Stream>,
}

impl CpalOutput {
    pub fn new(config: &EngineConfig) -> Self {
        CpalOutput {
            device_name: config.device_name.clone(),
            sample_rate: config.sample_rate,
            buffer_size: config.buffer_size,
            stream: None,
        }
    }
}

impl OutputBackend for CpalOutput {
    fn open(&mut self, mut renderer: BusRenderer) -> Result<OutputInfo, WavesError> {
        self.close();

        let device = get_output_device(self.device_name.as_deref())?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let stream_config = get_supported_config(&device, self.sample_rate, self.buffer_size)?;

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels;
        renderer.configure(sample_rate);

        log::info!(
            "CpalOutput: opening '{}' at {} Hz, {} channels",
            name,
            sample_rate,
            channels
        );

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer.render(data, channels as usize);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| unavailable("Failed to build output stream", e))?;

        stream
            .play()
            .map_err(|e| unavailable("Failed to start stream", e))?;

        self.stream = Some(stream);
        Ok(OutputInfo {
            sample_rate,
            channels,
            device_name: name,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("CpalOutput: failed to pause stream: {}", e);
            }
            log::info!("CpalOutput: closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> WavesError {
    WavesError::DeviceUnavailable(format!("{context}: {err}"))
}

/// Output device by name, or the host default.
fn get_output_device(name: Option<&str>) -> Result<cpal::Device, WavesError> {
    let host = cpal::default_host();

    match name {
        Some(device_name) => {
            let devices = host
                .output_devices()
                .map_err(|e| unavailable("Failed to enumerate devices", e))?;

            for device in devices {
                if let Ok(n) = device.name() {
                    if n == device_name {
                        return Ok(device);
                    }
                }
            }
            Err(WavesError::DeviceUnavailable(format!(
                "Device '{device_name}' not found"
            )))
        }
        None => host
            .default_output_device()
            .ok_or_else(|| WavesError::DeviceUnavailable("No default output device found".into())),
    }
}

/// Stream config at the preferred rate if the device supports it, else the
/// device default.
fn get_supported_config(
    device: &cpal::Device,
    sample_rate: u32,
    buffer_size: Option<u32>,
) -> Result<cpal::StreamConfig, WavesError> {
    let supported_configs = device
        .supported_output_configs()
        .map_err(|e| unavailable("Failed to get supported configs", e))?;

    let buffer_size = match buffer_size {
        Some(frames) => cpal::BufferSize::Fixed(frames),
        None => cpal::BufferSize::Default,
    };

    for config in supported_configs {
        if config.sample_format() == cpal::SampleFormat::F32
            && sample_rate >= config.min_sample_rate().0
            && sample_rate <= config.max_sample_rate().0
            && config.channels() >= PREFERRED_CHANNELS
        {
            return Ok(cpal::StreamConfig {
                channels: PREFERRED_CHANNELS,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size,
            });
        }
    }

    let default_config = device
        .default_output_config()
        .map_err(|e| unavailable("Failed to get default config", e))?;

    Ok(cpal::StreamConfig {
        channels: default_config.channels().min(PREFERRED_CHANNELS),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}
