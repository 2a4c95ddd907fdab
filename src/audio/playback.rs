//! Speaker host using cpal.
//!
//! Opens the default output device and lets its callback pull frames from a
//! [`Scheduler`], which renders a new quantum whenever the previous one is used up.
//! The callback never locks or allocates; all state lives in the scheduler.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, SupportedStreamConfig};
use tracing::{debug, info, warn};

use super::util::{find_best_config, get_device_name, preferred_sample_rate};
use crate::worklet::Scheduler;

/// Default output device with its negotiated configuration.
pub struct OutputDevice {
    device: Device,
    config: SupportedStreamConfig,
}

impl OutputDevice {
    /// Open the default output device at its preferred sample rate.
    ///
    /// # Errors
    /// Returns an error if:
    /// - No output device is available
    /// - Failed to get supported output configurations
    /// - No F32 configuration is supported
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("No output device available")?;

        info!("Using output device: {}", get_device_name(&device));

        let device_rate = preferred_sample_rate(device.default_output_config());
        let supported_configs = device.supported_output_configs().context("Failed to get supported output configs")?;
        let config = find_best_config(supported_configs, device_rate)?;

        debug!("Audio playback config: {} Hz, {} channels, {:?}", config.sample_rate(), config.channels(), config.sample_format());

        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate()
    }

    /// Channels per device frame; size the scheduler's output quantum with this.
    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Build and start the output stream.
    pub fn start(self, mut scheduler: Scheduler) -> Result<PlaybackStream> {
        let channels = self.config.channels() as usize;
        let stream_config: StreamConfig = self.config.config();

        let err_fn = |err| {
            tracing::error!("Audio playback error: {}", err);
        };

        let stream = self
            .device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        scheduler.pull_output(frame);
                    }
                },
                err_fn,
                None,
            )
            .context("Failed to build output stream")?;

        stream.play().context("Failed to start playback stream")?;
        info!("Audio playback started at {} Hz, {} channels", self.config.sample_rate(), channels);

        Ok(PlaybackStream { stream })
    }
}

/// Running output stream. Dropping it stops playback.
pub struct PlaybackStream {
    stream: Stream,
}

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Failed to pause playback stream: {}", e);
        }
        debug!("Audio playback stopped");
    }
}
