//! Microphone host using cpal.
//!
//! Opens the default input device at its native rate and drives a [`Scheduler`]
//! from the device callback: every incoming frame is downmixed to mono and pushed
//! into the scheduler, which renders one quantum each time enough frames arrived.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, SupportedStreamConfig};
use tracing::{debug, info, warn};

use super::util::{find_best_config, get_device_name, mix_to_mono, preferred_sample_rate};
use crate::worklet::Scheduler;

/// Default input device with its negotiated configuration.
pub struct InputDevice {
    device: Device,
    config: SupportedStreamConfig,
}

impl InputDevice {
    /// Open the default input device at its native sample rate.
    ///
    /// # Errors
    /// Returns an error if:
    /// - No input device is available
    /// - Failed to get supported input configurations
    /// - No F32 configuration is supported
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().context("No input device available")?;

        info!("Using input device: {}", get_device_name(&device));

        let native_rate = preferred_sample_rate(device.default_input_config());
        let supported_configs = device.supported_input_configs().context("Failed to get supported input configs")?;
        let config = find_best_config(supported_configs, native_rate)?;

        debug!("Audio capture config: {} Hz, {} channels, {:?}", config.sample_rate(), config.channels(), config.sample_format());

        Ok(Self { device, config })
    }

    /// Native capture rate, i.e. the resampler's input rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Build and start the input stream.
    ///
    /// The scheduler moves onto the audio thread; its nodes should already be
    /// registered. Its input quantum is expected to be mono.
    pub fn start(self, mut scheduler: Scheduler) -> Result<CaptureStream> {
        let channels = self.config.channels() as usize;
        let stream_config: StreamConfig = self.config.config();

        let err_fn = |err| {
            tracing::error!("Audio capture error: {}", err);
        };

        let stream = self
            .device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        scheduler.push_input(&[mix_to_mono(frame)]);
                    }
                },
                err_fn,
                None,
            )
            .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;
        info!("Audio capture started at {} Hz", self.config.sample_rate());

        Ok(CaptureStream { stream })
    }
}

/// Running input stream. Dropping it stops capture.
pub struct CaptureStream {
    stream: Stream,
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Failed to pause capture stream: {}", e);
        }
        info!("Audio capture stopped");
    }
}
