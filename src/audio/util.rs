//! Shared device helpers for the capture and playback hosts.

use anyhow::Result;
use cpal::traits::DeviceTrait;
use cpal::{Device, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};
use tracing::debug;

/// Rate used when a device does not report a preferred configuration.
pub const FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Get a human-readable device name.
///
/// # Returns
/// Device name string, or "Unknown" if the name cannot be retrieved.
pub fn get_device_name(device: &Device) -> String {
    device.description().ok().map(|desc| desc.name().to_string()).unwrap_or_else(|| "Unknown".to_string())
}

/// Find the best matching audio configuration.
///
/// Searches for a configuration that:
/// 1. Supports mono or stereo (max 2 channels)
/// 2. Uses F32 sample format
/// 3. Matches the target sample rate, or uses the closest available rate
///
/// # Arguments
/// * `configs` - Iterator of supported stream configurations
/// * `target_sample_rate` - Desired sample rate (usually the device's own preference)
///
/// # Returns
/// The best matching `SupportedStreamConfig`, or an error if no suitable config found.
pub fn find_best_config(configs: impl Iterator<Item = SupportedStreamConfigRange>, target_sample_rate: u32) -> Result<SupportedStreamConfig> {
    let f32_configs: Vec<SupportedStreamConfigRange> =
        configs.filter(|config| config.channels() <= 2 && config.sample_format() == SampleFormat::F32).collect();

    let Some(first) = f32_configs.first() else {
        anyhow::bail!("No F32 audio configuration found - this is unexpected on modern hardware");
    };

    // Prefer a config that supports the target rate directly
    if let Some(config) = f32_configs.iter().find(|c| (c.min_sample_rate()..=c.max_sample_rate()).contains(&target_sample_rate)) {
        return Ok(config.clone().with_sample_rate(target_sample_rate));
    }

    let rate = if target_sample_rate < first.min_sample_rate() { first.min_sample_rate() } else { first.max_sample_rate() };
    debug!("Target rate {} Hz unsupported, using {} Hz", target_sample_rate, rate);
    Ok(first.clone().with_sample_rate(rate))
}

/// Pick the device's native rate: its default config if available, else the fallback.
pub fn preferred_sample_rate(default_config: Result<SupportedStreamConfig, cpal::DefaultStreamConfigError>) -> u32 {
    match default_config {
        Ok(config) => config.sample_rate(),
        Err(e) => {
            debug!("No default stream config ({}), falling back to {} Hz", e, FALLBACK_SAMPLE_RATE);
            FALLBACK_SAMPLE_RATE
        }
    }
}

/// Mix one interleaved frame down to a single mono sample by averaging.
pub fn mix_to_mono(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().sum::<f32>() / frame.len() as f32
}
