//! Offline audio resampling using rubato's FFT-based resampler.
//!
//! The real-time capture path uses per-quantum linear interpolation instead
//! (see [`crate::processors::interpolate`]); this is for host-side preparation
//! of whole clips, e.g. matching a WAV file to the output device before it is
//! streamed to the playback unit.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};
use tracing::debug;

/// Chunk size for FFT-based resampling (provides good quality and performance).
const CHUNK_SIZE: usize = 1024;

/// Number of sub-chunks for FFT processing (higher = better quality but more CPU).
const SUB_CHUNKS: usize = 2;

/// Resample a mono clip from one sample rate to another.
///
/// # Arguments
/// * `samples` - Input audio samples
/// * `from_rate` - Input sample rate (e.g., 24000 for a synthesized clip)
/// * `to_rate` - Output sample rate (e.g., 48000 for the output device)
///
/// # Returns
/// Resampled audio, `round(len * to_rate / from_rate)` samples long.
///
/// # Example
/// ```no_run
/// use voice_worklets::audio::resampler::resample;
///
/// let clip = vec![0.0; 24000]; // 1 second at 24kHz
/// let device_audio = resample(&clip, 24000, 48000).unwrap();
/// assert_eq!(device_audio.len(), 48000); // 1 second at 48kHz
/// ```
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    // No resampling needed if rates match
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1, // mono
        FixedSync::Input,
    )
    .context("Failed to create resampler")?;

    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max];

    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let needed = expected_len + delay;
    let mut output = Vec::with_capacity(needed + output_frames_max);

    // Short final chunk and the flush chunks after it are zero-padded
    let mut padded = vec![0.0f32; CHUNK_SIZE];
    let mut chunks = samples.chunks(CHUNK_SIZE);

    // Keep feeding silence until the delayed tail of the clip is out
    while output.len() < needed {
        let input_chunk: &[f32] = match chunks.next() {
            Some(chunk) if chunk.len() == CHUNK_SIZE => chunk,
            Some(chunk) => {
                padded[..chunk.len()].copy_from_slice(chunk);
                padded[chunk.len()..].fill(0.0);
                &padded
            }
            None => {
                padded.fill(0.0);
                &padded
            }
        };

        let input_adapter = InterleavedSlice::new(input_chunk, 1, CHUNK_SIZE).context("Failed to create input adapter")?;
        let mut output_adapter = InterleavedSlice::new_mut(&mut output_buffer, 1, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;
        output.extend_from_slice(&output_buffer[..frames_written]);
    }

    // Drop the filter delay at the front and padding past the expected length
    output.drain(..delay);
    output.truncate(expected_len);

    debug!("Resampled {} -> {} samples ({} Hz -> {} Hz)", samples.len(), output.len(), from_rate, to_rate);
    Ok(output)
}
