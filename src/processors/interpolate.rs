//! Linear-interpolation sample-rate conversion.
//!
//! For a ratio `r = input_rate / output_rate`, a block of `n` input samples
//! produces `round(n / r)` output samples. Output sample `i` sits at source
//! position `p = i * r` and blends `input[floor(p)]` and `input[ceil(p)]`.
//! Both indices are clamped to the last sample of the block, so the final
//! output sample never reads past the end.

use crate::error::WorkletError;

/// Stateless per-block linear resampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearResampler {
    input_rate: u32,
    output_rate: u32,
    ratio: f64,
}

impl LinearResampler {
    /// Create a resampler.
    ///
    /// # Arguments
    /// * `input_rate` - Native rate of the incoming blocks (e.g., 44100)
    /// * `output_rate` - Target rate (e.g., 16000)
    ///
    /// # Errors
    /// Returns [`WorkletError::InvalidSampleRate`] if either rate is zero.
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self, WorkletError> {
        if input_rate == 0 || output_rate == 0 {
            return Err(WorkletError::InvalidSampleRate { input: input_rate, output: output_rate });
        }
        Ok(Self { input_rate, output_rate, ratio: input_rate as f64 / output_rate as f64 })
    }

    /// Source samples consumed per output sample.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Whether blocks pass through untouched.
    pub fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate
    }

    /// Number of output samples produced for `input_len` input samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        if self.is_passthrough() {
            return input_len;
        }
        (input_len as f64 / self.ratio).round() as usize
    }

    /// Resample `input` and append the result to `out`.
    ///
    /// # Returns
    /// The number of samples appended.
    pub fn process_into(&self, input: &[f32], out: &mut Vec<f32>) -> usize {
        self.process_prefix_into(input, out, usize::MAX)
    }

    /// Like [`process_into`](Self::process_into), but appends at most `limit`
    /// samples, the leading part of the block's output.
    pub fn process_prefix_into(&self, input: &[f32], out: &mut Vec<f32>, limit: usize) -> usize {
        if self.is_passthrough() {
            let take = input.len().min(limit);
            out.extend_from_slice(&input[..take]);
            return take;
        }

        let Some(last) = input.len().checked_sub(1) else {
            return 0;
        };

        let produced = self.output_len(input.len()).min(limit);
        out.reserve(produced);
        out.extend((0..produced).map(|i| {
            let position = i as f64 * self.ratio;
            let lo = (position.floor() as usize).min(last);
            let hi = (position.ceil() as usize).min(last);
            let weight = (position - position.floor()) as f32;
            input[lo] * (1.0 - weight) + input[hi] * weight
        }));
        produced
    }
}

/// Resample a whole block with linear interpolation.
///
/// # Errors
/// Returns [`WorkletError::InvalidSampleRate`] if either rate is zero.
pub fn resample_linear(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>, WorkletError> {
    let resampler = LinearResampler::new(input_rate, output_rate)?;
    let mut out = Vec::with_capacity(resampler.output_len(input.len()));
    resampler.process_into(input, &mut out);
    Ok(out)
}
