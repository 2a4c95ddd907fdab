//! WAV encoding and decoding via hound, plus `f32` <-> 16-bit PCM conversion.

use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Mono clip decoded from a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Clip {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Convert a normalized float sample to 16-bit PCM (inverse of `sample / 32768`).
pub fn f32_to_pcm(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert a whole clip to 16-bit PCM.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(f32_to_pcm).collect()
}

fn mono_pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int }
}

/// Encode mono float samples as a 16-bit PCM WAV file in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), mono_pcm16_spec(sample_rate)).context("Failed to create WAV writer")?;
        for sample in samples {
            writer.write_sample(f32_to_pcm(*sample)).context("Failed to write WAV sample")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }
    Ok(bytes)
}

/// Write mono float samples to a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let bytes = encode_wav(samples, sample_rate)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read a WAV file and downmix it to a mono float clip.
pub fn read_wav(path: &Path) -> Result<Clip> {
    let reader = WavReader::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    decode(reader)
}

/// Decode WAV bytes into a mono float clip.
pub fn decode_wav(bytes: &[u8]) -> Result<Clip> {
    let reader = WavReader::new(Cursor::new(bytes)).context("Invalid WAV data")?;
    decode(reader)
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<Clip> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>().context("Failed to decode float samples")?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to decode integer samples")?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
    };

    Ok(Clip { samples, sample_rate: spec.sample_rate })
}
