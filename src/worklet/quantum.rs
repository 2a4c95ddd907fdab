//! Fixed-size, per-channel sample blocks.

/// Default number of frames per render quantum.
pub const RENDER_QUANTUM_FRAMES: usize = 128;

/// One render quantum: `channels` planar buffers of `frames` samples each.
///
/// Allocated once by the scheduler and reused every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantum {
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl Quantum {
    /// Create a silent quantum.
    pub fn new(channels: usize, frames: usize) -> Self {
        Self { channels: vec![vec![0.0; frames]; channels], frames }
    }

    /// Build a quantum from existing planar channel data.
    ///
    /// Every channel is truncated or zero-padded to the length of the first one.
    pub fn from_channels(mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.first().map_or(0, Vec::len);
        for channel in channels.iter_mut() {
            channel.resize(frames, 0.0);
        }
        Self { channels, frames }
    }

    /// Build a single-channel quantum.
    pub fn mono(samples: &[f32]) -> Self {
        Self::from_channels(vec![samples.to_vec()])
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }

    /// Mutable access to every channel at once.
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Reset every sample to zero.
    pub fn silence(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.fill(0.0);
        }
    }

    /// Copy the first `len` samples of channel 0 into every other channel.
    pub fn fan_out_first(&mut self, len: usize) {
        let len = len.min(self.frames);
        if let Some((first, rest)) = self.channels.split_first_mut() {
            for channel in rest {
                channel[..len].copy_from_slice(&first[..len]);
            }
        }
    }

    /// Add `other` into `self`, channel by channel.
    pub fn mix_from(&mut self, other: &Quantum) {
        for (dst, src) in self.channels.iter_mut().zip(other.channels.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s;
            }
        }
    }
}
