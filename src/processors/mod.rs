//! The two real-time processing units and their message protocol.
//!
//! - [`CaptureResampler`] downsamples microphone quanta while recording.
//! - [`PlaybackStreamer`] drains queued 16-bit PCM into the output device.

mod capture;
pub mod interpolate;
pub mod message;
mod playback;

pub use capture::{CaptureOptions, CaptureResampler, DEFAULT_MAX_RECORDING_SECS, DEFAULT_TARGET_RATE, RecordingState};
pub use interpolate::{LinearResampler, resample_linear};
pub use message::{CaptureCommand, CaptureEvent, PlaybackCommand, PlaybackEvent};
pub use playback::{DEFAULT_MAX_QUEUE_SECS, FanOut, PlaybackProgress, PlaybackStreamer, pcm_to_f32};
