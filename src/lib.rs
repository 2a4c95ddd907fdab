//! Real-time audio units for a voice front end.
//!
//! Two isolated processing units run on the audio thread and talk to the host
//! only through ordered message ports:
//!
//! - a capture resampler that downsamples microphone audio while recording and
//!   hands the finished buffer back on `stop`, and
//! - a playback streamer that drains queued 16-bit PCM into the output device
//!   and reports when playback ends.
//!
//! The [`worklet`] module provides the runtime (scheduler, render quanta, ports),
//! [`processors`] the two units, and [`audio`] the cpal device hosts that drive
//! a scheduler from real hardware.

pub mod audio;
pub mod config;
pub mod error;
pub mod processors;
pub mod transcribe;
pub mod worklet;

pub use error::WorkletError;
