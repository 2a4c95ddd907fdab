//! Audio device hosting and clip utilities.
//!
//! Drives worklet schedulers from cpal input/output streams, with offline
//! resampling via rubato and WAV I/O via hound.

mod capture;
mod playback;
pub mod resampler;
pub mod util;
pub mod wav;

pub use capture::{CaptureStream, InputDevice};
pub use playback::{OutputDevice, PlaybackStream};
