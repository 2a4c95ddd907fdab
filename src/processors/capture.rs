//! Capture resampler: downsamples microphone quanta while armed and hands the
//! accumulated recording to the host on `stop`.

use tracing::{debug, info, warn};

use super::interpolate::LinearResampler;
use super::message::{CaptureCommand, CaptureEvent};
use crate::error::WorkletError;
use crate::worklet::{AudioProcessor, Emitter, Quantum};

/// Default recording target rate (speech recognition input).
pub const DEFAULT_TARGET_RATE: u32 = 16000;

/// Default recording cap in seconds at the target rate.
pub const DEFAULT_MAX_RECORDING_SECS: u32 = 300;

/// Recording state of the capture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

/// Construction parameters for [`CaptureResampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub input_rate: u32,  // Native rate of the capture device
    pub output_rate: u32, // Rate of the delivered recording
    pub max_samples: usize,
}

impl CaptureOptions {
    /// Options for a device rate, targeting [`DEFAULT_TARGET_RATE`] with the default cap.
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate,
            output_rate: DEFAULT_TARGET_RATE,
            max_samples: (DEFAULT_TARGET_RATE * DEFAULT_MAX_RECORDING_SECS) as usize,
        }
    }

    pub fn with_output_rate(mut self, output_rate: u32) -> Self {
        self.output_rate = output_rate;
        self
    }

    /// Cap the recording at `seconds` of output audio.
    pub fn with_max_seconds(mut self, seconds: u32) -> Self {
        self.max_samples = self.output_rate as usize * seconds as usize;
        self
    }
}

/// Capture processing unit.
///
/// While [`RecordingState::Recording`], every quantum is downsampled to the output
/// rate and appended to the capture buffer. The buffer is delivered and discarded
/// on `stop`.
///
/// The buffer holds the whole recording cap up front, so appending never
/// reallocates. `stop` moves the buffer into the event and leaves an unallocated
/// one behind; the next `start` allocates once, with nothing to copy.
pub struct CaptureResampler {
    resampler: LinearResampler,
    state: RecordingState,
    buffer: Vec<f32>,
    length: usize,      // Samples appended since the last start
    max_samples: usize, // Recording cap, also the buffer capacity
    truncated: usize,   // Samples discarded past the cap this session
}

impl CaptureResampler {
    /// Create a capture unit.
    ///
    /// # Errors
    /// Returns [`WorkletError::InvalidSampleRate`] if either rate is zero.
    pub fn new(options: CaptureOptions) -> Result<Self, WorkletError> {
        let resampler = LinearResampler::new(options.input_rate, options.output_rate)?;

        if resampler.is_passthrough() {
            info!("Capture rate {} Hz matches target, samples pass through", options.input_rate);
        } else {
            info!("Capture resampling {} Hz -> {} Hz (ratio {:.5})", options.input_rate, options.output_rate, resampler.ratio());
        }

        Ok(Self {
            resampler,
            state: RecordingState::Idle,
            buffer: Vec::with_capacity(options.max_samples),
            length: 0,
            max_samples: options.max_samples,
            truncated: 0,
        })
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Samples accumulated in the current session.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Clear the buffer and arm recording.
    pub fn start(&mut self) {
        self.buffer.clear();
        self.buffer.reserve_exact(self.max_samples);
        self.length = 0;
        self.truncated = 0;
        self.state = RecordingState::Recording;
        debug!("Capture armed");
    }

    /// Disarm and take the accumulated recording.
    ///
    /// Always produces exactly one event, which is empty if nothing was recorded.
    pub fn stop(&mut self) -> CaptureEvent {
        self.state = RecordingState::Idle;

        let audio_data = std::mem::take(&mut self.buffer);
        let audio_data_length = std::mem::take(&mut self.length);
        debug_assert_eq!(audio_data.len(), audio_data_length);

        if self.truncated > 0 {
            warn!("Recording exceeded {} samples, {} samples discarded", self.max_samples, self.truncated);
        }
        debug!("Capture stopped with {} samples", audio_data_length);

        CaptureEvent { audio_data, audio_data_length }
    }

    /// Downsample one block and append it, if recording.
    pub fn process_block(&mut self, input: &[f32]) {
        if self.state != RecordingState::Recording {
            return;
        }

        let produced = self.resampler.output_len(input.len());
        let room = self.max_samples - self.length;
        if produced > room {
            if self.truncated == 0 {
                warn!("Recording cap of {} samples reached, discarding further audio", self.max_samples);
            }
            self.truncated += produced - room;
        }

        self.length += self.resampler.process_prefix_into(input, &mut self.buffer, room);
    }
}

impl AudioProcessor for CaptureResampler {
    const NAME: &'static str = "capture-resampler";
    type Command = CaptureCommand;
    type Event = CaptureEvent;

    fn on_command(&mut self, command: CaptureCommand, events: &mut Emitter<CaptureEvent>) {
        match command {
            CaptureCommand::Start => self.start(),
            CaptureCommand::Stop => events.emit(self.stop()),
        }
    }

    fn process(&mut self, input: &Quantum, _output: &mut Quantum, _events: &mut Emitter<CaptureEvent>) -> bool {
        self.process_block(input.channel(0).unwrap_or_default());
        // Stays registered while idle
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::interpolate::resample_linear;
    use crate::worklet::create_node;
    use crate::worklet::{RENDER_QUANTUM_FRAMES, RenderNode};
    use tokio::sync::mpsc;

    fn emitter() -> (Emitter<CaptureEvent>, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Emitter::new(tx), rx)
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 / len as f32).collect()
    }

    #[test]
    fn test_idle_quanta_are_ignored() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(48000)).unwrap();
        let (mut events, mut rx) = emitter();
        let mut output = Quantum::new(1, RENDER_QUANTUM_FRAMES);

        assert!(capture.process(&Quantum::mono(&ramp(128)), &mut output, &mut events));
        assert_eq!(capture.state(), RecordingState::Idle);
        assert!(capture.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_recorded_length_is_sum_of_chunks() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(44100)).unwrap();
        let b1 = ramp(441);
        let b2 = ramp(128);

        capture.start();
        capture.process_block(&b1);
        capture.process_block(&b2);
        let event = capture.stop();

        let expected = resample_linear(&b1, 44100, 16000).unwrap().len() + resample_linear(&b2, 44100, 16000).unwrap().len();
        assert_eq!(event.audio_data_length, expected);
        assert_eq!(event.audio_data.len(), expected);
        assert_eq!(capture.state(), RecordingState::Idle);
    }

    #[test]
    fn test_recording_concatenates_resampled_chunks() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(48000)).unwrap();
        let b1 = ramp(128);
        let b2: Vec<f32> = ramp(128).into_iter().map(|s| -s).collect();

        capture.start();
        capture.process_block(&b1);
        capture.process_block(&b2);
        let event = capture.stop();

        let mut expected = resample_linear(&b1, 48000, 16000).unwrap();
        expected.extend(resample_linear(&b2, 48000, 16000).unwrap());
        assert_eq!(event.audio_data, expected);
    }

    #[test]
    fn test_stop_without_start_emits_empty_buffer() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(44100)).unwrap();
        let (mut events, mut rx) = emitter();

        capture.on_command(CaptureCommand::Stop, &mut events);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.audio_data_length, 0);
        assert!(event.audio_data.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_discards_buffer() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(16000)).unwrap();
        capture.start();
        capture.process_block(&ramp(128));
        assert_eq!(capture.stop().audio_data_length, 128);

        // A second stop delivers a fresh, empty buffer
        assert_eq!(capture.stop().audio_data_length, 0);
    }

    #[test]
    fn test_start_clears_previous_session() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(16000)).unwrap();
        capture.start();
        capture.process_block(&ramp(64));
        capture.start();
        capture.process_block(&ramp(32));
        assert_eq!(capture.stop().audio_data, ramp(32));
    }

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(16000)).unwrap();
        let block = ramp(128);
        capture.start();
        capture.process_block(&block);
        assert_eq!(capture.stop().audio_data, block);
    }

    #[test]
    fn test_empty_quantum_appends_nothing() {
        let mut capture = CaptureResampler::new(CaptureOptions::new(44100)).unwrap();
        capture.start();
        capture.process_block(&[]);
        assert_eq!(capture.len(), 0);
        assert_eq!(capture.state(), RecordingState::Recording);
    }

    #[test]
    fn test_recording_cap_truncates() {
        let options = CaptureOptions::new(16000).with_max_seconds(1);
        assert_eq!(options.max_samples, 16000);

        let mut capture = CaptureResampler::new(CaptureOptions { max_samples: 200, ..options }).unwrap();
        capture.start();
        capture.process_block(&ramp(128));
        capture.process_block(&ramp(128));
        capture.process_block(&ramp(128));

        let event = capture.stop();
        assert_eq!(event.audio_data_length, 200);
        assert_eq!(event.audio_data.len(), 200);
    }

    #[test]
    fn test_cap_reached_exactly_then_discards() {
        let options = CaptureOptions::new(16000);
        let mut capture = CaptureResampler::new(CaptureOptions { max_samples: 256, ..options }).unwrap();
        capture.start();
        capture.process_block(&ramp(128));
        capture.process_block(&ramp(128));
        assert_eq!(capture.truncated, 0);

        capture.process_block(&ramp(128));
        assert_eq!(capture.truncated, 128);
        assert_eq!(capture.stop().audio_data_length, 256);
    }

    #[test]
    fn test_long_recording_never_reallocates() {
        let options = CaptureOptions::new(16000).with_max_seconds(DEFAULT_MAX_RECORDING_SECS);
        let mut capture = CaptureResampler::new(options).unwrap();
        capture.start();
        let capacity = capture.buffer.capacity();
        let data = capture.buffer.as_ptr();
        assert!(capacity >= options.max_samples);

        // 70 seconds of quanta at 16 kHz
        let block = ramp(RENDER_QUANTUM_FRAMES);
        for _ in 0..(70 * 16000 / RENDER_QUANTUM_FRAMES) {
            capture.process_block(&block);
        }
        assert_eq!(capture.buffer.capacity(), capacity);
        assert_eq!(capture.buffer.as_ptr(), data);

        // Stop hands the buffer over without allocating a replacement
        let event = capture.stop();
        assert_eq!(event.audio_data.as_ptr(), data);
        assert_eq!(capture.buffer.capacity(), 0);
    }

    #[test]
    fn test_messages_drive_node() {
        let capture = CaptureResampler::new(CaptureOptions::new(32000)).unwrap();
        let (mut node, mut host) = create_node(capture, 4);
        let input = Quantum::mono(&ramp(128));
        let mut output = Quantum::new(1, 128);

        host.post(CaptureCommand::Start).unwrap();
        assert!(node.render(&input, &mut output));
        assert!(node.render(&input, &mut output));
        host.post(CaptureCommand::Stop).unwrap();
        assert!(node.render(&input, &mut output));

        // Stop is handled before the third quantum is processed
        let event = host.try_recv().unwrap();
        assert_eq!(event.audio_data_length, 128);
        assert!(host.try_recv().is_none());
        assert_eq!(node.processor().state(), RecordingState::Idle);
    }
}
