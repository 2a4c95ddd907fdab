//! Playback streamer: buffers host-supplied 16-bit PCM and drains it into the
//! output device one render quantum at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::ValueEnum;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::message::{PlaybackCommand, PlaybackEvent};
use crate::worklet::{AudioProcessor, Emitter, Quantum};

/// Default queue capacity in seconds of audio at the device rate.
pub const DEFAULT_MAX_QUEUE_SECS: u32 = 30;

/// How the mono playback stream maps onto the output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// Write channel 0 only, leave the others untouched
    #[default]
    First,
    /// Duplicate the stream into every output channel
    All,
}

impl std::fmt::Display for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FanOut::First => write!(f, "first"),
            FanOut::All => write!(f, "all"),
        }
    }
}

/// Convert a 16-bit PCM sample to the normalized float range.
pub fn pcm_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Host-side view of how many enqueued samples have left the queue, whether
/// played, dropped on overflow or discarded by a cancel.
///
/// The counter only grows, so the host can tell a stale `playback_ended` from the
/// real end of a stream by comparing it with the number of samples it posted.
#[derive(Debug, Clone, Default)]
pub struct PlaybackProgress(Arc<AtomicU64>);

impl PlaybackProgress {
    pub fn settled(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Whether every one of `posted` samples has left the queue.
    pub fn covers(&self, posted: u64) -> bool {
        self.settled() >= posted
    }

    fn add(&self, samples: usize) {
        self.0.fetch_add(samples as u64, Ordering::Release);
    }
}

/// Playback processing unit.
///
/// Uses a preallocated ring of `i16` samples so the render path never allocates.
/// Samples that do not fit are dropped and reported with
/// [`PlaybackEvent::PlaybackOverflow`].
pub struct PlaybackStreamer {
    queue: HeapRb<i16>,
    fan_out: FanOut,
    played: u64, // Samples written to the output so far
    progress: PlaybackProgress,
}

impl PlaybackStreamer {
    /// Create a playback unit.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of queued samples
    /// * `fan_out` - Output channel mapping
    pub fn new(capacity: usize, fan_out: FanOut) -> Self {
        let capacity = capacity.max(1);
        debug!("Playback queue capacity: {} samples, fan-out: {}", capacity, fan_out);
        Self { queue: HeapRb::new(capacity), fan_out, played: 0, progress: PlaybackProgress::default() }
    }

    /// Counter shared with the host; clone it before the unit moves to the audio thread.
    pub fn progress(&self) -> PlaybackProgress {
        self.progress.clone()
    }

    /// Number of samples waiting to be played.
    pub fn queued(&self) -> usize {
        self.queue.occupied_len()
    }

    pub fn played(&self) -> u64 {
        self.played
    }

    /// Append samples to the tail of the queue.
    ///
    /// # Returns
    /// The number of samples dropped because the queue was full.
    pub fn enqueue(&mut self, samples: &[i16]) -> usize {
        let written = self.queue.push_slice(samples);
        let dropped = samples.len() - written;
        self.progress.add(dropped);
        dropped
    }

    /// Discard everything queued.
    ///
    /// # Returns
    /// The number of samples discarded.
    pub fn cancel(&mut self) -> usize {
        let discarded = self.queue.clear();
        self.progress.add(discarded);
        discarded
    }

    /// Drain up to one quantum into `output`.
    ///
    /// # Returns
    /// `true` if this drain emptied the queue.
    pub fn drain_into(&mut self, output: &mut Quantum) -> bool {
        let queued = self.queue.occupied_len();
        if queued == 0 {
            return false;
        }

        let take = queued.min(output.frames());
        match output.channel_mut(0) {
            Some(channel) => {
                for slot in channel[..take].iter_mut() {
                    *slot = self.queue.try_pop().map_or(0.0, pcm_to_f32);
                }
            }
            None => {
                self.queue.skip(take);
            }
        }

        if self.fan_out == FanOut::All {
            output.fan_out_first(take);
        }

        self.played += take as u64;
        self.progress.add(take);
        self.queue.is_empty()
    }
}

impl AudioProcessor for PlaybackStreamer {
    const NAME: &'static str = "playback-streamer";
    type Command = PlaybackCommand;
    type Event = PlaybackEvent;

    fn on_command(&mut self, command: PlaybackCommand, events: &mut Emitter<PlaybackEvent>) {
        match command {
            PlaybackCommand::Enqueue(samples) => {
                let dropped = self.enqueue(&samples);
                if dropped > 0 {
                    warn!("Playback queue full, dropped {} samples", dropped);
                    events.emit(PlaybackEvent::PlaybackOverflow { dropped });
                }
            }
            PlaybackCommand::Stop => {
                let discarded = self.cancel();
                debug!("Playback cancelled, {} samples discarded", discarded);
                events.emit(PlaybackEvent::PlaybackEnded);
            }
        }
    }

    fn process(&mut self, _input: &Quantum, output: &mut Quantum, events: &mut Emitter<PlaybackEvent>) -> bool {
        if self.drain_into(output) {
            debug!("Playback drained after {} samples", self.played);
            events.emit(PlaybackEvent::PlaybackEnded);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worklet::{RenderNode, create_node};
    use approx::assert_relative_eq;
    use tokio::sync::mpsc;

    fn emitter() -> (Emitter<PlaybackEvent>, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Emitter::new(tx), rx)
    }

    fn cycle(streamer: &mut PlaybackStreamer, output: &mut Quantum, events: &mut Emitter<PlaybackEvent>) {
        output.silence();
        assert!(streamer.process(&Quantum::new(0, 0), output, events));
    }

    #[test]
    fn test_drain_300_samples_in_128_blocks() {
        let mut streamer = PlaybackStreamer::new(1024, FanOut::First);
        let (mut events, mut rx) = emitter();
        let mut output = Quantum::new(1, 128);

        streamer.enqueue(&[1000; 300]);

        cycle(&mut streamer, &mut output, &mut events);
        assert_eq!(streamer.queued(), 172);
        assert!(rx.try_recv().is_err());

        cycle(&mut streamer, &mut output, &mut events);
        assert_eq!(streamer.queued(), 44);
        assert!(rx.try_recv().is_err());

        cycle(&mut streamer, &mut output, &mut events);
        assert_eq!(streamer.queued(), 0);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackEnded));
        assert!(rx.try_recv().is_err());

        // Leading 44 samples written, trailing portion left as initialized
        let channel = output.channel(0).unwrap();
        assert_relative_eq!(channel[43], 1000.0 / 32768.0);
        assert!(channel[44..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_no_repeat_event_once_empty() {
        let mut streamer = PlaybackStreamer::new(1024, FanOut::First);
        let (mut events, mut rx) = emitter();
        let mut output = Quantum::new(1, 128);

        streamer.enqueue(&[1; 10]);
        cycle(&mut streamer, &mut output, &mut events);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackEnded));

        cycle(&mut streamer, &mut output, &mut events);
        cycle(&mut streamer, &mut output, &mut events);
        assert!(rx.try_recv().is_err());
        assert_eq!(events.sent(), 1);
    }

    #[test]
    fn test_exact_multiple_still_ends() {
        let mut streamer = PlaybackStreamer::new(1024, FanOut::First);
        let (mut events, mut rx) = emitter();
        let mut output = Quantum::new(1, 128);

        streamer.enqueue(&[1; 256]);
        cycle(&mut streamer, &mut output, &mut events);
        assert!(rx.try_recv().is_err());
        cycle(&mut streamer, &mut output, &mut events);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackEnded));
    }

    #[test]
    fn test_cancel_mid_stream() {
        let mut streamer = PlaybackStreamer::new(1024, FanOut::First);
        let (mut events, mut rx) = emitter();
        let mut output = Quantum::new(1, 128);

        streamer.on_command(PlaybackCommand::Enqueue(vec![500; 50]), &mut events);
        streamer.on_command(PlaybackCommand::Stop, &mut events);
        assert_eq!(streamer.queued(), 0);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackEnded));

        // Next quantum is a no-op
        cycle(&mut streamer, &mut output, &mut events);
        assert!(output.channel(0).unwrap().iter().all(|s| *s == 0.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cancel_when_empty_still_notifies() {
        let mut streamer = PlaybackStreamer::new(16, FanOut::First);
        let (mut events, mut rx) = emitter();

        streamer.on_command(PlaybackCommand::Stop, &mut events);
        streamer.on_command(PlaybackCommand::Stop, &mut events);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackEnded));
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackEnded));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_conversion_and_order() {
        let mut streamer = PlaybackStreamer::new(16, FanOut::First);
        let mut output = Quantum::new(1, 4);
        streamer.enqueue(&[i16::MIN, -16384, 0, 16384]);
        assert!(streamer.drain_into(&mut output));
        assert_eq!(output.channel(0), Some(&[-1.0, -0.5, 0.0, 0.5][..]));
        assert_relative_eq!(pcm_to_f32(i16::MAX), 32767.0 / 32768.0);
    }

    #[test]
    fn test_fan_out_first_leaves_other_channels() {
        let mut streamer = PlaybackStreamer::new(16, FanOut::First);
        let mut output = Quantum::from_channels(vec![vec![0.0; 4], vec![0.75; 4]]);
        streamer.enqueue(&[16384; 4]);
        streamer.drain_into(&mut output);
        assert_eq!(output.channel(0), Some(&[0.5; 4][..]));
        assert_eq!(output.channel(1), Some(&[0.75; 4][..]));
    }

    #[test]
    fn test_fan_out_all_duplicates() {
        let mut streamer = PlaybackStreamer::new(16, FanOut::All);
        let mut output = Quantum::new(3, 4);
        streamer.enqueue(&[16384, 16384]);
        streamer.drain_into(&mut output);
        for channel in 0..3 {
            assert_eq!(output.channel(channel), Some(&[0.5, 0.5, 0.0, 0.0][..]));
        }
    }

    #[test]
    fn test_overflow_reported() {
        let mut streamer = PlaybackStreamer::new(100, FanOut::First);
        let (mut events, mut rx) = emitter();

        streamer.on_command(PlaybackCommand::Enqueue(vec![1; 80]), &mut events);
        assert!(rx.try_recv().is_err());
        streamer.on_command(PlaybackCommand::Enqueue(vec![1; 80]), &mut events);
        assert_eq!(rx.try_recv(), Ok(PlaybackEvent::PlaybackOverflow { dropped: 60 }));
        assert_eq!(streamer.queued(), 100);
    }

    #[test]
    fn test_progress_counts_every_sample_leaving_the_queue() {
        let mut streamer = PlaybackStreamer::new(100, FanOut::First);
        let progress = streamer.progress();
        let mut output = Quantum::new(1, 64);

        streamer.enqueue(&[1; 80]);
        assert_eq!(progress.settled(), 0);
        streamer.enqueue(&[1; 40]); // 20 dropped
        assert_eq!(progress.settled(), 20);

        streamer.drain_into(&mut output);
        assert_eq!(progress.settled(), 84);
        assert_eq!(streamer.cancel(), 36);
        assert!(progress.covers(120));
    }

    #[test]
    fn test_ended_after_underrun_is_not_the_end_of_later_audio() {
        let streamer = PlaybackStreamer::new(1024, FanOut::First);
        let progress = streamer.progress();
        let (mut node, mut host) = create_node(streamer, 8);
        let input = Quantum::new(0, 0);
        let mut output = Quantum::new(1, 128);

        // First chunk drains completely before the host posts the next one
        host.post(PlaybackCommand::Enqueue(vec![100; 100])).unwrap();
        assert!(node.render(&input, &mut output));
        let mut posted = 100u64;

        // Final chunk goes out while the underrun event is still unread
        host.post(PlaybackCommand::Enqueue(vec![100; 200])).unwrap();
        posted += 200;
        assert!(node.render(&input, &mut output));

        assert_eq!(host.try_recv(), Some(PlaybackEvent::PlaybackEnded));
        assert!(!progress.covers(posted));

        assert!(node.render(&input, &mut output));
        assert_eq!(host.try_recv(), Some(PlaybackEvent::PlaybackEnded));
        assert!(progress.covers(posted));
    }

    #[test]
    fn test_stop_applies_before_next_quantum() {
        let (mut node, mut host) = create_node(PlaybackStreamer::new(1024, FanOut::First), 8);
        let input = Quantum::new(0, 0);
        let mut output = Quantum::new(1, 128);

        host.post(PlaybackCommand::Enqueue(vec![100; 300])).unwrap();
        assert!(node.render(&input, &mut output));
        assert_eq!(node.processor().queued(), 172);

        host.post(PlaybackCommand::Stop).unwrap();
        output.silence();
        assert!(node.render(&input, &mut output));

        // Cancellation ran first, so nothing stale reached the output
        assert!(output.channel(0).unwrap().iter().all(|s| *s == 0.0));
        assert_eq!(host.try_recv(), Some(PlaybackEvent::PlaybackEnded));
        assert!(host.try_recv().is_none());
    }
}
