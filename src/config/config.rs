//! Application configuration and CLI argument parsing.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::processors::{DEFAULT_MAX_QUEUE_SECS, DEFAULT_MAX_RECORDING_SECS, DEFAULT_TARGET_RATE, FanOut};
use crate::worklet::{DEFAULT_PORT_CAPACITY, RENDER_QUANTUM_FRAMES};

/// Largest accepted render quantum.
const MAX_QUANTUM_FRAMES: usize = 8192;

/// Audio worklet host configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "voice-worklets")]
#[command(author, version, about = "Real-time capture resampling and PCM playback streaming", long_about = None)]
pub struct AppConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Frames per render quantum
    #[arg(long, global = true, default_value_t = RENDER_QUANTUM_FRAMES)]
    pub quantum_frames: usize,

    /// Maximum number of pending host -> unit messages
    #[arg(long, global = true, default_value_t = DEFAULT_PORT_CAPACITY)]
    pub port_capacity: usize,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Record from the default microphone, downsampled to the target rate
    Record(RecordArgs),
    /// Stream a WAV file to the default output device
    Play(PlayArgs),
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct RecordArgs {
    /// Target sample rate of the recording
    #[arg(long, default_value_t = DEFAULT_TARGET_RATE)]
    pub target_rate: u32,

    /// Stop after this many seconds (default: until Ctrl+C)
    #[arg(long, short = 't')]
    pub duration: Option<f64>,

    /// Maximum recording length in seconds; later audio is discarded
    #[arg(long, default_value_t = DEFAULT_MAX_RECORDING_SECS)]
    pub max_seconds: u32,

    /// Output WAV path (default: timestamped file in the recordings directory)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Directory for timestamped recordings
    #[arg(long, env = "RECORDINGS_DIR", default_value_os_t = default_recordings_dir())]
    pub recordings_dir: PathBuf,

    /// Transcription endpoint; the recording is uploaded after capture
    #[arg(long, env = "TRANSCRIBE_URL")]
    pub transcribe_url: Option<String>,

    /// Language hint sent with the transcription request
    #[arg(long)]
    pub language: Option<String>,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct PlayArgs {
    /// WAV file to play
    pub file: PathBuf,

    /// Output channel mapping: 'first' writes channel 0 only, 'all' duplicates to every channel
    #[arg(long, value_enum, default_value_t = FanOut::First)]
    pub fan_out: FanOut,

    /// Playback queue capacity in seconds at the device rate
    #[arg(long, default_value_t = DEFAULT_MAX_QUEUE_SECS)]
    pub max_queue_seconds: u32,

    /// Samples per enqueue message
    #[arg(long, default_value = "4096")]
    pub chunk_samples: usize,

    /// How far ahead of the playhead the host may enqueue, in milliseconds
    #[arg(long, default_value = "500")]
    pub lead_ms: u64,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.quantum_frames == 0 || self.quantum_frames > MAX_QUANTUM_FRAMES {
            anyhow::bail!("Quantum frames must be between 1 and {}", MAX_QUANTUM_FRAMES);
        }

        if self.port_capacity == 0 {
            anyhow::bail!("Port capacity must be positive");
        }

        match &self.command {
            Command::Record(args) => {
                if args.target_rate == 0 {
                    anyhow::bail!("Target sample rate must be positive");
                }
                if args.duration.is_some_and(|d| !(d > 0.0 && d.is_finite())) {
                    anyhow::bail!("Duration must be a positive number of seconds");
                }
                if args.max_seconds == 0 {
                    anyhow::bail!("Maximum recording length must be positive");
                }
            }
            Command::Play(args) => {
                if !args.file.exists() {
                    anyhow::bail!("Audio file not found: {}", args.file.display());
                }
                if args.chunk_samples == 0 {
                    anyhow::bail!("Chunk size must be positive");
                }
                if args.max_queue_seconds == 0 {
                    anyhow::bail!("Queue capacity must be positive");
                }
            }
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Quantum: {} frames", self.quantum_frames);
        info!("  Port capacity: {} messages", self.port_capacity);
        match &self.command {
            Command::Record(args) => {
                info!("  Target rate: {} Hz", args.target_rate);
                match args.duration {
                    Some(secs) => info!("  Duration: {:.1}s", secs),
                    None => info!("  Duration: until Ctrl+C"),
                }
                info!("  Max recording: {}s", args.max_seconds);
                if let Some(ref url) = args.transcribe_url {
                    info!("  Transcription URL: {}", url);
                }
            }
            Command::Play(args) => {
                info!("  File: {}", args.file.display());
                info!("  Fan-out: {}", args.fan_out);
                info!("  Queue capacity: {}s", args.max_queue_seconds);
                info!("  Chunk: {} samples, lead: {}ms", args.chunk_samples, args.lead_ms);
            }
        }
    }
}

impl RecordArgs {
    /// Where the recording should be written.
    ///
    /// # Arguments
    /// * `timestamp` - Used for the file name when no explicit output is set
    pub fn output_path(&self, timestamp: &str) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self.recordings_dir.join(format!("recording-{}.wav", timestamp)),
        }
    }
}

/// Get the default recordings directory (~/.voice-worklets/recordings).
fn default_recordings_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".voice-worklets").join("recordings")
    } else {
        PathBuf::from("recordings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let config = AppConfig::try_parse_from(["voice-worklets", "record"]).unwrap();
        assert_eq!(config.quantum_frames, 128);
        let Command::Record(args) = &config.command else {
            panic!("expected record command");
        };
        assert_eq!(args.target_rate, 16000);
        assert!(args.duration.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_play_options() {
        let config = AppConfig::try_parse_from(["voice-worklets", "play", "clip.wav", "--fan-out", "all", "--quantum-frames", "256"]).unwrap();
        assert_eq!(config.quantum_frames, 256);
        let Command::Play(args) = &config.command else {
            panic!("expected play command");
        };
        assert_eq!(args.fan_out, FanOut::All);
        assert_eq!(args.file, PathBuf::from("clip.wav"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = AppConfig::try_parse_from(["voice-worklets", "record", "--quantum-frames", "0"]).unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::try_parse_from(["voice-worklets", "record", "--duration", "0"]).unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::try_parse_from(["voice-worklets", "play", "/nonexistent/clip.wav"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_path() {
        let config = AppConfig::try_parse_from(["voice-worklets", "record", "--recordings-dir", "/tmp/rec"]).unwrap();
        let Command::Record(args) = config.command else {
            panic!("expected record command");
        };
        assert_eq!(args.output_path("20260101-120000"), PathBuf::from("/tmp/rec/recording-20260101-120000.wav"));
    }
}
