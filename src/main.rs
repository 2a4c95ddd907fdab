//! voice-worklets - host for the real-time capture and playback units.
//!
//! `record` arms the capture resampler on the default microphone and saves (and
//! optionally transcribes) the downsampled recording. `play` streams a WAV file
//! through the playback streamer to the default output device.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use voice_worklets::WorkletError;
use voice_worklets::audio::{InputDevice, OutputDevice, resampler, wav};
use voice_worklets::config::{AppConfig, Command, PlayArgs, RecordArgs};
use voice_worklets::processors::{CaptureCommand, CaptureOptions, CaptureResampler, PlaybackCommand, PlaybackEvent, PlaybackStreamer};
use voice_worklets::transcribe::TranscriptionClient;
use voice_worklets::worklet::{AudioProcessor, HostPort, Scheduler, create_node};

/// How long to wait for a unit to answer a control message.
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// How often the playback host checks whether it should enqueue more audio.
const FEED_INTERVAL: Duration = Duration::from_millis(20);

/// Time left for the device to flush its own buffer after playback ends.
const FLUSH_DELAY: Duration = Duration::from_millis(150);

/// Record from the microphone until the duration elapses or shutdown is requested.
///
/// # Arguments
/// * `config` - Application configuration
/// * `args` - Record subcommand arguments
/// * `shutdown` - Cancelled on Ctrl+C / SIGTERM
async fn run_record(config: &AppConfig, args: &RecordArgs, shutdown: CancellationToken) -> Result<()> {
    let device = InputDevice::open_default()?;

    let options = CaptureOptions::new(device.sample_rate()).with_output_rate(args.target_rate).with_max_seconds(args.max_seconds);
    let (node, mut port) = create_node(CaptureResampler::new(options)?, config.port_capacity);

    // Mono input (the host downmixes), no audible output
    let mut scheduler = Scheduler::new(config.quantum_frames, 1, 1);
    scheduler.register(CaptureResampler::NAME, Box::new(node))?;
    let stream = device.start(scheduler)?;

    port.post(CaptureCommand::Start)?;
    info!("🎙️  Recording... (Ctrl+C to stop)");

    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = shutdown.cancelled() => debug!("Recording stopped early"),
                _ = tokio::time::sleep(Duration::from_secs_f64(secs)) => debug!("Recording duration reached"),
            }
        }
        None => shutdown.cancelled().await,
    }

    port.post(CaptureCommand::Stop)?;
    let event = tokio::time::timeout(EVENT_TIMEOUT, port.recv())
        .await
        .context("Timed out waiting for the recording")?
        .context("Capture unit closed before delivering the recording")?;
    drop(stream);

    let seconds = event.audio_data_length as f64 / args.target_rate as f64;
    info!("🎙️  Captured {} samples ({:.1}s at {} Hz)", event.audio_data_length, seconds, args.target_rate);

    if event.audio_data_length == 0 {
        warn!("Recording is empty");
    }

    let path = args.output_path(&timestamp()?);
    wav::write_wav(&path, &event.audio_data, args.target_rate)?;
    info!("💾 Saved {}", path.display());

    if let Some(ref url) = args.transcribe_url {
        let client = TranscriptionClient::new(url, args.language.clone())?;
        let bytes = wav::encode_wav(&event.audio_data, args.target_rate)?;
        match client.transcribe(bytes).await {
            Ok(text) => {
                info!("📝 Transcript: {}", text);
                println!("{}", text);
            }
            // Surfaced to the user, no retry
            Err(e) => error!("❌ {:#}", e),
        }
    }

    Ok(())
}

/// Stream a WAV file through the playback unit.
///
/// The file is resampled to the device rate, converted to 16-bit PCM and posted
/// in chunks, staying at most `lead_ms` ahead of the playhead so the unit's queue
/// never overflows.
///
/// # Arguments
/// * `config` - Application configuration
/// * `args` - Play subcommand arguments
/// * `shutdown` - Cancelled on Ctrl+C / SIGTERM; posts the stop sentinel
async fn run_play(config: &AppConfig, args: &PlayArgs, shutdown: CancellationToken) -> Result<()> {
    let clip = wav::read_wav(&args.file)?;
    info!("🔊 Loaded {} ({:.1}s at {} Hz)", args.file.display(), clip.duration_secs(), clip.sample_rate);

    let device = OutputDevice::open_default()?;
    let device_rate = device.sample_rate();

    let samples = resampler::resample(&clip.samples, clip.sample_rate, device_rate)?;
    let pcm = wav::to_pcm16(&samples);
    if pcm.is_empty() {
        warn!("Nothing to play");
        return Ok(());
    }

    let capacity = device_rate as usize * args.max_queue_seconds as usize;
    let streamer = PlaybackStreamer::new(capacity, args.fan_out);
    let progress = streamer.progress();
    let (node, mut port) = create_node(streamer, config.port_capacity);

    let mut scheduler = Scheduler::new(config.quantum_frames, 1, device.channels() as usize);
    scheduler.register(PlaybackStreamer::NAME, Box::new(node))?;
    let stream = device.start(scheduler)?;

    let started = Instant::now();
    let lead = Duration::from_millis(args.lead_ms);
    let mut chunks = pcm.chunks(args.chunk_samples);
    let mut pending = chunks.next();
    let mut posted = 0usize;

    loop {
        // Keep the queue topped up without running too far ahead
        while let Some(chunk) = pending {
            let queued_until = Duration::from_secs_f64(posted as f64 / device_rate as f64);
            if queued_until.saturating_sub(started.elapsed()) > lead {
                break;
            }
            match port.post(PlaybackCommand::Enqueue(chunk.to_vec())) {
                Ok(()) => {
                    posted += chunk.len();
                    pending = chunks.next();
                }
                Err(WorkletError::PortFull { .. }) => break,
                Err(e) => return Err(e.into()),
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("⏹️  Cancelling playback");
                port.post(PlaybackCommand::Stop)?;
                wait_for_end(&mut port).await?;
                break;
            }
            event = port.recv() => {
                let Some(event) = event else {
                    anyhow::bail!("Playback unit closed unexpectedly");
                };
                debug!("Event: {}", serde_json::to_string(&event).unwrap_or_default());
                match event {
                    // An underrun reported before the last post can arrive after it
                    PlaybackEvent::PlaybackEnded if pending.is_none() && progress.covers(posted as u64) => {
                        tokio::time::sleep(FLUSH_DELAY).await;
                        info!("✅ Playback finished ({:.1}s)", posted as f64 / device_rate as f64);
                        break;
                    }
                    PlaybackEvent::PlaybackEnded => warn!("Playback underrun, host fell behind"),
                    PlaybackEvent::PlaybackOverflow { dropped } => warn!("Playback queue overflow, {} samples lost", dropped),
                }
            }
            _ = tokio::time::sleep(FEED_INTERVAL) => {}
        }
    }

    drop(stream);
    Ok(())
}

/// Wait for the `playback_ended` answer to a cancellation.
async fn wait_for_end(port: &mut HostPort<PlaybackCommand, PlaybackEvent>) -> Result<()> {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, port.recv()).await {
            Ok(Some(PlaybackEvent::PlaybackEnded)) => return Ok(()),
            Ok(Some(other)) => debug!("Ignoring {:?} while cancelling", other),
            Ok(None) => anyhow::bail!("Playback unit closed unexpectedly"),
            Err(_) => anyhow::bail!("Timed out waiting for playback to stop"),
        }
    }
}

/// Local timestamp for recording file names.
fn timestamp() -> Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[year][month][day]-[hour][minute][second]")).context("Failed to format timestamp")
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown(shutdown: CancellationToken) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }

    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if config.verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🎧 voice-worklets v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    config.log_config();

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    let result = match &config.command {
        Command::Record(args) => run_record(&config, args, shutdown).await,
        Command::Play(args) => run_play(&config, args, shutdown).await,
    };

    if let Err(ref e) = result {
        error!("❌ {:#}", e);
    }
    result
}
