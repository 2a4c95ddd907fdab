//! Client for the downstream transcription endpoint.
//!
//! Consumed by the host after a recording completes; the real-time units never
//! touch the network.

mod client;

pub use client::TranscriptionClient;
