//! Error types for the processing-unit runtime.

use thiserror::Error;

/// Errors surfaced by the worklet runtime to the host side.
///
/// The render path itself never fails; these are returned from construction,
/// registration and host-side message posting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkletError {
    #[error("invalid sample rate: {input} Hz -> {output} Hz")]
    InvalidSampleRate { input: u32, output: u32 },

    #[error("a processor named '{0}' is already registered")]
    DuplicateName(String),

    #[error("message port is full ({capacity} pending messages)")]
    PortFull { capacity: usize },

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
