//! Configuration module for the worklet host.
//!
//! Provides CLI argument parsing and configuration management.

#[allow(clippy::module_inception)]
mod config;

pub use config::{AppConfig, Command, PlayArgs, RecordArgs};
