//! Wire format of the messages exchanged with the processing units.
//!
//! Capture unit:
//! - host -> unit: `"start"` | `"stop"`
//! - unit -> host: `{ "audioData": [f32...], "audioDataLength": n }`, once per `"stop"`
//!
//! Playback unit:
//! - host -> unit: `[i16...]` to enqueue, `"stop"` or `null` to cancel
//! - unit -> host: `{ "type": "playback_ended" }`, and `{ "type": "playback_overflow", "dropped": n }`
//!   when the queue had to drop samples

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkletError;

/// Control message for the capture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureCommand {
    /// Clear the buffer and arm recording
    Start,
    /// Disarm and deliver the accumulated buffer
    Stop,
}

impl CaptureCommand {
    /// Parse a JSON control message.
    ///
    /// # Errors
    /// Returns [`WorkletError::InvalidMessage`] for anything but `"start"` or `"stop"`.
    pub fn from_value(value: &Value) -> Result<Self, WorkletError> {
        Self::deserialize(value).map_err(|e| WorkletError::InvalidMessage(format!("capture command {}: {}", value, e)))
    }
}

/// Result of one recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEvent {
    pub audio_data: Vec<f32>,
    pub audio_data_length: usize,
}

/// Control message for the playback unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Append samples to the tail of the queue
    Enqueue(Vec<i16>),
    /// Cancellation sentinel: drop everything queued
    Stop,
}

impl PlaybackCommand {
    /// Parse a JSON message.
    ///
    /// An array of integers is enqueued; `"stop"` and `null` cancel.
    ///
    /// # Errors
    /// Returns [`WorkletError::InvalidMessage`] for other strings, objects, or
    /// arrays containing values outside the `i16` range.
    pub fn from_value(value: &Value) -> Result<Self, WorkletError> {
        match value {
            Value::Null => Ok(Self::Stop),
            Value::String(tag) if tag == "stop" => Ok(Self::Stop),
            Value::Array(_) => Vec::<i16>::deserialize(value)
                .map(Self::Enqueue)
                .map_err(|e| WorkletError::InvalidMessage(format!("playback samples: {}", e))),
            other => Err(WorkletError::InvalidMessage(format!("unexpected playback message: {}", other))),
        }
    }
}

/// Notification from the playback unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// The queue drained to empty, or playback was cancelled
    PlaybackEnded,
    /// Enqueued samples did not fit and were discarded
    PlaybackOverflow { dropped: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capture_commands_from_tags() {
        assert_eq!(CaptureCommand::from_value(&json!("start")), Ok(CaptureCommand::Start));
        assert_eq!(CaptureCommand::from_value(&json!("stop")), Ok(CaptureCommand::Stop));
        assert!(CaptureCommand::from_value(&json!("pause")).is_err());
        assert!(CaptureCommand::from_value(&json!(null)).is_err());
    }

    #[test]
    fn test_capture_event_wire_format() {
        let event = CaptureEvent { audio_data: vec![0.5, -0.25], audio_data_length: 2 };
        assert_eq!(serde_json::to_value(&event).unwrap(), json!({ "audioData": [0.5, -0.25], "audioDataLength": 2 }));
    }

    #[test]
    fn test_playback_commands() {
        assert_eq!(PlaybackCommand::from_value(&json!([1, -2, 32767, -32768])), Ok(PlaybackCommand::Enqueue(vec![1, -2, 32767, -32768])));
        assert_eq!(PlaybackCommand::from_value(&json!([])), Ok(PlaybackCommand::Enqueue(Vec::new())));
        assert_eq!(PlaybackCommand::from_value(&json!("stop")), Ok(PlaybackCommand::Stop));
        assert_eq!(PlaybackCommand::from_value(&Value::Null), Ok(PlaybackCommand::Stop));

        assert!(PlaybackCommand::from_value(&json!([40000])).is_err());
        assert!(PlaybackCommand::from_value(&json!("start")).is_err());
        assert!(PlaybackCommand::from_value(&json!({ "samples": [1] })).is_err());
    }

    #[test]
    fn test_playback_event_wire_format() {
        assert_eq!(serde_json::to_value(PlaybackEvent::PlaybackEnded).unwrap(), json!({ "type": "playback_ended" }));
        assert_eq!(
            serde_json::to_value(PlaybackEvent::PlaybackOverflow { dropped: 12 }).unwrap(),
            json!({ "type": "playback_overflow", "dropped": 12 })
        );
    }
}
