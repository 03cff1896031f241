//! Events pushed to connected clients.
//!
//! [`Event`] is serialized with a `type` discriminator (`log`, `progress`,
//! `speed`) and camelCase field names, which is the format the browser
//! client consumes.

use serde::{Deserialize, Serialize};

/// Severity attached to a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// A progress snapshot for the running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Overall percentage, 0-99 while running and 100 on completion.
    pub progress: u8,
    /// Resolution label of the current stage (e.g. `720p`).
    pub resolution: String,
    /// Human readable stage description.
    pub stage: String,
    /// 1-based index of the current stage. Absent on the completion event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<usize>,
    /// Number of stages in the job.
    pub total_stages: usize,
    /// Percentage within the current stage. Absent on the completion event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_progress: Option<u8>,
}

impl ProgressUpdate {
    /// The final update, sent once after the transcoder exits successfully.
    pub fn completed(total_stages: usize) -> Self {
        Self {
            progress: 100,
            resolution: "done".to_string(),
            stage: "Conversion complete".to_string(),
            current_stage: None,
            total_stages,
            resolution_progress: None,
        }
    }
}

/// Event broadcast to every connected listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// A line of log output.
    Log { level: LogLevel, message: String },
    /// Percentage/stage update.
    Progress(ProgressUpdate),
    /// Encoding speed as a multiple of realtime.
    Speed { speed: f64 },
}

impl Event {
    /// Create a Log event.
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Event::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info-level Log event.
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a warning-level Log event.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warning, message)
    }

    /// Create an error-level Log event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Create a success-level Log event.
    pub fn success(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Success, message)
    }

    /// Create a Speed event.
    pub fn speed(speed: f64) -> Self {
        Event::Speed { speed }
    }

    /// Discriminator as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Log { .. } => "log",
            Event::Progress(_) => "progress",
            Event::Speed { .. } => "speed",
        }
    }
}

/// Message accepted from a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Cancel the running job.
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_event_wire_format() {
        let event = Event::warning("Job cancelled by user");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "log", "level": "warning", "message": "Job cancelled by user"})
        );
    }

    #[test]
    fn progress_event_uses_camel_case() {
        let event = Event::Progress(ProgressUpdate {
            progress: 17,
            resolution: "720p".to_string(),
            stage: "Processing 720p".to_string(),
            current_stage: Some(1),
            total_stages: 3,
            resolution_progress: Some(50),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["progress"], 17);
        assert_eq!(value["currentStage"], 1);
        assert_eq!(value["totalStages"], 3);
        assert_eq!(value["resolutionProgress"], 50);
    }

    #[test]
    fn completion_event_omits_stage_fields() {
        let value = serde_json::to_value(Event::Progress(ProgressUpdate::completed(3))).unwrap();
        assert_eq!(value["progress"], 100);
        assert_eq!(value["totalStages"], 3);
        assert!(value.get("currentStage").is_none());
        assert!(value.get("resolutionProgress").is_none());
    }

    #[test]
    fn speed_event_wire_format() {
        let value = serde_json::to_value(Event::speed(1.5)).unwrap();
        assert_eq!(value, json!({"type": "speed", "speed": 1.5}));
    }

    #[test]
    fn abort_message_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"abort"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Abort);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"pause"}"#).is_err());
    }
}
