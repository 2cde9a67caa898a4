//! Domain event definitions for worker-initiated pushes

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::state::SessionState;

// ─────────────────────────────────────────────────────────
// Push Payloads
// ─────────────────────────────────────────────────────────

/// A device attached to the live session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Join,
    Leave,
}

/// A device joined or left the session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub status: PresenceStatus,
    pub device: DeviceDescriptor,
}

/// Error thrown by the running project on a device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeError {
    pub message: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub device: Option<DeviceDescriptor>,
}

/// The one error the editor shows inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnnotation {
    pub message: String,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl ErrorAnnotation {
    /// Build the annotation from the first error of an `ERROR` push.
    /// The remaining errors are dropped.
    pub fn from_errors(errors: &[RuntimeError]) -> Option<Self> {
        errors.first().map(|err| Self {
            message: err.message.clone(),
            path: err.file_name.clone(),
            line: err.line_number,
            column: err.column_number,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMethod {
    #[default]
    Log,
    Info,
    Warn,
    Error,
}

/// A console line emitted by a device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLog {
    #[serde(default)]
    pub method: LogMethod,
    pub message: String,
    #[serde(default)]
    pub device: Option<DeviceDescriptor>,
}

/// A [`DeviceLog`] stamped with its local arrival time
#[derive(Debug, Clone)]
pub struct LogLine {
    pub log: DeviceLog,
    pub received_at: DateTime<Local>,
}

impl LogLine {
    pub fn now(log: DeviceLog) -> Self {
        Self {
            log,
            received_at: Local::now(),
        }
    }
}

/// One failing dependency, reported through the `SYNC_DEPENDENCIES`
/// progress callback
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyError {
    pub name: String,
    #[serde(default)]
    pub message: String,
}

// ─────────────────────────────────────────────────────────
// SessionEvent Enum
// ─────────────────────────────────────────────────────────

/// Kinds of worker-initiated pushes a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushKind {
    State,
    Presence,
    Error,
    Log,
    Channel,
    /// The worker process went away
    Exited,
}

impl PushKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            PushKind::State => "STATE",
            PushKind::Presence => "PRESENCE",
            PushKind::Error => "ERROR",
            PushKind::Log => "LOG",
            PushKind::Channel => "CHANNEL",
            PushKind::Exited => "EXITED",
        }
    }
}

/// Fully typed worker push
#[derive(Debug, Clone)]
pub enum SessionEvent {
    State(Box<SessionState>),
    Presence(PresenceEvent),
    Error(Vec<RuntimeError>),
    Log(DeviceLog),
    Channel(String),
    Exited { code: Option<i32> },
}

impl SessionEvent {
    pub fn kind(&self) -> PushKind {
        match self {
            SessionEvent::State(_) => PushKind::State,
            SessionEvent::Presence(_) => PushKind::Presence,
            SessionEvent::Error(_) => PushKind::Error,
            SessionEvent::Log(_) => PushKind::Log,
            SessionEvent::Channel(_) => PushKind::Channel,
            SessionEvent::Exited { .. } => PushKind::Exited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_annotation_uses_first_error_only() {
        let errors: Vec<RuntimeError> = serde_json::from_value(json!([
            { "message": "undefined is not a function", "fileName": "App.js", "lineNumber": 12, "columnNumber": 4 },
            { "message": "second error" }
        ]))
        .unwrap();

        let annotation = ErrorAnnotation::from_errors(&errors).unwrap();
        assert_eq!(annotation.message, "undefined is not a function");
        assert_eq!(annotation.path.as_deref(), Some("App.js"));
        assert_eq!(annotation.line, Some(12));
        assert_eq!(annotation.column, Some(4));
    }

    #[test]
    fn test_annotation_without_location() {
        let errors = vec![RuntimeError {
            message: "boom".into(),
            file_name: None,
            line_number: None,
            column_number: None,
            stack: None,
            device: None,
        }];
        let annotation = ErrorAnnotation::from_errors(&errors).unwrap();
        assert!(annotation.line.is_none());
        assert!(ErrorAnnotation::from_errors(&[]).is_none());
    }

    #[test]
    fn test_presence_parse() {
        let presence: PresenceEvent = serde_json::from_value(json!({
            "status": "join",
            "device": { "id": "abc", "name": "Pixel 7", "platform": "android" }
        }))
        .unwrap();
        assert_eq!(presence.status, PresenceStatus::Join);
        assert_eq!(presence.device.name, "Pixel 7");
    }

    #[test]
    fn test_device_log_defaults_method() {
        let log: DeviceLog = serde_json::from_value(json!({ "message": "hi" })).unwrap();
        assert_eq!(log.method, LogMethod::Log);
    }
}
