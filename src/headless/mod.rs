//! Headless mode - JSON events on stdout, JSON commands on stdin
//!
//! The session runs without an editor attached. Everything the controller
//! reports is written to stdout as NDJSON (newline-delimited JSON), one
//! event per line, each with an "event" field naming its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"session_started","timestamp":1704700001000}
//! {"event":"code_pushed","files":3,"timestamp":1704700002000}
//! {"event":"status_changed","old":"changed","new":"saving-draft","timestamp":1704700005000}
//! {"event":"saved","id":"@anon/abc","draft":true,"timestamp":1704700005400}
//! ```
//!
//! Commands are read from stdin; see [`command`].

pub mod command;
pub mod runner;

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use snack_app::{ControllerEvent, SaveStatus};
use snack_core::events::{DeviceDescriptor, DeviceLog, ErrorAnnotation, LogMethod};
use snack_core::Error;

/// Events emitted in headless mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// `INIT` and `START` both succeeded
    SessionStarted { timestamp: i64 },

    SessionFailed { message: String, timestamp: i64 },

    /// The worker process went away
    WorkerExited { code: Option<i32>, timestamp: i64 },

    StatusChanged {
        old: SaveStatus,
        new: SaveStatus,
        timestamp: i64,
    },

    Saved {
        id: String,
        draft: bool,
        timestamp: i64,
    },

    SaveFailed {
        draft: bool,
        message: String,
        timestamp: i64,
    },

    AutosaveToggled { enabled: bool, timestamp: i64 },

    CodePushed { files: usize, timestamp: i64 },

    StateReconciled {
        replaced: Option<String>,
        timestamp: i64,
    },

    ManifestToggled { present: bool, timestamp: i64 },

    DependencyFailed {
        name: String,
        message: String,
        timestamp: i64,
    },

    DependenciesSynced { ok: bool, timestamp: i64 },

    AssetUploaded {
        path: String,
        uri: String,
        timestamp: i64,
    },

    AssetUploadFailed {
        path: String,
        message: String,
        timestamp: i64,
    },

    DevicesChanged {
        devices: Vec<DeviceDescriptor>,
        timestamp: i64,
    },

    /// The inline error changed; `null` clears it
    ErrorAnnotated {
        annotation: Option<ErrorAnnotation>,
        timestamp: i64,
    },

    /// Console output from a device
    Log {
        level: String,
        message: String,
        device: Option<String>,
        timestamp: i64,
    },

    ChannelAssigned { id: String, timestamp: i64 },

    /// A stdin command could not be applied
    CommandFailed {
        command: String,
        message: String,
        timestamp: i64,
    },

    /// Error outside any single command
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        // Consumers read line by line
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Translate a controller event, stamped with `timestamp`.
    pub fn from_controller(event: ControllerEvent, timestamp: i64) -> Self {
        match event {
            ControllerEvent::SessionStarted => Self::SessionStarted { timestamp },
            ControllerEvent::SessionFailed { message } => Self::SessionFailed { message, timestamp },
            ControllerEvent::WorkerExited { code } => Self::WorkerExited { code, timestamp },
            ControllerEvent::StatusChanged { old, new } => Self::StatusChanged {
                old,
                new,
                timestamp,
            },
            ControllerEvent::Saved { id, draft } => Self::Saved {
                id,
                draft,
                timestamp,
            },
            ControllerEvent::SaveFailed { draft, message } => Self::SaveFailed {
                draft,
                message,
                timestamp,
            },
            ControllerEvent::AutosaveToggled { enabled } => {
                Self::AutosaveToggled { enabled, timestamp }
            }
            ControllerEvent::CodePushed { files } => Self::CodePushed { files, timestamp },
            ControllerEvent::StateReconciled { replaced } => {
                Self::StateReconciled { replaced, timestamp }
            }
            ControllerEvent::ManifestToggled { present } => {
                Self::ManifestToggled { present, timestamp }
            }
            ControllerEvent::DependencyFailed(failure) => Self::DependencyFailed {
                name: failure.name,
                message: failure.message,
                timestamp,
            },
            ControllerEvent::DependenciesSynced { ok } => {
                Self::DependenciesSynced { ok, timestamp }
            }
            ControllerEvent::AssetUploaded { path, uri } => Self::AssetUploaded {
                path,
                uri,
                timestamp,
            },
            ControllerEvent::AssetUploadFailed { path, message } => Self::AssetUploadFailed {
                path,
                message,
                timestamp,
            },
            ControllerEvent::DevicesChanged { devices } => {
                Self::DevicesChanged { devices, timestamp }
            }
            ControllerEvent::ErrorAnnotated(annotation) => Self::ErrorAnnotated {
                annotation,
                timestamp,
            },
            ControllerEvent::Log(log) => Self::log(log, timestamp),
            ControllerEvent::ChannelAssigned { id } => Self::ChannelAssigned { id, timestamp },
        }
    }

    fn log(log: DeviceLog, timestamp: i64) -> Self {
        let level = match log.method {
            LogMethod::Log => "log",
            LogMethod::Info => "info",
            LogMethod::Warn => "warn",
            LogMethod::Error => "error",
        };
        Self::Log {
            level: level.to_string(),
            message: log.message,
            device: log.device.map(|device| device.name),
            timestamp,
        }
    }

    pub fn command_failed(command: &str, message: String) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            message,
            timestamp: Self::now(),
        }
    }

    pub fn error(err: &Error) -> Self {
        Self::Error {
            message: err.to_string(),
            fatal: err.is_fatal(),
            timestamp: Self::now(),
        }
    }
}

impl From<ControllerEvent> for HeadlessEvent {
    fn from(event: ControllerEvent) -> Self {
        Self::from_controller(event, Self::now())
    }
}
