//! Configuration types for snack-sync

use std::time::Duration;

use serde::{Deserialize, Serialize};

use snack_core::DEFAULT_ENTRY_POINT;

/// Project settings (.snack/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub device: DeviceSettings,
}

/// Session behaviour: debounce windows, autosave, defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Quiet period before local edits are pushed with `SEND_CODE`
    #[serde(default = "default_code_push_debounce_ms")]
    pub code_push_debounce_ms: u64,

    /// Quiet period before a draft is saved
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,

    #[serde(default = "default_true")]
    pub autosave: bool,

    /// File that can never be renamed or deleted
    #[serde(default = "default_entry_point")]
    pub entry_point: String,

    /// SDK version used when the project does not name one
    #[serde(default = "default_sdk_version")]
    pub sdk_version: String,

    /// Project name override; defaults to the directory name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,
}

impl SessionSettings {
    pub fn code_push_debounce(&self) -> Duration {
        Duration::from_millis(self.code_push_debounce_ms)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            code_push_debounce_ms: default_code_push_debounce_ms(),
            autosave_debounce_ms: default_autosave_debounce_ms(),
            autosave: true,
            entry_point: default_entry_point(),
            sdk_version: default_sdk_version(),
            name: None,
            description: String::new(),
        }
    }
}

fn default_code_push_debounce_ms() -> u64 {
    1000
}

fn default_autosave_debounce_ms() -> u64 {
    3000
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

fn default_sdk_version() -> String {
    "35.0.0".to_string()
}

fn default_true() -> bool {
    true
}

/// How to launch the session worker
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkerSettings {
    #[serde(default = "default_worker_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            command: default_worker_command(),
            args: Vec::new(),
        }
    }
}

fn default_worker_command() -> String {
    "snack-worker".to_string()
}

/// Values the editor remembers between sessions
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub user: Option<String>,
}
