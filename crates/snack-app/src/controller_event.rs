//! Events emitted by the session controller for external consumers
//!
//! Broadcast after each message or mutation via
//! `SessionController::subscribe()`. The headless binary serialises them as
//! JSON lines.

use snack_core::events::{DependencyError, DeviceDescriptor, DeviceLog, ErrorAnnotation};

use crate::save_status::SaveStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    // ─────────────────────────────────────────────────────────
    // Session Lifecycle
    // ─────────────────────────────────────────────────────────
    /// `INIT` and `START` both succeeded
    SessionStarted,

    /// `INIT` or `START` failed
    SessionFailed { message: String },

    /// The worker process went away
    WorkerExited { code: Option<i32> },

    // ─────────────────────────────────────────────────────────
    // Saving
    // ─────────────────────────────────────────────────────────
    StatusChanged { old: SaveStatus, new: SaveStatus },

    Saved { id: String, draft: bool },

    SaveFailed { draft: bool, message: String },

    /// Autosave turned on or off for this tab
    AutosaveToggled { enabled: bool },

    // ─────────────────────────────────────────────────────────
    // Synchronisation
    // ─────────────────────────────────────────────────────────
    /// `SEND_CODE` went out with this many files
    CodePushed { files: usize },

    /// A `STATE` push was applied; `replaced` names the focused file if its
    /// content was taken from the push
    StateReconciled { replaced: Option<String> },

    /// The synthetic manifest appeared or disappeared
    ManifestToggled { present: bool },

    DependencyFailed(DependencyError),

    DependenciesSynced { ok: bool },

    AssetUploaded { path: String, uri: String },

    AssetUploadFailed { path: String, message: String },

    // ─────────────────────────────────────────────────────────
    // Device Pushes
    // ─────────────────────────────────────────────────────────
    DevicesChanged { devices: Vec<DeviceDescriptor> },

    ErrorAnnotated(Option<ErrorAnnotation>),

    Log(DeviceLog),

    ChannelAssigned { id: String },
}
