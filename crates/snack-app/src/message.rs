//! Message types for the session controller (TEA pattern)
//!
//! Everything that happens asynchronously (worker pushes, timer expiry,
//! request completions, notices from other tabs) reaches the controller as a
//! [`Message`] on one queue and is applied by `SessionController::update`.

use snack_core::events::{DependencyError, SessionEvent};
use snack_core::Result;

use crate::tabs::TabNotice;

#[derive(Debug)]
pub enum Message {
    /// Push forwarded from the session channel
    Push(SessionEvent),

    // ─────────────────────────────────────────────────────────
    // Timers
    // ─────────────────────────────────────────────────────────
    /// Code-push debounce window elapsed
    CodePushDue,

    /// Autosave debounce window elapsed
    AutosaveDue,

    // ─────────────────────────────────────────────────────────
    // Request Completions
    // ─────────────────────────────────────────────────────────
    /// `INIT` settled
    Created(Result<()>),

    /// `START` settled
    Started(Result<()>),

    /// `SAVE` settled. `generation` is the edit counter when it was sent.
    SaveFinished {
        generation: u64,
        draft: bool,
        result: Result<String>,
    },

    /// One `SYNC_DEPENDENCIES` progress callback
    DependencyFailed(DependencyError),

    /// `SYNC_DEPENDENCIES` settled
    DependenciesSynced(Result<()>),

    /// `UPLOAD_ASSET` settled with the asset's uri
    AssetUploaded { path: String, result: Result<String> },

    // ─────────────────────────────────────────────────────────
    // Cross-tab
    // ─────────────────────────────────────────────────────────
    Tab(TabNotice),
}
