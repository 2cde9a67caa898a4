//! Error types shared by every snack-sync crate

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// An error raised inside the session worker and shipped back over the
/// channel as the payload of a `*_ERROR` response.
///
/// The worker serialises its error as `{ message, stack }`; we rebuild it
/// here so callers get the remote message and stack trace as a local value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub message: String,
    pub stack: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            message: message.into(),
            stack,
        }
    }

    /// Rebuild a remote error from the `data` field of an `*_ERROR` payload.
    ///
    /// Accepts `{ "message": .., "stack": .. }`, a bare string, or anything
    /// else (rendered as JSON so nothing is silently lost).
    pub fn from_payload(data: &serde_json::Value) -> Self {
        match data {
            serde_json::Value::Object(map) => {
                let message = map
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| data.to_string());
                let stack = map
                    .get("stack")
                    .and_then(|s| s.as_str())
                    .map(str::to_string);
                Self { message, stack }
            }
            serde_json::Value::String(message) => Self::new(message.clone(), None),
            serde_json::Value::Null => Self::new("Unknown error", None),
            other => Self::new(other.to_string(), None),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Application error types organized by layer
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Worker Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Session worker command not found: {command}")]
    WorkerNotFound { command: String },

    #[error("Failed to spawn session worker: {reason}")]
    WorkerSpawn { reason: String },

    #[error("Session worker exited unexpectedly with code: {code:?}")]
    WorkerExit { code: Option<i32> },

    #[error("Session protocol error: {message}")]
    Protocol { message: String },

    #[error("Session request failed: {0}")]
    Remote(RemoteError),

    // ─────────────────────────────────────────────────────────────
    // Entry Model Errors
    // ─────────────────────────────────────────────────────────────
    #[error("An entry already exists at: {path}")]
    PathConflict { path: String },

    #[error("No entry found at: {path}")]
    EntryNotFound { path: String },

    #[error("The entry point cannot be renamed or deleted: {path}")]
    EntryPointProtected { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    // ─────────────────────────────────────────────────────────────
    // Project / Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No project found in: {path}")]
    NoProject { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn path_conflict(path: impl Into<String>) -> Self {
        Self::PathConflict { path: path.into() }
    }

    pub fn entry_not_found(path: impl Into<String>) -> Self {
        Self::EntryNotFound { path: path.into() }
    }

    pub fn entry_point_protected(path: impl Into<String>) -> Self {
        Self::EntryPointProtected { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// The remote error carried by a settled `*_ERROR` response, if any.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Protocol { .. }
                | Error::Remote(_)
                | Error::ChannelSend { .. }
                | Error::PathConflict { .. }
                | Error::EntryNotFound { .. }
                | Error::EntryPointProtected { .. }
                | Error::InvalidPath { .. }
                | Error::InvalidManifest { .. }
        )
    }

    /// Check if this error should end the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::WorkerNotFound { .. }
                | Error::WorkerSpawn { .. }
                | Error::WorkerExit { .. }
                | Error::NoProject { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
