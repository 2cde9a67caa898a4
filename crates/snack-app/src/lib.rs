//! snack-app - Session orchestration for snack-sync
//!
//! This crate implements the TEA (The Elm Architecture) style session
//! controller that keeps the editor's entry store in sync with the session
//! worker, plus configuration loading, project loading, save-status
//! tracking, debounce timers, and cross-tab autosave coordination.
//!
//! ## Public API
//!
//! - [`SessionController`] - Owns the entry store; debounced code push,
//!   autosave, `STATE` reconciliation, manifest maintenance
//! - [`Message`] - Everything asynchronous the controller reacts to
//! - [`ControllerEvent`] - What the controller reports to consumers
//! - [`SaveStatus`] - `changed → saving-draft → saved-draft`,
//!   `changed → publishing → published`
//! - [`TabCoordinator`] - Hands autosave to the most recently claimed tab
//! - [`load_project()`] - Read a project directory
//! - [`config`] - `.snack/config.toml`

pub mod config;
pub mod controller;
pub mod controller_event;
pub mod debounce;
pub mod message;
pub mod project;
pub mod save_status;
pub mod tabs;

// Re-export primary types
pub use config::{init_config_dir, load_settings, Settings};
pub use controller::{SessionController, LOG_CAPACITY};
pub use controller_event::ControllerEvent;
pub use debounce::Debouncer;
pub use message::Message;
pub use project::{load_project, AssetSource, LoadedProject, Project};
pub use save_status::SaveStatus;
pub use tabs::{TabCoordinator, TabHandle, TabNotice};
