//! # snack-core - Core Domain Types
//!
//! Foundation crate for snack-sync. Provides the entry model, session state,
//! push event payloads, SDK capability checks, and error handling.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Entries (`entries`)
//! - [`Entry`], [`EntryItem`], [`EntryState`] - Flat file/folder records
//! - [`EntryStore`] - Entry list plus entry point, with checked mutations
//! - [`unique_path()`], [`create_at()`], [`rename_cascade()`], [`delete_cascade()`],
//!   [`is_inside_folder()`] - Pure list operations
//!
//! ### Session State (`state`)
//! - [`SessionState`] - The worker's view of the project
//! - [`SessionFile`], [`Dependency`] - File and dependency records
//!
//! ### Events (`events`)
//! - [`SessionEvent`] - Typed worker push
//! - [`PushKind`] - Subscribable push categories
//!
//! ### Manifest and SDK (`manifest`, `sdk`)
//! - [`render_manifest()`], [`parse_manifest()`] - Synthetic `package.json`
//! - [`Feature`], [`is_feature_supported()`] - SDK capability table
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! ```rust
//! use snack_core::prelude::*;
//! ```

pub mod entries;
pub mod error;
pub mod events;
pub mod logging;
pub mod manifest;
pub mod prelude;
pub mod ring_buffer;
pub mod sdk;
pub mod state;

pub use entries::{
    create_at, delete_cascade, is_inside_folder, rename_cascade, unique_path, Entry, EntryItem,
    EntryState, EntryStore, DEFAULT_ENTRY_POINT,
};
pub use error::{Error, RemoteError, Result, ResultExt};
pub use events::{
    DependencyError, DeviceDescriptor, DeviceLog, ErrorAnnotation, LogLine, LogMethod,
    PresenceEvent, PresenceStatus, PushKind, RuntimeError, SessionEvent,
};
pub use manifest::{manifest_entry, parse_manifest, render_manifest, MANIFEST_PATH};
pub use ring_buffer::RingBuffer;
pub use sdk::{is_feature_supported, Feature, SdkVersion};
pub use state::{Dependencies, Dependency, SessionFile, SessionFiles, SessionState};
