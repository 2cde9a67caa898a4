//! # snack-session - Session Worker Channel
//!
//! Spawns the session worker, speaks its line-delimited JSON protocol, and
//! correlates requests with their responses and progress callbacks.
//!
//! Depends on [`snack_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Channel
//! - [`SessionChannel`] - Proxy for the worker: buffering, requests, pushes
//! - [`PendingRequest`] - Future for one correlated request
//! - [`Subscription`] - Disposable handle for a push listener
//!
//! ### Protocol
//! - [`parse_inbound()`] - Parse one line from the worker
//! - [`OutboundMessage`], [`InboundMessage`], [`Outcome`] - Wire messages
//! - [`Property`] - Session properties set with `SET_*`
//!
//! ### Request Tracking
//! - [`RequestTracker`] - Pending requests keyed by token
//! - [`generate_token()`] - Fresh random correlation token
//!
//! ### Worker Process
//! - [`WorkerProcess`] - Spawn the worker as a child process
//! - [`WorkerCommand`] - Program, arguments, and working directory
//! - [`WorkerLink`], [`WorkerSender`], [`WorkerEvent`] - Transport-neutral link

pub mod channel;
pub mod protocol;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tracker;
pub mod worker;

// Public API re-exports
pub use channel::{PendingRequest, SessionChannel, Subscription};
pub use protocol::{
    parse_inbound, parse_upload_result, send_code_payload, upload_asset_payload,
    InboundMessage, OutboundMessage, Outcome, Property,
};
pub use tracker::{generate_token, RequestTracker};
pub use worker::{WorkerCommand, WorkerEvent, WorkerLink, WorkerProcess, WorkerSender};
