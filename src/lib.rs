//! snack-sync library
//!
//! Drives a live Snack session from a project directory. The session logic
//! lives in the workspace crates; this crate wires them to a worker process
//! and a line-oriented terminal interface.

pub mod headless;

// Re-export main entry points
pub use headless::runner::{run_headless, HeadlessOptions};
