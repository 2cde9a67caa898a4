//! Configuration file parsing for snack-sync
//!
//! Settings live in `.snack/config.toml` inside the project directory.

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_dir, load_settings};
pub use types::*;
