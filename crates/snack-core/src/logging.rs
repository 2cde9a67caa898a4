//! File logging for snack-sync
//!
//! stdout belongs to headless JSON events, so every `tracing` record goes to
//! a daily rolling file instead. `SNACK_LOG` sets the filter and
//! `SNACK_LOG_DIR` moves the directory.
//!
//! ```bash
//! SNACK_LOG=debug snack-sync ./my-snack
//! SNACK_LOG=snack_session=trace snack-sync ./my-snack
//! ```

use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

const FILTER_ENV: &str = "SNACK_LOG";
const DIR_ENV: &str = "SNACK_LOG_DIR";
const FILE_PREFIX: &str = "snack.log";

/// Filter used when `SNACK_LOG` is unset
const DEFAULT_FILTER: &str = "snack_sync=info,snack_app=info,snack_session=info,snack_core=info,warn";

/// Install the global subscriber. Returns the directory logs go to.
pub fn init() -> Result<PathBuf> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, FILE_PREFIX);
    let filter =
        EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::config(format!("logging already initialised: {e}")))?;

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("snack-sync {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(log_dir)
}

/// `SNACK_LOG_DIR`, else `<data_local_dir>/snack-sync/logs`
pub fn log_directory() -> PathBuf {
    match std::env::var_os(DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => default_log_directory(),
    }
}

fn default_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("snack-sync").join("logs")
}

/// Today's file in `dir`, as named by the daily appender.
pub fn current_log_file(dir: &Path) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d");
    dir.join(format!("{FILE_PREFIX}.{today}"))
}
