//! snack-sync - Keep a project directory in sync with a live Snack session
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

use snack_app::config::{config_path, init_config_dir, load_settings};
use snack_sync::HeadlessOptions;

/// snack-sync - Keep a project directory in sync with a live Snack session
#[derive(Parser, Debug)]
#[command(name = "snack-sync")]
#[command(about = "Keep a project directory in sync with a live Snack session", long_about = None)]
struct Args {
    /// Path to the project
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Write a default .snack/config.toml and exit
    #[arg(long)]
    init: bool,

    /// Session worker command (overrides [worker] command)
    #[arg(long, value_name = "COMMAND")]
    worker: Option<String>,

    /// Extra argument for the session worker; repeatable
    #[arg(long = "worker-arg", value_name = "ARG", allow_hyphen_values = true)]
    worker_args: Vec<String>,

    /// Device id sent with SET_DEVICE_ID
    #[arg(long, value_name = "ID")]
    device_id: Option<String>,

    /// User sent with SET_USER
    #[arg(long, value_name = "USER")]
    user: Option<String>,

    /// SDK version for the session (overrides [session] sdk_version)
    #[arg(long, value_name = "VERSION")]
    sdk_version: Option<String>,

    /// Do not autosave drafts
    #[arg(long)]
    no_autosave: bool,

    /// Publish once the session has started
    #[arg(long)]
    save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let project_path = args
        .path
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if !project_path.is_dir() {
        eprintln!("❌ Not a directory: {}", project_path.display());
        std::process::exit(1);
    }

    if args.init {
        init_config_dir(&project_path)?;
        eprintln!("✅ Wrote {}", config_path(&project_path).display());
        return Ok(());
    }

    snack_core::logging::init()?;

    let mut settings = load_settings(&project_path);
    if let Some(worker) = args.worker {
        settings.worker.command = worker;
    }
    if !args.worker_args.is_empty() {
        settings.worker.args = args.worker_args;
    }
    if args.device_id.is_some() {
        settings.device.device_id = args.device_id;
    }
    if args.user.is_some() {
        settings.device.user = args.user;
    }
    if let Some(sdk_version) = args.sdk_version {
        settings.session.sdk_version = sdk_version;
    }
    if args.no_autosave {
        settings.session.autosave = false;
    }

    let options = HeadlessOptions {
        project_path,
        settings,
        save_on_start: args.save,
    };
    snack_sync::run_headless(options).await?;
    Ok(())
}
