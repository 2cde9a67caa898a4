//! Loading and initialising `.snack/config.toml`

use std::path::{Path, PathBuf};

use snack_core::prelude::*;

use super::types::Settings;

const CONFIG_FILENAME: &str = "config.toml";
const SNACK_DIR: &str = ".snack";

/// Path of the config file for a project.
pub fn config_path(project_path: &Path) -> PathBuf {
    project_path.join(SNACK_DIR).join(CONFIG_FILENAME)
}

/// Load settings from .snack/config.toml
///
/// Returns defaults if the file is missing or unreadable.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = config_path(project_path);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create .snack/config.toml with commented defaults. An existing file is
/// left alone.
pub fn init_config_dir(project_path: &Path) -> Result<()> {
    let snack_dir = project_path.join(SNACK_DIR);

    if !snack_dir.exists() {
        std::fs::create_dir_all(&snack_dir)
            .map_err(|e| Error::config(format!("Failed to create .snack dir: {}", e)))?;
    }

    let config_path = snack_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# snack-sync configuration

[session]
code_push_debounce_ms = 1000   # Quiet period before edits reach the device
autosave_debounce_ms = 3000    # Quiet period before a draft is saved
autosave = true
entry_point = "App.js"
sdk_version = "35.0.0"
# name = "My Snack"            # Defaults to the directory name
description = ""

[worker]
command = "snack-worker"
args = []

[device]
# device_id = ""
# user = ""
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created {:?}", config_path);
    }

    Ok(())
}
