//! Commands read from stdin in headless mode
//!
//! One command per line. Either a JSON object tagged by `"command"`:
//!
//! ```json
//! {"command":"edit","path":"App.js","content":"export default 1;"}
//! {"command":"rename","from":"App 1.js","to":"Other.js"}
//! {"command":"sync_dependencies","dependencies":{"lodash":{"version":"4.17.21"}}}
//! ```
//!
//! or one of the shorthands `s`/`save`, `f`/`flush`, `q`/`quit`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use snack_app::SessionController;
use snack_core::entries::{Entry, EntryState};
use snack_core::prelude::*;
use snack_core::state::Dependencies;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HeadlessCommand {
    Edit {
        path: String,
        content: String,
    },
    /// New text file named `name`, next to or inside `parent`
    CreateFile {
        #[serde(default)]
        parent: Option<String>,
        name: String,
        #[serde(default)]
        content: String,
    },
    CreateFolder {
        #[serde(default)]
        parent: Option<String>,
        name: String,
    },
    /// Copy of an existing file, named "<stem> copy.<ext>"
    Duplicate {
        path: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Delete {
        path: String,
    },
    Focus {
        path: String,
    },
    Blur,
    Save,
    Flush,
    SyncDependencies {
        dependencies: Dependencies,
    },
    /// Upload a file from disk as an asset stored at `path`
    Upload {
        path: String,
        file: PathBuf,
    },
    SetSdkVersion {
        version: String,
    },
    SetName {
        name: String,
    },
    SetDescription {
        description: String,
    },
    ClaimAutosave,
    Quit,
}

impl HeadlessCommand {
    /// Parse one stdin line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let trimmed = line.trim();
        let command = match trimmed {
            "" => return Ok(None),
            "s" | "save" => Self::Save,
            "f" | "flush" => Self::Flush,
            "q" | "quit" => Self::Quit,
            _ => serde_json::from_str(trimmed)?,
        };
        Ok(Some(command))
    }

    /// Name used when reporting a failure
    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit { .. } => "edit",
            Self::CreateFile { .. } => "create_file",
            Self::CreateFolder { .. } => "create_folder",
            Self::Duplicate { .. } => "duplicate",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Focus { .. } => "focus",
            Self::Blur => "blur",
            Self::Save => "save",
            Self::Flush => "flush",
            Self::SyncDependencies { .. } => "sync_dependencies",
            Self::Upload { .. } => "upload",
            Self::SetSdkVersion { .. } => "set_sdk_version",
            Self::SetName { .. } => "set_name",
            Self::SetDescription { .. } => "set_description",
            Self::ClaimAutosave => "claim_autosave",
            Self::Quit => "quit",
        }
    }
}

/// What the runner should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply `command` to the controller. Relative upload paths resolve
/// against `project_path`.
pub async fn apply(
    controller: &mut SessionController,
    command: HeadlessCommand,
    project_path: &Path,
) -> Result<Flow> {
    match command {
        HeadlessCommand::Edit { path, content } => controller.edit(&path, &content)?,
        HeadlessCommand::CreateFile {
            parent,
            name,
            content,
        } => {
            let path =
                controller.create_entry(parent.as_deref(), Entry::text_file(name, content), None)?;
            info!("Created file {}", path);
        }
        HeadlessCommand::CreateFolder { parent, name } => {
            let path = controller.create_entry(parent.as_deref(), Entry::folder(name), None)?;
            info!("Created folder {}", path);
        }
        HeadlessCommand::Duplicate { path } => {
            let prototype = controller
                .store()
                .get(&path)
                .filter(|entry| !entry.is_folder() && !entry.is_virtual())
                .map(|entry| entry.clone().with_state(EntryState::default()))
                .ok_or_else(|| Error::entry_not_found(&path))?;
            let copy = controller.create_entry(Some(&path), prototype, Some("copy"))?;
            info!("Duplicated {} as {}", path, copy);
        }
        HeadlessCommand::Rename { from, to } => controller.rename(&from, &to)?,
        HeadlessCommand::Delete { path } => controller.delete(&path)?,
        HeadlessCommand::Focus { path } => controller.focus(&path)?,
        HeadlessCommand::Blur => controller.blur(),
        HeadlessCommand::Save => controller.save(),
        HeadlessCommand::Flush => controller.flush_code(),
        HeadlessCommand::SyncDependencies { dependencies } => {
            controller.sync_dependencies(dependencies)
        }
        HeadlessCommand::Upload { path, file } => {
            let source = if file.is_absolute() {
                file
            } else {
                project_path.join(file)
            };
            let bytes = tokio::fs::read(&source).await?;
            controller.upload_asset(&path, &bytes)?;
        }
        HeadlessCommand::SetSdkVersion { version } => controller.set_sdk_version(&version),
        HeadlessCommand::SetName { name } => controller.set_name(&name),
        HeadlessCommand::SetDescription { description } => {
            controller.set_description(&description)
        }
        HeadlessCommand::ClaimAutosave => controller.claim_autosave(),
        HeadlessCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}
