//! Loading a project directory into session files
//!
//! Text sources become `CODE` files. Anything else, including text files that
//! are not valid UTF-8, is returned as an asset to upload once the session
//! is open. A top-level `package.json` supplies
//! the dependency map and is not sent as a file.

use std::path::{Path, PathBuf};

use snack_core::prelude::*;
use snack_core::{parse_manifest, Dependencies, SessionFile, SessionFiles, MANIFEST_PATH};

use crate::config::SessionSettings;

/// Maximum directory depth walked below the project root
pub const MAX_DEPTH: usize = 10;

/// Extensions read as source text
const TEXT_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "json", "md", "txt", "css", "html", "svg",
];

/// Directory names never walked into
const SKIP_DIRS: &[&str] = &["node_modules", "build", "dist"];

/// What a session is created from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub files: SessionFiles,
    pub dependencies: Dependencies,
    pub sdk_version: String,
}

/// A binary file found on disk, waiting to be uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSource {
    pub path: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProject {
    pub project: Project,
    pub assets: Vec<AssetSource>,
}

/// Read `dir` into a [`LoadedProject`].
pub fn load_project(dir: &Path, settings: &SessionSettings) -> Result<LoadedProject> {
    if !dir.is_dir() {
        return Err(Error::NoProject {
            path: dir.to_path_buf(),
        });
    }

    let name = settings.name.clone().unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snack".to_string())
    });

    let mut found = Vec::new();
    walk(dir, dir, 0, &mut found)?;

    let mut files = SessionFiles::new();
    let mut assets = Vec::new();
    let mut dependencies = Dependencies::new();

    for (relative, absolute) in found {
        let bytes = std::fs::read(&absolute)
            .with_context(|| format!("Failed to read {:?}", absolute))?;

        if relative == MANIFEST_PATH {
            match std::str::from_utf8(&bytes)
                .map_err(|e| Error::invalid_manifest(e.to_string()))
                .and_then(parse_manifest)
            {
                Ok(parsed) => dependencies = parsed,
                Err(e) => warn!("Ignoring {}: {}", MANIFEST_PATH, e),
            }
            continue;
        }

        if !is_text_path(&relative) {
            assets.push(AssetSource {
                path: relative,
                bytes,
            });
            continue;
        }

        match String::from_utf8(bytes) {
            Ok(content) => {
                files.insert(relative, SessionFile::code(content));
            }
            Err(e) => {
                warn!("{} is not valid UTF-8; uploading it as an asset", relative);
                assets.push(AssetSource {
                    path: relative,
                    bytes: e.into_bytes(),
                });
            }
        }
    }

    if !files.contains_key(&settings.entry_point) {
        warn!(
            "Project {:?} has no entry point {}",
            dir, settings.entry_point
        );
    }

    info!(
        "Loaded project {} ({} files, {} assets, {} dependencies)",
        name,
        files.len(),
        assets.len(),
        dependencies.len()
    );

    Ok(LoadedProject {
        project: Project {
            name,
            description: settings.description.clone(),
            files,
            dependencies,
            sdk_version: settings.sdk_version.clone(),
        },
        assets,
    })
}

fn walk(root: &Path, dir: &Path, depth: usize, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    if depth > MAX_DEPTH {
        debug!("Not descending below {:?}: max depth reached", dir);
        return Ok(());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk(root, &path, depth + 1, out)?;
        } else if path.is_file() {
            if let Some(relative) = relative_path(root, &path) {
                out.push((relative, path));
            }
        }
    }

    Ok(())
}

/// `/`-separated path of `path` below `root`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn is_text_path(path: &str) -> bool {
    snack_core::entries::extension(path)
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
