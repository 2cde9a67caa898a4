//! Synthetic `package.json` derived from the dependency map
//!
//! Projects on an SDK with [`Feature::ProjectDependencies`] show their
//! dependencies as an editable manifest. The file never exists in the
//! session; it is rendered from [`Dependencies`] as a virtual entry and,
//! when edited, parsed back into a dependency map.
//!
//! [`Feature::ProjectDependencies`]: crate::sdk::Feature::ProjectDependencies

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::entries::Entry;
use crate::error::{Error, Result};
use crate::state::{Dependencies, Dependency};

pub const MANIFEST_PATH: &str = "package.json";

#[derive(Serialize)]
struct ManifestShape<'a> {
    dependencies: BTreeMap<&'a str, &'a str>,
}

/// Render the dependency map in the manifest's fixed shape.
pub fn render_manifest(dependencies: &Dependencies) -> String {
    let shape = ManifestShape {
        dependencies: dependencies
            .iter()
            .map(|(name, dep)| (name.as_str(), dep.version.as_str()))
            .collect(),
    };
    // A map of strings always serialises
    serde_json::to_string_pretty(&shape).unwrap_or_else(|_| String::from("{}"))
}

/// Parse manifest text back into a dependency map.
///
/// A missing `dependencies` key is an empty map. Versions must be strings.
pub fn parse_manifest(content: &str) -> Result<Dependencies> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| Error::invalid_manifest(format!("not valid JSON: {e}")))?;

    let root = value
        .as_object()
        .ok_or_else(|| Error::invalid_manifest("top level must be an object"))?;

    let Some(dependencies) = root.get("dependencies") else {
        return Ok(Dependencies::new());
    };

    let dependencies = dependencies
        .as_object()
        .ok_or_else(|| Error::invalid_manifest("\"dependencies\" must be an object"))?;

    dependencies
        .iter()
        .map(|(name, version)| {
            let version = version.as_str().ok_or_else(|| {
                Error::invalid_manifest(format!("version of \"{name}\" must be a string"))
            })?;
            Ok((name.clone(), Dependency::new(version)))
        })
        .collect()
}

/// The virtual manifest entry for `dependencies`.
pub fn manifest_entry(dependencies: &Dependencies) -> Entry {
    Entry::virtual_text_file(MANIFEST_PATH, render_manifest(dependencies))
}
