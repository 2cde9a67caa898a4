//! Authoritative project state as observed from the session worker

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A file as the session sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum SessionFile {
    /// Source text
    Code { contents: String },
    /// Uploaded binary, referenced by URI
    Asset { contents: String },
}

impl SessionFile {
    pub fn code(contents: impl Into<String>) -> Self {
        Self::Code {
            contents: contents.into(),
        }
    }

    pub fn asset(uri: impl Into<String>) -> Self {
        Self::Asset {
            contents: uri.into(),
        }
    }

    pub fn contents(&self) -> &str {
        match self {
            SessionFile::Code { contents } | SessionFile::Asset { contents } => contents,
        }
    }

    pub fn is_asset(&self) -> bool {
        matches!(self, SessionFile::Asset { .. })
    }
}

/// Map of project-relative path to file.
pub type SessionFiles = BTreeMap<String, SessionFile>;

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub version: String,
    /// Resolved bundle handle, filled in by the worker once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Dependency {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            handle: None,
        }
    }
}

/// Map of package name to dependency.
pub type Dependencies = BTreeMap<String, Dependency>;

/// The session's view of the project, replaced wholesale on every `STATE`
/// push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub name: String,
    pub description: String,
    pub files: SessionFiles,
    pub dependencies: Dependencies,
    pub sdk_version: String,
    pub is_resolving: bool,
    pub loading_message: Option<String>,
}

impl SessionState {
    /// Initial state built from what the editor already knows locally.
    pub fn from_defaults(
        name: impl Into<String>,
        description: impl Into<String>,
        files: SessionFiles,
        dependencies: Dependencies,
        sdk_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            files,
            dependencies,
            sdk_version: sdk_version.into(),
            is_resolving: false,
            loading_message: None,
        }
    }

    /// Whether `dependencies` differs from this state's map, ignoring
    /// resolution handles.
    pub fn dependencies_differ(&self, dependencies: &Dependencies) -> bool {
        self.dependencies.len() != dependencies.len()
            || self
                .dependencies
                .iter()
                .any(|(name, dep)| dependencies.get(name).map(|d| &d.version) != Some(&dep.version))
    }
}
