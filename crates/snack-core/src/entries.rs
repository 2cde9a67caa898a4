//! Flat file/folder entry model
//!
//! The project tree is a flat list. A folder's children are never stored;
//! they are every entry whose path starts with `folder + "/"`. All hierarchy
//! questions are answered by the helpers in this module, so there are no
//! parent pointers to keep consistent.
//!
//! Path uniqueness is case-insensitive. Prefix matching for cascades is
//! case-sensitive, matching how paths are stored.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::{SessionFile, SessionFiles};

/// Entry point used when the project does not configure one
pub const DEFAULT_ENTRY_POINT: &str = "App.js";

// ─────────────────────────────────────────────────────────
// Entry Types
// ─────────────────────────────────────────────────────────

/// Editor-side flags for an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryState {
    pub is_open: bool,
    pub is_focused: bool,
    pub is_selected: bool,
    pub is_creating: bool,
    pub is_expanded: bool,
}

/// What an entry is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryItem {
    TextFile {
        path: String,
        content: String,
        #[serde(default, rename = "virtual", skip_serializing_if = "std::ops::Not::not")]
        is_virtual: bool,
    },
    AssetFile {
        path: String,
        uri: String,
        #[serde(default, rename = "virtual", skip_serializing_if = "std::ops::Not::not")]
        is_virtual: bool,
    },
    Folder {
        path: String,
    },
}

/// One file or folder record in the project's flat list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub item: EntryItem,
    #[serde(default)]
    pub state: EntryState,
}

impl Entry {
    pub fn text_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            item: EntryItem::TextFile {
                path: path.into(),
                content: content.into(),
                is_virtual: false,
            },
            state: EntryState::default(),
        }
    }

    pub fn asset_file(path: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            item: EntryItem::AssetFile {
                path: path.into(),
                uri: uri.into(),
                is_virtual: false,
            },
            state: EntryState::default(),
        }
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Self {
            item: EntryItem::Folder { path: path.into() },
            state: EntryState::default(),
        }
    }

    /// A derived text entry that is never sent to the session
    pub fn virtual_text_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            item: EntryItem::TextFile {
                path: path.into(),
                content: content.into(),
                is_virtual: true,
            },
            state: EntryState::default(),
        }
    }

    pub fn with_state(mut self, state: EntryState) -> Self {
        self.state = state;
        self
    }

    pub fn path(&self) -> &str {
        match &self.item {
            EntryItem::TextFile { path, .. }
            | EntryItem::AssetFile { path, .. }
            | EntryItem::Folder { path } => path,
        }
    }

    pub fn set_path(&mut self, new_path: String) {
        match &mut self.item {
            EntryItem::TextFile { path, .. }
            | EntryItem::AssetFile { path, .. }
            | EntryItem::Folder { path } => *path = new_path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.item, EntryItem::Folder { .. })
    }

    pub fn is_virtual(&self) -> bool {
        match self.item {
            EntryItem::TextFile { is_virtual, .. } | EntryItem::AssetFile { is_virtual, .. } => {
                is_virtual
            }
            EntryItem::Folder { .. } => false,
        }
    }

    /// Text content, for text files only
    pub fn content(&self) -> Option<&str> {
        match &self.item {
            EntryItem::TextFile { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Project this entry into the session's file shape. Folders have none.
    pub fn to_session_file(&self) -> Option<SessionFile> {
        match &self.item {
            EntryItem::TextFile { content, .. } => Some(SessionFile::code(content.clone())),
            EntryItem::AssetFile { uri, .. } => Some(SessionFile::asset(uri.clone())),
            EntryItem::Folder { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Path Helpers
// ─────────────────────────────────────────────────────────

/// True iff `path` lies strictly inside `folder_path`.
pub fn is_inside_folder(path: &str, folder_path: &str) -> bool {
    path.len() > folder_path.len() + 1
        && path.starts_with(folder_path)
        && path.as_bytes()[folder_path.len()] == b'/'
}

/// Parent folder of `path`, or `None` at top level.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

/// Last path segment.
pub fn basename(path: &str) -> &str {
    path.rfind('/').map_or(path, |i| &path[i + 1..])
}

/// Split a path into `(stem, extension)`. Only the last segment is
/// considered, and a leading dot (`.babelrc`) is not an extension.
pub fn split_extension(path: &str) -> (&str, Option<&str>) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let split = name_start + dot;
            (&path[..split], Some(&path[split + 1..]))
        }
        _ => (path, None),
    }
}

/// Extension of the last path segment, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    split_extension(path).1
}

fn join_path(folder: Option<&str>, name: &str) -> String {
    match folder {
        Some(folder) if !folder.is_empty() => format!("{folder}/{name}"),
        _ => name.to_string(),
    }
}

fn paths_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Reject paths the flat model cannot represent.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::invalid_path(path, "path is empty"));
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(Error::invalid_path(path, "leading or trailing '/'"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(Error::invalid_path(path, "empty segment")),
            "." | ".." => return Err(Error::invalid_path(path, "relative segment")),
            _ => {}
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Pure List Operations
// ─────────────────────────────────────────────────────────

/// Produce a path that does not collide (ignoring case) with any of
/// `existing_paths`.
///
/// On collision a suffix is inserted before the extension: `" 1"`, `" 2"`, …
/// When `initial_suffix` is given the counter starts at zero, producing
/// `"name copy"`, `"name copy 1"`, … instead. The counter only grows and
/// every value yields a distinct candidate, so at most
/// `existing_paths.len() + 1` candidates are tried.
pub fn unique_path<S: AsRef<str>>(
    existing_paths: &[S],
    suggested_path: &str,
    initial_suffix: Option<&str>,
) -> String {
    let taken: BTreeSet<String> = existing_paths
        .iter()
        .map(|p| p.as_ref().to_lowercase())
        .collect();

    let (stem, extension) = split_extension(suggested_path);
    let mut counter: u64 = if initial_suffix.is_some() { 0 } else { 1 };
    let mut candidate = suggested_path.to_string();

    while taken.contains(&candidate.to_lowercase()) {
        let number = if counter == 0 {
            String::new()
        } else {
            counter.to_string()
        };
        let suffix = format!("{} {}", initial_suffix.unwrap_or(""), number);
        let suffix = suffix.trim();

        candidate = match extension {
            Some(ext) => format!("{stem} {suffix}.{ext}"),
            None => format!("{stem} {suffix}"),
        };
        counter += 1;
    }

    candidate
}

/// Build a new entry from `prototype`, placed relative to `parent`.
///
/// - `parent` names a folder: nest inside it.
/// - `parent` names a file: nest beside it, in that file's folder.
/// - `None` (or an unknown path): top level.
///
/// The final path goes through [`unique_path`]. The entry is returned, not
/// inserted.
pub fn create_at(
    entries: &[Entry],
    parent: Option<&str>,
    prototype: Entry,
    suffix: Option<&str>,
) -> Entry {
    let folder = parent.and_then(|target| {
        entries
            .iter()
            .find(|e| e.path() == target)
            .and_then(|e| {
                if e.is_folder() {
                    Some(e.path())
                } else {
                    parent_path(e.path())
                }
            })
    });

    let suggested = join_path(folder, basename(prototype.path()));
    let existing: Vec<&str> = entries.iter().map(Entry::path).collect();
    let path = unique_path(&existing, &suggested, suffix);

    let mut entry = prototype;
    entry.set_path(path);
    entry
}

/// Rename `old_path` to `new_path`, carrying every descendant along.
///
/// Only the `old_path + "/"` prefix of a descendant changes. Entries
/// outside the subtree pass through untouched.
pub fn rename_cascade(entries: Vec<Entry>, old_path: &str, new_path: &str) -> Vec<Entry> {
    entries
        .into_iter()
        .map(|mut entry| {
            if entry.path() == old_path {
                entry.set_path(new_path.to_string());
            } else if is_inside_folder(entry.path(), old_path) {
                let renamed = format!("{new_path}{}", &entry.path()[old_path.len()..]);
                entry.set_path(renamed);
            }
            entry
        })
        .collect()
}

/// Remove the entry at `path` and, for a folder, all of its descendants.
pub fn delete_cascade(entries: Vec<Entry>, path: &str) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|e| e.path() != path && !is_inside_folder(e.path(), path))
        .collect()
}

/// Direct children of `folder_path`.
pub fn children<'a>(entries: &'a [Entry], folder_path: &'a str) -> impl Iterator<Item = &'a Entry> {
    entries
        .iter()
        .filter(move |e| parent_path(e.path()) == Some(folder_path))
}

/// Entries at the top level.
pub fn top_level(entries: &[Entry]) -> impl Iterator<Item = &Entry> {
    entries.iter().filter(|e| !e.path().contains('/'))
}

/// Build a flat list from a session file map, adding every implied folder.
pub fn entries_from_files(files: &SessionFiles) -> Vec<Entry> {
    let mut folders = BTreeSet::new();
    for path in files.keys() {
        let mut current = parent_path(path);
        while let Some(folder) = current {
            if !folders.insert(folder.to_string()) {
                break;
            }
            current = parent_path(folder);
        }
    }

    let mut entries: Vec<Entry> = folders.into_iter().map(Entry::folder).collect();
    entries.extend(files.iter().map(|(path, file)| match file {
        SessionFile::Code { contents } => Entry::text_file(path.clone(), contents.clone()),
        SessionFile::Asset { contents } => Entry::asset_file(path.clone(), contents.clone()),
    }));
    entries
}

/// Project the list back into the session's file-map shape.
/// Folders and virtual entries are left out.
pub fn files_from_entries(entries: &[Entry]) -> SessionFiles {
    entries
        .iter()
        .filter(|e| !e.is_virtual())
        .filter_map(|e| e.to_session_file().map(|file| (e.path().to_string(), file)))
        .collect()
}

// ─────────────────────────────────────────────────────────
// EntryStore
// ─────────────────────────────────────────────────────────

/// The project's entry list together with its designated entry point.
///
/// Mutations are checked: paths stay unique ignoring case, and the entry
/// point can be neither renamed nor deleted (directly or by moving or
/// removing a folder that contains it).
#[derive(Debug, Clone)]
pub struct EntryStore {
    entries: Vec<Entry>,
    entry_point: String,
}

impl EntryStore {
    pub fn new(entries: Vec<Entry>, entry_point: impl Into<String>) -> Self {
        Self {
            entries,
            entry_point: entry_point.into(),
        }
    }

    pub fn from_files(files: &SessionFiles, entry_point: impl Into<String>) -> Self {
        Self::new(entries_from_files(files), entry_point)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path() == path)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.path() == path)
    }

    pub fn contains_ignoring_case(&self, path: &str) -> bool {
        self.entries.iter().any(|e| paths_equal(e.path(), path))
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(Entry::path).collect()
    }

    pub fn is_entry_point(&self, path: &str) -> bool {
        path == self.entry_point
    }

    /// The entry the editor currently has focused
    pub fn focused(&self) -> Option<&Entry> {
        self.entries.iter().find(|e| e.state.is_focused)
    }

    pub fn open_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.state.is_open)
    }

    pub fn children<'a>(&'a self, folder_path: &'a str) -> impl Iterator<Item = &'a Entry> {
        children(&self.entries, folder_path)
    }

    /// Session file map for this list, virtual entries excluded
    pub fn to_files(&self) -> SessionFiles {
        files_from_entries(&self.entries)
    }

    /// Add an entry at its exact path.
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        validate_path(entry.path())?;
        if self.contains_ignoring_case(entry.path()) {
            return Err(Error::path_conflict(entry.path()));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Create an entry relative to `parent`, picking a free path.
    /// Returns the path it was stored under.
    pub fn create_at(
        &mut self,
        parent: Option<&str>,
        prototype: Entry,
        suffix: Option<&str>,
    ) -> Result<String> {
        let entry = create_at(&self.entries, parent, prototype, suffix);
        let path = entry.path().to_string();
        self.insert(entry)?;
        Ok(path)
    }

    /// Rename an entry and its subtree.
    pub fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        if old_path == new_path {
            return Ok(());
        }
        validate_path(new_path)?;
        if self.get(old_path).is_none() {
            return Err(Error::entry_not_found(old_path));
        }
        if self.touches_entry_point(old_path) {
            return Err(Error::entry_point_protected(old_path));
        }
        if is_inside_folder(new_path, old_path) {
            return Err(Error::invalid_path(new_path, "cannot move a folder into itself"));
        }

        let collides = self.entries.iter().any(|e| {
            let in_subtree = e.path() == old_path || is_inside_folder(e.path(), old_path);
            !in_subtree && paths_equal(e.path(), new_path)
        });
        if collides {
            return Err(Error::path_conflict(new_path));
        }

        let entries = std::mem::take(&mut self.entries);
        self.entries = rename_cascade(entries, old_path, new_path);
        Ok(())
    }

    /// Delete an entry and its subtree.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        if self.get(path).is_none() {
            return Err(Error::entry_not_found(path));
        }
        if self.touches_entry_point(path) {
            return Err(Error::entry_point_protected(path));
        }

        let entries = std::mem::take(&mut self.entries);
        self.entries = delete_cascade(entries, path);
        Ok(())
    }

    /// Remove a virtual entry. Synthesized entries bypass the entry point
    /// and existence checks.
    pub fn remove_virtual(&mut self, path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !(e.is_virtual() && e.path() == path));
        before != self.entries.len()
    }

    /// Insert or replace a virtual entry in place, keeping its editor state.
    pub fn upsert_virtual(&mut self, entry: Entry) {
        match self.get_mut(entry.path()) {
            Some(existing) if existing.is_virtual() => {
                existing.item = entry.item;
            }
            Some(_) => {
                tracing::warn!(
                    "Refusing to shadow real entry {} with a virtual one",
                    entry.path()
                );
            }
            None => self.entries.push(entry),
        }
    }

    /// Replace the text of a file. Returns whether anything changed.
    pub fn update_content(&mut self, path: &str, new_content: &str) -> Result<bool> {
        let entry = self
            .get_mut(path)
            .ok_or_else(|| Error::entry_not_found(path))?;
        match &mut entry.item {
            EntryItem::TextFile { content, .. } => {
                if content == new_content {
                    Ok(false)
                } else {
                    *content = new_content.to_string();
                    Ok(true)
                }
            }
            _ => Err(Error::invalid_path(path, "not a text file")),
        }
    }

    /// Focus `path`, opening it; every other entry loses focus.
    pub fn focus(&mut self, path: &str) -> Result<()> {
        if self.get(path).is_none() {
            return Err(Error::entry_not_found(path));
        }
        for entry in &mut self.entries {
            let target = entry.path() == path;
            entry.state.is_focused = target;
            if target {
                entry.state.is_open = true;
            }
        }
        Ok(())
    }

    /// Drop focus from every entry.
    pub fn blur(&mut self) {
        for entry in &mut self.entries {
            entry.state.is_focused = false;
        }
    }

    fn touches_entry_point(&self, path: &str) -> bool {
        self.is_entry_point(path) || is_inside_folder(&self.entry_point, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(Entry::path).collect()
    }

    // ── unique_path ─────────────────────────────────

    #[test]
    fn test_unique_path_no_collision() {
        assert_eq!(unique_path(&["App.js"], "Button.js", None), "Button.js");
    }

    #[test]
    fn test_unique_path_inserts_counter_before_extension() {
        assert_eq!(unique_path(&["App.js"], "App.js", None), "App 1.js");
        assert_eq!(
            unique_path(&["App.js", "App 1.js"], "App.js", None),
            "App 2.js"
        );
    }

    #[test]
    fn test_unique_path_is_case_insensitive() {
        assert_eq!(unique_path(&["app.JS"], "App.js", None), "App 1.js");
    }

    #[test]
    fn test_unique_path_with_initial_suffix() {
        let existing = ["Button.js"];
        assert_eq!(
            unique_path(&existing, "Button.js", Some("copy")),
            "Button copy.js"
        );

        let existing = ["Button.js", "Button copy.js"];
        assert_eq!(
            unique_path(&existing, "Button.js", Some("copy")),
            "Button copy 1.js"
        );
    }

    #[test]
    fn test_unique_path_without_extension() {
        assert_eq!(
            unique_path(&["components"], "components", None),
            "components 1"
        );
        assert_eq!(unique_path(&[".babelrc"], ".babelrc", None), ".babelrc 1");
    }

    #[test]
    fn test_unique_path_extension_only_in_last_segment() {
        assert_eq!(
            unique_path(&["v1.2/readme"], "v1.2/readme", None),
            "v1.2/readme 1"
        );
        assert_eq!(
            unique_path(&["src/App.test.js"], "src/App.test.js", None),
            "src/App.test 1.js"
        );
    }

    #[test]
    fn test_unique_path_result_never_collides() {
        let mut existing: Vec<String> = vec!["a.js".into()];
        for _ in 0..25 {
            let next = unique_path(&existing, "A.JS", None);
            assert!(!existing.iter().any(|p| p.to_lowercase() == next.to_lowercase()));
            existing.push(next);
        }
        assert_eq!(existing.len(), 26);
    }

    // ── create_at ───────────────────────────────────

    #[test]
    fn test_create_at_top_level_with_collision() {
        let entries = vec![Entry::text_file("App.js", "")];
        let created = create_at(&entries, None, Entry::text_file("App.js", ""), None);
        assert_eq!(created.path(), "App 1.js");
    }

    #[test]
    fn test_create_at_empty_list() {
        let created = create_at(&[], None, Entry::text_file("App.js", ""), None);
        assert_eq!(created.path(), "App.js");
    }

    #[test]
    fn test_create_at_inside_folder() {
        let entries = vec![Entry::folder("components")];
        let created = create_at(
            &entries,
            Some("components"),
            Entry::text_file("Button.js", ""),
            None,
        );
        assert_eq!(created.path(), "components/Button.js");
    }

    #[test]
    fn test_create_at_beside_file() {
        let entries = vec![
            Entry::folder("components"),
            Entry::text_file("components/Button.js", ""),
        ];
        let created = create_at(
            &entries,
            Some("components/Button.js"),
            Entry::text_file("Button.js", ""),
            Some("copy"),
        );
        assert_eq!(created.path(), "components/Button copy.js");
    }

    #[test]
    fn test_create_at_beside_top_level_file() {
        let entries = vec![Entry::text_file("App.js", "")];
        let created = create_at(
            &entries,
            Some("App.js"),
            Entry::folder("components"),
            None,
        );
        assert_eq!(created.path(), "components");
        assert!(created.is_folder());
    }

    // ── rename / delete cascades ────────────────────

    #[test]
    fn test_rename_cascade_rewrites_prefix_only() {
        let entries = vec![
            Entry::folder("components"),
            Entry::text_file("components/A.js", "a"),
            Entry::text_file("other.js", "o"),
        ];
        let original_other = entries[2].clone();

        let renamed = rename_cascade(entries, "components", "comp");
        assert_eq!(paths(&renamed), vec!["comp", "comp/A.js", "other.js"]);
        assert_eq!(renamed[2], original_other);
        assert_eq!(renamed[1].content(), Some("a"));
    }

    #[test]
    fn test_rename_cascade_ignores_sibling_with_shared_prefix() {
        let entries = vec![
            Entry::folder("comp"),
            Entry::text_file("components.js", ""),
            Entry::text_file("comp/x.js", ""),
        ];
        let renamed = rename_cascade(entries, "comp", "lib");
        assert_eq!(paths(&renamed), vec!["lib", "components.js", "lib/x.js"]);
    }

    #[test]
    fn test_delete_cascade_removes_subtree_only() {
        let entries = vec![
            Entry::folder("a"),
            Entry::folder("a/b"),
            Entry::text_file("a/b/c.js", ""),
            Entry::text_file("a.js", ""),
            Entry::text_file("ab/d.js", ""),
        ];
        let remaining = delete_cascade(entries, "a");
        assert_eq!(paths(&remaining), vec!["a.js", "ab/d.js"]);
    }

    #[test]
    fn test_is_inside_folder() {
        assert!(is_inside_folder("a/b.js", "a"));
        assert!(is_inside_folder("a/b/c.js", "a"));
        assert!(!is_inside_folder("a", "a"));
        assert!(!is_inside_folder("ab/c.js", "a"));
        assert!(!is_inside_folder("a/", "a"));
    }

    // ── derived views ───────────────────────────────

    #[test]
    fn test_children_are_derived() {
        let entries = vec![
            Entry::folder("a"),
            Entry::text_file("a/1.js", ""),
            Entry::folder("a/b"),
            Entry::text_file("a/b/2.js", ""),
            Entry::text_file("top.js", ""),
        ];
        let direct: Vec<&str> = children(&entries, "a").map(Entry::path).collect();
        assert_eq!(direct, vec!["a/1.js", "a/b"]);

        let top: Vec<&str> = top_level(&entries).map(Entry::path).collect();
        assert_eq!(top, vec!["a", "top.js"]);
    }

    #[test]
    fn test_entries_from_files_adds_implied_folders() {
        let mut files = SessionFiles::new();
        files.insert("App.js".into(), SessionFile::code("app"));
        files.insert("src/ui/Button.js".into(), SessionFile::code("btn"));
        files.insert("assets/logo.png".into(), SessionFile::asset("https://x/logo.png"));

        let entries = entries_from_files(&files);
        let all = paths(&entries);
        assert!(all.contains(&"src"));
        assert!(all.contains(&"src/ui"));
        assert!(all.contains(&"assets"));
        assert_eq!(entries.iter().filter(|e| e.is_folder()).count(), 3);
    }

    #[test]
    fn test_files_from_entries_excludes_virtual_and_folders() {
        let entries = vec![
            Entry::folder("src"),
            Entry::text_file("src/App.js", "app"),
            Entry::asset_file("logo.png", "https://x/logo.png"),
            Entry::virtual_text_file("package.json", "{}"),
        ];
        let files = files_from_entries(&entries);
        assert_eq!(files.len(), 2);
        assert!(files.contains_key("src/App.js"));
        assert!(files["logo.png"].is_asset());
        assert!(!files.contains_key("package.json"));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_path("a/b/c.js"), Some("a/b"));
        assert_eq!(parent_path("c.js"), None);
        assert_eq!(basename("a/b/c.js"), "c.js");
        assert_eq!(extension("a/b/c.test.tsx"), Some("tsx"));
        assert_eq!(extension("a.b/README"), None);
        assert_eq!(extension(".gitignore"), None);
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("a/b.js").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("/a").is_err());
        assert!(validate_path("a//b").is_err());
        assert!(validate_path("a/../b").is_err());
    }

    #[test]
    fn test_entry_serde_shape() {
        let entry = Entry::virtual_text_file("package.json", "{}");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["item"]["type"], "text_file");
        assert_eq!(json["item"]["virtual"], true);

        let plain = serde_json::to_value(Entry::text_file("App.js", "")).unwrap();
        assert!(plain["item"].get("virtual").is_none());
    }

    // ── EntryStore ──────────────────────────────────

    fn store() -> EntryStore {
        EntryStore::new(
            vec![
                Entry::text_file("App.js", "app"),
                Entry::folder("components"),
                Entry::text_file("components/A.js", "a"),
            ],
            "App.js",
        )
    }

    #[test]
    fn test_store_rejects_case_insensitive_duplicate() {
        let mut store = store();
        let err = store.insert(Entry::text_file("app.js", "")).unwrap_err();
        assert!(matches!(err, Error::PathConflict { .. }));
    }

    #[test]
    fn test_store_entry_point_is_protected() {
        let mut store = store();
        assert!(matches!(
            store.rename("App.js", "Main.js").unwrap_err(),
            Error::EntryPointProtected { .. }
        ));
        assert!(matches!(
            store.delete("App.js").unwrap_err(),
            Error::EntryPointProtected { .. }
        ));
        assert!(store.get("App.js").is_some());
    }

    #[test]
    fn test_store_folder_holding_entry_point_is_protected() {
        let mut store = EntryStore::new(
            vec![Entry::folder("src"), Entry::text_file("src/App.js", "")],
            "src/App.js",
        );
        assert!(store.delete("src").is_err());
        assert!(store.rename("src", "lib").is_err());
    }

    #[test]
    fn test_store_rename_conflict() {
        let mut store = store();
        store.insert(Entry::text_file("comp", "")).unwrap();
        assert!(matches!(
            store.rename("components", "Comp").unwrap_err(),
            Error::PathConflict { .. }
        ));
    }

    #[test]
    fn test_store_rename_into_itself_rejected() {
        let mut store = store();
        assert!(store.rename("components", "components/nested").is_err());
    }

    #[test]
    fn test_store_rename_case_only_change() {
        let mut store = store();
        store.rename("components", "Components").unwrap();
        assert!(store.get("Components/A.js").is_some());
    }

    #[test]
    fn test_store_create_at_picks_free_path() {
        let mut store = store();
        let path = store
            .create_at(Some("components/A.js"), Entry::text_file("A.js", ""), None)
            .unwrap();
        assert_eq!(path, "components/A 1.js");
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_store_focus_is_exclusive() {
        let mut store = store();
        store.focus("App.js").unwrap();
        store.focus("components/A.js").unwrap();

        assert_eq!(store.focused().unwrap().path(), "components/A.js");
        assert_eq!(store.open_entries().count(), 2);
        store.blur();
        assert!(store.focused().is_none());
    }

    #[test]
    fn test_store_update_content_reports_change() {
        let mut store = store();
        assert!(!store.update_content("App.js", "app").unwrap());
        assert!(store.update_content("App.js", "app2").unwrap());
        assert!(store.update_content("components", "x").is_err());
        assert!(store.update_content("missing.js", "x").is_err());
    }

    #[test]
    fn test_store_virtual_upsert_keeps_state() {
        let mut store = store();
        store.upsert_virtual(Entry::virtual_text_file("package.json", "{}"));
        store.focus("package.json").unwrap();
        store.upsert_virtual(Entry::virtual_text_file("package.json", "{\"a\":1}"));

        let manifest = store.get("package.json").unwrap();
        assert!(manifest.state.is_focused);
        assert_eq!(manifest.content(), Some("{\"a\":1}"));

        assert!(store.remove_virtual("package.json"));
        assert!(!store.remove_virtual("App.js"));
        assert!(store.get("App.js").is_some());
    }
}
