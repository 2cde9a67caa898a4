//! Save status of the project
//!
//! ```text
//! Changed ──autosave──▶ SavingDraft ──ok──▶ SavedDraft
//!    │                       │
//!    └──save()──▶ Publishing ─┼──ok──▶ Published
//!                            └─fail─▶ Changed
//!
//! A failure of the other save kind (a draft failing mid-publish) leaves the
//! status alone.
//! ```
//!
//! Any local edit moves the status back to `Changed`. A save that completes
//! after a newer edit is stale and leaves `Changed` in place.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveStatus {
    #[default]
    Changed,
    SavingDraft,
    SavedDraft,
    Publishing,
    Published,
}

impl SaveStatus {
    pub fn is_saving(&self) -> bool {
        matches!(self, SaveStatus::SavingDraft | SaveStatus::Publishing)
    }

    /// Whether there are edits no save has picked up yet.
    pub fn is_dirty(&self) -> bool {
        *self == SaveStatus::Changed
    }

    pub fn on_edit(self) -> Self {
        SaveStatus::Changed
    }

    /// Start a draft save. Only unsaved edits are autosaved.
    pub fn begin_draft(self) -> Option<Self> {
        match self {
            SaveStatus::Changed => Some(SaveStatus::SavingDraft),
            _ => None,
        }
    }

    /// Start an explicit publish. Allowed from any state, including while a
    /// draft save is in flight.
    pub fn begin_publish(self) -> Self {
        SaveStatus::Publishing
    }

    /// A save finished. `current` is false when edits happened after the
    /// save started.
    pub fn on_saved(self, draft: bool, current: bool) -> Self {
        if !current {
            return self;
        }
        match (self, draft) {
            (SaveStatus::SavingDraft, true) => SaveStatus::SavedDraft,
            (SaveStatus::Publishing, false) => SaveStatus::Published,
            // A draft finishing during a publish does not end the publish
            (status, _) => status,
        }
    }

    /// A save failed. Only the save kind currently shown is rolled back.
    pub fn on_failed(self, draft: bool) -> Self {
        match (self, draft) {
            (SaveStatus::SavingDraft, true) | (SaveStatus::Publishing, false) => {
                SaveStatus::Changed
            }
            (status, _) => status,
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SaveStatus::Changed => "changed",
            SaveStatus::SavingDraft => "saving-draft",
            SaveStatus::SavedDraft => "saved-draft",
            SaveStatus::Publishing => "publishing",
            SaveStatus::Published => "published",
        };
        f.write_str(label)
    }
}
