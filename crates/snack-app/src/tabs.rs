//! Cross-tab autosave coordination
//!
//! Several controllers may edit the same project at once (one per editor
//! tab). Only the tab that most recently claimed the project autosaves; a
//! claim is broadcast to every other tab, which then stops autosaving until
//! it claims again. This is best effort: a claim in flight can race with
//! an autosave that already started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use snack_core::prelude::*;

const NOTICE_CAPACITY: usize = 64;

/// Identifies one tab within a [`TabCoordinator`]
pub type TabId = u64;

/// Broadcast between tabs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabNotice {
    /// `tab` is now the one autosaving `project`
    Claimed { tab: TabId, project: String },
}

/// Shared by every tab in the process
#[derive(Debug, Clone)]
pub struct TabCoordinator {
    tx: broadcast::Sender<TabNotice>,
    next_id: Arc<AtomicU64>,
}

impl Default for TabCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TabCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a new tab.
    pub fn join(&self) -> TabHandle {
        TabHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            tx: self.tx.clone(),
        }
    }
}

/// One tab's connection to the coordinator
#[derive(Debug, Clone)]
pub struct TabHandle {
    id: TabId,
    tx: broadcast::Sender<TabNotice>,
}

impl TabHandle {
    pub fn id(&self) -> TabId {
        self.id
    }

    /// Announce that this tab autosaves `project` from now on.
    pub fn claim(&self, project: &str) {
        debug!("Tab {} claims autosave for {}", self.id, project);
        let _ = self.tx.send(TabNotice::Claimed {
            tab: self.id,
            project: project.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TabNotice> {
        self.tx.subscribe()
    }

    /// Whether `notice` means this tab must stop autosaving `project`.
    pub fn yields_to(&self, notice: &TabNotice, project: &str) -> bool {
        match notice {
            TabNotice::Claimed { tab, project: claimed } => *tab != self.id && claimed == project,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_reaches_other_tabs() {
        let coordinator = TabCoordinator::new();
        let a = coordinator.join();
        let b = coordinator.join();
        let mut b_rx = b.subscribe();

        a.claim("demo");

        let notice = b_rx.recv().await.unwrap();
        assert!(b.yields_to(&notice, "demo"));
        assert!(!a.yields_to(&notice, "demo"));
    }

    #[test]
    fn test_other_project_is_ignored() {
        let coordinator = TabCoordinator::new();
        let a = coordinator.join();
        let b = coordinator.join();
        assert_ne!(a.id(), b.id());

        let notice = TabNotice::Claimed {
            tab: a.id(),
            project: "other".into(),
        };
        assert!(!b.yields_to(&notice, "demo"));
    }

    #[test]
    fn test_claim_without_listeners_is_fine() {
        let coordinator = TabCoordinator::new();
        coordinator.join().claim("demo");
    }
}
