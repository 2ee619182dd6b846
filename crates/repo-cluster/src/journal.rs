//! Ordered, replayable record of cluster events (spec §4.6: a node must be
//! able to catch up on events it missed while disconnected).
//!
//! An append-only sequence with a monotonic position, kept in memory since
//! the durable backing store is the persistence manager's concern and out
//! of scope for this crate.

use crate::events::ClusterEvent;
use std::sync::Mutex;

/// A journaled event plus the revision it was appended at. Revisions are
/// strictly increasing and start at 1.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    pub revision: u64,
    pub event: ClusterEvent,
}

/// Append-only, in-memory journal with revision-based replay, used by
/// [`crate::node::ClusterNodeImpl`] to track how far each peer has synced.
pub struct Journal {
    records: Mutex<Vec<JournalRecord>>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Append `event`, returning the revision it was assigned.
    pub fn append(&self, event: ClusterEvent) -> u64 {
        let mut records = self.records.lock().unwrap();
        let revision = records.len() as u64 + 1;
        records.push(JournalRecord { revision, event });
        revision
    }

    /// All records with `revision > since`, in revision order.
    pub fn records_since(&self, since: u64) -> Vec<JournalRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.revision > since)
            .cloned()
            .collect()
    }

    pub fn head_revision(&self) -> u64 {
        self.records.lock().unwrap().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NamespaceEvent, WorkspaceEvent, WorkspaceEventKind};

    fn namespace_event(prefix: &str) -> ClusterEvent {
        ClusterEvent::Namespace(NamespaceEvent {
            old_prefix: None,
            new_prefix: prefix.to_string(),
            uri: format!("http://{prefix}/"),
        })
    }

    #[test]
    fn revisions_are_monotonic_starting_at_one() {
        let journal = Journal::new();
        assert_eq!(journal.append(namespace_event("a")), 1);
        assert_eq!(journal.append(namespace_event("b")), 2);
        assert_eq!(journal.head_revision(), 2);
    }

    #[test]
    fn records_since_excludes_already_seen_revisions() {
        let journal = Journal::new();
        journal.append(namespace_event("a"));
        journal.append(namespace_event("b"));
        journal.append(ClusterEvent::Workspace(WorkspaceEvent {
            kind: WorkspaceEventKind::Created,
            workspace_name: "default".into(),
        }));

        let missed = journal.records_since(1);
        assert_eq!(missed.len(), 2);
        assert_eq!(missed[0].revision, 2);
        assert_eq!(missed[1].revision, 3);
    }

    #[test]
    fn records_since_head_is_empty() {
        let journal = Journal::new();
        journal.append(namespace_event("a"));
        assert!(journal.records_since(journal.head_revision()).is_empty());
    }
}
