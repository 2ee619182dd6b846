//! Wire-level events exchanged between repository cluster nodes (spec §4.6
//! "ClusterNode"). Kept to data only — no transport or ordering logic lives
//! here, matching the Non-goal that this crate does not define a network
//! wire protocol, only the event shapes a transport carries.

use serde::{Deserialize, Serialize};

/// A namespace prefix remap, as broadcast by
/// `repo_core::namespace::NamespaceRegistry` (see
/// `NamespaceClusterChannel::broadcast_remap`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceEvent {
    pub old_prefix: Option<String>,
    pub new_prefix: String,
    pub uri: String,
}

/// Placeholder for node-type registration replication. Node-type registry
/// internals are out of scope for this crate (SPEC_FULL.md §C); only the
/// fact that *some* registration happened, identified by name, crosses the
/// wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeEvent {
    pub type_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockEventKind {
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockEvent {
    pub kind: LockEventKind,
    pub node_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceEventKind {
    Created,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEvent {
    pub kind: WorkspaceEventKind,
    pub workspace_name: String,
}

/// An externally-applied item-state update, carrying the serialized form of
/// a committed `repo_core::changelog::ChangeLog` for a given workspace.
/// Serialization of the change log itself is the persistence manager's
/// concern (out of scope here); this wraps the already-serialized bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub workspace_name: String,
    pub change_log_bytes: Vec<u8>,
}

/// Any event type a cluster node may journal and replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClusterEvent {
    Namespace(NamespaceEvent),
    NodeType(NodeTypeEvent),
    Lock(LockEvent),
    Workspace(WorkspaceEvent),
    Update(UpdateEvent),
}
