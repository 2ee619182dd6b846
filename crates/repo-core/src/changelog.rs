//! In-memory representation of a pending set of item-state mutations and
//! the observation events they produce (spec §4.2, §4.9 "SearchManager").
//!
//! `ItemStatus` follows the same closed, small-enum style as [`crate::ids`]'s
//! identifier types: a fixed set of named states with cheap `Display`/
//! equality rather than a stringly-typed status field.

use crate::ids::{Name, NodeId, PropertyId};
use std::fmt;

/// Lifecycle status of an item state held by a transient or shared item
/// state manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    New,
    Existing,
    Modified,
    Stale,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::New => "new",
            ItemStatus::Existing => "existing",
            ItemStatus::Modified => "modified",
            ItemStatus::Stale => "stale",
        };
        write!(f, "{s}")
    }
}

/// Mixin marking a node as shareable: reachable as a child of more than one
/// parent. Named after the real JCR mixin so callers that already know JCR
/// recognize it; nothing else in this crate treats mixin names specially.
pub const SHAREABLE_MIXIN: &str = "mix:shareable";

#[derive(Debug, Clone)]
pub struct NodeState {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub node_type_name: String,
    pub mixin_type_names: Vec<String>,
    pub child_nodes: Vec<(Name, NodeId)>,
    pub property_names: Vec<Name>,
    pub status: ItemStatus,
}

impl NodeState {
    pub fn new_transient(id: NodeId, parent_id: Option<NodeId>, node_type_name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            node_type_name: node_type_name.into(),
            mixin_type_names: Vec::new(),
            child_nodes: Vec::new(),
            property_names: Vec::new(),
            status: ItemStatus::New,
        }
    }

    pub fn is_shareable(&self) -> bool {
        self.mixin_type_names.iter().any(|m| m == SHAREABLE_MIXIN)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyState {
    pub id: PropertyId,
    pub values: Vec<String>,
    pub multi_valued: bool,
    pub status: ItemStatus,
}

/// A coherent, ordered batch of item-state mutations, applied atomically by
/// a `SharedItemStateManager` (spec §4.2 "update"): accumulate in memory,
/// then commit as one unit.
#[derive(Debug, Default)]
pub struct ChangeLog {
    added_nodes: Vec<NodeState>,
    modified_nodes: Vec<NodeState>,
    deleted_node_ids: Vec<NodeId>,
    deleted_nodes: Vec<NodeState>,
    added_properties: Vec<PropertyState>,
    modified_properties: Vec<PropertyState>,
    deleted_property_ids: Vec<PropertyId>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, state: NodeState) {
        self.added_nodes.push(state);
    }

    pub fn modify_node(&mut self, state: NodeState) {
        self.modified_nodes.push(state);
    }

    /// Record a node removal, keeping its pre-image so downstream consumers
    /// (search batching, in particular) can still see mixin types such as
    /// `mix:shareable` after the node itself is gone from the cache.
    pub fn delete_node(&mut self, state: NodeState) {
        self.deleted_node_ids.push(state.id);
        self.deleted_nodes.push(state);
    }

    pub fn add_property(&mut self, state: PropertyState) {
        self.added_properties.push(state);
    }

    pub fn modify_property(&mut self, state: PropertyState) {
        self.modified_properties.push(state);
    }

    pub fn delete_property(&mut self, id: PropertyId) {
        self.deleted_property_ids.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.deleted_node_ids.is_empty()
            && self.added_properties.is_empty()
            && self.modified_properties.is_empty()
            && self.deleted_property_ids.is_empty()
    }

    pub fn added_nodes(&self) -> &[NodeState] {
        &self.added_nodes
    }

    pub fn modified_nodes(&self) -> &[NodeState] {
        &self.modified_nodes
    }

    pub fn deleted_node_ids(&self) -> &[NodeId] {
        &self.deleted_node_ids
    }

    pub fn deleted_nodes(&self) -> &[NodeState] {
        &self.deleted_nodes
    }

    /// Merge `other` into `self`, in the order the changes were recorded.
    /// Used when a session operation stages further changes on top of an
    /// already-built log (spec §4.8, `SessionOperation::Save`).
    pub fn merge(&mut self, mut other: ChangeLog) {
        self.added_nodes.append(&mut other.added_nodes);
        self.modified_nodes.append(&mut other.modified_nodes);
        self.deleted_node_ids.append(&mut other.deleted_node_ids);
        self.deleted_nodes.append(&mut other.deleted_nodes);
        self.added_properties.append(&mut other.added_properties);
        self.modified_properties.append(&mut other.modified_properties);
        self.deleted_property_ids
            .append(&mut other.deleted_property_ids);
    }
}

/// Kind of observation event produced when a `ChangeLog` is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    NodeAdded,
    NodeRemoved,
    PropertyAdded,
    PropertyChanged,
    PropertyRemoved,
}

/// Whether an [`EventState`] was produced by this process committing its
/// own change log, or by applying a change log that arrived from a cluster
/// peer. Search batching (spec §4.6) logs resolution failures differently
/// depending on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    Local,
    External,
}

/// A single observation event, addressed by item id rather than path: path
/// resolution is a collaborator concern (node type / path resolver) outside
/// this crate's scope.
#[derive(Debug, Clone)]
pub struct EventState {
    pub event_type: EventType,
    pub node_id: NodeId,
    pub user_id: String,
    pub origin: EventOrigin,
    /// Only meaningful for `NodeAdded`/`NodeRemoved`: was the node carrying
    /// [`SHAREABLE_MIXIN`] at the time of the mutation.
    pub shareable: bool,
}

/// An ordered batch of [`EventState`]s produced from one committed
/// `ChangeLog`, handed to the observation dispatcher and to
/// [`crate`]-external search indexing.
#[derive(Debug, Default)]
pub struct EventStateCollection {
    events: Vec<EventState>,
}

impl EventStateCollection {
    pub fn from_change_log(log: &ChangeLog, user_id: &str, origin: EventOrigin) -> Self {
        let mut events = Vec::new();
        for node in &log.added_nodes {
            events.push(EventState {
                event_type: EventType::NodeAdded,
                node_id: node.id,
                user_id: user_id.to_string(),
                origin,
                shareable: node.is_shareable(),
            });
        }
        for node in &log.deleted_nodes {
            events.push(EventState {
                event_type: EventType::NodeRemoved,
                node_id: node.id,
                user_id: user_id.to_string(),
                origin,
                shareable: node.is_shareable(),
            });
        }
        for prop in &log.added_properties {
            events.push(EventState {
                event_type: EventType::PropertyAdded,
                node_id: prop.id.parent,
                user_id: user_id.to_string(),
                origin,
                shareable: false,
            });
        }
        for prop in &log.modified_properties {
            events.push(EventState {
                event_type: EventType::PropertyChanged,
                node_id: prop.id.parent,
                user_id: user_id.to_string(),
                origin,
                shareable: false,
            });
        }
        for id in &log.deleted_property_ids {
            events.push(EventState {
                event_type: EventType::PropertyRemoved,
                node_id: id.parent,
                user_id: user_id.to_string(),
                origin,
                shareable: false,
            });
        }
        Self { events }
    }

    pub fn events(&self) -> &[EventState] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
