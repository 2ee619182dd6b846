//! Resolves committed observation events into search-index updates (spec
//! §4.6 "SearchManager"). The index itself is out of scope (SPEC_FULL.md
//! §C): this resolves each event's `NodeId` back to current item state
//! through the workspace's `SharedItemStateManager`, applies the batching
//! rules spec §4.6 describes per event type, and drives a `QueryHandler`
//! with the result.
//!
//! The dedup hash uses `blake3` to fingerprint a batch, folding repeated
//! events for the same node within a batch into one update.

use repo_core::changelog::{EventState, EventStateCollection, EventType, EventOrigin, NodeState};
use repo_core::ids::NodeId;
use repo_core::namespace::NamespaceRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::collab::QueryHandler;
use crate::item_state::SharedItemStateManager;

/// XML Schema datatypes, used by XPath function signatures in query
/// predicates.
const XS_URI: &str = "http://www.w3.org/2001/XMLSchema";
/// Current XPath/XQuery functions and operators namespace.
const FN_URI: &str = "http://www.w3.org/2005/xpath-functions";
/// Deprecated XPath functions namespace, registered under its own prefix
/// so queries written against it keep resolving after `fn` moved to
/// [`FN_URI`].
const FN_OLD_URI: &str = "http://www.w3.org/2004/10/xpath-functions";

fn register_xpath_namespaces(namespaces: &NamespaceRegistry) {
    // A registry carried over from before `fn` meant the current
    // functions-and-operators namespace may still have `fn` bound to the
    // deprecated URI. Free `fn` for the canonical binding below by moving
    // that mapping onto its proper prefix first.
    if namespaces.get_uri("fn").map(|uri| uri == FN_OLD_URI).unwrap_or(false) {
        let _ = namespaces.register("fn_old", FN_OLD_URI);
    }
    let _ = namespaces.safe_register("xs", XS_URI);
    let _ = namespaces.safe_register("fn", FN_URI);
    let _ = namespaces.safe_register("fn_old", FN_OLD_URI);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexBatch {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl IndexBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// A stable fingerprint of the batch contents, useful for the
    /// downstream index to recognize and skip a batch it already applied.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for id in &self.added {
            hasher.update(b"+");
            hasher.update(id.to_string().as_bytes());
        }
        for id in &self.removed {
            hasher.update(b"-");
            hasher.update(id.to_string().as_bytes());
        }
        hasher.finalize()
    }
}

/// Batches committed observation events into index updates for one
/// workspace (spec §2 component 10, §4.3: one `SearchManager` per
/// workspace, not per repository).
pub struct SearchManager {
    workspace_name: String,
    item_states: Arc<SharedItemStateManager>,
    excluded_subtree: RwLock<Option<NodeId>>,
    query_handler: RwLock<Option<Arc<dyn QueryHandler>>>,
    added: Mutex<HashMap<NodeId, NodeState>>,
    removed: Mutex<HashMap<NodeId, bool>>,
}

impl SearchManager {
    pub fn new(workspace_name: impl Into<String>, item_states: Arc<SharedItemStateManager>, namespaces: &NamespaceRegistry) -> Self {
        register_xpath_namespaces(namespaces);
        Self {
            workspace_name: workspace_name.into(),
            item_states,
            excluded_subtree: RwLock::new(None),
            query_handler: RwLock::new(None),
            added: Mutex::new(HashMap::new()),
            removed: Mutex::new(HashMap::new()),
        }
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    /// Attach the query engine this manager keeps in step with committed
    /// item state (spec §6 `QueryHandler`). Calls `init` once, immediately.
    pub fn set_query_handler(&self, handler: Arc<dyn QueryHandler>) {
        let _ = handler.init(&self.workspace_name);
        *self.query_handler.write().unwrap() = Some(handler);
    }

    /// Nodes under `root` (inclusive) are never indexed. Matches the real
    /// `excludedPaths` configuration knob, addressed by id since this
    /// codebase does not model paths.
    pub fn set_excluded_subtree(&self, root: Option<NodeId>) {
        *self.excluded_subtree.write().unwrap() = root;
    }

    fn is_excluded(&self, id: NodeId) -> bool {
        let Some(root) = *self.excluded_subtree.read().unwrap() else {
            return false;
        };
        let mut current = id;
        loop {
            if current == root {
                return true;
            }
            match self.item_states.get_node(current) {
                Ok(state) => match state.parent_id {
                    Some(parent) => current = parent,
                    None => return false,
                },
                Err(_) => return false,
            }
        }
    }

    fn log_unresolved(&self, event: &EventState) {
        match event.origin {
            // A local commit's own node must resolve; if it doesn't,
            // `item_state.rs` and `search.rs` have diverged.
            EventOrigin::Local => {
                tracing::error!(node_id = %event.node_id, workspace = %self.workspace_name, "local commit produced an unresolvable search event");
            }
            // An externally applied change (cluster peer) can legitimately
            // race ahead of this node's own view of the workspace.
            EventOrigin::External => {
                tracing::info!(node_id = %event.node_id, workspace = %self.workspace_name, "external update referenced a node not yet visible locally");
            }
        }
    }

    fn queue_add(&self, id: NodeId, added: &mut HashMap<NodeId, NodeState>, removed: &mut HashMap<NodeId, bool>) {
        if self.is_excluded(id) {
            return;
        }
        match self.item_states.get_node(id) {
            Ok(state) => {
                removed.remove(&id);
                added.insert(id, state);
            }
            Err(_) => {}
        }
    }

    fn queue_remove(&self, id: NodeId, shareable: bool, added: &mut HashMap<NodeId, NodeState>, removed: &mut HashMap<NodeId, bool>) {
        if shareable {
            // A shareable node can still be reachable under another parent
            // this removal didn't touch; this manager has no multi-parent
            // index to consult, so it deindexes eagerly and logs so an
            // operator can reconcile if that assumption is wrong for their
            // content.
            tracing::info!(node_id = %id, workspace = %self.workspace_name, "deindexing a shareable node on removal");
        }
        added.remove(&id);
        removed.insert(id, shareable);
    }

    /// Resolve one committed change log's events into the pending batch,
    /// then hand the result to the query handler, if any (spec §4.6).
    pub fn on_events(&self, events: &EventStateCollection) {
        let mut added = self.added.lock().unwrap();
        let mut removed = self.removed.lock().unwrap();

        for event in events.events() {
            match event.event_type {
                EventType::NodeAdded => {
                    if self.item_states.get_node(event.node_id).is_err() {
                        self.log_unresolved(event);
                        continue;
                    }
                    self.queue_add(event.node_id, &mut added, &mut removed);
                    if event.shareable {
                        // A shareable node's identity can be reached through
                        // more than one parent; force a full reindex rather
                        // than trust an incremental add.
                        removed.insert(event.node_id, true);
                    }
                }
                EventType::NodeRemoved => {
                    self.queue_remove(event.node_id, event.shareable, &mut added, &mut removed);
                }
                EventType::PropertyAdded => {
                    self.queue_add(event.node_id, &mut added, &mut removed);
                }
                EventType::PropertyChanged => {
                    // A property value change must force a full reindex of
                    // its owning node rather than an incremental update, so
                    // it is staged as both a re-add and a removal.
                    if self.item_states.get_node(event.node_id).is_err() {
                        self.log_unresolved(event);
                        continue;
                    }
                    self.queue_add(event.node_id, &mut added, &mut removed);
                    removed.insert(event.node_id, false);
                }
                EventType::PropertyRemoved => {
                    // Only delivered while the parent node still exists, so
                    // this always forces a full reindex too, the same as
                    // PROPERTY_CHANGED.
                    if self.item_states.get_node(event.node_id).is_err() {
                        self.log_unresolved(event);
                        continue;
                    }
                    self.queue_add(event.node_id, &mut added, &mut removed);
                    removed.insert(event.node_id, false);
                }
            }
        }

        if let Some(handler) = self.query_handler.read().unwrap().as_ref() {
            let added_states: Vec<NodeState> = added.values().cloned().collect();
            let removed_ids: Vec<NodeId> = removed.keys().copied().collect();
            if !added_states.is_empty() || !removed_ids.is_empty() {
                handler.update_nodes(&removed_ids, &added_states);
            }
        }
    }

    /// Drain the pending batch for inspection. The query handler, if set,
    /// already saw this batch when `on_events` produced it; this exists
    /// for callers (tests, diagnostics) that want to see what was computed
    /// without standing up a `QueryHandler`.
    pub fn take_batch(&self) -> IndexBatch {
        let mut added = self.added.lock().unwrap();
        let mut removed = self.removed.lock().unwrap();
        IndexBatch {
            added: added.drain().map(|(id, _)| id).collect(),
            removed: removed.drain().map(|(id, _)| id).collect(),
        }
    }
}
