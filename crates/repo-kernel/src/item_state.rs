//! Shared item state manager: the single-writer, cache-coherent view of a
//! workspace's persisted item states (spec §4.2 "SharedItemStateManager").
//!
//! Reads never block behind the write lock; a mutation takes the write
//! lock for the duration of applying one `ChangeLog`, so concurrent
//! sessions always see either the pre- or post-mutation state, never a
//! partial one: a read-heavy cache guarded by an `RwLock`, plus an
//! explicit single-writer mutex serializing mutations.

use parking_lot::{Mutex, RwLock};
use repo_core::changelog::{ChangeLog, EventOrigin, EventStateCollection, NodeState};
use repo_core::error::ItemStateError;
use repo_core::ids::NodeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::collab::PersistenceManager;

/// Read-only overlay consulted when a node id is not found in the cache or
/// backing persistence (spec §4.2 `addVirtualItemStateProvider`): the
/// version manager and virtual node-type manager contribute states this way
/// without the item state manager needing to know about either.
pub trait VirtualItemStateProvider: Send + Sync {
    fn load_item_state(&self, id: NodeId) -> Option<NodeState>;
}

/// Sink a `SharedItemStateManager` publishes its locally committed change
/// logs to, and the seam an inbound cluster update is applied through
/// (spec §4.2 `setEventChannel`).
pub trait ItemStateEventChannel: Send + Sync {
    fn publish(&self, change_log: &ChangeLog, user_id: &str);
}

/// Workspace-scoped cache of node states, backed by a [`PersistenceManager`].
/// All mutating operations serialize through `write_lock`; this is the
/// "shared" in `SharedItemStateManager` — every session in a workspace
/// reads and writes through the same instance.
pub struct SharedItemStateManager {
    workspace_name: String,
    persistence: Arc<dyn PersistenceManager>,
    cache: RwLock<HashMap<NodeId, NodeState>>,
    write_lock: Mutex<()>,
    virtual_providers: RwLock<Vec<Arc<dyn VirtualItemStateProvider>>>,
    event_channel: RwLock<Option<Arc<dyn ItemStateEventChannel>>>,
    check_references: AtomicBool,
}

impl SharedItemStateManager {
    pub fn new(workspace_name: impl Into<String>, persistence: Arc<dyn PersistenceManager>) -> Self {
        Self {
            workspace_name: workspace_name.into(),
            persistence,
            cache: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            virtual_providers: RwLock::new(Vec::new()),
            event_channel: RwLock::new(None),
            check_references: AtomicBool::new(false),
        }
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    /// Register a read-only overlay consulted on a cache-and-persistence
    /// miss. Providers are tried in registration order; the first hit wins.
    pub fn add_virtual_item_state_provider(&self, provider: Arc<dyn VirtualItemStateProvider>) {
        self.virtual_providers.write().push(provider);
    }

    /// Attach (or detach, with `None`) the channel local commits publish
    /// their change log to. Has no effect on [`Self::external_update`],
    /// which never re-publishes.
    pub fn set_event_channel(&self, channel: Option<Arc<dyn ItemStateEventChannel>>) {
        *self.event_channel.write() = channel;
    }

    /// Toggle referential-integrity enforcement: when enabled, `update` and
    /// `external_update` reject a change log that points `parent_id` at a
    /// node not present in the cache or persistence.
    pub fn set_check_references(&self, enabled: bool) {
        self.check_references.store(enabled, Ordering::SeqCst);
    }

    /// Fetch a node state, consulting the cache first, then persistence,
    /// then any registered virtual providers.
    pub fn get_node(&self, id: NodeId) -> Result<NodeState, ItemStateError> {
        if let Some(state) = self.cache.read().get(&id) {
            return Ok(state.clone());
        }
        if let Some(loaded) = self
            .persistence
            .load_node(id)
            .map_err(|e| ItemStateError::Storage(e.to_string()))?
        {
            self.cache.write().insert(id, loaded.clone());
            return Ok(loaded);
        }
        for provider in self.virtual_providers.read().iter() {
            if let Some(state) = provider.load_item_state(id) {
                return Ok(state);
            }
        }
        Err(ItemStateError::NotFound(id.to_string()))
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        if self.cache.read().contains_key(&id) {
            return true;
        }
        if self.persistence.exists(id).unwrap_or(false) {
            return true;
        }
        self.virtual_providers
            .read()
            .iter()
            .any(|p| p.load_item_state(id).is_some())
    }

    fn known_elsewhere(&self, id: NodeId, cache: &HashMap<NodeId, NodeState>) -> bool {
        cache.contains_key(&id)
            || self.persistence.exists(id).unwrap_or(false)
            || self
                .virtual_providers
                .read()
                .iter()
                .any(|p| p.load_item_state(id).is_some())
    }

    /// Apply `change_log` atomically: persist it, update the in-memory
    /// cache, and return the observation events it produced, under
    /// `write_lock` so two sessions can never interleave a save against the
    /// same workspace (spec §4.2 "apply" invariant).
    fn apply_locked(
        &self,
        change_log: ChangeLog,
        user_id: &str,
        origin: EventOrigin,
    ) -> Result<EventStateCollection, ItemStateError> {
        let _guard = self.write_lock.lock();

        if self.check_references.load(Ordering::SeqCst) {
            let cache = self.cache.read();
            for node in change_log.added_nodes().iter().chain(change_log.modified_nodes()) {
                if let Some(parent) = node.parent_id {
                    if parent != node.id && !self.known_elsewhere(parent, &cache) {
                        return Err(ItemStateError::ReferenceIntegrity(format!(
                            "node {} references missing parent {parent}",
                            node.id
                        )));
                    }
                }
            }
        }

        self.persistence
            .store(&change_log)
            .map_err(|e| ItemStateError::Storage(e.to_string()))?;

        let events = EventStateCollection::from_change_log(&change_log, user_id, origin);

        let mut cache = self.cache.write();
        for node in change_log.added_nodes().iter().chain(change_log.modified_nodes()) {
            cache.insert(node.id, node.clone());
        }
        for id in change_log.deleted_node_ids() {
            cache.remove(id);
        }
        drop(cache);

        if origin == EventOrigin::Local {
            if let Some(channel) = self.event_channel.read().as_ref() {
                channel.publish(&change_log, user_id);
            }
        }

        Ok(events)
    }

    /// Apply a locally originated change log (spec §4.2 "apply"). Publishes
    /// to the event channel, if any, once the commit succeeds.
    pub fn update(&self, change_log: ChangeLog, user_id: &str) -> Result<EventStateCollection, ItemStateError> {
        self.apply_locked(change_log, user_id, EventOrigin::Local)
    }

    /// Apply a change log that arrived from a cluster peer, under the same
    /// locking discipline as [`Self::update`] but without re-publishing to
    /// the event channel (spec §4.2 "setEventChannel").
    pub fn external_update(
        &self,
        change_log: ChangeLog,
        user_id: &str,
    ) -> Result<EventStateCollection, ItemStateError> {
        self.apply_locked(change_log, user_id, EventOrigin::External)
    }
}
