//! Collaborator interfaces the repository kernel depends on but does not
//! implement in full: persistence backend, node-type/privilege registries,
//! security, query, observation dispatch, and the repository lock
//! mechanism (spec §4.4 "collaborators"). Each of these is a substantial
//! subsystem in its own right and is explicitly out of scope
//! (SPEC_FULL.md §C); what lives here is the seam the kernel calls through,
//! plus minimal in-memory implementations for tests.

use repo_core::changelog::{ChangeLog, EventStateCollection, NodeState, PropertyState};
use repo_core::error::RepositoryError;
use repo_core::ids::{NodeId, PropertyId};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

pub trait PersistenceManager: Send + Sync {
    fn load_node(&self, id: NodeId) -> Result<Option<NodeState>, RepositoryError>;
    fn load_property(&self, id: &PropertyId) -> Result<Option<PropertyState>, RepositoryError>;
    fn store(&self, change_log: &ChangeLog) -> Result<(), RepositoryError>;
    fn exists(&self, id: NodeId) -> Result<bool, RepositoryError>;
}

/// In-memory `PersistenceManager`, sufficient for kernel tests. A real
/// deployment backs this with the bundle/database persistence manager
/// named in spec §4.4 — out of scope here.
#[derive(Default)]
pub struct InMemoryPersistenceManager {
    nodes: RwLock<HashMap<NodeId, NodeState>>,
    properties: RwLock<HashMap<PropertyId, PropertyState>>,
}

impl InMemoryPersistenceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceManager for InMemoryPersistenceManager {
    fn load_node(&self, id: NodeId) -> Result<Option<NodeState>, RepositoryError> {
        Ok(self.nodes.read().unwrap().get(&id).cloned())
    }

    fn load_property(&self, id: &PropertyId) -> Result<Option<PropertyState>, RepositoryError> {
        Ok(self.properties.read().unwrap().get(id).cloned())
    }

    fn store(&self, change_log: &ChangeLog) -> Result<(), RepositoryError> {
        let mut nodes = self.nodes.write().unwrap();
        for node in change_log.added_nodes().iter().chain(change_log.modified_nodes()) {
            nodes.insert(node.id, node.clone());
        }
        for id in change_log.deleted_node_ids() {
            nodes.remove(id);
        }
        Ok(())
    }

    fn exists(&self, id: NodeId) -> Result<bool, RepositoryError> {
        Ok(self.nodes.read().unwrap().contains_key(&id))
    }
}

pub trait NodeTypeRegistry: Send + Sync {
    fn is_registered(&self, name: &str) -> bool;
    fn register(&self, name: &str);
}

#[derive(Default)]
pub struct InMemoryNodeTypeRegistry {
    names: RwLock<Vec<String>>,
}

impl NodeTypeRegistry for InMemoryNodeTypeRegistry {
    fn is_registered(&self, name: &str) -> bool {
        self.names.read().unwrap().iter().any(|n| n == name)
    }

    fn register(&self, name: &str) {
        self.names.write().unwrap().push(name.to_string());
    }
}

pub trait PrivilegeRegistry: Send + Sync {
    fn is_registered(&self, name: &str) -> bool;
}

#[derive(Default)]
pub struct InMemoryPrivilegeRegistry {
    names: RwLock<Vec<String>>,
}

impl PrivilegeRegistry for InMemoryPrivilegeRegistry {
    fn is_registered(&self, name: &str) -> bool {
        self.names.read().unwrap().iter().any(|n| n == name)
    }
}

/// Login credentials: a user id plus opaque attribute bag. Password or
/// token validation is the security manager's concern.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub user_id: String,
    pub attributes: HashMap<String, String>,
}

impl Credentials {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: HashMap::new(),
        }
    }
}

pub trait SecurityManager: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<String, RepositoryError>;
    fn can_access_workspace(&self, user_id: &str, workspace_name: &str) -> bool;
}

/// Accepts any non-empty user id and grants access to every workspace.
/// Stands in for the access-control subsystem (out of scope, spec §4.4).
#[derive(Default)]
pub struct PermissiveSecurityManager;

impl SecurityManager for PermissiveSecurityManager {
    fn authenticate(&self, credentials: &Credentials) -> Result<String, RepositoryError> {
        if credentials.user_id.is_empty() {
            return Err(RepositoryError::Login("empty user id".to_string()));
        }
        Ok(credentials.user_id.clone())
    }

    fn can_access_workspace(&self, _user_id: &str, _workspace_name: &str) -> bool {
        true
    }
}

/// Query execution itself is out of scope (spec Non-goals); this is the
/// seam `SearchManager` drives to keep a query engine's index in step with
/// committed item state (spec §4.6, §6).
pub trait QueryHandler: Send + Sync {
    /// Called once, before the first `update_nodes`/`execute` call, so the
    /// handler can open whatever index storage it keeps for `workspace_name`.
    fn init(&self, workspace_name: &str) -> Result<(), RepositoryError>;

    fn execute(&self, statement: &str) -> Result<Vec<NodeId>, RepositoryError>;

    /// Apply one resolved batch: remove `removed_ids` from the index, then
    /// (re)index `added_states`. Removal runs first so a node that was
    /// removed and re-added within the same batch ends up indexed once.
    fn update_nodes(&self, removed_ids: &[NodeId], added_states: &[NodeState]);

    /// Nodes that hold a weak reference to `id`, for reference-integrity
    /// checks that must survive the referent's removal (spec §6).
    fn get_weakly_referring_nodes(&self, id: NodeId) -> Vec<NodeId>;

    /// Release whatever resources `init` opened.
    fn close(&self);
}

/// In-memory `QueryHandler`, sufficient for kernel tests: an index is just
/// the set of ids last seen in `update_nodes`.
#[derive(Default)]
pub struct InMemoryQueryHandler {
    indexed: Mutex<Vec<NodeId>>,
}

impl InMemoryQueryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indexed_ids(&self) -> Vec<NodeId> {
        self.indexed.lock().unwrap().clone()
    }
}

impl QueryHandler for InMemoryQueryHandler {
    fn init(&self, _workspace_name: &str) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn execute(&self, _statement: &str) -> Result<Vec<NodeId>, RepositoryError> {
        Ok(self.indexed_ids())
    }

    fn update_nodes(&self, removed_ids: &[NodeId], added_states: &[NodeState]) {
        let mut indexed = self.indexed.lock().unwrap();
        indexed.retain(|id| !removed_ids.contains(id));
        for state in added_states {
            if !indexed.contains(&state.id) {
                indexed.push(state.id);
            }
        }
    }

    fn get_weakly_referring_nodes(&self, _id: NodeId) -> Vec<NodeId> {
        Vec::new()
    }

    fn close(&self) {}
}

pub trait ObservationDispatcher: Send + Sync {
    fn dispatch(&self, workspace_name: &str, events: &EventStateCollection);
}

#[derive(Default)]
pub struct NullObservationDispatcher;

impl ObservationDispatcher for NullObservationDispatcher {
    fn dispatch(&self, _workspace_name: &str, _events: &EventStateCollection) {}
}

/// The repository-wide exclusive lock mechanism backed by
/// `repo_core::io::lock` (spec §4.4 step 1, §6 "repository lock").
pub trait RepositoryLock: Send + Sync {
    fn acquire(&self) -> Result<(), RepositoryError>;
    fn release(&self);
}

pub struct FileRepositoryLock {
    path: std::path::PathBuf,
    held: RwLock<Option<repo_core::io::FileLock>>,
}

impl FileRepositoryLock {
    pub fn new(home: &std::path::Path) -> Self {
        Self {
            path: home.join("repository.lock"),
            held: RwLock::new(None),
        }
    }
}

impl RepositoryLock for FileRepositoryLock {
    fn acquire(&self) -> Result<(), RepositoryError> {
        let lock = repo_core::io::acquire_lock(&self.path, 5)
            .map_err(|e| RepositoryError::storage(self.path.clone(), std::io::Error::other(e.to_string())))?;
        *self.held.write().unwrap() = Some(lock);
        Ok(())
    }

    fn release(&self) {
        *self.held.write().unwrap() = None;
    }
}

/// JCR node locking (`jcr:lockOwner`/`jcr:lockIsDeep`), one instance per
/// workspace (spec §4.3 "WorkspaceInfo"). Distinct from [`RepositoryLock`],
/// which guards the whole repository's home directory rather than
/// individual nodes.
pub trait WorkspaceLockManager: Send + Sync {
    fn lock(&self, id: NodeId, owner: &str) -> Result<(), RepositoryError>;
    fn unlock(&self, id: NodeId) -> Result<(), RepositoryError>;
    fn lock_owner(&self, id: NodeId) -> Option<String>;
}

#[derive(Default)]
pub struct InMemoryLockManager {
    locks: RwLock<HashMap<NodeId, String>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceLockManager for InMemoryLockManager {
    fn lock(&self, id: NodeId, owner: &str) -> Result<(), RepositoryError> {
        let mut locks = self.locks.write().unwrap();
        if let Some(existing) = locks.get(&id) {
            if existing != owner {
                return Err(RepositoryError::AccessDenied(format!("{id} is already locked by '{existing}'")));
            }
        }
        locks.insert(id, owner.to_string());
        Ok(())
    }

    fn unlock(&self, id: NodeId) -> Result<(), RepositoryError> {
        self.locks.write().unwrap().remove(&id);
        Ok(())
    }

    fn lock_owner(&self, id: NodeId) -> Option<String> {
        self.locks.read().unwrap().get(&id).cloned()
    }
}

/// Retained (`jcr:retentionPolicy`) and held (`jcr:hold`) nodes, one
/// instance per workspace (spec §4.3). Retention/hold enforcement itself
/// is out of scope (SPEC_FULL.md §C); this is the registry a future
/// enforcement layer would consult.
pub trait RetentionRegistry: Send + Sync {
    fn add_hold(&self, id: NodeId, hold_name: &str);
    fn remove_hold(&self, id: NodeId, hold_name: &str);
    fn holds(&self, id: NodeId) -> Vec<String>;
}

#[derive(Default)]
pub struct InMemoryRetentionRegistry {
    holds: RwLock<HashMap<NodeId, Vec<String>>>,
}

impl InMemoryRetentionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetentionRegistry for InMemoryRetentionRegistry {
    fn add_hold(&self, id: NodeId, hold_name: &str) {
        self.holds.write().unwrap().entry(id).or_default().push(hold_name.to_string());
    }

    fn remove_hold(&self, id: NodeId, hold_name: &str) {
        if let Some(names) = self.holds.write().unwrap().get_mut(&id) {
            names.retain(|n| n != hold_name);
        }
    }

    fn holds(&self, id: NodeId) -> Vec<String> {
        self.holds.read().unwrap().get(&id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_security_manager_rejects_empty_user_id() {
        let manager = PermissiveSecurityManager;
        let err = manager.authenticate(&Credentials::default()).unwrap_err();
        assert!(matches!(err, RepositoryError::Login(_)));
    }

    #[test]
    fn permissive_security_manager_accepts_named_user() {
        let manager = PermissiveSecurityManager;
        let user = manager.authenticate(&Credentials::for_user("alice")).unwrap();
        assert_eq!(user, "alice");
        assert!(manager.can_access_workspace("alice", "default"));
    }

    #[test]
    fn in_memory_persistence_round_trips_a_change_log() {
        let pm = InMemoryPersistenceManager::new();
        let id = NodeId::new_random();
        let mut log = ChangeLog::new();
        log.add_node(NodeState::new_transient(id, None, "nt:base"));
        pm.store(&log).unwrap();
        assert!(pm.exists(id).unwrap());
        assert!(pm.load_node(id).unwrap().is_some());
    }

    #[test]
    fn in_memory_query_handler_tracks_updates() {
        let handler = InMemoryQueryHandler::new();
        let kept = NodeId::new_random();
        let removed = NodeId::new_random();
        handler.update_nodes(&[], &[NodeState::new_transient(kept, None, "nt:base")]);
        handler.update_nodes(&[], &[NodeState::new_transient(removed, None, "nt:base")]);
        handler.update_nodes(&[removed], &[]);

        let indexed = handler.indexed_ids();
        assert!(indexed.contains(&kept));
        assert!(!indexed.contains(&removed));
    }

    #[test]
    fn file_repository_lock_acquire_and_release() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock = FileRepositoryLock::new(dir.path());
        lock.acquire().unwrap();
        lock.release();
        lock.acquire().unwrap();
    }

    #[test]
    fn lock_manager_rejects_a_second_owner() {
        let manager = InMemoryLockManager::new();
        let id = NodeId::new_random();
        manager.lock(id, "alice").unwrap();
        let err = manager.lock(id, "bob").unwrap_err();
        assert!(matches!(err, RepositoryError::AccessDenied(_)));
        manager.unlock(id).unwrap();
        manager.lock(id, "bob").unwrap();
        assert_eq!(manager.lock_owner(id), Some("bob".to_string()));
    }

    #[test]
    fn retention_registry_tracks_holds() {
        let registry = InMemoryRetentionRegistry::new();
        let id = NodeId::new_random();
        registry.add_hold(id, "litigation");
        assert_eq!(registry.holds(id), vec!["litigation".to_string()]);
        registry.remove_hold(id, "litigation");
        assert!(registry.holds(id).is_empty());
    }
}
