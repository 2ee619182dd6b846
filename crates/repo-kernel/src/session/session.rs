//! Session kernel: the per-login handle to a workspace's shared item state
//! (spec §4.8 "Session"). Building transient changes, saving, and
//! refreshing all funnel through [`crate::session::operations::SessionOperation`]
//! so every mutating entry point shares one audit/dispatch path.

use parking_lot::Mutex;
use repo_core::changelog::{ChangeLog, ItemStatus, NodeState};
use repo_core::error::{ItemStateError, RepositoryError};
use repo_core::ids::{Name, NodeId};
use std::sync::Arc;

use crate::collab::ObservationDispatcher;
use crate::item_state::SharedItemStateManager;
use crate::search::SearchManager;
use crate::session::context::SessionContext;
use crate::session::state::SessionState;
use crate::statistics::RepositoryStatistics;

pub struct Session {
    pub context: Arc<SessionContext>,
    state: Arc<SessionState>,
    item_state_manager: Arc<SharedItemStateManager>,
    observation: Arc<dyn ObservationDispatcher>,
    search: Arc<SearchManager>,
    statistics: Arc<RepositoryStatistics>,
    pending: Mutex<ChangeLog>,
    on_logout: Option<Box<dyn Fn() + Send + Sync>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        context: Arc<SessionContext>,
        item_state_manager: Arc<SharedItemStateManager>,
        observation: Arc<dyn ObservationDispatcher>,
        search: Arc<SearchManager>,
        statistics: Arc<RepositoryStatistics>,
    ) -> Self {
        Self::with_logout_hook(context, item_state_manager, observation, search, statistics, None)
    }

    /// Like [`Session::new`], but runs `on_logout` exactly once when the
    /// session transitions to closed. Used by [`crate::repository::Repository::login`]
    /// to tell the owning `WorkspaceInfo` a session closed.
    pub fn with_logout_hook(
        context: Arc<SessionContext>,
        item_state_manager: Arc<SharedItemStateManager>,
        observation: Arc<dyn ObservationDispatcher>,
        search: Arc<SearchManager>,
        statistics: Arc<RepositoryStatistics>,
        on_logout: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Self {
        statistics.record_session_login();
        Self {
            context,
            state: Arc::new(SessionState::new()),
            item_state_manager,
            observation,
            search,
            statistics,
            pending: Mutex::new(ChangeLog::new()),
            on_logout,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state.is_alive()
    }

    fn require_live(&self) -> Result<(), RepositoryError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(RepositoryError::Closed)
        }
    }

    /// Stage a new transient node under this session's pending change log,
    /// registering it as `name` in its parent's `child_nodes` so later
    /// operations (`stage_move` in particular) can resolve it as a recorded
    /// child. A real JCR `Node.addNode` would also enforce node-type
    /// constraints and same-name-sibling policy at add time; out of scope
    /// here (SPEC_FULL.md §C) beyond what `stage_move` already checks.
    pub fn add_node(
        &self,
        id: NodeId,
        parent_id: Option<NodeId>,
        name: Name,
        node_type_name: &str,
    ) -> Result<(), RepositoryError> {
        self.require_live()?;
        let mut pending = self.pending.lock();
        if let Some(parent_id) = parent_id {
            let mut parent = self.item_state_manager.get_node(parent_id).map_err(RepositoryError::from)?;
            parent.child_nodes.push((name, id));
            parent.status = ItemStatus::Modified;
            pending.modify_node(parent);
        }
        pending.add_node(NodeState::new_transient(id, parent_id, node_type_name));
        Ok(())
    }

    /// Stage a removal, keeping the node's pre-image in the change log so
    /// downstream consumers (search batching, in particular) can still see
    /// it after the delete is applied.
    pub fn stage_remove(&self, id: NodeId) -> Result<(), RepositoryError> {
        self.require_live()?;
        let state = self.item_state_manager.get_node(id).map_err(RepositoryError::from)?;
        self.pending.lock().delete_node(state);
        Ok(())
    }

    /// True iff `ancestor` is `node` itself or one of its ancestors, walking
    /// `parent_id` pointers up from `node`.
    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> Result<bool, RepositoryError> {
        let mut current = node;
        loop {
            if current == ancestor {
                return Ok(true);
            }
            let state = self.item_state_manager.get_node(current).map_err(RepositoryError::from)?;
            match state.parent_id {
                Some(parent) => current = parent,
                None => return Ok(false),
            }
        }
    }

    /// Stage a reparent: move `id` from its current parent to `new_parent`,
    /// keeping its name, within one transient change set (spec §4.5 "Move
    /// semantics"). Rejects moving a node into its own subtree, rejects
    /// same-name-sibling collisions at the destination, and rejects moving
    /// a shareable node (shareable nodes have more than one parent; a plain
    /// reparent would silently orphan the other references).
    pub fn stage_move(&self, id: NodeId, new_parent: NodeId) -> Result<(), RepositoryError> {
        self.require_live()?;

        if id == new_parent || self.is_ancestor_or_self(id, new_parent)? {
            return Err(RepositoryError::InvalidMove(format!(
                "cannot move {id} into its own descendant {new_parent}"
            )));
        }

        let mut moved = self.item_state_manager.get_node(id).map_err(RepositoryError::from)?;
        if moved.is_shareable() {
            return Err(RepositoryError::InvalidMove(format!(
                "{id} is shareable and cannot be moved"
            )));
        }
        let old_parent_id = moved
            .parent_id
            .ok_or_else(|| RepositoryError::InvalidMove(format!("{id} has no parent to move from")))?;

        if new_parent == old_parent_id {
            // Same-parent "moves" are renames; without a destination name
            // there is nothing to change.
            return Ok(());
        }

        let mut old_parent = self
            .item_state_manager
            .get_node(old_parent_id)
            .map_err(RepositoryError::from)?;
        let entry_index = old_parent
            .child_nodes
            .iter()
            .position(|(_, child_id)| *child_id == id)
            .ok_or_else(|| {
                RepositoryError::InvalidMove(format!("{id} is not a recorded child of {old_parent_id}"))
            })?;
        let (name, _) = old_parent.child_nodes.remove(entry_index);
        old_parent.status = ItemStatus::Modified;

        let mut new_parent_state = self
            .item_state_manager
            .get_node(new_parent)
            .map_err(RepositoryError::from)?;
        if new_parent_state.child_nodes.iter().any(|(n, _)| *n == name) {
            return Err(RepositoryError::InvalidMove(format!(
                "{new_parent} already has a child named {name:?}"
            )));
        }
        new_parent_state.child_nodes.push((name, id));
        new_parent_state.status = ItemStatus::Modified;

        moved.parent_id = Some(new_parent);
        moved.status = ItemStatus::Modified;

        let mut pending = self.pending.lock();
        pending.modify_node(old_parent);
        pending.modify_node(new_parent_state);
        pending.modify_node(moved);
        Ok(())
    }

    /// Persist the pending change log, dispatch the resulting observation
    /// events, and fold them into the search manager's pending batch.
    pub fn save(&self) -> Result<(), RepositoryError> {
        self.require_live()?;
        let log = std::mem::replace(&mut *self.pending.lock(), ChangeLog::new());
        if log.is_empty() {
            return Ok(());
        }
        let events = self
            .item_state_manager
            .update(log, &self.context.user_id)
            .map_err(RepositoryError::from)?;
        self.search.on_events(&events);
        self.observation
            .dispatch(&self.context.workspace_name, &events);
        self.statistics.record_save();
        Ok(())
    }

    /// Discard pending changes. `keep_changes = true` leaves the pending
    /// change log untouched (spec §4.8 `Session::refresh(keepChanges)`).
    pub fn refresh(&self, keep_changes: bool) -> Result<(), RepositoryError> {
        self.require_live()?;
        if !keep_changes {
            *self.pending.lock() = ChangeLog::new();
        }
        Ok(())
    }

    pub fn get_node(&self, id: NodeId) -> Result<NodeState, ItemStateError> {
        self.item_state_manager.get_node(id)
    }

    /// Log out exactly once. Idempotent: a second call is a silent no-op,
    /// matching `SessionState::close`'s contract.
    pub fn logout(&self) {
        if self.state.close() {
            self.statistics.record_session_logout();
            if let Some(hook) = &self.on_logout {
                hook();
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.logout();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InMemoryPersistenceManager, NullObservationDispatcher};
    use repo_core::changelog::SHAREABLE_MIXIN;

    fn session() -> Session {
        let ism = Arc::new(SharedItemStateManager::new(
            "default",
            Arc::new(InMemoryPersistenceManager::new()),
        ));
        let namespaces_dir = tempfile::TempDir::new().unwrap().into_path();
        let namespaces = repo_core::namespace::NamespaceRegistry::open(&namespaces_dir).unwrap();
        Session::new(
            Arc::new(SessionContext::new("alice", "default")),
            Arc::clone(&ism),
            Arc::new(NullObservationDispatcher),
            Arc::new(SearchManager::new("default", ism, &namespaces)),
            Arc::new(RepositoryStatistics::new()),
        )
    }

    fn name(local: &str) -> Name {
        Name::new("http://example.com/ns", local)
    }

    #[test]
    fn new_session_is_live() {
        assert!(session().is_live());
    }

    #[test]
    fn logout_is_idempotent_and_marks_dead() {
        let s = session();
        s.logout();
        assert!(!s.is_live());
        s.logout();
        assert!(!s.is_live());
    }

    #[test]
    fn operations_after_logout_fail() {
        let s = session();
        s.logout();
        let err = s
            .add_node(NodeId::new_random(), None, name("n"), "nt:base")
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Closed));
    }

    #[test]
    fn save_persists_pending_nodes() {
        let s = session();
        let id = NodeId::new_random();
        s.add_node(id, None, name("n"), "nt:base").unwrap();
        s.save().unwrap();
        assert_eq!(s.get_node(id).unwrap().id, id);
    }

    #[test]
    fn refresh_without_keep_changes_discards_pending_state() {
        let s = session();
        let id = NodeId::new_random();
        s.add_node(id, None, name("n"), "nt:base").unwrap();
        s.refresh(false).unwrap();
        s.save().unwrap();
        assert!(s.get_node(id).is_err());
    }

    #[test]
    fn refresh_with_keep_changes_preserves_pending_state() {
        let s = session();
        let id = NodeId::new_random();
        s.add_node(id, None, name("n"), "nt:base").unwrap();
        s.refresh(true).unwrap();
        s.save().unwrap();
        assert!(s.get_node(id).is_ok());
    }

    #[test]
    fn save_with_no_pending_changes_is_a_no_op() {
        let s = session();
        s.save().unwrap();
    }

    #[test]
    fn move_relocates_a_node_between_parents() {
        let s = session();
        let old_parent = NodeId::new_random();
        let new_parent = NodeId::new_random();
        let child = NodeId::new_random();
        s.add_node(old_parent, None, name("old"), "nt:base").unwrap();
        s.add_node(new_parent, None, name("new"), "nt:base").unwrap();
        s.add_node(child, Some(old_parent), name("child"), "nt:base").unwrap();
        s.save().unwrap();

        s.stage_move(child, new_parent).unwrap();
        s.save().unwrap();

        assert_eq!(s.get_node(child).unwrap().parent_id, Some(new_parent));
        assert!(!s
            .get_node(old_parent)
            .unwrap()
            .child_nodes
            .iter()
            .any(|(_, id)| *id == child));
        assert!(s
            .get_node(new_parent)
            .unwrap()
            .child_nodes
            .iter()
            .any(|(_, id)| *id == child));
    }

    #[test]
    fn move_into_own_descendant_is_rejected() {
        let s = session();
        let parent = NodeId::new_random();
        let child = NodeId::new_random();
        s.add_node(parent, None, name("parent"), "nt:base").unwrap();
        s.add_node(child, Some(parent), name("child"), "nt:base").unwrap();
        s.save().unwrap();

        let err = s.stage_move(parent, child).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidMove(_)));
    }

    #[test]
    fn move_onto_itself_is_rejected() {
        let s = session();
        let id = NodeId::new_random();
        s.add_node(id, None, name("n"), "nt:base").unwrap();
        s.save().unwrap();

        let err = s.stage_move(id, id).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidMove(_)));
    }

    #[test]
    fn move_onto_a_same_named_sibling_is_rejected() {
        let s = session();
        let old_parent = NodeId::new_random();
        let new_parent = NodeId::new_random();
        let child = NodeId::new_random();
        let colliding = NodeId::new_random();
        s.add_node(old_parent, None, name("old"), "nt:base").unwrap();
        s.add_node(new_parent, None, name("new"), "nt:base").unwrap();
        s.add_node(child, Some(old_parent), name("shared"), "nt:base").unwrap();
        s.add_node(colliding, Some(new_parent), name("shared"), "nt:base")
            .unwrap();
        s.save().unwrap();

        let err = s.stage_move(child, new_parent).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidMove(_)));
    }

    #[test]
    fn move_of_a_shareable_node_is_rejected() {
        let s = session();
        let old_parent = NodeId::new_random();
        let new_parent = NodeId::new_random();
        let child = NodeId::new_random();
        s.add_node(old_parent, None, name("old"), "nt:base").unwrap();
        s.add_node(new_parent, None, name("new"), "nt:base").unwrap();
        s.add_node(child, Some(old_parent), name("child"), "nt:base").unwrap();
        s.save().unwrap();

        let mut shared = s.get_node(child).unwrap();
        shared.mixin_type_names.push(SHAREABLE_MIXIN.to_string());
        let mut log = ChangeLog::new();
        log.modify_node(shared);
        s.item_state_manager.update(log, "alice").unwrap();

        let err = s.stage_move(child, new_parent).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidMove(_)));
    }

    #[test]
    fn move_to_the_current_parent_is_a_no_op() {
        let s = session();
        let parent = NodeId::new_random();
        let child = NodeId::new_random();
        s.add_node(parent, None, name("parent"), "nt:base").unwrap();
        s.add_node(child, Some(parent), name("child"), "nt:base").unwrap();
        s.save().unwrap();

        s.stage_move(child, parent).unwrap();
        s.save().unwrap();
        assert_eq!(s.get_node(child).unwrap().parent_id, Some(parent));
    }
}
