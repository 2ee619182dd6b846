//! First-class, dispatched session operations (spec §4.8:
//! `Save`/`Refresh`/`Move`/`Remove`/`Logout`), so every mutating entry
//! point goes through one `execute` seam instead of being called directly
//! off `Session`: a closed set of request variants matched in one place.

use repo_core::error::RepositoryError;
use repo_core::ids::NodeId;

use crate::session::session::Session;

#[derive(Debug, Clone)]
pub enum SessionOperation {
    Save,
    Refresh { keep_changes: bool },
    Move { id: NodeId, new_parent: NodeId },
    Remove { id: NodeId },
    Logout,
}

impl SessionOperation {
    pub fn execute(self, session: &Session) -> Result<(), RepositoryError> {
        match self {
            SessionOperation::Save => session.save(),
            SessionOperation::Refresh { keep_changes } => session.refresh(keep_changes),
            SessionOperation::Move { id, new_parent } => session.stage_move(id, new_parent),
            SessionOperation::Remove { id } => session.stage_remove(id),
            SessionOperation::Logout => {
                session.logout();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InMemoryPersistenceManager, NullObservationDispatcher};
    use crate::item_state::SharedItemStateManager;
    use crate::search::SearchManager;
    use crate::session::context::SessionContext;
    use crate::statistics::RepositoryStatistics;
    use repo_core::ids::Name;
    use std::sync::Arc;

    fn name(local: &str) -> Name {
        Name::new("http://example.com/ns", local)
    }

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

    #[test]
    fn save_operation_commits_pending_changes() {
        let s = session();
        let id = NodeId::new_random();
        s.add_node(id, None, name("n"), "nt:base").unwrap();
        SessionOperation::Save.execute(&s).unwrap();
        assert!(s.get_node(id).is_ok());
    }

    #[test]
    fn remove_then_save_deletes_the_node() {
        let s = session();
        let id = NodeId::new_random();
        s.add_node(id, None, name("n"), "nt:base").unwrap();
        SessionOperation::Save.execute(&s).unwrap();

        SessionOperation::Remove { id }.execute(&s).unwrap();
        SessionOperation::Save.execute(&s).unwrap();
        assert!(s.get_node(id).is_err());
    }

    #[test]
    fn logout_operation_ends_the_session() {
        let s = session();
        SessionOperation::Logout.execute(&s).unwrap();
        assert!(!s.is_live());
    }

    #[test]
    fn move_operation_reparents_an_existing_node() {
        let s = session();
        let old_parent = NodeId::new_random();
        let new_parent = NodeId::new_random();
        let id = NodeId::new_random();
        s.add_node(old_parent, None, name("old"), "nt:base").unwrap();
        s.add_node(new_parent, None, name("new"), "nt:base").unwrap();
        s.add_node(id, Some(old_parent), name("child"), "nt:base").unwrap();
        SessionOperation::Save.execute(&s).unwrap();

        SessionOperation::Move { id, new_parent }.execute(&s).unwrap();
        SessionOperation::Save.execute(&s).unwrap();
        assert_eq!(s.get_node(id).unwrap().parent_id, Some(new_parent));
    }
}
