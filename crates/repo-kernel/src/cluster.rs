//! Bridges inbound cluster events onto the repository kernel (spec §4.6:
//! `externalUpdate`/`externalRemap`/`workspaceCreated`). Implements
//! `repo_cluster`'s object-safe handler trait so `repo-cluster` itself
//! never needs to depend on kernel internals.

use repo_cluster::events::LockEventKind;
use repo_cluster::node::ClusterEventHandler;
use std::sync::Arc;

use crate::repository::Repository;

pub struct KernelClusterHandler {
    repository: Arc<Repository>,
}

impl KernelClusterHandler {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self { repository }
    }
}

impl ClusterEventHandler for KernelClusterHandler {
    fn external_namespace_remap(&self, old_prefix: Option<&str>, new_prefix: &str, uri: &str) {
        if let Err(err) = self
            .repository
            .context
            .namespaces
            .external_remap(old_prefix, Some(new_prefix), uri)
        {
            tracing::warn!(error = %err, "failed to apply external namespace remap");
        }
    }

    fn external_lock_event(&self, kind: LockEventKind, node_id: &str) {
        tracing::debug!(?kind, node_id, "received external lock event");
    }

    fn external_workspace_created(&self, workspace_name: &str) {
        self.repository.register_remote_workspace(workspace_name);
    }

    fn external_workspace_deleted(&self, workspace_name: &str) {
        self.repository.remove_remote_workspace(workspace_name);
    }

    fn external_update(&self, workspace_name: &str, change_log_bytes: &[u8]) {
        // The wire format for a replicated `ChangeLog` is an explicit
        // Non-goal (SPEC_FULL.md §B.4): this records that an update arrived
        // without attempting to decode and apply it.
        tracing::debug!(
            workspace = workspace_name,
            bytes = change_log_bytes.len(),
            "received external update"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        FileRepositoryLock, InMemoryPersistenceManager, NullObservationDispatcher, PermissiveSecurityManager,
    };
    use crate::repository::RepositoryCollaborators;
    use repo_core::config::RepositoryConfig;

    fn repository(home: &std::path::Path) -> Arc<Repository> {
        let config = RepositoryConfig {
            home: home.to_path_buf(),
            workspace_janitor_interval_secs: 3600,
            workspaces: vec![],
            cluster: Default::default(),
            security: Default::default(),
            search: Default::default(),
            versioning: Default::default(),
        };
        Repository::startup(
            config,
            RepositoryCollaborators {
                persistence: Arc::new(InMemoryPersistenceManager::new()),
                security: Arc::new(PermissiveSecurityManager),
                observation: Arc::new(NullObservationDispatcher),
                lock: Arc::new(FileRepositoryLock::new(home)),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn external_workspace_created_registers_it_locally() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = repository(dir.path());
        let handler = KernelClusterHandler::new(Arc::clone(&repo));

        handler.external_workspace_created("remote-ws");
        let session = repo
            .login(&crate::collab::Credentials::for_user("alice"), Some("remote-ws"))
            .unwrap();
        assert!(session.is_live());
    }

    #[tokio::test]
    async fn external_namespace_remap_updates_the_registry() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = repository(dir.path());
        let handler = KernelClusterHandler::new(Arc::clone(&repo));

        handler.external_namespace_remap(None, "acme", "http://acme/");
        assert_eq!(repo.context.namespaces.get_uri("acme").unwrap(), "http://acme/");
    }
}
