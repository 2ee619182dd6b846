//! Repository kernel: startup, login/shutdown, and the background
//! workspace janitor (spec §4.4 "Repository").
//!
//! The janitor and statistics sampler are both `CancellationToken`-driven
//! background loops spawned during startup and cancelled together on
//! shutdown.

use repo_core::config::RepositoryConfig;
use repo_core::error::RepositoryError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::collab::{Credentials, ObservationDispatcher, PersistenceManager, RepositoryLock, SecurityManager};
use crate::context::RepositoryContext;
use crate::session::{Session, SessionContext};
use crate::workspace::WorkspaceInfo;

/// Everything the kernel needs to do its job that isn't named in
/// `RepositoryConfig` itself — the collaborator instances (spec §4.4).
pub struct RepositoryCollaborators {
    pub persistence: Arc<dyn PersistenceManager>,
    pub security: Arc<dyn SecurityManager>,
    pub observation: Arc<dyn ObservationDispatcher>,
    pub lock: Arc<dyn RepositoryLock>,
}

pub struct Repository {
    pub context: Arc<RepositoryContext>,
    collaborators: RepositoryCollaborators,
    workspaces: parking_lot::RwLock<HashMap<String, Arc<WorkspaceInfo>>>,
    janitor_cancellation: CancellationToken,
    statistics_cancellation: CancellationToken,
    started: AtomicBool,
}

impl Repository {
    /// Spec §4.4 startup sequence:
    /// 1. acquire the repository-wide exclusive lock
    /// 2. bootstrap the namespace registry and descriptors
    /// 3. register the configured workspaces (lazily initialized)
    /// 4. start the statistics sampler
    /// 5. start the workspace janitor
    pub fn startup(
        config: RepositoryConfig,
        collaborators: RepositoryCollaborators,
    ) -> Result<Arc<Self>, RepositoryError> {
        collaborators.lock.acquire()?;

        let janitor_interval = Duration::from_secs(config.workspace_janitor_interval_secs);
        let workspace_configs = config.workspaces.clone();

        let context = Arc::new(RepositoryContext::bootstrap(config)?);

        let mut workspaces = HashMap::new();
        for ws_config in workspace_configs {
            workspaces.insert(
                ws_config.name.clone(),
                Arc::new(WorkspaceInfo::new(
                    ws_config,
                    Arc::clone(&collaborators.persistence),
                    Arc::clone(&context.namespaces),
                    Arc::clone(&collaborators.observation),
                    Arc::clone(&context.statistics),
                )),
            );
        }

        let repository = Arc::new(Self {
            context: Arc::clone(&context),
            collaborators,
            workspaces: parking_lot::RwLock::new(workspaces),
            janitor_cancellation: CancellationToken::new(),
            statistics_cancellation: CancellationToken::new(),
            started: AtomicBool::new(true),
        });

        context
            .statistics
            .clone()
            .spawn_sampler(repository.statistics_cancellation.clone());
        repository.spawn_janitor(janitor_interval);

        Ok(repository)
    }

    fn spawn_janitor(self: &Arc<Self>, interval: Duration) {
        let repository = Arc::clone(self);
        let token = self.janitor_cancellation.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        repository.sweep_idle_workspaces();
                    }
                }
            }
        });
    }

    /// Dispose every workspace that is initialized, has no open sessions,
    /// and has been untouched past its idle timeout (spec §4.5).
    fn sweep_idle_workspaces(&self) -> usize {
        let workspaces = self.workspaces.read();
        let mut disposed = 0;
        for info in workspaces.values() {
            if info.is_idle() {
                info.dispose();
                self.context.statistics.record_workspace_disposed();
                disposed += 1;
            }
        }
        if disposed > 0 {
            tracing::debug!(disposed, "workspace janitor swept idle workspaces");
        }
        disposed
    }

    fn resolve_workspace(&self, name: Option<&str>) -> Result<Arc<WorkspaceInfo>, RepositoryError> {
        let workspaces = self.workspaces.read();
        let name = name
            .map(str::to_string)
            .or_else(|| workspaces.keys().next().cloned())
            .ok_or_else(|| RepositoryError::NoSuchWorkspace("<none configured>".to_string()))?;
        workspaces
            .get(&name)
            .cloned()
            .ok_or(RepositoryError::NoSuchWorkspace(name))
    }

    /// Authenticate, resolve the target workspace, and hand back a live
    /// `Session` (spec §4.4 "login").
    pub fn login(&self, credentials: &Credentials, workspace_name: Option<&str>) -> Result<Session, RepositoryError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(RepositoryError::ShuttingDown);
        }

        let user_id = self.collaborators.security.authenticate(credentials)?;
        let workspace = self.resolve_workspace(workspace_name)?;

        if !self
            .collaborators
            .security
            .can_access_workspace(&user_id, workspace.name())
        {
            return Err(RepositoryError::AccessDenied(format!(
                "user '{user_id}' may not access workspace '{}'",
                workspace.name()
            )));
        }

        let was_initialized = workspace.status() == crate::workspace::WorkspaceStatus::Initialized;
        let item_state_manager = workspace.ensure_initialized()?;
        if !was_initialized {
            self.context.statistics.record_workspace_initialized();
        }
        let search = workspace
            .search_manager()
            .expect("ensure_initialized always sets the search manager alongside the item state manager");
        workspace.session_opened();

        let session_context = Arc::new(SessionContext::new(user_id, workspace.name().to_string()));
        let hook_workspace = Arc::clone(&workspace);
        let session = Session::with_logout_hook(
            session_context,
            item_state_manager,
            Arc::clone(&self.collaborators.observation),
            search,
            Arc::clone(&self.context.statistics),
            Some(Box::new(move || hook_workspace.session_closed())),
        );
        Ok(session)
    }

    /// Cancel the background tasks, dispose every workspace, and release
    /// the repository lock (spec §4.4 "shutdown").
    pub fn shutdown(&self) {
        self.started.store(false, Ordering::SeqCst);
        self.janitor_cancellation.cancel();
        self.statistics_cancellation.cancel();
        for info in self.workspaces.read().values() {
            info.dispose();
        }
        self.collaborators.lock.release();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Register a workspace announced by a remote cluster peer
    /// (`ClusterEventHandler::external_workspace_created`, spec §4.6
    /// `workspaceCreated`). A no-op if the workspace is already known
    /// locally.
    pub fn register_remote_workspace(&self, name: &str) {
        let mut workspaces = self.workspaces.write();
        workspaces.entry(name.to_string()).or_insert_with(|| {
            Arc::new(WorkspaceInfo::new(
                repo_core::config::WorkspaceConfig::new(name),
                Arc::clone(&self.collaborators.persistence),
                Arc::clone(&self.context.namespaces),
                Arc::clone(&self.collaborators.observation),
                Arc::clone(&self.context.statistics),
            ))
        });
    }

    pub fn remove_remote_workspace(&self, name: &str) {
        if let Some(info) = self.workspaces.write().remove(name) {
            info.dispose();
        }
    }
}
