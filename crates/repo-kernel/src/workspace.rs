//! Lazy workspace lifecycle: created → initialized → disposed, cycling
//! back to initialized on next access (spec §4.3 "WorkspaceInfo").
//!
//! Guarded by a `parking_lot` writer-preference lock so a disposal in
//! progress is never raced by a session trying to initialize the same
//! workspace, with idle-timeout bookkeeping alongside it to decide what
//! is/isn't active. Everything a workspace needs that is scoped to *that*
//! workspace rather than the whole repository lives here: its item state
//! manager, its search index driver, its file system, its lock manager,
//! its retention registry, and the system-session handle other
//! collaborators use to read/write without an end-user login.

use parking_lot::RwLock;
use repo_core::config::WorkspaceConfig;
use repo_core::error::RepositoryError;
use repo_core::filesystem::{FileSystem, InMemoryFileSystem, LocalFileSystem};
use repo_core::namespace::NamespaceRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::collab::{
    InMemoryLockManager, InMemoryRetentionRegistry, ObservationDispatcher, PersistenceManager, RetentionRegistry,
    WorkspaceLockManager,
};
use crate::item_state::SharedItemStateManager;
use crate::search::SearchManager;
use crate::session::{Session, SessionContext};
use crate::statistics::RepositoryStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Created,
    Initialized,
    Disposed,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn build_file_system(config: &WorkspaceConfig) -> Arc<dyn FileSystem> {
    match &config.root_path {
        Some(root) => Arc::new(LocalFileSystem::new(root.clone())),
        None => Arc::new(InMemoryFileSystem::new()),
    }
}

/// Per-workspace lazy state. `ensure_initialized` is the only way an item
/// state manager (and the search manager/system session alongside it)
/// comes into existence; the janitor disposes idle workspaces by dropping
/// them, and the next `ensure_initialized` call recreates them — the
/// "cycling" lifecycle named in spec §4.3.
pub struct WorkspaceInfo {
    config: WorkspaceConfig,
    persistence: Arc<dyn PersistenceManager>,
    namespaces: Arc<NamespaceRegistry>,
    observation: Arc<dyn ObservationDispatcher>,
    statistics: Arc<RepositoryStatistics>,
    file_system: Arc<dyn FileSystem>,
    lock_manager: Arc<dyn WorkspaceLockManager>,
    retention: Arc<dyn RetentionRegistry>,
    status: RwLock<WorkspaceStatus>,
    item_state_manager: RwLock<Option<Arc<SharedItemStateManager>>>,
    search: RwLock<Option<Arc<SearchManager>>>,
    last_access: AtomicU64,
    sessions_open: AtomicU64,
}

impl WorkspaceInfo {
    pub fn new(
        config: WorkspaceConfig,
        persistence: Arc<dyn PersistenceManager>,
        namespaces: Arc<NamespaceRegistry>,
        observation: Arc<dyn ObservationDispatcher>,
        statistics: Arc<RepositoryStatistics>,
    ) -> Self {
        let file_system = build_file_system(&config);
        Self {
            config,
            persistence,
            namespaces,
            observation,
            statistics,
            file_system,
            lock_manager: Arc::new(InMemoryLockManager::new()),
            retention: Arc::new(InMemoryRetentionRegistry::new()),
            status: RwLock::new(WorkspaceStatus::Created),
            item_state_manager: RwLock::new(None),
            search: RwLock::new(None),
            last_access: AtomicU64::new(now_secs()),
            sessions_open: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn status(&self) -> WorkspaceStatus {
        *self.status.read()
    }

    pub fn file_system(&self) -> Arc<dyn FileSystem> {
        Arc::clone(&self.file_system)
    }

    pub fn lock_manager(&self) -> Arc<dyn WorkspaceLockManager> {
        Arc::clone(&self.lock_manager)
    }

    pub fn retention_registry(&self) -> Arc<dyn RetentionRegistry> {
        Arc::clone(&self.retention)
    }

    fn touch(&self) {
        self.last_access.store(now_secs(), Ordering::Relaxed);
    }

    /// Lazily create the item state manager and search manager if missing,
    /// transitioning `Created`/`Disposed` -> `Initialized`. Cheap on the
    /// already-warm path: only takes a read lock.
    pub fn ensure_initialized(&self) -> Result<Arc<SharedItemStateManager>, RepositoryError> {
        self.touch();
        if let Some(ism) = self.item_state_manager.read().as_ref() {
            return Ok(Arc::clone(ism));
        }

        let mut slot = self.item_state_manager.write();
        if let Some(ism) = slot.as_ref() {
            return Ok(Arc::clone(ism));
        }
        let ism = Arc::new(SharedItemStateManager::new(
            self.config.name.clone(),
            Arc::clone(&self.persistence),
        ));
        *slot = Some(Arc::clone(&ism));

        let mut search_slot = self.search.write();
        if search_slot.is_none() {
            *search_slot = Some(Arc::new(SearchManager::new(
                self.config.name.clone(),
                Arc::clone(&ism),
                &self.namespaces,
            )));
        }

        *self.status.write() = WorkspaceStatus::Initialized;
        Ok(ism)
    }

    /// The search manager driving this workspace's query index. Only
    /// meaningful once initialized; callers are expected to call
    /// `ensure_initialized` first (as `Repository::login` does).
    pub fn search_manager(&self) -> Option<Arc<SearchManager>> {
        self.search.read().clone()
    }

    /// A privileged session with no end-user behind it, for internal
    /// maintenance work (index rebuilds, version store bookkeeping) a
    /// collaborator needs to perform against this workspace directly
    /// (spec §4.3). Built on demand from the already-initialized item
    /// state/search managers; never persisted across a dispose/reinit
    /// cycle.
    pub fn system_session(&self) -> Result<Session, RepositoryError> {
        let item_state_manager = self.ensure_initialized()?;
        let search = self
            .search_manager()
            .expect("ensure_initialized always sets the search manager alongside the item state manager");
        let context = Arc::new(SessionContext::new("system", self.config.name.clone()));
        Ok(Session::new(
            context,
            item_state_manager,
            Arc::clone(&self.observation),
            search,
            Arc::clone(&self.statistics),
        ))
    }

    pub fn session_opened(&self) {
        self.sessions_open.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    pub fn session_closed(&self) {
        self.sessions_open.fetch_sub(1, Ordering::SeqCst);
        self.touch();
    }

    fn open_session_count(&self) -> u64 {
        self.sessions_open.load(Ordering::SeqCst)
    }

    /// Idle iff initialized, no sessions currently open, and untouched for
    /// at least `config.idle_timeout_secs`.
    pub fn is_idle(&self) -> bool {
        if self.status() != WorkspaceStatus::Initialized {
            return false;
        }
        if self.open_session_count() > 0 {
            return false;
        }
        now_secs().saturating_sub(self.last_access.load(Ordering::Relaxed))
            >= self.config.idle_timeout_secs
    }

    /// Drop the item state manager and search manager, transitioning back
    /// to `Disposed`. A subsequent `ensure_initialized` call brings them
    /// back.
    pub fn dispose(&self) {
        *self.item_state_manager.write() = None;
        *self.search.write() = None;
        *self.status.write() = WorkspaceStatus::Disposed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{InMemoryPersistenceManager, NullObservationDispatcher};

    fn config(idle_timeout_secs: u64) -> WorkspaceConfig {
        WorkspaceConfig {
            name: "default".into(),
            root_path: None,
            idle_timeout_secs,
        }
    }

    fn namespaces() -> Arc<NamespaceRegistry> {
        let dir = tempfile::TempDir::new().unwrap().into_path();
        Arc::new(NamespaceRegistry::open(&dir).unwrap())
    }

    fn info(idle_timeout_secs: u64) -> WorkspaceInfo {
        WorkspaceInfo::new(
            config(idle_timeout_secs),
            Arc::new(InMemoryPersistenceManager::new()),
            namespaces(),
            Arc::new(NullObservationDispatcher),
            Arc::new(RepositoryStatistics::new()),
        )
    }

    #[test]
    fn starts_created_and_uninitialized() {
        let info = info(60);
        assert_eq!(info.status(), WorkspaceStatus::Created);
        assert!(info.search_manager().is_none());
    }

    #[test]
    fn ensure_initialized_transitions_to_initialized_and_builds_a_search_manager() {
        let info = info(60);
        info.ensure_initialized().unwrap();
        assert_eq!(info.status(), WorkspaceStatus::Initialized);
        assert!(info.search_manager().is_some());
    }

    #[test]
    fn ensure_initialized_is_idempotent() {
        let info = info(60);
        let a = info.ensure_initialized().unwrap();
        let b = info.ensure_initialized().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&info.search_manager().unwrap(), &info.search_manager().unwrap()));
    }

    #[test]
    fn not_idle_with_open_sessions() {
        let info = info(0);
        info.ensure_initialized().unwrap();
        info.session_opened();
        assert!(!info.is_idle());
    }

    #[test]
    fn idle_after_timeout_with_no_sessions() {
        let info = info(0);
        info.ensure_initialized().unwrap();
        assert!(info.is_idle());
    }

    #[test]
    fn dispose_then_reinitialize_cycles_the_lifecycle() {
        let info = info(60);
        let first = info.ensure_initialized().unwrap();
        info.dispose();
        assert_eq!(info.status(), WorkspaceStatus::Disposed);
        assert!(info.search_manager().is_none());

        let second = info.ensure_initialized().unwrap();
        assert_eq!(info.status(), WorkspaceStatus::Initialized);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn system_session_can_add_and_see_a_node() {
        let info = info(60);
        let session = info.system_session().unwrap();
        let id = repo_core::ids::NodeId::new_random();
        session
            .add_node(id, None, repo_core::ids::Name::new("http://example.com/ns", "n"), "nt:base")
            .unwrap();
        crate::session::SessionOperation::Save.execute(&session).unwrap();
        assert!(session.get_node(id).is_ok());
    }

    #[test]
    fn in_memory_file_system_is_used_when_no_root_path_is_configured() {
        let info = info(60);
        let fs = info.file_system();
        fs.write("probe", b"1").unwrap();
        assert!(fs.exists("probe"));
    }
}
