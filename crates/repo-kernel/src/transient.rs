//! Start-on-first-login, stop-on-last-logout façade over [`Repository`]
//! (spec §4.11 "TransientRepository"): the same graceful-shutdown idea as
//! "shut everything down on one signal", generalized to "shut everything
//! down once nobody is using it any more".

use parking_lot::Mutex;
use repo_core::config::RepositoryConfig;
use repo_core::error::RepositoryError;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::collab::{Credentials, ObservationDispatcher, PersistenceManager, RepositoryLock, SecurityManager};
use crate::repository::{Repository, RepositoryCollaborators};
use crate::session::Session;

pub struct TransientRepository {
    config: RepositoryConfig,
    persistence: Arc<dyn PersistenceManager>,
    security: Arc<dyn SecurityManager>,
    observation: Arc<dyn ObservationDispatcher>,
    lock: Arc<dyn RepositoryLock>,
    inner: Mutex<Option<Arc<Repository>>>,
    active_sessions: AtomicUsize,
}

impl TransientRepository {
    pub fn new(
        config: RepositoryConfig,
        persistence: Arc<dyn PersistenceManager>,
        security: Arc<dyn SecurityManager>,
        observation: Arc<dyn ObservationDispatcher>,
        lock: Arc<dyn RepositoryLock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            persistence,
            security,
            observation,
            lock,
            inner: Mutex::new(None),
            active_sessions: AtomicUsize::new(0),
        })
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().is_some()
    }

    fn ensure_started(&self) -> Result<Arc<Repository>, RepositoryError> {
        let mut guard = self.inner.lock();
        if let Some(repo) = guard.as_ref() {
            return Ok(Arc::clone(repo));
        }
        let collaborators = RepositoryCollaborators {
            persistence: Arc::clone(&self.persistence),
            security: Arc::clone(&self.security),
            observation: Arc::clone(&self.observation),
            lock: Arc::clone(&self.lock),
        };
        let repo = Repository::startup(self.config.clone(), collaborators)?;
        *guard = Some(Arc::clone(&repo));
        Ok(repo)
    }

    /// Start the underlying repository if it is not already running,
    /// authenticate, and return a session that counts toward the
    /// stop-on-last-logout threshold.
    pub fn login(
        self: &Arc<Self>,
        credentials: &Credentials,
        workspace_name: Option<&str>,
    ) -> Result<TransientSession, RepositoryError> {
        let repo = self.ensure_started()?;
        let session = repo.login(credentials, workspace_name)?;
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(TransientSession {
            session,
            transient: Arc::clone(self),
        })
    }

    fn on_session_closed(&self) {
        if self.active_sessions.fetch_sub(1, Ordering::SeqCst) == 1 {
            let mut guard = self.inner.lock();
            if let Some(repo) = guard.take() {
                repo.shutdown();
            }
        }
    }
}

/// A `Session` obtained through [`TransientRepository::login`]. Logging it
/// out (or dropping it) decrements the active-session count; the last one
/// to close stops the underlying repository.
pub struct TransientSession {
    session: Session,
    transient: Arc<TransientRepository>,
}

impl Deref for TransientSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Drop for TransientSession {
    fn drop(&mut self) {
        self.session.logout();
        self.transient.on_session_closed();
    }
}
