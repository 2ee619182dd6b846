//! Repository-wide error kinds.
//!
//! These map to spec §7 ("Error Handling Design"): each variant names a
//! failure *kind*, not an implementation detail, so subsystems above
//! `repo-core` can match on them without depending on persistence or
//! transport internals.

use std::io;
use std::path::PathBuf;

/// Top-level error returned by repository-kernel operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository is shutting down")]
    ShuttingDown,

    #[error("repository is closed")]
    Closed,

    #[error("no such workspace: {0}")]
    NoSuchWorkspace(String),

    #[error("login failed: {0}")]
    Login(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("namespace error: {0}")]
    Namespace(#[from] NamespaceError),

    #[error("item state error: {0}")]
    ItemState(#[from] ItemStateError),

    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cluster error: {0}")]
    Cluster(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("invalid move: {0}")]
    InvalidMove(String),
}

impl RepositoryError {
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by [`crate::namespace::NamespaceRegistry`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("prefix or uri must not be empty")]
    Illegal,

    #[error("'{0}' is a reserved prefix or uri")]
    Reserved(String),

    #[error("'{0}' is not a valid XML NCName")]
    InvalidPrefix(String),

    #[error("mapping ({prefix} -> {uri}) is already registered")]
    AlreadyMapped { prefix: String, uri: String },

    #[error("prefix '{0}' is already bound to a different uri; remapping a prefix is not supported")]
    RemapNotSupported(String),

    #[error("unregistering namespaces is not supported")]
    NotSupported,

    #[error("no such mapping registered for '{0}'")]
    NotRegistered(String),
}

/// Errors raised applying or loading item state (spec §4.2).
#[derive(Debug, thiserror::Error)]
pub enum ItemStateError {
    #[error("no such item: {0}")]
    NotFound(String),

    #[error("item state is stale: {0}")]
    Stale(String),

    #[error("referential integrity violation: {0}")]
    ReferenceIntegrity(String),

    #[error("underlying storage failure: {0}")]
    Storage(String),
}
