//! Repository, workspace, and session kernel (spec §§4.3-4.11).
//!
//! Wires together `repo_core`'s namespace registry, change log, and I/O
//! primitives into a running repository: lazy per-workspace item state,
//! session login/logout with first-class dispatched operations, observation
//! batching into search-index updates, periodic statistics, and a
//! start-on-first-login/stop-on-last-logout facade.

pub mod cluster;
pub mod collab;
pub mod context;
pub mod item_state;
pub mod repository;
pub mod search;
pub mod session;
pub mod statistics;
pub mod transient;
pub mod workspace;

pub use cluster::KernelClusterHandler;
pub use context::RepositoryContext;
pub use repository::{Repository, RepositoryCollaborators};
pub use session::{Session, SessionContext, SessionOperation};
pub use transient::{TransientRepository, TransientSession};
pub use workspace::{WorkspaceInfo, WorkspaceStatus};
