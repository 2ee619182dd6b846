//! Foundational types shared by the repository kernel and cluster crates:
//! error kinds, identifiers, atomic/locking I/O primitives, the namespace
//! registry, the persisted change log, repository descriptors, and config
//! types (spec §§3-4.1, §6-§7).

pub mod changelog;
pub mod config;
pub mod descriptors;
pub mod error;
pub mod filesystem;
pub mod ids;
pub mod io;
pub mod logging;
pub mod namespace;

pub use error::{ItemStateError, NamespaceError, RepositoryError};
pub use ids::{Name, NodeId, PropertyId};
pub use namespace::NamespaceRegistry;
