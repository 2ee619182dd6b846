//! Low-level, platform-facing persistence primitives shared by
//! [`crate::namespace::NamespaceRegistry`] and the repository lock
//! mechanism (spec §6).

pub mod atomic;
pub mod lock;

pub use atomic::write_atomic;
pub use lock::{acquire_lock, FileLock, LockError};
