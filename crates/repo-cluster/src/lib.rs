//! Cluster replication channel for the repository kernel (spec §4.6).
//!
//! Defines the event shapes exchanged between nodes, a transport
//! abstraction, an in-memory journal, and the `ClusterNode` control
//! surface. Deliberately has no dependency on `repo-kernel`: kernel state
//! is reached only through the [`node::ClusterEventHandler`] trait the
//! kernel implements.

pub mod events;
pub mod journal;
pub mod node;
pub mod transport;

pub use events::ClusterEvent;
pub use journal::Journal;
pub use node::{ClusterError, ClusterEventHandler, ClusterNode, ClusterNodeImpl};
pub use transport::{LoopbackTransport, Transport, TransportError};
