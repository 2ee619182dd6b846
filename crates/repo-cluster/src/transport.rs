//! Cluster transport abstraction (spec §4.6 collaborator list: "journal" /
//! cluster channel): an async trait plus a loopback implementation usable
//! in tests without a real network. No wire format is defined here — that
//! is an explicit Non-goal (SPEC_FULL.md §B.4).

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport send failed: {0}")]
    Send(String),
}

/// A bidirectional channel for serialized [`crate::events::ClusterEvent`]
/// payloads. Implementations decide how bytes actually leave the process;
/// callers only push and pull opaque frames.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;
    async fn push(&self, payload: Vec<u8>) -> Result<(), TransportError>;
    async fn pull(&self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// In-process transport double: pushes from one handle are visible to
/// `pull()` on a clone of the same handle. Used by single-process tests and
/// by [`crate::node`] tests that exercise two `ClusterNode`s without a real
/// network.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    connected: Arc<Mutex<bool>>,
    queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        *self.connected.lock().unwrap() = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }

    async fn push(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.queue.lock().unwrap().push_back(payload);
        Ok(())
    }

    async fn pull(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        Ok(self.queue.lock().unwrap().pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_then_pull_is_fifo() {
        let transport = LoopbackTransport::new();
        transport.connect().await.unwrap();
        transport.push(vec![1]).await.unwrap();
        transport.push(vec![2]).await.unwrap();

        assert_eq!(transport.pull().await.unwrap(), Some(vec![1]));
        assert_eq!(transport.pull().await.unwrap(), Some(vec![2]));
        assert_eq!(transport.pull().await.unwrap(), None);
    }

    #[tokio::test]
    async fn push_before_connect_fails() {
        let transport = LoopbackTransport::new();
        let err = transport.push(vec![1]).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn cloned_handles_share_the_same_queue() {
        let transport = LoopbackTransport::new();
        transport.connect().await.unwrap();
        let other = transport.clone();
        transport.push(vec![9]).await.unwrap();
        assert_eq!(other.pull().await.unwrap(), Some(vec![9]));
    }
}
