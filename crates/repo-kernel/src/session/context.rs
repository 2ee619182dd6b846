//! Per-session identity and typed attribute bag (spec §4.7
//! "SessionContext"; SPEC_FULL.md §B.2 names `disableClusterSyncOnRefresh`
//! as a concrete attribute consumers set by name).

use parking_lot::RwLock;
use repo_core::descriptors::DescriptorValue;
use std::collections::HashMap;
use uuid::Uuid;

pub struct SessionContext {
    pub session_id: Uuid,
    pub user_id: String,
    pub workspace_name: String,
    attributes: RwLock<HashMap<String, DescriptorValue>>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, workspace_name: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            workspace_name: workspace_name.into(),
            attributes: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: DescriptorValue) {
        self.attributes.write().insert(key.into(), value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<DescriptorValue> {
        self.attributes.read().get(key).cloned()
    }

    /// Typed convenience accessor for the one attribute spec.md calls out
    /// by name: whether `Session::refresh` should suppress the usual
    /// cluster-sync-before-refresh step.
    pub fn disable_cluster_sync_on_refresh(&self) -> bool {
        self.get_attribute("disableClusterSyncOnRefresh")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_attribute_returns_none() {
        let ctx = SessionContext::new("alice", "default");
        assert!(ctx.get_attribute("missing").is_none());
    }

    #[test]
    fn disable_cluster_sync_defaults_to_false() {
        let ctx = SessionContext::new("alice", "default");
        assert!(!ctx.disable_cluster_sync_on_refresh());
    }

    #[test]
    fn disable_cluster_sync_reads_back_the_set_attribute() {
        let ctx = SessionContext::new("alice", "default");
        ctx.set_attribute("disableClusterSyncOnRefresh", DescriptorValue::Bool(true));
        assert!(ctx.disable_cluster_sync_on_refresh());
    }
}
