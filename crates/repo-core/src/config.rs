//! Repository and workspace configuration types (SPEC_FULL.md §A
//! "config"): plain, `serde`-derived structs with no parsing logic of their
//! own. Parsing a config file from disk is out of scope here (spec §1
//! boundary) — the kernel consumes an already-parsed [`RepositoryConfig`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,
    #[serde(default)]
    pub root_path: Option<PathBuf>,
    /// Seconds of inactivity after which an idle `WorkspaceInfo` is
    /// eligible for disposal by the janitor (spec §4.5).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    3600
}

impl WorkspaceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_path: None,
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub enabled: bool,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,
}

fn default_sync_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_anonymous_id")]
    pub anonymous_id: String,
    #[serde(default)]
    pub admin_ids: Vec<String>,
}

fn default_anonymous_id() -> String {
    "anonymous".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub enabled: bool,
    #[serde(default)]
    pub index_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersioningConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub home: PathBuf,
    #[serde(default = "default_janitor_interval_secs")]
    pub workspace_janitor_interval_secs: u64,
    pub workspaces: Vec<WorkspaceConfig>,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub versioning: VersioningConfig,
}

fn default_janitor_interval_secs() -> u64 {
    60
}

impl RepositoryConfig {
    pub fn default_workspace_name(&self) -> Option<&str> {
        self.workspaces.first().map(|w| w.name.as_str())
    }

    pub fn workspace(&self, name: &str) -> Option<&WorkspaceConfig> {
        self.workspaces.iter().find(|w| w.name == name)
    }
}
