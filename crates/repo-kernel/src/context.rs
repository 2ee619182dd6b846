//! Repository-wide, workspace-independent context: namespace registry,
//! descriptors, configuration, and statistics (spec §4.3
//! "RepositoryContext"). Shared by reference across every workspace and
//! session the kernel hosts.

use repo_core::config::RepositoryConfig;
use repo_core::descriptors::RepositoryDescriptors;
use repo_core::namespace::NamespaceRegistry;
use std::sync::Arc;

use crate::statistics::RepositoryStatistics;

pub struct RepositoryContext {
    pub config: RepositoryConfig,
    pub namespaces: Arc<NamespaceRegistry>,
    pub descriptors: RepositoryDescriptors,
    pub statistics: Arc<RepositoryStatistics>,
}

impl RepositoryContext {
    pub fn new(
        config: RepositoryConfig,
        namespaces: Arc<NamespaceRegistry>,
        descriptors: RepositoryDescriptors,
    ) -> Self {
        Self {
            config,
            namespaces,
            descriptors,
            statistics: Arc::new(RepositoryStatistics::new()),
        }
    }
}

fn default_descriptors() -> RepositoryDescriptors {
    use repo_core::descriptors::DescriptorValue;
    RepositoryDescriptors::builder()
        .set(
            "jcr.repository.name",
            DescriptorValue::String("repository-kernel".to_string()),
        )
        .set(
            "jcr.repository.vendor",
            DescriptorValue::String("repository-kernel contributors".to_string()),
        )
        .set(
            "jcr.specification.version",
            DescriptorValue::String("2.0".to_string()),
        )
        .set("option.transactions.supported", DescriptorValue::Bool(true))
        .set("option.observation.supported", DescriptorValue::Bool(true))
        .set("option.versioning.supported", DescriptorValue::Bool(false))
        .build()
}

impl RepositoryContext {
    pub fn bootstrap(config: RepositoryConfig) -> Result<Self, repo_core::error::RepositoryError> {
        let namespaces_dir = config.home.join("namespaces");
        let namespaces = Arc::new(NamespaceRegistry::open(&namespaces_dir)?);
        Ok(Self::new(config, namespaces, default_descriptors()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_seeds_descriptors_and_namespaces() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RepositoryConfig {
            home: dir.path().to_path_buf(),
            workspace_janitor_interval_secs: 60,
            workspaces: vec![],
            cluster: Default::default(),
            security: Default::default(),
            search: Default::default(),
            versioning: Default::default(),
        };
        let context = RepositoryContext::bootstrap(config).unwrap();
        assert!(context.descriptors.get("jcr.repository.name").is_some());
        assert_eq!(context.namespaces.get_uri("jcr").unwrap(), "http://www.jcp.org/jcr/1.0");
    }
}
