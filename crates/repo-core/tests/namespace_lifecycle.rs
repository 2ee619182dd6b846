//! Integration tests for the namespace registry's on-disk lifecycle.

use repo_core::namespace::NamespaceRegistry;
use tempfile::TempDir;

#[test]
fn registry_survives_a_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("namespaces");

    {
        let registry = NamespaceRegistry::open(&path).unwrap();
        registry.register("acme", "http://acme.example/1.0").unwrap();
        assert_eq!(registry.get_uri("acme").unwrap(), "http://acme.example/1.0");
    }

    let reopened = NamespaceRegistry::open(&path).unwrap();
    assert_eq!(reopened.get_uri("acme").unwrap(), "http://acme.example/1.0");
    assert_eq!(reopened.get_prefix("http://acme.example/1.0").unwrap(), "acme");
}

#[test]
fn reserved_prefixes_survive_reopen_with_stable_indices() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("namespaces");

    let first_index = {
        let registry = NamespaceRegistry::open(&path).unwrap();
        registry.get_index_by_uri("http://www.jcp.org/jcr/1.0").unwrap()
    };

    let reopened = NamespaceRegistry::open(&path).unwrap();
    assert_eq!(
        reopened.get_index_by_uri("http://www.jcp.org/jcr/1.0").unwrap(),
        first_index
    );
}

#[test]
fn remap_then_reopen_drops_the_old_prefix_binding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("namespaces");

    {
        let registry = NamespaceRegistry::open(&path).unwrap();
        registry.register("a", "http://acme.example/1.0").unwrap();
        registry.register("b", "http://acme.example/1.0").unwrap();
        assert_eq!(registry.get_prefix("http://acme.example/1.0").unwrap(), "b");
    }

    let reopened = NamespaceRegistry::open(&path).unwrap();
    assert!(reopened.get_uri("a").is_err());
    assert_eq!(reopened.get_prefix("http://acme.example/1.0").unwrap(), "b");
}

#[test]
fn safe_register_avoids_collisions_across_many_calls() {
    let dir = TempDir::new().unwrap();
    let registry = NamespaceRegistry::open(&dir.path().join("namespaces")).unwrap();

    let mut prefixes = Vec::new();
    for i in 0..5 {
        let prefix = registry
            .safe_register("jcr", &format!("http://acme.example/{i}"))
            .unwrap();
        prefixes.push(prefix);
    }

    let unique: std::collections::HashSet<_> = prefixes.iter().collect();
    assert_eq!(unique.len(), prefixes.len(), "every safe_register call must pick a distinct prefix");
}
