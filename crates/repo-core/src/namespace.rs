//! Authoritative, persistent, reversible prefix ↔ URI mapping with a stable
//! integer index per URI (spec §4.1).
//!
//! Built on the same typed, serde-backed registry shape as other identifier
//! tables in this codebase, combined with the atomic persistence and file
//! locking primitives in [`crate::io`]. Where a closed identifier enum only
//! needs exhaustive matching, this registry validates an open, mutable,
//! persisted bimap against a reserved set plus an NCName grammar check.

use crate::error::NamespaceError;
use crate::io::write_atomic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Reserved prefixes that can never be registered or unregistered. Matches
/// are case-sensitive except for the blanket `xml*` rule enforced
/// separately in [`is_reserved_prefix`].
const RESERVED_PREFIXES: &[&str] = &["rep", "jcr", "nt", "mix", "sv"];

fn default_bindings() -> Vec<(&'static str, &'static str)> {
    vec![
        ("", ""),
        ("rep", "internal"),
        ("jcr", "http://www.jcp.org/jcr/1.0"),
        ("nt", "http://www.jcp.org/jcr/nt/1.0"),
        ("mix", "http://www.jcp.org/jcr/mix/1.0"),
        ("sv", "http://www.jcp.org/jcr/sv/1.0"),
        ("xml", "http://www.w3.org/XML/1998/namespace"),
    ]
}

pub fn is_reserved_prefix(prefix: &str) -> bool {
    prefix.to_ascii_lowercase().starts_with("xml") || RESERVED_PREFIXES.contains(&prefix)
}

/// Validate an XML NCName: `(Letter | '_') (Letter | Digit | '-' | '_' | '.')*`.
/// The empty string is accepted only as the special "no prefix" binding;
/// callers that forbid an empty prefix check that separately.
pub fn is_valid_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Event emitted to a cluster channel. Adds are represented as a remap with
/// `old_prefix = None`, matching spec §4.1's cluster-integration note that
/// the wire channel only ever carries a single `remapped` event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRemapEvent {
    pub old_prefix: Option<String>,
    pub new_prefix: String,
    pub uri: String,
}

/// Sink for outbound namespace-registry cluster events.
pub trait NamespaceClusterChannel: Send + Sync {
    fn broadcast_remap(&self, event: &NamespaceRemapEvent);
}

/// Sink for local namespace-registry observation events.
pub trait NamespaceListener: Send + Sync {
    fn namespace_added(&self, _prefix: &str, _uri: &str) {}
    fn namespace_remapped(&self, _old_prefix: &str, _new_prefix: &str, _uri: &str) {}
}

struct Bindings {
    prefix_to_uri: BTreeMap<String, String>,
    uri_to_prefix: BTreeMap<String, String>,
    uri_to_index: BTreeMap<String, u32>,
    next_index: u32,
}

/// Prefix ↔ URI bimap with stable per-URI integer indices, persisted under
/// `namespaces/ns_reg` and `namespaces/ns_idx` (spec §6).
pub struct NamespaceRegistry {
    ns_reg_path: PathBuf,
    ns_idx_path: PathBuf,
    state: RwLock<Bindings>,
    cluster: RwLock<Option<Box<dyn NamespaceClusterChannel>>>,
    listeners: RwLock<Vec<Box<dyn NamespaceListener>>>,
}

impl NamespaceRegistry {
    /// Load the registry rooted at `namespaces_dir`, seeding and persisting
    /// the reserved bindings on first boot (spec §4.1 "Persistence").
    pub fn open(namespaces_dir: &Path) -> Result<Self, NamespaceError> {
        let ns_reg_path = namespaces_dir.join("ns_reg");
        let ns_idx_path = namespaces_dir.join("ns_idx");

        let prefix_to_uri: BTreeMap<String, String> = if ns_reg_path.exists() {
            read_map(&ns_reg_path)
        } else {
            default_bindings()
                .into_iter()
                .map(|(p, u)| (p.to_string(), u.to_string()))
                .collect()
        };

        let mut uri_to_prefix = BTreeMap::new();
        for (prefix, uri) in &prefix_to_uri {
            uri_to_prefix.insert(uri.clone(), prefix.clone());
        }

        let (uri_to_index, next_index): (BTreeMap<String, u32>, u32) = if ns_idx_path.exists() {
            let idx = read_index_map(&ns_idx_path);
            let next = idx.values().copied().max().unwrap_or(0) + 1;
            (idx, next)
        } else {
            let mut idx = BTreeMap::new();
            let mut next = 1u32;
            for uri in uri_to_prefix.keys() {
                idx.insert(uri.clone(), next);
                next += 1;
            }
            (idx, next)
        };

        let registry = Self {
            ns_reg_path,
            ns_idx_path,
            state: RwLock::new(Bindings {
                prefix_to_uri,
                uri_to_prefix,
                uri_to_index,
                next_index,
            }),
            cluster: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        };
        registry.persist()?;
        Ok(registry)
    }

    pub fn set_cluster_channel(&self, channel: Box<dyn NamespaceClusterChannel>) {
        *self.cluster.write().unwrap() = Some(channel);
    }

    pub fn add_listener(&self, listener: Box<dyn NamespaceListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    fn persist(&self) -> Result<(), NamespaceError> {
        let state = self.state.read().unwrap();
        let reg_bytes = serde_json::to_vec_pretty(&state.prefix_to_uri)
            .expect("BTreeMap<String,String> is always serializable");
        let idx_bytes = serde_json::to_vec_pretty(&state.uri_to_index)
            .expect("BTreeMap<String,u32> is always serializable");
        drop(state);

        write_atomic(&self.ns_reg_path, &reg_bytes)
            .map_err(|_| NamespaceError::NotSupported)?;
        write_atomic(&self.ns_idx_path, &idx_bytes).map_err(|_| NamespaceError::NotSupported)?;
        Ok(())
    }

    fn validate_new_mapping(&self, prefix: &str, uri: &str) -> Result<(), NamespaceError> {
        if prefix.is_empty() && !uri.is_empty() {
            // empty prefix is reserved for the empty ("") uri only
            return Err(NamespaceError::Reserved(prefix.to_string()));
        }
        if uri.is_empty() && !prefix.is_empty() {
            return Err(NamespaceError::Illegal);
        }
        if is_reserved_prefix(prefix) {
            return Err(NamespaceError::Reserved(prefix.to_string()));
        }
        if !prefix.is_empty() && !is_valid_ncname(prefix) {
            return Err(NamespaceError::InvalidPrefix(prefix.to_string()));
        }
        Ok(())
    }

    /// Register `(prefix, uri)`. See spec §4.1 for the full failure
    /// taxonomy. An already-present identical mapping is a no-op success,
    /// matching the idempotence property in spec §8 (see DESIGN.md for the
    /// resolved ambiguity against the literal `AlreadyMapped` wording).
    pub fn register(&self, prefix: &str, uri: &str) -> Result<(), NamespaceError> {
        if prefix.is_empty() && uri.is_empty() {
            return Err(NamespaceError::Illegal);
        }
        self.validate_new_mapping(prefix, uri)?;

        let mut state = self.state.write().unwrap();

        if state.prefix_to_uri.get(prefix).map(|u| u.as_str()) == Some(uri) {
            return Ok(());
        }
        if let Some(existing_uri) = state.prefix_to_uri.get(prefix) {
            if existing_uri != uri {
                return Err(NamespaceError::RemapNotSupported(prefix.to_string()));
            }
        }

        let old_prefix = state.uri_to_prefix.get(uri).cloned();
        if let Some(ref old) = old_prefix {
            state.prefix_to_uri.remove(old);
        }

        state.prefix_to_uri.insert(prefix.to_string(), uri.to_string());
        state.uri_to_prefix.insert(uri.to_string(), prefix.to_string());

        if !state.uri_to_index.contains_key(uri) {
            let idx = state.next_index;
            state.next_index += 1;
            state.uri_to_index.insert(uri.to_string(), idx);
        }
        drop(state);

        self.persist()?;

        if let Some(channel) = self.cluster.read().unwrap().as_ref() {
            channel.broadcast_remap(&NamespaceRemapEvent {
                old_prefix: old_prefix.clone(),
                new_prefix: prefix.to_string(),
                uri: uri.to_string(),
            });
        }

        for listener in self.listeners.read().unwrap().iter() {
            match &old_prefix {
                Some(old) => listener.namespace_remapped(old, prefix, uri),
                None => listener.namespace_added(prefix, uri),
            }
        }
        Ok(())
    }

    /// Always fails for non-reserved prefixes: unregistration would break
    /// referential integrity of already-stored qualified names.
    pub fn unregister(&self, prefix: &str) -> Result<(), NamespaceError> {
        if is_reserved_prefix(prefix) {
            return Err(NamespaceError::Reserved(prefix.to_string()));
        }
        let state = self.state.read().unwrap();
        if !state.prefix_to_uri.contains_key(prefix) {
            return Err(NamespaceError::NotRegistered(prefix.to_string()));
        }
        Err(NamespaceError::NotSupported)
    }

    /// Register `uri` under a sanitized, collision-free variant of
    /// `prefix_hint`. No-op if `uri` is already mapped.
    pub fn safe_register(&self, prefix_hint: &str, uri: &str) -> Result<String, NamespaceError> {
        if let Ok(existing) = self.get_prefix(uri) {
            return Ok(existing);
        }

        let sanitized = if prefix_hint.is_empty()
            || is_reserved_prefix(prefix_hint)
            || !is_valid_ncname(prefix_hint)
        {
            "_pre".to_string()
        } else {
            prefix_hint.to_string()
        };

        let mut candidate = sanitized.clone();
        let mut suffix = 2u32;
        loop {
            let taken = self.state.read().unwrap().prefix_to_uri.contains_key(&candidate);
            if !taken {
                break;
            }
            candidate = format!("{sanitized}{suffix}");
            suffix += 1;
        }

        self.register(&candidate, uri)?;
        Ok(candidate)
    }

    /// A monotonic, hint-independent generator: `_pre<N>` where `N` is the
    /// current number of registered mappings plus one. Preserved verbatim
    /// from the source behaviour (see spec §4.1): collisions are impossible
    /// only because the registry's own size always grows past any
    /// previously generated suffix.
    pub fn unique_prefix(&self) -> String {
        let size = self.state.read().unwrap().prefix_to_uri.len();
        format!("_pre{}", size + 1)
    }

    pub fn get_uri(&self, prefix: &str) -> Result<String, NamespaceError> {
        self.state
            .read()
            .unwrap()
            .prefix_to_uri
            .get(prefix)
            .cloned()
            .ok_or_else(|| NamespaceError::NotRegistered(prefix.to_string()))
    }

    pub fn get_prefix(&self, uri: &str) -> Result<String, NamespaceError> {
        self.state
            .read()
            .unwrap()
            .uri_to_prefix
            .get(uri)
            .cloned()
            .ok_or_else(|| NamespaceError::NotRegistered(uri.to_string()))
    }

    pub fn get_index_by_uri(&self, uri: &str) -> Result<u32, NamespaceError> {
        self.state
            .read()
            .unwrap()
            .uri_to_index
            .get(uri)
            .copied()
            .ok_or_else(|| NamespaceError::NotRegistered(uri.to_string()))
    }

    pub fn get_uri_by_index(&self, index: u32) -> Result<String, NamespaceError> {
        self.state
            .read()
            .unwrap()
            .uri_to_index
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| NamespaceError::NotRegistered(index.to_string()))
    }

    /// Apply a remap delivered by the cluster channel. `new_prefix = None`
    /// is rejected (unregistration is disallowed); `old_prefix = None`
    /// means "add a new mapping". Does not re-broadcast.
    pub fn external_remap(
        &self,
        old_prefix: Option<&str>,
        new_prefix: Option<&str>,
        uri: &str,
    ) -> Result<(), NamespaceError> {
        let new_prefix = new_prefix.ok_or(NamespaceError::NotSupported)?;

        {
            let mut state = self.state.write().unwrap();
            if let Some(old) = old_prefix {
                state.prefix_to_uri.remove(old);
            }
            state
                .prefix_to_uri
                .insert(new_prefix.to_string(), uri.to_string());
            state.uri_to_prefix.insert(uri.to_string(), new_prefix.to_string());
            if !state.uri_to_index.contains_key(uri) {
                let idx = state.next_index;
                state.next_index += 1;
                state.uri_to_index.insert(uri.to_string(), idx);
            }
        }
        self.persist()?;

        for listener in self.listeners.read().unwrap().iter() {
            match old_prefix {
                Some(old) => listener.namespace_remapped(old, new_prefix, uri),
                None => listener.namespace_added(new_prefix, uri),
            }
        }
        Ok(())
    }
}

fn read_map(path: &Path) -> BTreeMap<String, String> {
    std::fs::read(path)
        .ok()
        .and_then(|b| serde_json::from_slice(&b).ok())
        .unwrap_or_default()
}

fn read_index_map(path: &Path) -> BTreeMap<String, u32> {
    std::fs::read(path)
        .ok()
        .and_then(|b| serde_json::from_slice(&b).ok())
        .unwrap_or_default()
}
