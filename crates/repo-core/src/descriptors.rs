//! Static repository capability descriptors (spec §4.3 `RepositoryContext`,
//! SPEC_FULL.md §B.1): a small, serializable, read-only fact sheet attached
//! to a long-lived component.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single descriptor value. JCR repositories expose descriptors as one of
/// a handful of scalar/vector kinds rather than free-form JSON; kept
/// narrow here for the same reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum DescriptorValue {
    Bool(bool),
    String(String),
    Strings(Vec<String>),
    Long(i64),
}

impl DescriptorValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DescriptorValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DescriptorValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Immutable set of repository descriptors, keyed by descriptor name
/// (e.g. `"jcr.repository.name"`). Populated once at startup and never
/// mutated afterward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryDescriptors {
    values: BTreeMap<String, DescriptorValue>,
}

impl RepositoryDescriptors {
    pub fn builder() -> RepositoryDescriptorsBuilder {
        RepositoryDescriptorsBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&DescriptorValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|s| s.as_str())
    }
}

#[derive(Debug, Default)]
pub struct RepositoryDescriptorsBuilder {
    values: BTreeMap<String, DescriptorValue>,
}

impl RepositoryDescriptorsBuilder {
    pub fn set(mut self, key: impl Into<String>, value: DescriptorValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn build(self) -> RepositoryDescriptors {
        RepositoryDescriptors { values: self.values }
    }
}
