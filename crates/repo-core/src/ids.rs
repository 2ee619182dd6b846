//! Stable identity types for repository items (spec §3 "Data Model").

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fixed UUID of the repository root node, written to `meta/rootUUID` on
/// first boot and never regenerated afterwards (spec §8, scenario 1).
pub const ROOT_NODE_UUID: &str = "cafebabe-cafe-babe-cafe-babecafebabe";

/// Stable identity of a node: a 128-bit UUID, minted by the id factory and
/// persisted in item state. Two `NodeId`s are equal iff they name the same
/// node, regardless of which workspace resolved them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// The fixed, well-known id of every workspace's root node.
    pub fn root() -> Self {
        Self(Uuid::parse_str(ROOT_NODE_UUID).expect("ROOT_NODE_UUID is a valid UUID literal"))
    }

    /// Mint a new random id. Grounded on the id-factory role spec §4.4 step 5
    /// assigns to the repository kernel.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A namespace-qualified name: `{uri}localPart`, interned per namespace.
///
/// Two `Name`s compare equal iff both the URI and local part match exactly;
/// the registered prefix for a URI plays no part in equality, matching the
/// invariant in spec §3 that namespace mappings are reversible but names are
/// identified by URI, not by whichever prefix happens to be bound today.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Name {
    uri: String,
    local: String,
}

impl Name {
    pub fn new(uri: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            local: local.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn local_part(&self) -> &str {
        &self.local
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.uri, self.local)
    }
}

/// Identity of a named property of a node: the owning node's id plus the
/// property's qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId {
    pub parent: NodeId,
    pub name: Name,
}

impl PropertyId {
    pub fn new(parent: NodeId, name: Name) -> Self {
        Self { parent, name }
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.name)
    }
}
