//! Organization tree
//!
//! Nodes inherit `sheetName` and `layout` down the path: the effective value
//! for a node is taken from the nearest ancestor (including itself) that
//! defines the property. Blueprints rely on this walk intentionally, so it is
//! preserved exactly as an explicit helper rather than folded into the index.

use crate::slot::Slot;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;

/// Ordered list of node names from root to a node
///
/// Serializes as its dotted string form so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    segments: SmallVec<[String; 4]>,
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Cow::<str>::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Self::root());
        }
        Ok(s.split('.').map(str::to_string).collect())
    }
}

impl NodePath {
    /// Empty (root-level) path
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Path extended by one child segment
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Deepest segment, if any
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Segments root-first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(seg)?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<String> for NodePath {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Physical placement hints carried by a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLocation {
    /// Column anchor inherited by slots that define rows but no column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_col: Option<u32>,
}

/// A node in the organization tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgNode {
    /// Display name; also a path segment
    pub name: String,

    /// Short identifiers resolving to this node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shortcuts: Vec<String>,

    /// Sheet name override; inherited by descendants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,

    /// Layout name override; inherited by descendants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    /// Slots defined directly on the node
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<Slot>,

    /// Named reusable slot group to expand after own slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_slots_from: Option<String>,

    /// Placement hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<NodeLocation>,

    /// Child nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OrgNode>,
}

/// Nearest-ancestor property resolution
///
/// `stack` is the path from root to the current node, current node last.
/// Returns the value from the deepest node that defines the property.
pub fn nearest<'a, T: ?Sized>(
    stack: &[&'a OrgNode],
    get: impl Fn(&'a OrgNode) -> Option<&'a T>,
) -> Option<&'a T> {
    stack.iter().rev().find_map(|node| get(node))
}
