//! Layout offset blueprints
//!
//! A [`Layout`] maps logical record fields to (row, col) deltas relative to a
//! slot's anchor coordinate. All reads and writes for a record are confined
//! to the minimal bounding rectangle implied by its layout.

use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Logical record field addressed by a layout offset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// Unique member name; blank identity marks a vacant slot
    Identity,
    /// Rank code cell (pool slots only; fixed slots carry their rank)
    Rank,
    /// Region / locale
    Region,
    /// Join date
    JoinDate,
    /// External contact identifier
    ContactId,
    /// Leave-of-absence checkbox
    LeaveFlag,
    /// Training-passed checkbox
    TrainingFlag,
    /// Declared custom field
    Custom(String),
}

impl FieldKey {
    /// Canonical string form, matching the blueprint document keys
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identity => "identity",
            Self::Rank => "rank",
            Self::Region => "region",
            Self::JoinDate => "joinDate",
            Self::ContactId => "contactId",
            Self::LeaveFlag => "leaveFlag",
            Self::TrainingFlag => "trainingFlag",
            Self::Custom(k) => k,
        }
    }

    /// Parse a document key; anything unrecognized is a custom field
    #[must_use]
    pub fn parse(key: &str) -> Self {
        match key {
            "identity" => Self::Identity,
            "rank" => Self::Rank,
            "region" => Self::Region,
            "joinDate" => Self::JoinDate,
            "contactId" => Self::ContactId,
            "leaveFlag" => Self::LeaveFlag,
            "trainingFlag" => Self::TrainingFlag,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Cow::<str>::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A (row, col) delta relative to a slot anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Offset {
    /// Row delta
    pub row: i32,
    /// Column delta
    pub col: i32,
}

impl Offset {
    /// Create an offset
    #[inline]
    #[must_use]
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Minimal bounding rectangle of a layout's offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Smallest row delta
    pub min_row: i32,
    /// Largest row delta
    pub max_row: i32,
    /// Smallest column delta
    pub min_col: i32,
    /// Largest column delta
    pub max_col: i32,
}

impl Rect {
    /// Whether an offset falls inside the rectangle
    #[inline]
    #[must_use]
    pub fn contains(&self, off: Offset) -> bool {
        (self.min_row..=self.max_row).contains(&off.row)
            && (self.min_col..=self.max_col).contains(&off.col)
    }
}

/// Named field-to-offset mapping
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layout {
    /// Field offsets in declaration order
    pub offsets: IndexMap<FieldKey, Offset>,
}

impl Layout {
    /// Offset for a field, if the layout defines one
    #[must_use]
    pub fn offset(&self, key: &FieldKey) -> Option<Offset> {
        self.offsets.get(key).copied()
    }

    /// Custom-field keys the layout defines offsets for
    pub fn custom_keys(&self) -> impl Iterator<Item = &str> {
        self.offsets.keys().filter_map(|k| match k {
            FieldKey::Custom(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Bounding rectangle covering every offset (including custom fields)
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        let mut rect = Rect::default();
        for off in self.offsets.values() {
            rect.min_row = rect.min_row.min(off.row);
            rect.max_row = rect.max_row.max(off.row);
            rect.min_col = rect.min_col.min(off.col);
            rect.max_col = rect.max_col.max(off.col);
        }
        rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        let mut offsets = IndexMap::new();
        offsets.insert(FieldKey::Identity, Offset::new(0, 0));
        offsets.insert(FieldKey::Region, Offset::new(1, -1));
        offsets.insert(FieldKey::JoinDate, Offset::new(1, 0));
        offsets.insert(FieldKey::Custom("callsign".into()), Offset::new(0, 3));
        Layout { offsets }
    }

    #[test]
    fn bounding_rect_spans_all_offsets() {
        let rect = layout().bounding_rect();
        assert_eq!(rect.min_row, 0);
        assert_eq!(rect.max_row, 1);
        assert_eq!(rect.min_col, -1);
        assert_eq!(rect.max_col, 3);
    }

    #[test]
    fn rect_contains_its_offsets() {
        let l = layout();
        let rect = l.bounding_rect();
        assert!(l.offsets.values().all(|off| rect.contains(*off)));
        assert!(!rect.contains(Offset::new(2, 0)));
        assert!(!rect.contains(Offset::new(0, 4)));
    }

    #[test]
    fn field_key_round_trips_through_json() {
        let l = layout();
        let json = serde_json::to_string(&l).unwrap();
        let back: Layout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, l);
        assert!(json.contains("\"joinDate\""));
        assert!(json.contains("\"callsign\""));
    }

    #[test]
    fn unknown_keys_parse_as_custom() {
        assert_eq!(
            FieldKey::parse("steamId"),
            FieldKey::Custom("steamId".into())
        );
        assert_eq!(FieldKey::parse("rank"), FieldKey::Rank);
    }

    #[test]
    fn custom_keys_iterates_only_custom() {
        let l = layout();
        let keys: Vec<&str> = l.custom_keys().collect();
        assert_eq!(keys, vec!["callsign"]);
    }
}
