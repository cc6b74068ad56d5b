//! Blueprint document
//!
//! The declarative configuration consumed by the engine: rank hierarchy,
//! layout blueprints, reusable slot groups, the organization tree, and the
//! operational settings (date format, lease timeout, cache keys, validation
//! rules, promotion gates). The document is consumed as-is; internal
//! consistency problems surface as [`ConfigError`] during index compilation,
//! never repaired.

use crate::error::ConfigError;
use crate::layout::Layout;
use crate::node::{nearest, OrgNode};
use crate::rank::RankTable;
use crate::slot::Slot;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache keys and lifetimes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Key prefix for per-sheet snapshot entries
    pub sheet_prefix: String,
    /// Well-known key for the derived roster view
    pub roster_key: String,
    /// TTL for per-sheet snapshot entries, seconds
    pub sheet_ttl_secs: u64,
    /// TTL for derived aggregates, seconds (shorter than the sheet tier)
    pub aggregate_ttl_secs: u64,
    /// Compress persisted payloads above this many bytes
    pub compress_threshold_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            sheet_prefix: "sheet_data_v2_".to_string(),
            roster_key: "roster_view_v1".to_string(),
            sheet_ttl_secs: 21_600,
            aggregate_ttl_secs: 1_800,
            compress_threshold_bytes: 64 * 1024,
        }
    }
}

/// Username validation rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsernameRules {
    /// Allowed-characters pattern
    pub regex: Option<String>,
    /// Message for pattern violations
    pub regex_error: Option<String>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Message for length violations
    pub length_error: Option<String>,
    /// Forbid leading/trailing underscore
    pub no_edge_underscore: bool,
    /// Message for edge-underscore violations
    pub edge_underscore_error: Option<String>,
    /// Maximum number of underscores
    pub max_underscores: Option<usize>,
    /// Message for underscore-count violations
    pub underscores_error: Option<String>,
}

/// Input validation rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRules {
    /// Rules applied to the identity field on recruit
    pub username: UsernameRules,
}

/// Training-passed gate for promotions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingGate {
    /// Display name of the training requirement
    pub name: String,
    /// Promotions to this rank or above require the training flag
    pub trigger_rank: String,
}

/// Declared custom field editable through the field-edit operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDef {
    /// Offset key as it appears in layouts
    pub key: String,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The complete blueprint document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlueprintConfig {
    /// Textual date format using MM/DD/YY-style tokens
    pub date_format: String,

    /// Ordered rank hierarchy, junior first
    pub ranks: RankTable,

    /// Named layout blueprints
    pub layouts: IndexMap<String, Layout>,

    /// Named reusable slot groups
    pub slot_groups: IndexMap<String, Vec<Slot>>,

    /// Organization tree roots
    pub hierarchy: Vec<OrgNode>,

    /// Cache keys and lifetimes
    pub cache: CacheSettings,

    /// Mutation lease acquisition bound, milliseconds
    pub lock_timeout_ms: u64,

    /// Input validation rules
    pub validation: ValidationRules,

    /// Rank at or above which an email must be on file
    pub email_required_min_rank: Option<String>,

    /// Training gate for promotions
    pub training: Option<TrainingGate>,

    /// Custom fields editable via field-edit
    pub custom_fields: Vec<CustomFieldDef>,
}

impl BlueprintConfig {
    /// Parse a blueprint document from JSON
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed JSON.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(doc)?)
    }

    /// Look up a layout by name
    ///
    /// # Errors
    /// [`ConfigError::UnknownLayout`] when undefined.
    pub fn layout(&self, name: &str) -> Result<&Layout, ConfigError> {
        self.layouts
            .get(name)
            .ok_or_else(|| ConfigError::UnknownLayout(name.to_string()))
    }

    /// Look up a reusable slot group by name
    ///
    /// # Errors
    /// [`ConfigError::UnknownSlotGroup`] when undefined.
    pub fn slot_group(&self, name: &str) -> Result<&[Slot], ConfigError> {
        self.slot_groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownSlotGroup(name.to_string()))
    }

    /// Resolve the effective layout name for a slot at a tree position
    ///
    /// The slot's own layout wins; otherwise the nearest node on the path
    /// (deepest first) that defines one.
    ///
    /// # Errors
    /// [`ConfigError::LayoutUnresolved`] when nothing on the path defines a
    /// layout, [`ConfigError::UnknownLayout`] when the resolved name is
    /// undefined.
    pub fn resolve_layout<'a>(
        &'a self,
        slot: &'a Slot,
        stack: &[&'a OrgNode],
        path: &str,
        slot_index: usize,
    ) -> Result<(&'a str, &'a Layout), ConfigError> {
        let name = slot
            .layout
            .as_deref()
            .or_else(|| nearest(stack, |n| n.layout.as_deref()))
            .ok_or_else(|| ConfigError::LayoutUnresolved {
                path: path.to_string(),
                slot: slot_index,
            })?;
        Ok((name, self.layout(name)?))
    }

    /// Lease acquisition bound as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Translate the human date format into a chrono format string
    ///
    /// Supports the `YYYY`, `YY`, `MM`, `DD` tokens of the original
    /// notation; anything else passes through verbatim.
    #[must_use]
    pub fn chrono_date_format(&self) -> String {
        self.date_format
            .replace("YYYY", "%Y")
            .replace("YY", "%y")
            .replace("MM", "%m")
            .replace("DD", "%d")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FieldKey, Offset};
    use crate::rank::Rank;

    #[test]
    fn date_format_translation() {
        let cfg = BlueprintConfig {
            date_format: "MM/DD/YY".into(),
            ..BlueprintConfig::default()
        };
        assert_eq!(cfg.chrono_date_format(), "%m/%d/%y");

        let cfg = BlueprintConfig {
            date_format: "YYYY-MM-DD".into(),
            ..BlueprintConfig::default()
        };
        assert_eq!(cfg.chrono_date_format(), "%Y-%m-%d");
    }

    #[test]
    fn resolve_layout_prefers_slot_over_path() {
        let mut layouts = IndexMap::new();
        layouts.insert("wide".to_string(), Layout::default());
        let mut narrow = Layout::default();
        narrow.offsets.insert(FieldKey::Identity, Offset::new(0, 0));
        layouts.insert("narrow".to_string(), narrow);

        let cfg = BlueprintConfig {
            layouts,
            ..BlueprintConfig::default()
        };
        let node = OrgNode {
            name: "A".into(),
            layout: Some("wide".into()),
            ..OrgNode::default()
        };
        let stack = [&node];

        let own = Slot {
            layout: Some("narrow".into()),
            ..Slot::default()
        };
        let (name, _) = cfg.resolve_layout(&own, &stack, "A", 0).unwrap();
        assert_eq!(name, "narrow");

        let inherited = Slot::default();
        let (name, _) = cfg.resolve_layout(&inherited, &stack, "A", 1).unwrap();
        assert_eq!(name, "wide");
    }

    #[test]
    fn unresolved_layout_is_config_error() {
        let cfg = BlueprintConfig::default();
        let node = OrgNode {
            name: "A".into(),
            ..OrgNode::default()
        };
        let err = cfg
            .resolve_layout(&Slot::default(), &[&node], "A", 0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::LayoutUnresolved { .. }));
    }

    #[test]
    fn undefined_layout_name_is_config_error() {
        let cfg = BlueprintConfig::default();
        let node = OrgNode {
            name: "A".into(),
            layout: Some("ghost".into()),
            ..OrgNode::default()
        };
        let err = cfg
            .resolve_layout(&Slot::default(), &[&node], "A", 0)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLayout(name) if name == "ghost"));
    }

    #[test]
    fn document_round_trip() {
        let cfg = BlueprintConfig {
            date_format: "MM/DD/YY".into(),
            ranks: RankTable::new(vec![Rank {
                name: "Private".into(),
                abbr: "PVT".into(),
            }]),
            lock_timeout_ms: 15_000,
            ..BlueprintConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back = BlueprintConfig::from_json(&json).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(back.lock_timeout(), Duration::from_millis(15_000));
    }
}
