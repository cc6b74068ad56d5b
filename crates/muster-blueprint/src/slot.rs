//! Slot definitions and coordinate expansion
//!
//! A slot is either a single fixed-rank position or a pool: an ordered set of
//! coordinates shared by one or more eligible ranks. Pool order matters — the
//! seniority packer assigns the most senior occupant to the first coordinate.

use crate::coord::Coordinate;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// An explicit cell in a slot's location list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLoc {
    /// 1-based row
    pub row: u32,
    /// Per-cell column override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
}

/// Where a slot's coordinates live
///
/// Exactly one of the row forms should be present: `cells`, `rows`, `row`,
/// or `startRow`/`endRow`. The column comes from the location itself, the
/// nearest ancestor node's `startCol`, or (for `cells`) each cell entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotLocation {
    /// Sheet override for this slot only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,

    /// Column anchor for the row forms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,

    /// Explicit cell list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<CellLoc>>,

    /// Explicit row list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<u32>>,

    /// Single row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,

    /// First row of a contiguous range (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_row: Option<u32>,

    /// Last row of a contiguous range (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_row: Option<u32>,
}

/// A rank capacity unit at specific grid coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Layout override; otherwise inherited from the node path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,

    /// Fixed rank: occupants hold exactly this rank and the grid carries no
    /// rank code for them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,

    /// Eligible ranks for a shared pool; rank is read from the grid
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranks: Vec<String>,

    /// Title distinguishing this pool from same-rank pools in the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Declared capacity; informational, the coordinate count is
    /// authoritative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Physical placement
    #[serde(default)]
    pub location: SlotLocation,
}

impl Slot {
    /// Expand the slot into its ordered coordinate list
    ///
    /// `default_col` is the nearest ancestor node's column anchor. The
    /// declared order of the location form is preserved.
    ///
    /// # Errors
    /// [`ConfigError::MissingRows`] when no row form is present and
    /// [`ConfigError::MissingColumn`] when a row form resolves no column.
    pub fn expand(
        &self,
        sheet: &str,
        default_col: Option<u32>,
        path: &str,
        slot_index: usize,
    ) -> Result<Vec<Coordinate>, ConfigError> {
        let loc = &self.location;
        let anchor_col = loc.col.or(default_col);

        let missing_col = || ConfigError::MissingColumn {
            path: path.to_string(),
            slot: slot_index,
        };

        if let Some(cells) = &loc.cells {
            return cells
                .iter()
                .map(|c| {
                    let col = c.col.or(anchor_col).ok_or_else(missing_col)?;
                    Ok(Coordinate::new(sheet, c.row, col))
                })
                .collect();
        }

        let col = anchor_col.ok_or_else(missing_col)?;

        if let Some(rows) = &loc.rows {
            return Ok(rows
                .iter()
                .map(|&row| Coordinate::new(sheet, row, col))
                .collect());
        }
        if let Some(row) = loc.row {
            return Ok(vec![Coordinate::new(sheet, row, col)]);
        }
        if let (Some(start), Some(end)) = (loc.start_row, loc.end_row) {
            return Ok((start..=end)
                .map(|row| Coordinate::new(sheet, row, col))
                .collect());
        }

        Err(ConfigError::MissingRows {
            path: path.to_string(),
            slot: slot_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_row_range_in_declared_order() {
        let slot = Slot {
            ranks: vec!["Private".into()],
            location: SlotLocation {
                start_row: Some(14),
                end_row: Some(16),
                ..SlotLocation::default()
            },
            ..Slot::default()
        };
        let coords = slot.expand("Alpha", Some(4), "A.B", 0).unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[0], Coordinate::new("Alpha", 14, 4));
        assert_eq!(coords[2], Coordinate::new("Alpha", 16, 4));
    }

    #[test]
    fn expand_explicit_cells_with_overrides() {
        let slot = Slot {
            location: SlotLocation {
                cells: Some(vec![
                    CellLoc { row: 3, col: Some(9) },
                    CellLoc { row: 5, col: None },
                ]),
                ..SlotLocation::default()
            },
            ..Slot::default()
        };
        let coords = slot.expand("Alpha", Some(2), "A", 1).unwrap();
        assert_eq!(coords[0], Coordinate::new("Alpha", 3, 9));
        assert_eq!(coords[1], Coordinate::new("Alpha", 5, 2));
    }

    #[test]
    fn expand_without_rows_is_config_error() {
        let slot = Slot {
            location: SlotLocation {
                col: Some(4),
                ..SlotLocation::default()
            },
            ..Slot::default()
        };
        let err = slot.expand("Alpha", None, "A.B", 2).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRows { slot: 2, .. }));
    }

    #[test]
    fn expand_without_column_is_config_error() {
        let slot = Slot {
            location: SlotLocation {
                row: Some(7),
                ..SlotLocation::default()
            },
            ..Slot::default()
        };
        let err = slot.expand("Alpha", None, "A", 0).unwrap_err();
        assert!(matches!(err, ConfigError::MissingColumn { .. }));
    }

    #[test]
    fn slot_location_parses_document_keys() {
        let json = r#"{"startRow": 17, "endRow": 39}"#;
        let loc: SlotLocation = serde_json::from_str(json).unwrap();
        assert_eq!(loc.start_row, Some(17));
        assert_eq!(loc.end_row, Some(39));
    }
}
