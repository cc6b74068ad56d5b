//! Grid store collaborator
//!
//! The backing grid is the single source of truth: a shared, externally
//! mutable 2-D surface with no transactions and no row locking. The engine
//! reads whole-sheet snapshots through the cache tier and issues batched
//! writes that the collaborator applies atomically from the caller's
//! perspective.

use crate::error::GridError;
use async_trait::async_trait;
use chrono::NaiveDate;
use muster_blueprint::Coordinate;
use serde::{Deserialize, Serialize};

/// A single cell's typed contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellValue {
    /// Nothing in the cell
    #[default]
    Empty,
    /// Free text
    Text(String),
    /// Numeric value
    Number(f64),
    /// Checkbox state
    Bool(bool),
    /// Native date value
    Date(NaiveDate),
}

impl CellValue {
    /// Whether the cell reads as unoccupied
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text contents, trimmed; empty for blank and non-text cells
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(s) => s.trim(),
            _ => "",
        }
    }

    /// Canonical string for identity comparison (exact match after trim)
    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::Date(d) => d.to_string(),
        }
    }

    /// Checkbox interpretation: native true or the text `TRUE`
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// Immutable values + annotations snapshot of one sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    /// Cell values, row-major, 0-based internally
    pub values: Vec<Vec<CellValue>>,
    /// Cell annotations (notes), same shape as `values`
    pub notes: Vec<Vec<String>>,
}

impl SheetSnapshot {
    /// Snapshot with no data (a sheet that exists but is empty, or one the
    /// grid does not know)
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the snapshot holds no cells
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a 1-based (row, col); out-of-range reads are empty
    #[must_use]
    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        if row == 0 || col == 0 {
            return &CellValue::Empty;
        }
        self.values
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
            .unwrap_or(&CellValue::Empty)
    }

    /// Annotation at a 1-based (row, col); out-of-range reads are empty
    #[must_use]
    pub fn note(&self, row: u32, col: u32) -> &str {
        if row == 0 || col == 0 {
            return "";
        }
        self.notes
            .get(row as usize - 1)
            .and_then(|r| r.get(col as usize - 1))
            .map_or("", String::as_str)
    }
}

/// One cell mutation within a write batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellWrite {
    /// Target cell
    pub at: Coordinate,
    /// New value
    pub value: CellValue,
    /// New annotation; `None` leaves the existing annotation in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CellWrite {
    /// Write a value, leaving the annotation untouched
    #[inline]
    #[must_use]
    pub fn value(at: Coordinate, value: CellValue) -> Self {
        Self {
            at,
            value,
            note: None,
        }
    }

    /// Write a value and replace the annotation
    #[inline]
    #[must_use]
    pub fn with_note(at: Coordinate, value: CellValue, note: impl Into<String>) -> Self {
        Self {
            at,
            value,
            note: Some(note.into()),
        }
    }

    /// Erase the cell: empty value, empty annotation
    #[inline]
    #[must_use]
    pub fn clear(at: Coordinate) -> Self {
        Self {
            at,
            value: CellValue::Empty,
            note: Some(String::new()),
        }
    }
}

/// The raw grid collaborator
#[async_trait]
pub trait GridStore: Send + Sync {
    /// Read a whole sheet; `None` when the sheet does not exist
    async fn read_sheet(&self, name: &str) -> Result<Option<SheetSnapshot>, GridError>;

    /// Read a single live cell, bypassing every cache tier
    ///
    /// Used by the concurrency guard's identity re-read.
    async fn read_cell(&self, at: &Coordinate) -> Result<CellValue, GridError>;

    /// Apply a batch of cell writes, atomic from the caller's perspective
    async fn write_batch(&self, writes: &[CellWrite]) -> Result<(), GridError>;

    /// Names of all sheets in the backing grid
    async fn list_sheets(&self) -> Result<Vec<String>, GridError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reads_are_empty() {
        let snap = SheetSnapshot {
            values: vec![vec![CellValue::Text("a".into())]],
            notes: vec![vec!["n".into()]],
        };
        assert_eq!(snap.value(1, 1), &CellValue::Text("a".into()));
        assert_eq!(snap.value(2, 1), &CellValue::Empty);
        assert_eq!(snap.value(0, 1), &CellValue::Empty);
        assert_eq!(snap.note(1, 1), "n");
        assert_eq!(snap.note(9, 9), "");
    }

    #[test]
    fn blank_detection() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".into()).is_blank());
        assert!(!CellValue::Text("x".into()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn truthy_checkboxes() {
        assert!(CellValue::Bool(true).is_truthy());
        assert!(CellValue::Text("TRUE".into()).is_truthy());
        assert!(!CellValue::Text("no".into()).is_truthy());
        assert!(!CellValue::Empty.is_truthy());
    }

    #[test]
    fn clear_write_erases_value_and_note() {
        let w = CellWrite::clear(Coordinate::new("A", 1, 1));
        assert_eq!(w.value, CellValue::Empty);
        assert_eq!(w.note.as_deref(), Some(""));
    }
}
