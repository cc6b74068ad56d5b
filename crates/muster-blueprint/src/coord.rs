//! Structured grid coordinates
//!
//! Provides [`Coordinate`], the (sheet, row, column) value type used as the
//! primary key for every positional lookup. Replaces string-concatenated
//! composite keys with structural equality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single addressable cell in the backing grid
///
/// Rows and columns are 1-based, matching the grid collaborator's addressing.
/// `Coordinate` is also the `SourceIdentifier` of an occupied position: the
/// anchor cell of a materialized record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Sheet name
    pub sheet: String,
    /// 1-based row
    pub row: u32,
    /// 1-based column
    pub col: u32,
}

impl Coordinate {
    /// Create a coordinate
    #[inline]
    #[must_use]
    pub fn new(sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            col,
        }
    }

    /// Apply a (row, col) delta, keeping the sheet
    ///
    /// Returns `None` if the delta would leave the grid (row or column
    /// below 1), which callers treat as an empty cell.
    #[must_use]
    pub fn offset(&self, row_delta: i32, col_delta: i32) -> Option<Coordinate> {
        let row = i64::from(self.row) + i64::from(row_delta);
        let col = i64::from(self.col) + i64::from(col_delta);
        if row < 1 || col < 1 {
            return None;
        }
        Some(Coordinate {
            sheet: self.sheet.clone(),
            row: u32::try_from(row).ok()?,
            col: u32::try_from(col).ok()?,
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!R{}C{}", self.sheet, self.row, self.col)
    }
}
