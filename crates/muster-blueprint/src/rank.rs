//! Rank hierarchy table
//!
//! The rank list is ordered: lower index = lower rank. The on-grid rank code
//! is the abbreviation; translation back to a full rank is best-effort and an
//! unrecognized code materializes as the [`UNKNOWN_RANK`] sentinel rather
//! than failing a full-roster scan.

use serde::{Deserialize, Serialize};

/// Sentinel rank name for unrecognized on-grid codes
pub const UNKNOWN_RANK: &str = "Unknown";

/// A single rank definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    /// Full rank name
    pub name: String,
    /// On-grid abbreviation (rank code)
    pub abbr: String,
}

/// Ordered rank hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable {
    ranks: Vec<Rank>,
}

impl RankTable {
    /// Create a table from an ordered rank list (junior first)
    #[inline]
    #[must_use]
    pub fn new(ranks: Vec<Rank>) -> Self {
        Self { ranks }
    }

    /// Seniority index of a rank name; `None` for unknown ranks
    ///
    /// Comparison is case-insensitive after trimming, matching the
    /// exact-string-after-trim cell identity rule of the backing grid.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.ranks
            .iter()
            .position(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Look up a rank by its on-grid abbreviation
    #[must_use]
    pub fn by_abbr(&self, code: &str) -> Option<&Rank> {
        let code = code.trim();
        self.ranks.iter().find(|r| r.abbr.eq_ignore_ascii_case(code))
    }

    /// Look up a rank by full name
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Rank> {
        let name = name.trim();
        self.ranks.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Translate an on-grid code (abbreviation or full name) to a rank name
    ///
    /// Falls back to [`UNKNOWN_RANK`] so a single bad cell never aborts a
    /// scan.
    #[must_use]
    pub fn translate(&self, code: &str) -> String {
        self.by_abbr(code)
            .or_else(|| self.by_name(code))
            .map_or_else(|| UNKNOWN_RANK.to_string(), |r| r.name.clone())
    }

    /// Whether `rank` sits at or above `threshold` in the hierarchy
    ///
    /// Unknown ranks on either side are treated as not meeting the
    /// threshold.
    #[must_use]
    pub fn at_or_above(&self, rank: &str, threshold: &str) -> bool {
        match (self.index_of(rank), self.index_of(threshold)) {
            (Some(r), Some(t)) => r >= t,
            _ => false,
        }
    }

    /// Iterate ranks junior to senior
    pub fn iter(&self) -> impl Iterator<Item = &Rank> {
        self.ranks.iter()
    }

    /// Number of ranks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RankTable {
        RankTable::new(vec![
            Rank {
                name: "Private".into(),
                abbr: "PVT".into(),
            },
            Rank {
                name: "Specialist".into(),
                abbr: "SPC".into(),
            },
            Rank {
                name: "Sergeant".into(),
                abbr: "SGT".into(),
            },
        ])
    }

    #[test]
    fn index_reflects_seniority_order() {
        let t = table();
        assert_eq!(t.index_of("Private"), Some(0));
        assert_eq!(t.index_of("Sergeant"), Some(2));
        assert_eq!(t.index_of("Field Marshal"), None);
    }

    #[test]
    fn translate_accepts_abbr_and_name() {
        let t = table();
        assert_eq!(t.translate("SGT"), "Sergeant");
        assert_eq!(t.translate(" sergeant "), "Sergeant");
        assert_eq!(t.translate("XYZ"), UNKNOWN_RANK);
    }

    #[test]
    fn threshold_comparison() {
        let t = table();
        assert!(t.at_or_above("Sergeant", "Specialist"));
        assert!(t.at_or_above("Specialist", "Specialist"));
        assert!(!t.at_or_above("Private", "Specialist"));
        assert!(!t.at_or_above(UNKNOWN_RANK, "Private"));
    }
}
