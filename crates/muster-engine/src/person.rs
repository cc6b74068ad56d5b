//! Materialized personnel records
//!
//! A [`Person`] is rebuilt wholesale from grid contents on every read; no
//! in-place field mutation. Its primary key is the anchor [`Coordinate`] of
//! the record block.

use chrono::NaiveDate;
use indexmap::IndexMap;
use muster_blueprint::{Coordinate, NodePath};
use serde::{Deserialize, Serialize};

/// Parsed leave-of-absence details from the leave-flag annotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveDetails {
    /// Leave start, when the annotation carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    /// Leave end, when the annotation carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Free-text remainder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LeaveDetails {
    /// Best-effort parse: up to two dates in the configured format, the
    /// trimmed remainder as the reason
    #[must_use]
    pub fn parse(note: &str, date_format: &str) -> Option<Self> {
        let note = note.trim();
        if note.is_empty() {
            return None;
        }
        let mut dates = Vec::new();
        let mut reason_words = Vec::new();
        for word in note.split_whitespace() {
            let token = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/');
            if dates.len() < 2 {
                if let Ok(d) = NaiveDate::parse_from_str(token, date_format) {
                    dates.push(d);
                    continue;
                }
            }
            reason_words.push(word);
        }
        let mut dates = dates.into_iter();
        let reason = if reason_words.is_empty() {
            None
        } else {
            Some(reason_words.join(" "))
        };
        Some(Self {
            start: dates.next(),
            end: dates.next(),
            reason,
        })
    }

    /// Render back into annotation text
    #[must_use]
    pub fn to_note(&self, date_format: &str) -> String {
        let mut parts = Vec::new();
        if let Some(start) = self.start {
            parts.push(start.format(date_format).to_string());
        }
        if let Some(end) = self.end {
            parts.push(end.format(date_format).to_string());
        }
        if let Some(reason) = &self.reason {
            parts.push(reason.clone());
        }
        parts.join(" ")
    }
}

/// A fully materialized personnel record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Identity string; never blank for a materialized record
    pub identity: String,

    /// Rank name; `Unknown` when the on-grid code was unrecognized
    pub rank: String,

    /// Owning node path
    pub path: NodePath,

    /// Human-readable location (dotted path plus pool title, if any)
    pub display_location: String,

    /// Anchor coordinate: the record's primary key
    pub source: Coordinate,

    /// Join date, when present and parseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<NaiveDate>,

    /// Region / locale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// External contact identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,

    /// Email parsed from the identity annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Leave-of-absence flag
    #[serde(default)]
    pub on_leave: bool,

    /// Parsed leave details, when the flag's annotation carried any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave: Option<LeaveDetails>,

    /// Training-passed flag
    #[serde(default)]
    pub training_passed: bool,

    /// Custom-field values keyed by offset key
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub custom: IndexMap<String, String>,

    /// Pool title at the current position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Person {
    /// Display location for a path and optional pool title
    #[must_use]
    pub fn location_label(path: &NodePath, title: Option<&str>) -> String {
        match title {
            Some(t) => format!("{path} ({t})"),
            None => path.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_details_parse_two_dates_and_reason() {
        let details = LeaveDetails::parse("01/05/24 01/19/24 family visit", "%m/%d/%y").unwrap();
        assert_eq!(
            details.start,
            Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
        assert_eq!(
            details.end,
            Some(NaiveDate::from_ymd_opt(2024, 1, 19).unwrap())
        );
        assert_eq!(details.reason.as_deref(), Some("family visit"));
    }

    #[test]
    fn leave_details_reason_only() {
        let details = LeaveDetails::parse("medical", "%m/%d/%y").unwrap();
        assert_eq!(details.start, None);
        assert_eq!(details.reason.as_deref(), Some("medical"));
    }

    #[test]
    fn leave_details_empty_note_is_none() {
        assert_eq!(LeaveDetails::parse("   ", "%m/%d/%y"), None);
    }

    #[test]
    fn location_label_with_title() {
        let path: NodePath = ["A".to_string(), "B".to_string()].into_iter().collect();
        assert_eq!(Person::location_label(&path, None), "A.B");
        assert_eq!(
            Person::location_label(&path, Some("Weapons Detail")),
            "A.B (Weapons Detail)"
        );
    }
}
