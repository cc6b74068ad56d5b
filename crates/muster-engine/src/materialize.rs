//! Record materialization
//!
//! Turns a raw cell block plus a resolved layout into a typed [`Person`],
//! and a [`Person`] back into the write batch that re-lays its block out.
//! All reads and writes stay inside the bounding rectangle the layout
//! implies.
//!
//! A blank identity cell is the vacancy sentinel: the slot materializes as
//! `None`, never as a partial record. A single bad cell (unknown rank code,
//! unparseable date) degrades that one field instead of aborting a
//! full-roster scan.

use crate::person::{LeaveDetails, Person};
use chrono::NaiveDate;
use muster_blueprint::{
    BlueprintConfig, Coordinate, FieldKey, Layout, PoolRef, RankTable, Rect, UNKNOWN_RANK,
};
use muster_grid::{CellValue, CellWrite, SheetSnapshot};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
});

/// First email-shaped substring in free text, if any
#[must_use]
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

/// Parse a date cell: native date values pass through, text is tried
/// against the configured format and then ISO. Unparseable values are
/// `None`, never an error.
#[must_use]
pub fn parse_date(value: &CellValue, format: &str) -> Option<NaiveDate> {
    match value {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, format)
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                .ok()
        }
        _ => None,
    }
}

/// Materialize the record anchored at `anchor`, or `None` for a vacant slot
#[must_use]
pub fn materialize(
    anchor: &Coordinate,
    pool: &PoolRef,
    layout: &Layout,
    snapshot: &SheetSnapshot,
    config: &BlueprintConfig,
) -> Option<Person> {
    let rect = layout.bounding_rect();
    let identity_at = field_coordinate(anchor, layout, &rect, &FieldKey::Identity)?;
    let identity_cell = snapshot.value(identity_at.row, identity_at.col);
    if identity_cell.is_blank() {
        return None;
    }
    let identity = identity_cell.display_string();
    let email = extract_email(snapshot.note(identity_at.row, identity_at.col));

    let date_format = config.chrono_date_format();
    let cell = |key: &FieldKey| -> Option<&CellValue> {
        let at = field_coordinate(anchor, layout, &rect, key)?;
        Some(snapshot.value(at.row, at.col))
    };

    let rank = match &pool.fixed_rank {
        Some(fixed) => fixed.clone(),
        None => cell(&FieldKey::Rank).map_or_else(
            || UNKNOWN_RANK.to_string(),
            |v| config.ranks.translate(&v.display_string()),
        ),
    };

    let join_date = cell(&FieldKey::JoinDate).and_then(|v| parse_date(v, &date_format));
    let region = cell(&FieldKey::Region)
        .filter(|v| !v.is_blank())
        .map(CellValue::display_string);
    let contact_id = cell(&FieldKey::ContactId)
        .filter(|v| !v.is_blank())
        .map(CellValue::display_string);

    let on_leave = cell(&FieldKey::LeaveFlag).is_some_and(CellValue::is_truthy);
    let leave = field_coordinate(anchor, layout, &rect, &FieldKey::LeaveFlag)
        .and_then(|at| LeaveDetails::parse(snapshot.note(at.row, at.col), &date_format));
    let training_passed = cell(&FieldKey::TrainingFlag).is_some_and(CellValue::is_truthy);

    let mut custom = indexmap::IndexMap::new();
    for key in layout.custom_keys() {
        let field = FieldKey::Custom(key.to_string());
        if let Some(v) = cell(&field).filter(|v| !v.is_blank()) {
            custom.insert(key.to_string(), v.display_string());
        }
    }

    Some(Person {
        identity,
        rank,
        path: pool.path.clone(),
        display_location: Person::location_label(&pool.path, pool.title.as_deref()),
        source: anchor.clone(),
        join_date,
        region,
        contact_id,
        email,
        on_leave,
        leave,
        training_passed,
        custom,
        title: pool.title.clone(),
    })
}

/// Full write batch that lays a person's record out at `anchor`
///
/// Every offset the layout defines is written, replacing any stale
/// contents from a previous occupant. Annotations on the identity and
/// leave cells are rewritten too (email, leave details).
#[must_use]
pub fn person_writes(
    person: &Person,
    layout: &Layout,
    anchor: &Coordinate,
    ranks: &RankTable,
    date_format: &str,
) -> Vec<CellWrite> {
    let mut writes = Vec::with_capacity(layout.offsets.len());
    for (key, off) in &layout.offsets {
        let Some(at) = anchor.offset(off.row, off.col) else {
            continue;
        };
        writes.push(field_write(person, key, at, ranks, date_format));
    }
    writes
}

/// Write batch covering only the named fields
///
/// Every other cell in the record's block is left untouched, so an edit
/// never clobbers concurrent changes to cells it was not asked to change.
/// Keys the layout defines no offset for are skipped.
#[must_use]
pub fn field_writes(
    person: &Person,
    layout: &Layout,
    anchor: &Coordinate,
    ranks: &RankTable,
    date_format: &str,
    keys: &[FieldKey],
) -> Vec<CellWrite> {
    let mut writes = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(off) = layout.offset(key) else {
            continue;
        };
        let Some(at) = anchor.offset(off.row, off.col) else {
            continue;
        };
        writes.push(field_write(person, key, at, ranks, date_format));
    }
    writes
}

fn field_write(
    person: &Person,
    key: &FieldKey,
    at: Coordinate,
    ranks: &RankTable,
    date_format: &str,
) -> CellWrite {
    match key {
        FieldKey::Identity => CellWrite::with_note(
            at,
            CellValue::Text(person.identity.clone()),
            person.email.clone().unwrap_or_default(),
        ),
        FieldKey::Rank => {
            let code = ranks
                .by_name(&person.rank)
                .map_or_else(|| person.rank.clone(), |r| r.abbr.clone());
            CellWrite::value(at, CellValue::Text(code))
        }
        FieldKey::Region => CellWrite::value(at, text_or_empty(person.region.as_deref())),
        FieldKey::JoinDate => CellWrite::value(
            at,
            person.join_date.map_or(CellValue::Empty, CellValue::Date),
        ),
        FieldKey::ContactId => CellWrite::value(at, text_or_empty(person.contact_id.as_deref())),
        FieldKey::LeaveFlag => CellWrite::with_note(
            at,
            CellValue::Bool(person.on_leave),
            person
                .leave
                .as_ref()
                .map_or_else(String::new, |l| l.to_note(date_format)),
        ),
        FieldKey::TrainingFlag => CellWrite::value(at, CellValue::Bool(person.training_passed)),
        FieldKey::Custom(name) => CellWrite::value(
            at,
            text_or_empty(person.custom.get(name).map(String::as_str)),
        ),
    }
}

/// Write batch erasing every offset the layout defines at `anchor`
#[must_use]
pub fn clear_writes(layout: &Layout, anchor: &Coordinate) -> Vec<CellWrite> {
    layout
        .offsets
        .values()
        .filter_map(|off| anchor.offset(off.row, off.col))
        .map(CellWrite::clear)
        .collect()
}

// Reads never leave the layout's bounding rectangle.
fn field_coordinate(
    anchor: &Coordinate,
    layout: &Layout,
    rect: &Rect,
    key: &FieldKey,
) -> Option<Coordinate> {
    let off = layout.offset(key)?;
    if !rect.contains(off) {
        return None;
    }
    anchor.offset(off.row, off.col)
}

fn text_or_empty(value: Option<&str>) -> CellValue {
    match value {
        Some(s) if !s.trim().is_empty() => CellValue::Text(s.to_string()),
        _ => CellValue::Empty,
    }
}
