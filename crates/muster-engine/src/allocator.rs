//! Slot allocation and seniority packing
//!
//! A pool is a fixed, ordered sequence of coordinates; occupants are packed
//! into it senior-first. The plan always clears every pool coordinate and
//! rewrites every occupied target, so a previous occupant's fields can never
//! leak into a shrunken or reordered pool. Pools are small (single to low
//! double digits), so a full recompute per mutation is intentional.
//!
//! Ordering: descending by rank (hierarchy index; absent or unknown rank is
//! maximally junior), then ascending by join date. A missing join date sorts
//! as the earliest possible date, i.e. most senior within the rank. That
//! tie-break is a preserved policy choice flagged for product review, not an
//! accident.

use crate::error::EngineError;
use crate::materialize::{clear_writes, person_writes};
use crate::person::Person;
use chrono::NaiveDate;
use muster_blueprint::{Coordinate, Layout, PoolRef, RankTable};
use muster_grid::CellWrite;
use std::cmp::Ordering;

/// The change a plan applies to a pool's working set
#[derive(Debug, Clone)]
pub enum PoolChange {
    /// Add a person (recruit, or promote-in)
    Insert(Person),
    /// Remove the occupant anchored at a coordinate (remove, or promote-out)
    Remove(Coordinate),
    /// Re-sort the current occupants unchanged
    Resort,
}

/// A computed re-layout of one pool
#[derive(Debug, Clone, Default)]
pub struct PoolPlan {
    /// People in their target order, sources updated to target coordinates
    pub assignments: Vec<Person>,
    /// Clear-every-coordinate then rewrite-every-occupant write batch
    pub writes: Vec<CellWrite>,
}

impl PoolPlan {
    /// People whose anchor moved, paired with their previous anchor
    #[must_use]
    pub fn moved(&self, before: &[Person]) -> Vec<Person> {
        self.assignments
            .iter()
            .filter(|after| {
                before
                    .iter()
                    .any(|b| b.identity == after.identity && b.source != after.source)
            })
            .cloned()
            .collect()
    }
}

/// Compare two people by seniority: senior orders first
///
/// Pure over rank + join date; independent of input order.
#[must_use]
pub fn seniority_cmp(a: &Person, b: &Person, ranks: &RankTable) -> Ordering {
    let rank_a = ranks.index_of(&a.rank).map_or(-1, |i| i as i64);
    let rank_b = ranks.index_of(&b.rank).map_or(-1, |i| i as i64);
    rank_b.cmp(&rank_a).then_with(|| {
        let date_a = a.join_date.unwrap_or(NaiveDate::MIN);
        let date_b = b.join_date.unwrap_or(NaiveDate::MIN);
        date_a.cmp(&date_b)
    })
}

/// Recompute a pool's layout after a working-set change
///
/// # Errors
/// [`EngineError::Capacity`] when the working set exceeds the pool's
/// coordinate count; no writes are produced in that case.
pub fn plan(
    pool: &PoolRef,
    layout: &Layout,
    ranks: &RankTable,
    date_format: &str,
    occupants: &[Person],
    change: PoolChange,
) -> Result<PoolPlan, EngineError> {
    let mut working: Vec<Person> = match change {
        PoolChange::Insert(person) => {
            let mut set: Vec<Person> = occupants.to_vec();
            set.push(person);
            set
        }
        PoolChange::Remove(source) => occupants
            .iter()
            .filter(|p| p.source != source)
            .cloned()
            .collect(),
        PoolChange::Resort => occupants.to_vec(),
    };

    if working.len() > pool.capacity() {
        return Err(EngineError::Capacity {
            pool: Person::location_label(&pool.path, pool.title.as_deref()),
            capacity: pool.capacity(),
        });
    }

    working.sort_by(|a, b| seniority_cmp(a, b, ranks));

    let mut assignments = Vec::with_capacity(working.len());
    for (person, target) in working.into_iter().zip(&pool.coordinates) {
        let mut person = person;
        person.source = target.clone();
        person.path = pool.path.clone();
        person.title = pool.title.clone();
        person.display_location = Person::location_label(&pool.path, pool.title.as_deref());
        assignments.push(person);
    }

    // Erase the whole pool first: a shrink-by-one leaves its last
    // coordinate intentionally blank.
    let mut writes = Vec::new();
    for coord in &pool.coordinates {
        writes.extend(clear_writes(layout, coord));
    }
    for person in &assignments {
        writes.extend(person_writes(person, layout, &person.source, ranks, date_format));
    }

    Ok(PoolPlan { assignments, writes })
}
