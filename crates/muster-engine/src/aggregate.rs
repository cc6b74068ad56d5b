//! Aggregate computation and the derived-data cache
//!
//! Availability is derived, never authoritative: recomputed from the
//! blueprint's capacity index plus the live roster whenever the roster
//! changes. The derived cache holds the full roster view under a single
//! well-known key with a short TTL and is invalidated wholesale on any
//! mutation.

use crate::error::EngineError;
use crate::person::Person;
use indexmap::IndexMap;
use moka::future::Cache;
use muster_blueprint::{BlueprintIndex, NodePath};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Occupancy of one availability key within a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCount {
    /// Total coordinates
    pub total: usize,
    /// Currently occupied coordinates
    pub occupied: usize,
}

impl SlotCount {
    /// Free capacity
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.total.saturating_sub(self.occupied)
    }
}

/// Per-path availability, keyed by pool availability key (rank name, pool
/// title, or joined eligible ranks)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathAvailability {
    /// Counts per availability key
    pub counts: IndexMap<String, SlotCount>,
}

/// Free capacity per organizational path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityMap {
    /// Availability per path, in blueprint declaration order
    pub by_path: IndexMap<NodePath, PathAvailability>,
}

impl AvailabilityMap {
    /// Derive availability from the capacity index and the live roster
    ///
    /// Occupants whose coordinate is not in the index (stale records after
    /// a blueprint reload) are ignored rather than panicking the scan.
    #[must_use]
    pub fn compute(index: &BlueprintIndex, roster: &[Person]) -> Self {
        let mut by_path: IndexMap<NodePath, PathAvailability> = IndexMap::new();
        for (path, capacity) in index.capacity() {
            let entry = by_path.entry(path.clone()).or_default();
            for (key, &total) in &capacity.totals {
                entry.counts.insert(
                    key.clone(),
                    SlotCount { total, occupied: 0 },
                );
            }
        }
        for person in roster {
            let Some(ctx) = index.context_at(&person.source) else {
                continue;
            };
            let key = ctx.pool.availability_key();
            if let Some(count) = by_path
                .get_mut(&ctx.pool.path)
                .and_then(|p| p.counts.get_mut(&key))
            {
                count.occupied += 1;
            }
        }
        Self { by_path }
    }

    /// Free capacity for a path and availability key; zero when unknown
    #[must_use]
    pub fn available(&self, path: &NodePath, key: &str) -> usize {
        self.by_path
            .get(path)
            .and_then(|p| p.counts.get(key))
            .map_or(0, SlotCount::available)
    }
}

/// Derived roster view: the full roster plus its availability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    /// Every materialized record, ordered by coordinate
    pub people: Vec<Person>,
    /// Availability derived from the same scan
    pub availability: AvailabilityMap,
}

impl RosterView {
    /// Find a record by identity (exact match after trim, case-insensitive)
    #[must_use]
    pub fn find_identity(&self, identity: &str) -> Option<&Person> {
        let identity = identity.trim();
        self.people
            .iter()
            .find(|p| p.identity.eq_ignore_ascii_case(identity))
    }

    /// Find a record by its anchor coordinate
    #[must_use]
    pub fn find_source(&self, source: &muster_blueprint::Coordinate) -> Option<&Person> {
        self.people.iter().find(|p| &p.source == source)
    }
}

/// TTL cache over the derived roster view
///
/// Holds no authority: serves possibly stale reads bounded by the TTL and
/// is invalidated in whole on every mutation.
#[derive(Debug)]
pub struct AggregateCache {
    inner: Cache<String, Arc<RosterView>>,
    key: String,
}

impl AggregateCache {
    /// Create a cache with the given well-known key and TTL
    #[must_use]
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(4).time_to_live(ttl).build(),
            key: key.into(),
        }
    }

    /// Cached view, or compute and cache one
    ///
    /// # Errors
    /// Propagates the compute error without caching anything.
    pub async fn get_or_insert_with<F, Fut>(&self, f: F) -> Result<Arc<RosterView>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RosterView, EngineError>>,
    {
        if let Some(view) = self.inner.get(&self.key).await {
            return Ok(view);
        }
        let view = Arc::new(f().await?);
        self.inner.insert(self.key.clone(), Arc::clone(&view)).await;
        Ok(view)
    }

    /// Replace the cached view with a freshly computed one
    pub async fn prime(&self, view: Arc<RosterView>) {
        self.inner.insert(self.key.clone(), view).await;
    }

    /// Drop every derived entry
    pub fn invalidate(&self) {
        self.inner.invalidate_all();
    }
}
