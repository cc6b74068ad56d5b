//! Testing utilities for the muster workspace
//!
//! In-memory implementations of the three collaborator traits plus a
//! fixture blueprint shared by unit and integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use muster_blueprint::Coordinate;
use muster_grid::{
    CacheService, CellValue, CellWrite, GridError, GridStore, LeaseError, LeaseService,
    LeaseToken, SheetSnapshot,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct Sheet {
    values: Vec<Vec<CellValue>>,
    notes: Vec<Vec<String>>,
}

impl Sheet {
    fn grow(&mut self, row: usize, col: usize) {
        while self.values.len() < row {
            self.values.push(Vec::new());
            self.notes.push(Vec::new());
        }
        let value_row = &mut self.values[row - 1];
        while value_row.len() < col {
            value_row.push(CellValue::Empty);
        }
        let note_row = &mut self.notes[row - 1];
        while note_row.len() < col {
            note_row.push(String::new());
        }
    }
}

/// In-memory grid store: sheets of growable cell matrices
#[derive(Debug, Default)]
pub struct InMemoryGrid {
    sheets: DashMap<String, Sheet>,
    batches: Mutex<Vec<Vec<CellWrite>>>,
    fail_writes: AtomicBool,
}

impl InMemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid with the named (empty) sheets pre-created
    pub fn with_sheets(names: &[&str]) -> Self {
        let grid = Self::new();
        for name in names {
            grid.sheets.insert((*name).to_string(), Sheet::default());
        }
        grid
    }

    /// Set a cell value directly, bypassing `write_batch`
    pub fn set_value(&self, at: &Coordinate, value: CellValue) {
        let mut sheet = self.sheets.entry(at.sheet.clone()).or_default();
        sheet.grow(at.row as usize, at.col as usize);
        sheet.values[at.row as usize - 1][at.col as usize - 1] = value;
    }

    /// Set a cell annotation directly
    pub fn set_note(&self, at: &Coordinate, note: impl Into<String>) {
        let mut sheet = self.sheets.entry(at.sheet.clone()).or_default();
        sheet.grow(at.row as usize, at.col as usize);
        sheet.notes[at.row as usize - 1][at.col as usize - 1] = note.into();
    }

    /// Live value at a coordinate
    pub fn value_at(&self, at: &Coordinate) -> CellValue {
        self.sheets.get(&at.sheet).map_or(CellValue::Empty, |s| {
            s.values
                .get(at.row as usize - 1)
                .and_then(|r| r.get(at.col as usize - 1))
                .cloned()
                .unwrap_or(CellValue::Empty)
        })
    }

    /// Live annotation at a coordinate
    pub fn note_at(&self, at: &Coordinate) -> String {
        self.sheets.get(&at.sheet).map_or_else(String::new, |s| {
            s.notes
                .get(at.row as usize - 1)
                .and_then(|r| r.get(at.col as usize - 1))
                .cloned()
                .unwrap_or_default()
        })
    }

    /// Number of committed write batches
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// All committed batches, in commit order
    pub fn batches(&self) -> Vec<Vec<CellWrite>> {
        self.batches.lock().clone()
    }

    /// Make the next `write_batch` calls fail (or stop failing)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl GridStore for InMemoryGrid {
    async fn read_sheet(&self, name: &str) -> Result<Option<SheetSnapshot>, GridError> {
        Ok(self.sheets.get(name).map(|s| SheetSnapshot {
            values: s.values.clone(),
            notes: s.notes.clone(),
        }))
    }

    async fn read_cell(&self, at: &Coordinate) -> Result<CellValue, GridError> {
        Ok(self.value_at(at))
    }

    async fn write_batch(&self, writes: &[CellWrite]) -> Result<(), GridError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GridError::Backend("injected write failure".to_string()));
        }
        for write in writes {
            self.set_value(&write.at, write.value.clone());
            if let Some(note) = &write.note {
                self.set_note(&write.at, note.clone());
            }
        }
        self.batches.lock().push(writes.to_vec());
        Ok(())
    }

    async fn list_sheets(&self) -> Result<Vec<String>, GridError> {
        Ok(self.sheets.iter().map(|e| e.key().clone()).collect())
    }
}

/// In-memory cache service; TTLs are accepted and ignored
#[derive(Debug)]
pub struct InMemoryCache {
    entries: DashMap<String, Vec<u8>>,
    fail_puts: AtomicBool,
    removes: AtomicU64,
    fail_removes_at: AtomicU64,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            fail_puts: AtomicBool::new(false),
            removes: AtomicU64::new(0),
            fail_removes_at: AtomicU64::new(u64::MAX),
        }
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Make every subsequent `put` fail (or stop failing)
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Let the next `calls` removes succeed, then fail every later one
    pub fn fail_removes_after(&self, calls: u64) {
        self.removes.store(0, Ordering::SeqCst);
        self.fail_removes_at.store(calls, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheService for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GridError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _ttl: Duration) -> Result<(), GridError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(GridError::Backend("injected put failure".to_string()));
        }
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), GridError> {
        let n = self.removes.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_removes_at.load(Ordering::SeqCst) {
            return Err(GridError::Backend("injected remove failure".to_string()));
        }
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}

/// In-memory whole-store lease backed by a one-permit semaphore
#[derive(Debug)]
pub struct InMemoryLease {
    permit: tokio::sync::Semaphore,
    counter: AtomicU64,
}

impl Default for InMemoryLease {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLease {
    pub fn new() -> Self {
        Self {
            permit: tokio::sync::Semaphore::new(1),
            counter: AtomicU64::new(0),
        }
    }

    /// Take the lease without a timeout, for tests simulating contention
    pub async fn hold(&self) -> LeaseToken {
        let permit = self.permit.acquire().await.expect("lease semaphore closed");
        permit.forget();
        LeaseToken::new(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl LeaseService for InMemoryLease {
    async fn acquire(&self, timeout: Duration) -> Result<LeaseToken, LeaseError> {
        match tokio::time::timeout(timeout, self.permit.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                Ok(LeaseToken::new(
                    self.counter.fetch_add(1, Ordering::SeqCst) + 1,
                ))
            }
            Ok(Err(_)) => Err(LeaseError::Backend("lease semaphore closed".to_string())),
            Err(_) => Err(LeaseError::Busy(timeout)),
        }
    }

    async fn release(&self, _token: LeaseToken) -> Result<(), LeaseError> {
        self.permit.add_permits(1);
        Ok(())
    }
}

/// Fixture blueprints and grid seeds
pub mod fixtures {
    use super::*;
    use indexmap::IndexMap;
    use muster_blueprint::{
        BlueprintConfig, CustomFieldDef, FieldKey, Layout, NodeLocation, Offset, OrgNode, Rank,
        RankTable, Slot, SlotLocation, TrainingGate, UsernameRules, ValidationRules,
    };

    /// Rank code column offset within the `row` layout
    pub const COL_RANK: i32 = 0;
    /// Identity column offset
    pub const COL_IDENTITY: i32 = 1;

    /// A two-squad company on one sheet
    ///
    /// Each squad has a fixed Sergeant slot at row 12 and a two-seat
    /// Private/Specialist pool at rows 14-15. First Squad anchors at column
    /// 2, Second Squad at column 12.
    pub fn standard_config() -> BlueprintConfig {
        let mut offsets = IndexMap::new();
        offsets.insert(FieldKey::Rank, Offset::new(0, 0));
        offsets.insert(FieldKey::Identity, Offset::new(0, 1));
        offsets.insert(FieldKey::Region, Offset::new(0, 2));
        offsets.insert(FieldKey::JoinDate, Offset::new(0, 3));
        offsets.insert(FieldKey::ContactId, Offset::new(0, 4));
        offsets.insert(FieldKey::LeaveFlag, Offset::new(0, 5));
        offsets.insert(FieldKey::TrainingFlag, Offset::new(0, 6));
        offsets.insert(FieldKey::Custom("callsign".into()), Offset::new(0, 7));

        let mut layouts = IndexMap::new();
        layouts.insert("row".to_string(), Layout { offsets });

        let mut slot_groups = IndexMap::new();
        slot_groups.insert(
            "standardSquad".to_string(),
            vec![
                Slot {
                    rank: Some("Sergeant".into()),
                    location: SlotLocation {
                        row: Some(12),
                        ..SlotLocation::default()
                    },
                    ..Slot::default()
                },
                Slot {
                    ranks: vec!["Private".into(), "Specialist".into()],
                    location: SlotLocation {
                        start_row: Some(14),
                        end_row: Some(15),
                        ..SlotLocation::default()
                    },
                    ..Slot::default()
                },
            ],
        );

        let squad = |name: &str, shortcut: &str, start_col: u32| OrgNode {
            name: name.into(),
            shortcuts: vec![shortcut.into()],
            use_slots_from: Some("standardSquad".into()),
            location: Some(NodeLocation {
                start_col: Some(start_col),
            }),
            ..OrgNode::default()
        };

        BlueprintConfig {
            date_format: "MM/DD/YY".into(),
            ranks: RankTable::new(vec![
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
                Rank {
                    name: "Staff Sergeant".into(),
                    abbr: "SSG".into(),
                },
            ]),
            layouts,
            slot_groups,
            hierarchy: vec![OrgNode {
                name: "Alpha Company".into(),
                sheet_name: Some("Alpha".into()),
                layout: Some("row".into()),
                children: vec![squad("First Squad", "1S", 2), squad("Second Squad", "2S", 12)],
                ..OrgNode::default()
            }],
            lock_timeout_ms: 15_000,
            validation: ValidationRules {
                username: UsernameRules {
                    regex: Some("[A-Za-z0-9_]+".into()),
                    regex_error: Some("letters, digits and underscores only".into()),
                    min_length: Some(3),
                    max_length: Some(16),
                    length_error: Some("3 to 16 characters".into()),
                    no_edge_underscore: true,
                    edge_underscore_error: None,
                    max_underscores: Some(2),
                    underscores_error: None,
                },
            },
            email_required_min_rank: Some("Staff Sergeant".into()),
            training: Some(TrainingGate {
                name: "Unit Basic Training".into(),
                trigger_rank: "Sergeant".into(),
            }),
            custom_fields: vec![CustomFieldDef {
                key: "callsign".into(),
                label: Some("Callsign".into()),
            }],
            ..BlueprintConfig::default()
        }
    }

    /// Seed a record block at `anchor` using the `row` layout offsets
    pub fn seed_record(
        grid: &InMemoryGrid,
        anchor: &Coordinate,
        rank_code: &str,
        identity: &str,
        join_date: Option<NaiveDate>,
    ) {
        if !rank_code.is_empty() {
            grid.set_value(anchor, CellValue::Text(rank_code.to_string()));
        }
        let identity_at = anchor.offset(0, COL_IDENTITY).expect("in bounds");
        grid.set_value(&identity_at, CellValue::Text(identity.to_string()));
        if let Some(date) = join_date {
            let date_at = anchor.offset(0, 3).expect("in bounds");
            grid.set_value(&date_at, CellValue::Date(date));
        }
    }
}
