//! Two-tier sheet cache
//!
//! Fronts the raw grid collaborator with a process-resident map and a
//! persistent, TTL-bounded external tier. The grid stays authoritative:
//! cached snapshots may be stale but are never trusted past an
//! invalidation — once `invalidate` returns, the next `ensure` re-fetches
//! from the store.
//!
//! Persistence is best-effort. A failed put is a named soft outcome in the
//! [`EnsureReport`], logged and never propagated into the read path.

use crate::error::GridError;
use crate::store::{GridStore, SheetSnapshot};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Frame marker: payload is raw JSON
const FRAME_RAW: u8 = 0;
/// Frame marker: payload is lz4-compressed JSON
const FRAME_LZ4: u8 = 1;

/// The external key/value cache collaborator
///
/// No read-modify-write atomicity is assumed; callers always store full
/// replacement values.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Fetch a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GridError>;

    /// Store a value with a time-to-live
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> Result<(), GridError>;

    /// Remove keys; absent keys are not an error
    async fn remove(&self, keys: &[String]) -> Result<(), GridError>;
}

/// Tuning for the sheet cache
#[derive(Debug, Clone)]
pub struct SheetCacheConfig {
    /// Key prefix for persistent per-sheet entries
    pub key_prefix: String,
    /// Persistent entry TTL
    pub ttl: Duration,
    /// Compress payloads above this many bytes
    pub compress_threshold: usize,
}

impl Default for SheetCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "sheet_data_v2_".to_string(),
            ttl: Duration::from_secs(21_600),
            compress_threshold: 64 * 1024,
        }
    }
}

/// A persistence put that failed without failing the read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftFailure {
    /// Sheet whose snapshot was not persisted
    pub sheet: String,
    /// Backend reason
    pub reason: String,
}

/// What `ensure` did for each requested sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    /// Sheets already resident
    pub resident_hits: Vec<String>,
    /// Sheets restored from the persistent tier
    pub persistent_hits: Vec<String>,
    /// Sheets fetched from the raw grid
    pub store_fetches: Vec<String>,
    /// Best-effort persistence failures (degraded, not fatal)
    pub soft_failures: Vec<SoftFailure>,
}

/// Two-level snapshot cache over the grid store
pub struct SheetCache {
    resident: DashMap<String, Arc<SheetSnapshot>>,
    persistent: Arc<dyn CacheService>,
    store: Arc<dyn GridStore>,
    config: SheetCacheConfig,
}

impl SheetCache {
    /// Create a cache over the given collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn GridStore>,
        persistent: Arc<dyn CacheService>,
        config: SheetCacheConfig,
    ) -> Self {
        Self {
            resident: DashMap::new(),
            persistent,
            store,
            config,
        }
    }

    fn key_for(&self, sheet: &str) -> String {
        format!("{}{}", self.config.key_prefix, sheet)
    }

    /// Make the named sheets resident
    ///
    /// Consults the persistent tier first (corrupt entries are evicted and
    /// fall through), the raw grid last. Sheets unknown to the grid become
    /// empty snapshots.
    ///
    /// # Errors
    /// Only raw-grid read failures propagate; persistence problems degrade
    /// into [`EnsureReport::soft_failures`].
    pub async fn ensure(&self, sheets: &[String]) -> Result<EnsureReport, GridError> {
        let mut report = EnsureReport::default();
        for sheet in sheets {
            if self.resident.contains_key(sheet) {
                report.resident_hits.push(sheet.clone());
                continue;
            }
            if let Some(snapshot) = self.try_persistent(sheet).await {
                self.resident.insert(sheet.clone(), Arc::new(snapshot));
                report.persistent_hits.push(sheet.clone());
                continue;
            }

            let snapshot = self
                .store
                .read_sheet(sheet)
                .await?
                .unwrap_or_else(SheetSnapshot::empty);
            let snapshot = Arc::new(snapshot);
            self.resident.insert(sheet.clone(), Arc::clone(&snapshot));
            report.store_fetches.push(sheet.clone());

            if let Err(reason) = self.persist(sheet, &snapshot).await {
                tracing::warn!(sheet = %sheet, %reason, "sheet snapshot not persisted");
                report.soft_failures.push(SoftFailure {
                    sheet: sheet.clone(),
                    reason: reason.to_string(),
                });
            }
        }
        Ok(report)
    }

    /// Resident snapshot for a sheet; empty if never ensured
    #[must_use]
    pub fn get(&self, sheet: &str) -> Arc<SheetSnapshot> {
        self.resident
            .get(sheet)
            .map_or_else(|| Arc::new(SheetSnapshot::empty()), |e| Arc::clone(e.value()))
    }

    /// Drop sheets from both tiers
    ///
    /// After this returns, the next `ensure` for these sheets is guaranteed
    /// to hit the raw grid.
    ///
    /// # Errors
    /// Persistent-tier removal failures propagate: the staleness guarantee
    /// cannot be given if the external entry may survive.
    pub async fn invalidate(&self, sheets: &[String]) -> Result<(), GridError> {
        for sheet in sheets {
            self.resident.remove(sheet);
        }
        let keys: Vec<String> = sheets.iter().map(|s| self.key_for(s)).collect();
        self.persistent.remove(&keys).await
    }

    async fn try_persistent(&self, sheet: &str) -> Option<SheetSnapshot> {
        let key = self.key_for(sheet);
        let bytes = match self.persistent.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(sheet = %sheet, error = %e, "persistent tier read failed");
                return None;
            }
        };
        match decode_snapshot(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(sheet = %sheet, error = %e, "evicting corrupt cache entry");
                if let Err(e) = self.persistent.remove(&[key]).await {
                    tracing::warn!(sheet = %sheet, error = %e, "corrupt entry eviction failed");
                }
                None
            }
        }
    }

    async fn persist(&self, sheet: &str, snapshot: &SheetSnapshot) -> Result<(), GridError> {
        let bytes = encode_snapshot(snapshot, self.config.compress_threshold)?;
        self.persistent
            .put(&self.key_for(sheet), bytes, self.config.ttl)
            .await
    }
}

/// Encode a snapshot as a framed payload, compressing above the threshold
pub(crate) fn encode_snapshot(
    snapshot: &SheetSnapshot,
    compress_threshold: usize,
) -> Result<Vec<u8>, GridError> {
    let json = serde_json::to_vec(snapshot)?;
    let mut framed;
    if json.len() > compress_threshold {
        let compressed = lz4_flex::compress_prepend_size(&json);
        framed = Vec::with_capacity(compressed.len() + 1);
        framed.push(FRAME_LZ4);
        framed.extend_from_slice(&compressed);
    } else {
        framed = Vec::with_capacity(json.len() + 1);
        framed.push(FRAME_RAW);
        framed.extend_from_slice(&json);
    }
    Ok(framed)
}

/// Decode a framed payload back into a snapshot
pub(crate) fn decode_snapshot(bytes: &[u8]) -> Result<SheetSnapshot, GridError> {
    let (marker, payload) = bytes
        .split_first()
        .ok_or_else(|| GridError::CorruptPayload("empty payload".to_string()))?;
    let json = match *marker {
        FRAME_RAW => payload.to_vec(),
        FRAME_LZ4 => lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| GridError::CorruptPayload(e.to_string()))?,
        other => {
            return Err(GridError::CorruptPayload(format!(
                "unknown frame marker {other}"
            )))
        }
    };
    Ok(serde_json::from_slice(&json)?)
}
