//! Optimistic concurrency guard
//!
//! The backing grid is shared and externally mutable, so every mutation that
//! targets an existing record re-reads its identity cell live (bypassing
//! both cache tiers) after the lease is held and before any write. A
//! mismatch means another actor changed the record since the client's last
//! read; the mutation aborts with a [`EngineError::Conflict`] and writes
//! nothing.

use crate::error::EngineError;
use crate::person::Person;
use muster_blueprint::{FieldKey, Layout};
use muster_grid::GridStore;

/// Re-read the identity cell under `cached`'s anchor and compare
///
/// Comparison is exact string after trim, the same identity rule used
/// everywhere else. A layout without an identity offset has nothing to
/// verify and passes.
///
/// # Errors
/// [`EngineError::Conflict`] on mismatch; grid faults propagate.
pub async fn verify(
    store: &dyn GridStore,
    layout: &Layout,
    cached: &Person,
) -> Result<(), EngineError> {
    let Some(off) = layout.offset(&FieldKey::Identity) else {
        return Ok(());
    };
    let Some(at) = cached.source.offset(off.row, off.col) else {
        return Ok(());
    };
    let live = store.read_cell(&at).await?;
    let found = live.display_string();
    if found == cached.identity.trim() {
        Ok(())
    } else {
        tracing::warn!(at = %at, expected = %cached.identity, found = %found, "identity guard tripped");
        Err(EngineError::Conflict {
            at,
            expected: cached.identity.trim().to_string(),
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use muster_blueprint::{Coordinate, NodePath, Offset};
    use muster_grid::{CellValue, CellWrite, GridError, SheetSnapshot};

    struct OneCellStore {
        at: Coordinate,
        value: CellValue,
    }

    #[async_trait]
    impl GridStore for OneCellStore {
        async fn read_sheet(&self, _name: &str) -> Result<Option<SheetSnapshot>, GridError> {
            Ok(None)
        }

        async fn read_cell(&self, at: &Coordinate) -> Result<CellValue, GridError> {
            if at == &self.at {
                Ok(self.value.clone())
            } else {
                Ok(CellValue::Empty)
            }
        }

        async fn write_batch(&self, _writes: &[CellWrite]) -> Result<(), GridError> {
            Ok(())
        }

        async fn list_sheets(&self) -> Result<Vec<String>, GridError> {
            Ok(vec![])
        }
    }

    fn layout() -> Layout {
        let mut offsets = IndexMap::new();
        offsets.insert(FieldKey::Identity, Offset::new(0, 1));
        Layout { offsets }
    }

    fn cached(identity: &str) -> Person {
        Person {
            identity: identity.into(),
            rank: "Private".into(),
            path: NodePath::root(),
            display_location: String::new(),
            source: Coordinate::new("Alpha", 5, 2),
            join_date: None,
            region: None,
            contact_id: None,
            email: None,
            on_leave: false,
            leave: None,
            training_passed: false,
            custom: IndexMap::new(),
            title: None,
        }
    }

    #[tokio::test]
    async fn matching_identity_passes() {
        let store = OneCellStore {
            at: Coordinate::new("Alpha", 5, 3),
            value: CellValue::Text("  vex ".into()),
        };
        assert!(verify(&store, &layout(), &cached("vex")).await.is_ok());
    }

    #[tokio::test]
    async fn changed_identity_is_a_conflict() {
        let store = OneCellStore {
            at: Coordinate::new("Alpha", 5, 3),
            value: CellValue::Text("intruder".into()),
        };
        let err = verify(&store, &layout(), &cached("vex")).await.unwrap_err();
        match err {
            EngineError::Conflict { at, expected, found } => {
                assert_eq!(at, Coordinate::new("Alpha", 5, 3));
                assert_eq!(expected, "vex");
                assert_eq!(found, "intruder");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn emptied_cell_is_a_conflict() {
        let store = OneCellStore {
            at: Coordinate::new("Alpha", 5, 3),
            value: CellValue::Empty,
        };
        assert!(verify(&store, &layout(), &cached("vex")).await.is_err());
    }
}
