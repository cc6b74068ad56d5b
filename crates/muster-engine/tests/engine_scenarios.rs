//! End-to-end mutation scenarios over in-memory collaborators

use chrono::NaiveDate;
use muster_blueprint::{BlueprintConfig, Coordinate, NodePath};
use muster_engine::{
    EngineError, FieldUpdates, OperationStatus, ReassignRequest, RecruitRequest, RosterEngine,
};
use muster_grid::{CacheService, CellValue, GridStore, LeaseService};
use muster_test_utils::{fixtures, InMemoryCache, InMemoryGrid, InMemoryLease};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// Fixture geometry: each squad has a fixed Sergeant anchor at row 12 and a
// two-seat Private/Specialist pool at rows 14-15. First Squad anchors at
// column 2, Second Squad at column 12. Identity sits one column right of
// the anchor.
const FIRST_SGT: (u32, u32) = (12, 2);
const FIRST_POOL: [(u32, u32); 2] = [(14, 2), (15, 2)];
const SECOND_SGT: (u32, u32) = (12, 12);

fn coord(at: (u32, u32)) -> Coordinate {
    Coordinate::new("Alpha", at.0, at.1)
}

fn identity_cell(at: (u32, u32)) -> Coordinate {
    Coordinate::new("Alpha", at.0, at.1 + 1)
}

fn setup() -> (
    RosterEngine,
    Arc<InMemoryGrid>,
    Arc<InMemoryCache>,
    Arc<InMemoryLease>,
) {
    setup_with(fixtures::standard_config())
}

fn setup_with(
    config: BlueprintConfig,
) -> (
    RosterEngine,
    Arc<InMemoryGrid>,
    Arc<InMemoryCache>,
    Arc<InMemoryLease>,
) {
    let grid = Arc::new(InMemoryGrid::with_sheets(&["Alpha"]));
    let cache = Arc::new(InMemoryCache::new());
    let lease = Arc::new(InMemoryLease::new());
    let engine = RosterEngine::new(
        config,
        Arc::clone(&grid) as Arc<dyn GridStore>,
        Arc::clone(&cache) as Arc<dyn CacheService>,
        Arc::clone(&lease) as Arc<dyn LeaseService>,
    )
    .expect("fixture blueprint compiles");
    (engine, grid, cache, lease)
}

fn recruit(identity: &str, rank: &str, join: Option<(i32, u32, u32)>) -> RecruitRequest {
    RecruitRequest {
        destination: "1S".into(),
        title: None,
        identity: identity.into(),
        rank: rank.into(),
        join_date: join.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        region: None,
        contact_id: None,
        email: None,
    }
}

fn squad_path(name: &str) -> NodePath {
    ["Alpha Company".to_string(), name.to_string()]
        .into_iter()
        .collect()
}

#[tokio::test]
async fn recruit_into_empty_pool_lands_on_first_coordinate() {
    let (engine, grid, _, _) = setup();

    let delta = engine
        .try_recruit(recruit("newbie", "Private", Some((2024, 3, 1))))
        .await
        .unwrap();

    assert_eq!(delta.created.len(), 1);
    assert_eq!(delta.created[0].source, coord(FIRST_POOL[0]));
    assert!(delta.updated.is_empty());
    assert_eq!(
        grid.value_at(&identity_cell(FIRST_POOL[0])),
        CellValue::Text("newbie".into())
    );
    assert_eq!(
        grid.value_at(&coord(FIRST_POOL[0])),
        CellValue::Text("PVT".into())
    );
    assert_eq!(
        delta
            .availability
            .available(&squad_path("First Squad"), "Private/Specialist"),
        1
    );
}

#[tokio::test]
async fn senior_recruit_displaces_junior_to_second_seat() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(
        &grid,
        &coord(FIRST_POOL[0]),
        "SPC",
        "alpha",
        NaiveDate::from_ymd_opt(2024, 1, 1),
    );

    // Same rank, earlier join date: packs ahead of the incumbent.
    let delta = engine
        .try_recruit(recruit("bravo", "Specialist", Some((2023, 1, 1))))
        .await
        .unwrap();

    assert_eq!(
        grid.value_at(&identity_cell(FIRST_POOL[0])),
        CellValue::Text("bravo".into())
    );
    assert_eq!(
        grid.value_at(&identity_cell(FIRST_POOL[1])),
        CellValue::Text("alpha".into())
    );
    assert_eq!(delta.created[0].source, coord(FIRST_POOL[0]));
    assert_eq!(delta.updated.len(), 1);
    assert_eq!(delta.updated[0].identity, "alpha");
    assert_eq!(delta.updated[0].source, coord(FIRST_POOL[1]));
}

#[tokio::test]
async fn full_pool_rejects_recruit_without_writing() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "alpha", None);
    fixtures::seed_record(&grid, &coord(FIRST_POOL[1]), "PVT", "bravo", None);

    let err = engine
        .try_recruit(recruit("charlie", "Private", None))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Capacity { capacity: 2, .. }));
    assert!(err.is_user_error());
    assert_eq!(grid.batch_count(), 0);
    assert_eq!(
        grid.value_at(&identity_cell(FIRST_POOL[0])),
        CellValue::Text("alpha".into())
    );
}

#[tokio::test]
async fn remove_sole_fixed_occupant_clears_and_frees_the_slot() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_SGT), "", "sarge", None);

    let delta = engine.try_remove("sarge").await.unwrap();

    assert_eq!(delta.deleted, Some(coord(FIRST_SGT)));
    assert!(delta.updated.is_empty());
    assert_eq!(grid.value_at(&identity_cell(FIRST_SGT)), CellValue::Empty);
    assert_eq!(
        delta
            .availability
            .available(&squad_path("First Squad"), "Sergeant"),
        1
    );
    assert!(engine.find_by_identity("sarge").await.unwrap().is_none());
}

#[tokio::test]
async fn externally_changed_identity_aborts_with_conflict() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    // Warm the derived view, then mutate the grid behind the engine's back.
    engine.roster().await.unwrap();
    grid.set_value(
        &identity_cell(FIRST_POOL[0]),
        CellValue::Text("intruder".into()),
    );

    let err = engine
        .try_reassign(ReassignRequest {
            identity: "vex".into(),
            destination: "2S".into(),
            title: None,
            rank: None,
            acknowledge_training: false,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Conflict { .. }));
    assert!(err.is_retryable());
    assert_eq!(grid.batch_count(), 0);
}

#[tokio::test]
async fn cross_pool_promotion_needs_training_acknowledgement() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    let promote = |ack: bool| ReassignRequest {
        identity: "vex".into(),
        destination: "2S".into(),
        title: None,
        rank: Some("Sergeant".into()),
        acknowledge_training: ack,
    };

    let err = engine.try_reassign(promote(false)).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(err.to_string().contains("Unit Basic Training"));

    let delta = engine.try_reassign(promote(true)).await.unwrap();
    assert_eq!(grid.value_at(&identity_cell(FIRST_POOL[0])), CellValue::Empty);
    assert_eq!(
        grid.value_at(&identity_cell(SECOND_SGT)),
        CellValue::Text("vex".into())
    );
    let moved = delta
        .updated
        .iter()
        .find(|p| p.identity == "vex")
        .expect("vex in delta");
    assert_eq!(moved.source, coord(SECOND_SGT));
    assert_eq!(moved.rank, "Sergeant");
}

#[tokio::test]
async fn duplicate_identity_is_rejected_before_the_lease() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    let err = engine
        .try_recruit(recruit("VEX", "Private", None))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(grid.batch_count(), 0);
}

#[tokio::test]
async fn field_edit_is_idempotent() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    let updates = || FieldUpdates {
        region: Some("EU".into()),
        custom: [("callsign".to_string(), "Viper".to_string())]
            .into_iter()
            .collect(),
        ..FieldUpdates::default()
    };

    let first = engine.try_edit_fields("vex", updates()).await.unwrap();
    let second = engine.try_edit_fields("vex", updates()).await.unwrap();

    assert_eq!(first.updated[0].region, second.updated[0].region);
    assert_eq!(first.updated[0].custom, second.updated[0].custom);
    let callsign_cell = Coordinate::new("Alpha", FIRST_POOL[0].0, FIRST_POOL[0].1 + 7);
    assert_eq!(grid.value_at(&callsign_cell), CellValue::Text("Viper".into()));

    let person = engine.find_by_identity("vex").await.unwrap().unwrap();
    assert_eq!(person.region.as_deref(), Some("EU"));
    // Position and rank untouched.
    assert_eq!(person.source, coord(FIRST_POOL[0]));
    assert_eq!(person.rank, "Specialist");
}

#[tokio::test]
async fn field_edit_writes_only_the_edited_cells() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    engine
        .try_edit_fields(
            "vex",
            FieldUpdates {
                region: Some("EU".into()),
                ..FieldUpdates::default()
            },
        )
        .await
        .unwrap();

    let batches = grid.batches();
    assert_eq!(batches.len(), 1);
    let region_cell = Coordinate::new("Alpha", FIRST_POOL[0].0, FIRST_POOL[0].1 + 2);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].at, region_cell);
    // Identity and rank cells were not rewritten, so concurrent external
    // edits to them survive.
    assert!(batches[0]
        .iter()
        .all(|w| w.at != identity_cell(FIRST_POOL[0]) && w.at != coord(FIRST_POOL[0])));
}

#[tokio::test]
async fn undeclared_custom_field_is_rejected() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    let err = engine
        .try_edit_fields(
            "vex",
            FieldUpdates {
                custom: [("ghost".to_string(), "x".to_string())].into_iter().collect(),
                ..FieldUpdates::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(grid.batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn contended_lease_reports_busy() {
    let mut config = fixtures::standard_config();
    config.lock_timeout_ms = 100;
    let (engine, grid, _, lease) = setup_with(config);
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);

    let _held = lease.hold().await;
    let err = engine.try_remove("vex").await.unwrap_err();
    assert!(matches!(err, EngineError::Busy(_)));
    assert!(err.is_retryable());
    assert_eq!(grid.batch_count(), 0);
}

#[tokio::test]
async fn failed_cache_persistence_degrades_softly() {
    let (engine, grid, cache, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);
    cache.set_fail_puts(true);

    let report = engine.refresh_sheets().await.unwrap();
    assert_eq!(report.soft_failures.len(), 1);
    assert_eq!(report.soft_failures[0].sheet, "Alpha");

    // The read path still serves from the resident tier.
    let view = engine.roster().await.unwrap();
    assert_eq!(view.people.len(), 1);
    assert_eq!(view.people[0].identity, "vex");
}

#[tokio::test]
async fn mid_write_failure_purges_derived_caches() {
    let (engine, grid, _, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);
    engine.roster().await.unwrap();

    grid.set_fail_writes(true);
    let outcome = engine.remove("vex").await;
    assert_eq!(outcome.status, OperationStatus::Failed);
    assert!(outcome.delta.is_none());

    // Recovery: the next read recomputes and the retry commits.
    grid.set_fail_writes(false);
    let delta = engine.try_remove("vex").await.unwrap();
    assert_eq!(delta.deleted, Some(coord(FIRST_POOL[0])));
}

#[tokio::test]
async fn post_write_invalidation_failure_purges_aggregates() {
    let (engine, grid, cache, _) = setup();
    fixtures::seed_record(&grid, &coord(FIRST_POOL[0]), "SPC", "vex", None);
    engine.roster().await.unwrap();

    // The fresh re-scan under the lease invalidates once; the post-commit
    // invalidation is the call that fails.
    cache.fail_removes_after(1);
    let err = engine.try_remove("vex").await.unwrap_err();
    assert!(matches!(err, EngineError::Grid(_)));
    assert_eq!(grid.batch_count(), 1);

    // The batch committed, so the derived view must not survive. Once the
    // persistent tier recovers the next read recomputes from the grid
    // instead of serving the pre-write roster.
    cache.fail_removes_after(u64::MAX);
    cache.clear();
    let view = engine.roster().await.unwrap();
    assert!(view.people.is_empty());
}

#[tokio::test]
async fn outcome_boundary_folds_success_and_failure() {
    let (engine, _, _, _) = setup();

    let ok = engine
        .recruit(recruit("newbie", "Private", None))
        .await;
    assert_eq!(ok.status, OperationStatus::Ok);
    assert!(ok.delta.is_some());

    let missing = engine.remove("nobody").await;
    assert_eq!(missing.status, OperationStatus::Failed);
    assert!(missing.message.contains("nobody"));
}
