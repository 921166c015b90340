//! End-to-end pipeline tests over the in-memory target and on-disk legacy
//! fixtures.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

use legacy_sync::{
    catalog, ChildRow, FieldValue, MemoryTarget, ParentRow, SyncBatch, SyncOrchestrator,
    SyncPhase, SyncTarget,
};

use common::{delivery_file, delivery_item_file, LegacyFileBuilder};

fn setup(dir: &TempDir) -> (Arc<MemoryTarget>, SyncOrchestrator<MemoryTarget>) {
    common::init_tracing();
    let target = Arc::new(MemoryTarget::new());
    let orchestrator = SyncOrchestrator::new(target.clone(), dir.path());
    (target, orchestrator)
}

/// Standard scenario: parents 10 and 11 live, 12 soft-deleted; three detail
/// rows for 10, two for 11, one orphan for 99.
fn write_delivery_fixtures(dir: &TempDir) {
    delivery_file()
        .row(&["00000010", "ACME", "20240110", "PO-1"])
        .row(&["00000011", "BRAVO", "20240111", "PO-2"])
        .deleted_row(&["00000012", "GONE", "20240112", "PO-3"])
        .write_to(dir.path(), "DELIVERY.DBF");
    delivery_item_file()
        .row(&["00000010", "WIDGET", "100", "5"])
        .row(&["00000010", "GADGET", "101", "2"])
        .row(&["00000010", "SPROCKET", "102", "1"])
        .row(&["00000011", "WIDGET", "100", "4"])
        .row(&["00000011", "GIZMO", "103", "9"])
        .row(&["00000099", "GHOST", "", "1"])
        .write_to(dir.path(), "DELITEM.DBF");
}

#[tokio::test]
async fn test_incremental_sync_example_scenario() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    let (target, orchestrator) = setup(&dir);
    target.seed_parent("delivery", 9, vec![]);

    let entity = catalog::entity("delivery").unwrap();
    let outcome = orchestrator.run(entity).await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.parent_count, 2);
    assert_eq!(outcome.child_count, 5);
    assert_eq!(outcome.entity, "delivery");
    assert!(!outcome.run_id.is_empty());

    let parents = target.parent_rows("delivery");
    let keys: Vec<i64> = parents.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![9, 10, 11]);

    let children = target.child_rows("delivery_item");
    assert_eq!(children.len(), 5);
    assert!(children.iter().all(|(fk, _, _)| *fk == 10 || *fk == 11));

    // Re-running immediately against unchanged files: watermark is now 11,
    // nothing qualifies, and that is success rather than an error.
    let rerun = orchestrator.run(entity).await;
    assert!(rerun.success);
    assert_eq!(rerun.parent_count, 0);
    assert_eq!(rerun.child_count, 0);
    assert_eq!(rerun.message, "no new records");
    assert_eq!(target.parent_rows("delivery").len(), 3);
    assert_eq!(target.child_rows("delivery_item").len(), 5);
}

#[tokio::test]
async fn test_soft_deleted_rows_never_reach_target() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    let (target, orchestrator) = setup(&dir);

    // From-empty backfill: watermark 0, everything live qualifies.
    let outcome = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    assert!(outcome.success);
    assert_eq!(outcome.parent_count, 2);

    let keys: Vec<i64> = target
        .parent_rows("delivery")
        .iter()
        .map(|(k, _)| *k)
        .collect();
    assert!(!keys.contains(&12), "soft-deleted row was synced");
}

#[tokio::test]
async fn test_coerced_values_and_fresh_child_sequence() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    let (target, orchestrator) = setup(&dir);

    let outcome = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    assert!(outcome.success);

    let parents = target.parent_rows("delivery");
    let (_, first) = &parents[0];
    assert_eq!(
        first.values,
        vec![
            FieldValue::Text("ACME".into()),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()),
            FieldValue::Text("PO-1".into()),
        ]
    );

    // Delivery items carry no durable sequence; line numbers are a fresh
    // 1-based rewrite in file order.
    let children = target.child_rows("delivery_item");
    let for_ten: Vec<_> = children.iter().filter(|(fk, _, _)| *fk == 10).collect();
    assert_eq!(
        for_ten.iter().map(|(_, seq, _)| *seq).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(for_ten[0].2[0], FieldValue::Text("WIDGET".into()));
}

#[tokio::test]
async fn test_blank_numeric_coerces_to_default_and_row_still_written() {
    let dir = TempDir::new().unwrap();
    LegacyFileBuilder::new()
        .field("REFNO", b'N', 8)
        .field("RMCODE", b'C', 10)
        .field("DESCRIPT", b'C', 20)
        .field("QTYONHAND", b'N', 10)
        .field("DATERECV", b'D', 8)
        .row(&["5", "RM-01", "CAUSTIC SODA", "", ""])
        .write_to(dir.path(), "RMWHSE.DBF");
    let (target, orchestrator) = setup(&dir);

    let outcome = orchestrator
        .run(catalog::entity("raw_material_warehouse").unwrap())
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.parent_count, 1);

    let parents = target.parent_rows("raw_material_warehouse");
    assert_eq!(parents[0].0, 5);
    // Blank quantity resolves to the declared zero default; blank date to NULL.
    assert_eq!(parents[0].1.values[2], FieldValue::Number(Decimal::ZERO));
    assert_eq!(parents[0].1.values[3], FieldValue::Null);
}

#[tokio::test]
async fn test_atomic_rollback_on_write_failure() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    let (target, orchestrator) = setup(&dir);
    target.seed_parent("delivery", 9, vec![]);
    target.poison_key(11);

    let outcome = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("delivery"));
    assert_eq!(outcome.parent_count, 0);

    // Neither parent nor any child from the failed batch is visible.
    assert_eq!(target.parent_rows("delivery").len(), 1);
    assert!(target.child_rows("delivery_item").is_empty());

    // The caller re-triggers after fixing the cause; no engine-side retry
    // happened in between.
    target.clear_poison();
    let retry = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    assert!(retry.success);
    assert_eq!(retry.parent_count, 2);
    assert_eq!(target.child_rows("delivery_item").len(), 5);
}

#[tokio::test]
async fn test_missing_file_fails_with_path() {
    let dir = TempDir::new().unwrap();
    let (_, orchestrator) = setup(&dir);

    let outcome = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("DELITEM.DBF"), "{}", outcome.message);
    assert!(outcome.message.contains("unavailable"), "{}", outcome.message);
}

#[tokio::test]
async fn test_missing_required_column_fails_with_name() {
    let dir = TempDir::new().unwrap();
    // Header file lacks the declared PONO column.
    LegacyFileBuilder::new()
        .field("DRNO", b'C', 8)
        .field("CUSTOMER", b'C', 20)
        .field("DATEDEL", b'D', 8)
        .row(&["00000010", "ACME", "20240110"])
        .write_to(dir.path(), "DELIVERY.DBF");
    delivery_item_file().write_to(dir.path(), "DELITEM.DBF");
    let (_, orchestrator) = setup(&dir);

    let outcome = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    assert!(!outcome.success);
    assert!(
        outcome.message.contains("PONO") && outcome.message.contains("DELIVERY.DBF"),
        "{}",
        outcome.message
    );
}

#[tokio::test]
async fn test_progress_phases_and_single_terminal_result() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    let (_, orchestrator) = setup(&dir);

    let mut handle = orchestrator.spawn(catalog::entity("delivery").unwrap());
    let mut phases = Vec::new();
    while let Some(progress) = handle.progress.recv().await {
        assert_eq!(progress.entity, "delivery");
        phases.push(progress.phase);
    }
    let outcome = handle.finished().await;

    assert!(outcome.success);
    assert_eq!(
        phases,
        vec![
            SyncPhase::ResolvingWatermark,
            SyncPhase::ReadingChildren,
            SyncPhase::ReadingParents,
            SyncPhase::Writing,
            SyncPhase::Succeeded,
        ]
    );
}

#[tokio::test]
async fn test_durable_lot_sequence_preserved() {
    let dir = TempDir::new().unwrap();
    LegacyFileBuilder::new()
        .field("BATCHNO", b'N', 8)
        .field("PRODCODE", b'C', 10)
        .field("FORMNO", b'N', 8)
        .field("QTYMADE", b'N', 10)
        .field("DATEPROD", b'D', 8)
        .row(&["100", "WIDGET", "7", "500", "20240201"])
        .write_to(dir.path(), "PRODUCTN.DBF");
    LegacyFileBuilder::new()
        .field("BATCHNO", b'N', 8)
        .field("LOTSEQ", b'N', 4)
        .field("LOTNO", b'C', 10)
        .field("QTY", b'N', 10)
        .row(&["100", "20", "L-B", "250"])
        .row(&["100", "10", "L-A", "250"])
        .write_to(dir.path(), "PRODLOT.DBF");
    let (target, orchestrator) = setup(&dir);

    let outcome = orchestrator.run(catalog::entity("production").unwrap()).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.child_count, 2);

    let lots = target.child_rows("production_lot");
    assert_eq!(
        lots.iter().map(|(_, seq, _)| *seq).collect::<Vec<_>>(),
        vec![10, 20]
    );
    assert_eq!(lots[0].2[0], FieldValue::Text("L-A".into()));
}

#[tokio::test]
async fn test_replace_children_rewrites_full_group() {
    let target = MemoryTarget::new();
    let entity = catalog::entity("delivery").unwrap();

    let child = |seq: i64, code: &str| ChildRow {
        parent_key: 10,
        sequence: seq,
        values: vec![
            FieldValue::Text(code.into()),
            FieldValue::Null,
            FieldValue::Number(Decimal::ONE),
        ],
    };

    let mut first = SyncBatch::default();
    first.parents.push(ParentRow {
        key: 10,
        values: vec![],
    });
    first
        .children
        .insert(10, vec![child(1, "OLD-A"), child(2, "OLD-B"), child(3, "OLD-C")]);
    target.write_batch(entity, &first).await.unwrap();
    assert_eq!(target.child_rows("delivery_item").len(), 3);

    // Resyncing the same parent with fewer lines must not leave stale rows.
    let mut second = SyncBatch::default();
    second.parents.push(ParentRow {
        key: 10,
        values: vec![],
    });
    second.children.insert(10, vec![child(1, "NEW-A")]);
    target.write_batch(entity, &second).await.unwrap();

    let rows = target.child_rows("delivery_item");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].2[0], FieldValue::Text("NEW-A".into()));
}

#[tokio::test]
async fn test_concurrent_entities_are_isolated() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    // Production files are absent, so that entity fails while delivery
    // succeeds; failures stay isolated to their own run.
    let (target, orchestrator) = setup(&dir);

    let delivery = orchestrator.spawn(catalog::entity("delivery").unwrap());
    let production = orchestrator.spawn(catalog::entity("production").unwrap());

    let delivery_outcome = delivery.finished().await;
    let production_outcome = production.finished().await;

    assert!(delivery_outcome.success);
    assert!(!production_outcome.success);
    assert!(production_outcome.message.contains("PRODLOT.DBF"));
    assert_eq!(target.parent_rows("delivery").len(), 2);
    assert!(target.parent_rows("production").is_empty());
}

#[tokio::test]
async fn test_outcome_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    write_delivery_fixtures(&dir);
    let (_, orchestrator) = setup(&dir);

    let outcome = orchestrator.run(catalog::entity("delivery").unwrap()).await;
    let json = outcome.to_json().unwrap();
    assert!(json.contains("\"entity\": \"delivery\""));
    assert!(json.contains("\"success\": true"));
}
