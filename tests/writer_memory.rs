//! Replay scenarios through the library facade against the in-memory store.

use bson::doc;
use oplog_replay::testing::{id_selector, mock_record, no_options};
use oplog_replay::{
    ApplyError, Batch, ExecutionMode, FailureKind, MemoryStore, Namespace, TargetStore,
    WriteOptions, Writer,
};
use std::sync::Arc;

fn setup() -> (Arc<MemoryStore>, Writer, Writer) {
    tracing_subscriber::fmt()
        .with_env_filter("oplog_replay=debug,db_writer=debug")
        .try_init()
        .ok(); // Ignore if already initialized

    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn TargetStore> = store.clone();
    let single = Writer::with_mode(shared.clone(), WriteOptions::new(), ExecutionMode::Single);
    let bulk = Writer::with_mode(shared, WriteOptions::new(), ExecutionMode::Bulk);
    (store, single, bulk)
}

fn ns() -> Namespace {
    Namespace::new("writer_memory", "a")
}

async fn x_values(store: &MemoryStore) -> Vec<i32> {
    store
        .documents(&ns())
        .await
        .iter()
        .map(|d| d.get_i32("x").unwrap())
        .collect()
}

#[tokio::test]
async fn test_replay_single_then_bulk_segment() {
    let (store, single, bulk) = setup();

    // A segment applied in single mode, then replayed from an earlier
    // checkpoint in bulk mode.
    let inserts = Batch::inserts((1..=5).map(|i| mock_record(i, i))).unwrap();
    single.insert(&ns(), &no_options(), &inserts, false).await.unwrap();

    let replay = Batch::inserts((3..=7).map(|i| mock_record(i, i))).unwrap();
    bulk.insert(&ns(), &no_options(), &replay, false).await.unwrap();

    let updates = Batch::updates((1..=7).map(|i| (id_selector(i), mock_record(i, i * 10)))).unwrap();
    bulk.update(&ns(), &no_options(), &updates, false).await.unwrap();

    let deletes = Batch::deletes(vec![id_selector(6), id_selector(7), id_selector(8)]).unwrap();
    bulk.delete(&ns(), &no_options(), &deletes).await.unwrap();

    assert_eq!(x_values(&store).await, vec![10, 20, 30, 40, 50]);

    // The same deletes in single mode stop at the first missing document.
    let err = single.delete(&ns(), &no_options(), &deletes).await.unwrap_err();
    assert_eq!(err.failed_index(), Some(0));
    assert_eq!(err.failure_kinds(), vec![FailureKind::NotFound]);
}

#[tokio::test]
async fn test_bulk_unique_constraint_scenario() {
    let (store, _, bulk) = setup();
    store.create_unique_index(&ns(), "x").await;

    let seed = Batch::inserts((1..=3).map(|i| mock_record(i, i))).unwrap();
    bulk.insert(&ns(), &no_options(), &seed, false).await.unwrap();

    let updates = Batch::updates(vec![
        (id_selector(1), mock_record(1, 2)),
        (id_selector(10), mock_record(10, 10)),
        (id_selector(11), mock_record(11, 11)),
    ])
    .unwrap();

    let err = bulk
        .update(&ns(), &no_options(), &updates, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplyError::Bulk { .. }));
    assert_eq!(err.failure_kinds(), vec![FailureKind::DuplicateKey]);
    assert_eq!(x_values(&store).await, vec![1, 2, 3]);

    bulk.update(&ns(), &no_options(), &updates, true).await.unwrap();
    assert_eq!(x_values(&store).await, vec![1, 2, 3, 10, 11]);
}

#[tokio::test]
async fn test_call_options_override_writer_options() {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn TargetStore> = store.clone();
    let writer = Writer::new(
        shared,
        WriteOptions::new().with("writeConcern", doc! { "w": "majority" }),
        false,
    );

    let batch = Batch::deletes(vec![id_selector(1)]).unwrap();
    let call_options = WriteOptions::new().with("writeConcern", doc! { "w": 1 });
    let _ = writer.delete(&ns(), &call_options, &batch).await;

    let forwarded = store.last_options().await.unwrap();
    assert_eq!(
        forwarded.as_document(),
        &doc! { "writeConcern": { "w": 1 } }
    );
}
