//! Single-mode writer against a real MongoDB server.
//!
//! Run with `cargo test -- --ignored`; the server comes from
//! `MONGODB_TEST_URL` (default: the DevContainer's `mongodb` service).

use oplog_replay::testing::{
    connect_mongodb, drop_database, fetch_sorted, fetch_x_values, id_selector, mock_record,
    mongodb_writers, no_options, test_namespace,
};
use oplog_replay::{ApplyError, Batch, FailureKind};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("oplog_replay=debug,db_writer=debug,mongodb_target=debug")
        .try_init()
        .ok(); // Ignore if already initialized
}

#[tokio::test]
#[ignore = "Requires a running MongoDB server"]
async fn test_single_insert_update_delete() -> anyhow::Result<()> {
    init_logging();
    let client = connect_mongodb().await?;
    let ns = test_namespace("single_basic");
    let (single, _) = mongodb_writers(&client);

    let inserts = Batch::inserts(vec![mock_record(1, 1)])?;
    single.insert(&ns, &no_options(), &inserts, false).await?;
    assert_eq!(fetch_sorted(&client, &ns).await?, vec![mock_record(1, 1)]);

    let updates = Batch::updates(vec![(id_selector(1), mock_record(1, 10))])?;
    single.update(&ns, &no_options(), &updates, false).await?;
    assert_eq!(fetch_x_values(&client, &ns).await?, vec![10]);

    let deletes = Batch::deletes(vec![id_selector(1)])?;
    single.delete(&ns, &no_options(), &deletes).await?;
    assert!(fetch_sorted(&client, &ns).await?.is_empty());

    drop_database(&client, &ns).await;
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a running MongoDB server"]
async fn test_single_upsert_and_duplicate_insert() -> anyhow::Result<()> {
    init_logging();
    let client = connect_mongodb().await?;
    let ns = test_namespace("single_upsert");
    let (single, _) = mongodb_writers(&client);

    let inserts = Batch::inserts((1..=5).map(|i| mock_record(i, i)))?;
    single.insert(&ns, &no_options(), &inserts, false).await?;

    // Update of a missing document fails without upsert
    let missing = Batch::updates(vec![(id_selector(6), mock_record(6, 10))])?;
    let err = single
        .update(&ns, &no_options(), &missing, false)
        .await
        .unwrap_err();
    assert_eq!(err.failure_kinds(), vec![FailureKind::NotFound]);
    assert_eq!(fetch_sorted(&client, &ns).await?.len(), 5);

    // and inserts with it
    single.update(&ns, &no_options(), &missing, true).await?;
    assert_eq!(fetch_x_values(&client, &ns).await?, vec![1, 2, 3, 4, 5, 10]);

    // Duplicate insert is ignored without upsert
    let duplicate = Batch::inserts(vec![mock_record(1, 30)])?;
    single.insert(&ns, &no_options(), &duplicate, false).await?;
    assert_eq!(fetch_x_values(&client, &ns).await?[0], 1);

    // and replaces the document with it
    single.insert(&ns, &no_options(), &duplicate, true).await?;
    assert_eq!(fetch_x_values(&client, &ns).await?[0], 30);

    // Delete of a missing document fails
    let deletes = Batch::deletes(vec![id_selector(20)])?;
    let err = single.delete(&ns, &no_options(), &deletes).await.unwrap_err();
    assert!(matches!(err, ApplyError::Record { index: 0, .. }));
    assert_eq!(err.failure_kinds(), vec![FailureKind::NotFound]);

    drop_database(&client, &ns).await;
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a running MongoDB server"]
async fn test_single_write_concern_reaches_server() -> anyhow::Result<()> {
    init_logging();
    let client = connect_mongodb().await?;
    let ns = test_namespace("single_options");
    let (single, _) = mongodb_writers(&client);

    // A write concern the standalone server cannot satisfy is rejected,
    // proving the option is forwarded.
    let options = oplog_replay::WriteOptions::new()
        .with("writeConcern", bson::doc! { "w": 50, "wtimeout": 100 });
    let inserts = Batch::inserts(vec![mock_record(1, 1)])?;
    let err = single
        .insert(&ns, &options, &inserts, false)
        .await
        .unwrap_err();
    assert_eq!(err.failure_kinds(), vec![FailureKind::Other]);

    drop_database(&client, &ns).await;
    Ok(())
}
