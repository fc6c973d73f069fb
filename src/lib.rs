//! Oplog Replay Library
//!
//! Applies change records replayed from a source operation log to a target
//! MongoDB deployment, batch by batch.
//!
//! # Features
//!
//! - Two execution modes: one request per record, or one unordered grouped
//!   request per batch
//! - Idempotent replay: duplicate-key and not-found conflicts from an
//!   already-applied segment are swallowed or compensated
//! - Pass-through write options (write concern and friends) layered per
//!   writer and per call
//!
//! # Component Crates
//!
//! - `replay_core` - change records, batches, namespaces, write options
//! - `target_store` - the `TargetStore` trait and an in-memory store
//! - `mongodb_target` - MongoDB write command implementation of the store
//! - `db_writer` - the writer and its conflict policy
//!
//! # Usage
//!
//! ```ignore
//! let config = WriterConfig::load("writer.toml")?;
//! let writer = oplog_replay::connect_writer(&config).await?;
//! let batch = Batch::inserts(vec![doc! { "_id": 1, "x": 1 }])?;
//! writer
//!     .insert(&Namespace::new("app", "users"), &WriteOptions::new(), &batch, true)
//!     .await?;
//! ```

use std::sync::Arc;

pub mod config;
pub mod testing;

pub use config::{Acknowledgment, TargetOpts, WriterConfig};
pub use db_writer::{
    resolve, ApplyError, Compensation, ExecutionMode, RecordFailure, Resolution, Stage, Writer,
};
pub use mongodb_target::{ConnectOpts, MongoStore};
pub use replay_core::{Batch, BatchError, ChangeRecord, Namespace, OpKind, WriteOptions};
pub use target_store::{FailureKind, MemoryStore, StoreError, TargetStore};

/// Connect to the configured target and build a writer on the connection.
pub async fn connect_writer(config: &WriterConfig) -> anyhow::Result<Writer> {
    let client = mongodb_target::connect(&config.connect_opts()).await?;
    Ok(writer_on(client, config))
}

/// Build a writer on an existing client. The client is shared, not owned.
pub fn writer_on(client: mongodb::Client, config: &WriterConfig) -> Writer {
    let store: Arc<dyn TargetStore> = Arc::new(MongoStore::new(client));
    tracing::debug!(
        "Created {} writer for {}",
        ExecutionMode::from_bulk(config.bulk),
        config.uri
    );
    Writer::new(store, config.write_options(), config.bulk)
}
