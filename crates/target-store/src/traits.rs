//! TargetStore trait definition.

use crate::error::StoreError;
use crate::request::{UnorderedOutcome, UnorderedRequest};
use async_trait::async_trait;
use bson::Document;
use replay_core::{Namespace, WriteOptions};

/// Trait for applying writes to the target database.
///
/// Implementations wrap an already-open connection. They never interpret
/// `options`; it is forwarded to the server with every request. A store
/// never retries internally.
///
/// # Usage Pattern
///
/// ```ignore
/// let store: Arc<dyn TargetStore> = Arc::new(MongoStore::new(client));
/// store.insert_one(&ns, &doc! { "_id": 1 }, &WriteOptions::new()).await?;
/// ```
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert one document.
    async fn insert_one(
        &self,
        ns: &Namespace,
        payload: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError>;

    /// Replace the document matching `selector` with `payload`, creating it
    /// if nothing matches.
    async fn replace_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        payload: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError>;

    /// Replace the first document matching `selector` with `payload`.
    ///
    /// Returns [`StoreError::NotFound`] when nothing matches and `upsert` is
    /// false. With `upsert` a non-matching selector inserts `payload`.
    async fn update_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        payload: &Document,
        upsert: bool,
        options: &WriteOptions,
    ) -> Result<(), StoreError>;

    /// Delete the first document matching `selector`.
    ///
    /// Returns [`StoreError::NotFound`] when nothing matches.
    async fn delete_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError>;

    /// Run a grouped request with unordered semantics.
    ///
    /// `Err` means the request failed before per-operation results were
    /// available. Otherwise the outcome holds one result per queued
    /// operation and a failed operation never blocks its siblings.
    async fn run_unordered(
        &self,
        ns: &Namespace,
        request: UnorderedRequest,
        options: &WriteOptions,
    ) -> Result<UnorderedOutcome, StoreError>;
}
