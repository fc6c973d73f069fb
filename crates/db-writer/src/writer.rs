//! The batched write executor.

use crate::bulk::BulkExecutor;
use crate::error::ApplyError;
use crate::policy::ExecutionMode;
use crate::single::SingleExecutor;
use async_trait::async_trait;
use bson::Document;
use replay_core::{Batch, BatchError, ChangeRecord, Namespace, OpKind, WriteOptions};
use std::sync::Arc;
use target_store::{StoreError, TargetStore};

/// Per-call context handed to an executor.
pub(crate) struct Call<'a> {
    pub store: &'a dyn TargetStore,
    pub namespace: &'a Namespace,
    /// Writer options overlaid with the call's options.
    pub options: WriteOptions,
}

impl Call<'_> {
    pub fn record_error(
        &self,
        kind: OpKind,
        index: usize,
        record: &ChangeRecord,
        source: StoreError,
    ) -> ApplyError {
        ApplyError::Record {
            namespace: self.namespace.clone(),
            kind,
            index,
            identity: record.identity().cloned(),
            source,
        }
    }

    pub fn aborted(&self, kind: OpKind, source: StoreError) -> ApplyError {
        ApplyError::Aborted {
            namespace: self.namespace.clone(),
            kind,
            source,
        }
    }
}

/// One execution strategy. Both implementations classify failures through
/// [`crate::policy::resolve`].
#[async_trait]
pub(crate) trait Executor: Send + Sync {
    async fn insert(&self, call: &Call<'_>, batch: &Batch, upsert: bool) -> Result<(), ApplyError>;

    async fn update(&self, call: &Call<'_>, batch: &Batch, upsert: bool) -> Result<(), ApplyError>;

    async fn delete(&self, call: &Call<'_>, batch: &Batch) -> Result<(), ApplyError>;
}

pub(crate) fn payload_of(record: &ChangeRecord, index: usize) -> Result<&Document, ApplyError> {
    record.payload().ok_or_else(|| {
        ApplyError::InvalidBatch(BatchError::MissingField {
            index,
            field: "payload",
        })
    })
}

pub(crate) fn selector_of(record: &ChangeRecord, index: usize) -> Result<&Document, ApplyError> {
    record.selector().ok_or_else(|| {
        ApplyError::InvalidBatch(BatchError::MissingField {
            index,
            field: "selector",
        })
    })
}

/// Applies batches of change records to a target store.
///
/// A writer holds only fixed configuration: the shared store handle, the
/// writer-level write options and the execution mode. It never closes the
/// store, so several writers (of either mode) may share one connection.
/// Callers needing both strategies hold two writers.
///
/// Every call completes only after its store round trips do and reports a
/// single aggregate result. The writer never retries.
#[derive(Clone)]
pub struct Writer {
    store: Arc<dyn TargetStore>,
    options: WriteOptions,
    mode: ExecutionMode,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("options", &self.options)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Writer {
    /// Create a writer; `bulk` selects [`ExecutionMode::Bulk`] for the
    /// writer's whole lifetime.
    pub fn new(store: Arc<dyn TargetStore>, options: WriteOptions, bulk: bool) -> Self {
        Self::with_mode(store, options, ExecutionMode::from_bulk(bulk))
    }

    pub fn with_mode(store: Arc<dyn TargetStore>, options: WriteOptions, mode: ExecutionMode) -> Self {
        Self {
            store,
            options,
            mode,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn TargetStore> {
        &self.store
    }

    fn executor(&self) -> &'static dyn Executor {
        match self.mode {
            ExecutionMode::Single => &SingleExecutor,
            ExecutionMode::Bulk => &BulkExecutor,
        }
    }

    fn call<'a>(&'a self, ns: &'a Namespace, options: &WriteOptions) -> Call<'a> {
        Call {
            store: self.store.as_ref(),
            namespace: ns,
            options: self.options.merged(options),
        }
    }

    fn check_kind(expected: OpKind, batch: &Batch) -> Result<(), ApplyError> {
        if batch.kind() != expected {
            return Err(ApplyError::KindMismatch {
                expected,
                found: batch.kind(),
            });
        }
        Ok(())
    }

    fn finish(
        &self,
        kind: OpKind,
        ns: &Namespace,
        batch: &Batch,
        result: Result<(), ApplyError>,
    ) -> Result<(), ApplyError> {
        match &result {
            Ok(()) => tracing::debug!(
                "Applied {} {} records to {} ({} mode)",
                batch.len(),
                kind,
                ns,
                self.mode
            ),
            Err(e) => tracing::warn!("Failed to apply {} batch to {}: {}", kind, ns, e),
        }
        result
    }

    /// Insert every record's payload.
    ///
    /// Duplicate-key failures are treated as already applied, or with
    /// `upsert` compensated by a full replace keyed by the record's
    /// identity.
    pub async fn insert(
        &self,
        ns: &Namespace,
        options: &WriteOptions,
        batch: &Batch,
        upsert: bool,
    ) -> Result<(), ApplyError> {
        Self::check_kind(OpKind::Insert, batch)?;
        tracing::debug!(
            "Inserting {} records into {} ({} mode, upsert: {})",
            batch.len(),
            ns,
            self.mode,
            upsert
        );
        let call = self.call(ns, options);
        let result = self.executor().insert(&call, batch, upsert).await;
        self.finish(OpKind::Insert, ns, batch, result)
    }

    /// Replace each document matched by a record's selector with its payload.
    ///
    /// With `upsert` a non-matching selector inserts the payload instead.
    pub async fn update(
        &self,
        ns: &Namespace,
        options: &WriteOptions,
        batch: &Batch,
        upsert: bool,
    ) -> Result<(), ApplyError> {
        Self::check_kind(OpKind::Update, batch)?;
        tracing::debug!(
            "Updating {} records in {} ({} mode, upsert: {})",
            batch.len(),
            ns,
            self.mode,
            upsert
        );
        let call = self.call(ns, options);
        let result = self.executor().update(&call, batch, upsert).await;
        self.finish(OpKind::Update, ns, batch, result)
    }

    /// Delete the document matched by each record's selector.
    pub async fn delete(
        &self,
        ns: &Namespace,
        options: &WriteOptions,
        batch: &Batch,
    ) -> Result<(), ApplyError> {
        Self::check_kind(OpKind::Delete, batch)?;
        tracing::debug!(
            "Deleting {} records from {} ({} mode)",
            batch.len(),
            ns,
            self.mode
        );
        let call = self.call(ns, options);
        let result = self.executor().delete(&call, batch).await;
        self.finish(OpKind::Delete, ns, batch, result)
    }
}
