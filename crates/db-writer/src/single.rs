//! Single mode: one store request per record, in batch order.
//!
//! The first propagated failure aborts the call; records after it are not
//! attempted.

use crate::error::ApplyError;
use crate::policy::{resolve, Compensation, ExecutionMode, Resolution};
use crate::writer::{payload_of, selector_of, Call, Executor};
use async_trait::async_trait;
use replay_core::{Batch, ChangeRecord, OpKind};
use target_store::StoreError;

pub(crate) struct SingleExecutor;

impl SingleExecutor {
    /// Settle one record's primary result against the conflict policy.
    async fn settle(
        call: &Call<'_>,
        kind: OpKind,
        upsert: bool,
        index: usize,
        record: &ChangeRecord,
        result: Result<(), StoreError>,
    ) -> Result<(), ApplyError> {
        let Err(err) = result else {
            return Ok(());
        };

        match resolve(kind, ExecutionMode::Single, upsert, err.kind()) {
            Resolution::Swallow => {
                tracing::debug!(
                    "Ignoring {} failure of {} record {} in {}: {}",
                    err.kind(),
                    kind,
                    index,
                    call.namespace,
                    err
                );
                Ok(())
            }
            Resolution::Compensate(compensation) => {
                tracing::info!(
                    "Compensating {} failure of {} record {} in {} with {:?}",
                    err.kind(),
                    kind,
                    index,
                    call.namespace,
                    compensation
                );
                Self::compensate(call, record, compensation, err)
                    .await
                    .map_err(|source| call.record_error(kind, index, record, source))
            }
            Resolution::Propagate => Err(call.record_error(kind, index, record, err)),
        }
    }

    /// Issue the compensating write. Without the data it needs, the original
    /// failure stands.
    async fn compensate(
        call: &Call<'_>,
        record: &ChangeRecord,
        compensation: Compensation,
        original: StoreError,
    ) -> Result<(), StoreError> {
        let Some(payload) = record.payload() else {
            return Err(original);
        };

        match compensation {
            Compensation::ReplaceByIdentity => match record.identity_selector() {
                Some(selector) => {
                    call.store
                        .replace_one(call.namespace, &selector, payload, &call.options)
                        .await
                }
                None => Err(original),
            },
            Compensation::InsertPayload => {
                call.store
                    .insert_one(call.namespace, payload, &call.options)
                    .await
            }
        }
    }
}

#[async_trait]
impl Executor for SingleExecutor {
    async fn insert(&self, call: &Call<'_>, batch: &Batch, upsert: bool) -> Result<(), ApplyError> {
        for (index, record) in batch.iter().enumerate() {
            let payload = payload_of(record, index)?;
            let result = call
                .store
                .insert_one(call.namespace, payload, &call.options)
                .await;
            Self::settle(call, OpKind::Insert, upsert, index, record, result).await?;
        }
        Ok(())
    }

    async fn update(&self, call: &Call<'_>, batch: &Batch, upsert: bool) -> Result<(), ApplyError> {
        for (index, record) in batch.iter().enumerate() {
            let selector = selector_of(record, index)?;
            let payload = payload_of(record, index)?;
            let result = call
                .store
                .update_one(call.namespace, selector, payload, upsert, &call.options)
                .await;
            Self::settle(call, OpKind::Update, upsert, index, record, result).await?;
        }
        Ok(())
    }

    async fn delete(&self, call: &Call<'_>, batch: &Batch) -> Result<(), ApplyError> {
        for (index, record) in batch.iter().enumerate() {
            let selector = selector_of(record, index)?;
            let result = call
                .store
                .delete_one(call.namespace, selector, &call.options)
                .await;
            Self::settle(call, OpKind::Delete, false, index, record, result).await?;
        }
        Ok(())
    }
}
