//! Bulk mode: one unordered grouped request per call.
//!
//! Failed records are resolved after the group completes. Compensating
//! writes are gathered into a second unordered request. Whatever remains
//! unresolved is reported together in [`ApplyError::Bulk`].
//!
//! Only a failure of the primary request before it reports per-operation
//! results yields [`ApplyError::Aborted`]. A failed compensating request
//! is collected as a compensation failure of every record it carried.

use crate::error::{ApplyError, RecordFailure, Stage};
use crate::policy::{resolve, Compensation, ExecutionMode, Resolution};
use crate::writer::{payload_of, selector_of, Call, Executor};
use async_trait::async_trait;
use replay_core::{Batch, OpKind};
use target_store::{StoreError, UnorderedOutcome, UnorderedRequest};

pub(crate) struct BulkExecutor;

/// Follow-up writes and the batch positions they stand in for.
#[derive(Default)]
struct Compensations {
    request: UnorderedRequest,
    origins: Vec<usize>,
}

impl Compensations {
    fn push(&mut self, batch: &Batch, index: usize, compensation: Compensation) -> bool {
        let Some(record) = batch.get(index) else {
            return false;
        };
        let Some(payload) = record.payload() else {
            return false;
        };
        match compensation {
            Compensation::ReplaceByIdentity => {
                let Some(selector) = record.identity_selector() else {
                    return false;
                };
                self.request.replace(selector, payload.clone());
            }
            Compensation::InsertPayload => {
                self.request.insert(payload.clone());
            }
        }
        self.origins.push(index);
        true
    }

    fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl BulkExecutor {
    async fn execute(
        call: &Call<'_>,
        kind: OpKind,
        upsert: bool,
        batch: &Batch,
        request: UnorderedRequest,
    ) -> Result<(), ApplyError> {
        let outcome = Self::run(call, request, batch.len())
            .await
            .map_err(|source| call.aborted(kind, source))?;

        let mut failures = Vec::new();
        let mut compensations = Compensations::default();
        let mut swallowed = 0usize;

        for (index, result) in outcome.into_results().into_iter().enumerate() {
            let Err(err) = result else {
                continue;
            };
            match resolve(kind, ExecutionMode::Bulk, upsert, err.kind()) {
                Resolution::Swallow => {
                    tracing::debug!(
                        "Ignoring {} failure of {} record {} in {}: {}",
                        err.kind(),
                        kind,
                        index,
                        call.namespace,
                        err
                    );
                    swallowed += 1;
                }
                Resolution::Compensate(compensation) => {
                    if !compensations.push(batch, index, compensation) {
                        failures.push(Self::failure(batch, index, Stage::Primary, err));
                    }
                }
                Resolution::Propagate => {
                    failures.push(Self::failure(batch, index, Stage::Primary, err));
                }
            }
        }

        if swallowed > 0 {
            tracing::debug!(
                "Ignored {} conflicting {} records in {}",
                swallowed,
                kind,
                call.namespace
            );
        }

        if !compensations.is_empty() {
            tracing::info!(
                "Issuing {} compensating writes for {} batch in {}",
                compensations.origins.len(),
                kind,
                call.namespace
            );
            let Compensations { request, origins } = compensations;
            match Self::run(call, request, origins.len()).await {
                Ok(outcome) => {
                    for (origin, result) in origins.into_iter().zip(outcome.into_results()) {
                        if let Err(err) = result {
                            failures.push(Self::failure(batch, origin, Stage::Compensation, err));
                        }
                    }
                }
                // Primary writes already committed; every compensated record
                // stays unresolved.
                Err(err) => {
                    tracing::warn!(
                        "Compensating request for {} batch in {} failed: {}",
                        kind,
                        call.namespace,
                        err
                    );
                    let message = err.to_string();
                    for origin in origins {
                        failures.push(Self::failure(
                            batch,
                            origin,
                            Stage::Compensation,
                            StoreError::other(&message),
                        ));
                    }
                }
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        failures.sort_by_key(|f| f.index);
        Err(ApplyError::Bulk {
            namespace: call.namespace.clone(),
            kind,
            attempted: batch.len(),
            failures,
        })
    }

    /// Run one grouped request and check it reported a result per operation.
    async fn run(
        call: &Call<'_>,
        request: UnorderedRequest,
        expected: usize,
    ) -> Result<UnorderedOutcome, StoreError> {
        let outcome = call
            .store
            .run_unordered(call.namespace, request, &call.options)
            .await?;

        if outcome.len() != expected {
            return Err(StoreError::other(format!(
                "grouped request returned {} results for {} operations",
                outcome.len(),
                expected
            )));
        }
        Ok(outcome)
    }

    fn failure(batch: &Batch, index: usize, stage: Stage, error: StoreError) -> RecordFailure {
        RecordFailure {
            index,
            identity: batch.get(index).and_then(|r| r.identity().cloned()),
            stage,
            error,
        }
    }
}

#[async_trait]
impl Executor for BulkExecutor {
    async fn insert(&self, call: &Call<'_>, batch: &Batch, upsert: bool) -> Result<(), ApplyError> {
        let mut request = UnorderedRequest::with_capacity(batch.len());
        for (index, record) in batch.iter().enumerate() {
            request.insert(payload_of(record, index)?.clone());
        }
        Self::execute(call, OpKind::Insert, upsert, batch, request).await
    }

    async fn update(&self, call: &Call<'_>, batch: &Batch, upsert: bool) -> Result<(), ApplyError> {
        let mut request = UnorderedRequest::with_capacity(batch.len());
        for (index, record) in batch.iter().enumerate() {
            let selector = selector_of(record, index)?;
            let payload = payload_of(record, index)?;
            request.update(selector.clone(), payload.clone(), upsert);
        }
        Self::execute(call, OpKind::Update, upsert, batch, request).await
    }

    async fn delete(&self, call: &Call<'_>, batch: &Batch) -> Result<(), ApplyError> {
        let mut request = UnorderedRequest::with_capacity(batch.len());
        for (index, record) in batch.iter().enumerate() {
            request.delete(selector_of(record, index)?.clone());
        }
        Self::execute(call, OpKind::Delete, false, batch, request).await
    }
}
