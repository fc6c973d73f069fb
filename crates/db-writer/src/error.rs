//! Aggregate errors returned by writer calls.

use bson::Bson;
use replay_core::{BatchError, Namespace, OpKind};
use target_store::{FailureKind, StoreError};
use thiserror::Error;

/// Which request produced a record failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The record's own insert, update or delete.
    Primary,
    /// The compensating write issued after the primary request failed.
    Compensation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Primary => write!(f, "primary"),
            Stage::Compensation => write!(f, "compensation"),
        }
    }
}

/// One uncompensated failure inside a bulk call.
#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record in the batch.
    pub index: usize,
    pub identity: Option<Bson>,
    pub stage: Stage,
    pub error: StoreError,
}

impl std::fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record {}", self.index)?;
        if let Some(identity) = &self.identity {
            write!(f, " (_id {identity})")?;
        }
        write!(f, " {} failed: {}", self.stage, self.error)
    }
}

/// The single error a writer call reports.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("{found} batch passed to {expected}")]
    KindMismatch { expected: OpKind, found: OpKind },

    /// Single mode stopped at `index`; later records were not attempted.
    #[error("{kind} on {namespace} failed at record {index}: {source}")]
    Record {
        namespace: Namespace,
        kind: OpKind,
        index: usize,
        identity: Option<Bson>,
        #[source]
        source: StoreError,
    },

    /// The primary grouped request failed before reporting per-record
    /// results, so the outcome of every record is unknown. Failures after
    /// that point are reported as [`ApplyError::Bulk`].
    #[error("bulk {kind} on {namespace} aborted: {source}")]
    Aborted {
        namespace: Namespace,
        kind: OpKind,
        #[source]
        source: StoreError,
    },

    /// Some records of a grouped request failed; the others committed.
    #[error(
        "bulk {kind} on {namespace}: {} of {attempted} records failed; first: {}",
        .failures.len(),
        first_failure(.failures)
    )]
    Bulk {
        namespace: Namespace,
        kind: OpKind,
        attempted: usize,
        failures: Vec<RecordFailure>,
    },
}

fn first_failure(failures: &[RecordFailure]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

impl ApplyError {
    /// Structured cause list of a bulk call; empty for other variants.
    pub fn failures(&self) -> &[RecordFailure] {
        match self {
            ApplyError::Bulk { failures, .. } => failures,
            _ => &[],
        }
    }

    /// Failure kinds of the store errors behind this error, one per failed
    /// record.
    pub fn failure_kinds(&self) -> Vec<FailureKind> {
        match self {
            ApplyError::Record { source, .. } | ApplyError::Aborted { source, .. } => {
                vec![source.kind()]
            }
            ApplyError::Bulk { failures, .. } => failures.iter().map(|f| f.error.kind()).collect(),
            ApplyError::InvalidBatch(_) | ApplyError::KindMismatch { .. } => Vec::new(),
        }
    }

    /// Position of the record a single-mode call stopped at.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            ApplyError::Record { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("writer_test", "a")
    }

    #[test]
    fn test_bulk_error_message() {
        let err = ApplyError::Bulk {
            namespace: ns(),
            kind: OpKind::Update,
            attempted: 3,
            failures: vec![RecordFailure {
                index: 0,
                identity: Some(Bson::Int32(3)),
                stage: Stage::Primary,
                error: StoreError::duplicate_key("E11000 duplicate key error"),
            }],
        };

        let message = err.to_string();
        assert!(message.starts_with("bulk update on writer_test.a: 1 of 3 records failed"));
        assert!(message.contains("record 0 (_id 3) primary failed"));
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failure_kinds(), vec![FailureKind::DuplicateKey]);
    }

    #[test]
    fn test_record_error() {
        let err = ApplyError::Record {
            namespace: ns(),
            kind: OpKind::Delete,
            index: 2,
            identity: None,
            source: StoreError::NotFound,
        };
        assert_eq!(err.failed_index(), Some(2));
        assert!(err.failures().is_empty());
        assert_eq!(err.failure_kinds(), vec![FailureKind::NotFound]);
        assert_eq!(
            err.to_string(),
            "delete on writer_test.a failed at record 2: no document matched the selector"
        );
    }
}
