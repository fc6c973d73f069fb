//! Unordered grouped requests.

use crate::error::StoreError;
use bson::Document;
use replay_core::OpKind;

/// One queued operation of an [`UnorderedRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum UnorderedOp {
    Insert {
        payload: Document,
    },
    /// Full-document replacement of the first match.
    Update {
        selector: Document,
        payload: Document,
        upsert: bool,
    },
    Delete {
        selector: Document,
    },
}

impl UnorderedOp {
    pub fn kind(&self) -> OpKind {
        match self {
            UnorderedOp::Insert { .. } => OpKind::Insert,
            UnorderedOp::Update { .. } => OpKind::Update,
            UnorderedOp::Delete { .. } => OpKind::Delete,
        }
    }
}

/// A group of operations executed without ordering guarantees.
///
/// Each operation succeeds or fails on its own; a failure never stops
/// sibling operations from being applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnorderedRequest {
    ops: Vec<UnorderedOp>,
}

impl UnorderedRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, payload: Document) -> &mut Self {
        self.ops.push(UnorderedOp::Insert { payload });
        self
    }

    pub fn update(&mut self, selector: Document, payload: Document, upsert: bool) -> &mut Self {
        self.ops.push(UnorderedOp::Update {
            selector,
            payload,
            upsert,
        });
        self
    }

    /// Upserting full-document replace.
    pub fn replace(&mut self, selector: Document, payload: Document) -> &mut Self {
        self.update(selector, payload, true)
    }

    pub fn delete(&mut self, selector: Document) -> &mut Self {
        self.ops.push(UnorderedOp::Delete { selector });
        self
    }

    pub fn ops(&self) -> &[UnorderedOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<UnorderedOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Per-operation results of an unordered request, in queue order.
#[derive(Debug, Default)]
pub struct UnorderedOutcome {
    results: Vec<Result<(), StoreError>>,
}

impl UnorderedOutcome {
    pub fn new(results: Vec<Result<(), StoreError>>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[Result<(), StoreError>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Result<(), StoreError>> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }
}
