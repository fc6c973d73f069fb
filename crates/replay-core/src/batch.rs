//! Homogeneous batches of change records.

use crate::record::{ChangeRecord, OpKind};
use bson::{Bson, Document};
use std::collections::HashMap;
use thiserror::Error;

/// Reasons a batch cannot be built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("batch must contain at least one record")]
    Empty,

    #[error("record {index} is a {found}, batch holds {expected} records")]
    MixedKinds {
        index: usize,
        expected: OpKind,
        found: OpKind,
    },

    #[error("record {index} has no {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("records {first} and {second} target the same identity {identity}")]
    DuplicateIdentity {
        first: usize,
        second: usize,
        identity: String,
    },
}

/// Key under which two identities collide. Numbers compare by magnitude
/// regardless of width, as the store compares unique keys. NaN equals
/// nothing, so it has no key.
fn identity_key(identity: &Bson) -> Option<String> {
    let number = match identity {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(d) if d.is_nan() => return None,
        Bson::Double(d) => *d,
        other => return Some(other.to_string()),
    };
    // -0.0 and 0.0 are the same key
    Some(format!("number:{:?}", number + 0.0))
}

/// An ordered sequence of change records sharing one operation kind.
///
/// The target namespace is supplied with each call rather than stored here.
/// Two records targeting the same identity would make per-record conflict
/// handling ambiguous in bulk mode, so construction rejects them.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    kind: OpKind,
    records: Vec<ChangeRecord>,
}

impl Batch {
    pub fn new(kind: OpKind, records: Vec<ChangeRecord>) -> Result<Self, BatchError> {
        if records.is_empty() {
            return Err(BatchError::Empty);
        }

        let mut seen: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if record.kind() != kind {
                return Err(BatchError::MixedKinds {
                    index,
                    expected: kind,
                    found: record.kind(),
                });
            }
            let Some(identity) = record.identity() else {
                continue;
            };
            let Some(key) = identity_key(identity) else {
                continue;
            };
            if let Some(&first) = seen.get(&key) {
                return Err(BatchError::DuplicateIdentity {
                    first,
                    second: index,
                    identity: identity.to_string(),
                });
            }
            seen.insert(key, index);
        }

        Ok(Self { kind, records })
    }

    /// Build an insert batch from full documents.
    pub fn inserts<I>(payloads: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = Document>,
    {
        let records = payloads.into_iter().map(ChangeRecord::insert).collect();
        Self::new(OpKind::Insert, records)
    }

    /// Build an update batch from `(selector, payload)` pairs.
    pub fn updates<I>(changes: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = (Document, Document)>,
    {
        let records = changes
            .into_iter()
            .map(|(selector, payload)| ChangeRecord::update(selector, payload))
            .collect();
        Self::new(OpKind::Update, records)
    }

    /// Build a delete batch from selectors.
    pub fn deletes<I>(selectors: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = Document>,
    {
        let records = selectors.into_iter().map(ChangeRecord::delete).collect();
        Self::new(OpKind::Delete, records)
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`; batches are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ChangeRecord> {
        self.records.get(index)
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
