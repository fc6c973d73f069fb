//! Conflict policy.
//!
//! Pure decision table mapping (operation kind, execution mode, upsert flag,
//! failure kind) to what the executor does with a failed record:
//!
//! | kind   | failure       | mode   | upsert | resolution            |
//! |--------|---------------|--------|--------|-----------------------|
//! | insert | duplicate key | any    | false  | swallow               |
//! | insert | duplicate key | any    | true   | replace by identity   |
//! | update | not found     | single | false  | propagate             |
//! | update | not found     | bulk   | false  | swallow               |
//! | update | not found     | any    | true   | insert payload        |
//! | update | duplicate key | single | any    | propagate             |
//! | update | duplicate key | bulk   | false  | propagate             |
//! | update | duplicate key | bulk   | true   | swallow               |
//! | delete | not found     | single | -      | propagate             |
//! | delete | not found     | bulk   | -      | swallow               |
//! | any    | other         | any    | any    | propagate             |
//!
//! Propagation aborts the call in single mode. In bulk mode the failure is
//! collected into the aggregate error while sibling records still commit.

use replay_core::OpKind;
use target_store::FailureKind;

/// Execution strategy of a writer, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// One request per record, in batch order.
    Single,
    /// One unordered grouped request per call.
    Bulk,
}

impl ExecutionMode {
    pub fn from_bulk(bulk: bool) -> Self {
        if bulk {
            ExecutionMode::Bulk
        } else {
            ExecutionMode::Single
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Single => "single",
            ExecutionMode::Bulk => "bulk",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow-up write issued in place of a failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    /// Full-document replace keyed by the record's identity, using the
    /// payload as new content.
    ReplaceByIdentity,
    /// Insert the payload as a new document.
    InsertPayload,
}

/// What to do with one failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Treat as already applied.
    Swallow,
    /// Issue a compensating write; its own failure is propagated.
    Compensate(Compensation),
    /// Report the failure to the caller.
    Propagate,
}

pub fn resolve(kind: OpKind, mode: ExecutionMode, upsert: bool, failure: FailureKind) -> Resolution {
    use ExecutionMode::{Bulk, Single};
    use FailureKind::{DuplicateKey, NotFound, Other};

    match (kind, failure, mode, upsert) {
        (_, Other, _, _) => Resolution::Propagate,

        (OpKind::Insert, DuplicateKey, _, false) => Resolution::Swallow,
        (OpKind::Insert, DuplicateKey, _, true) => {
            Resolution::Compensate(Compensation::ReplaceByIdentity)
        }
        (OpKind::Insert, NotFound, _, _) => Resolution::Propagate,

        (OpKind::Update, NotFound, _, true) => Resolution::Compensate(Compensation::InsertPayload),
        (OpKind::Update, NotFound, Single, false) => Resolution::Propagate,
        (OpKind::Update, NotFound, Bulk, false) => Resolution::Swallow,
        (OpKind::Update, DuplicateKey, Single, _) => Resolution::Propagate,
        (OpKind::Update, DuplicateKey, Bulk, false) => Resolution::Propagate,
        (OpKind::Update, DuplicateKey, Bulk, true) => Resolution::Swallow,

        // Deletes have no upsert fallback.
        (OpKind::Delete, NotFound, Single, _) => Resolution::Propagate,
        (OpKind::Delete, NotFound, Bulk, _) => Resolution::Swallow,
        (OpKind::Delete, DuplicateKey, _, _) => Resolution::Propagate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionMode::{Bulk, Single};
    use FailureKind::{DuplicateKey, NotFound, Other};

    const MODES: [ExecutionMode; 2] = [Single, Bulk];
    const KINDS: [OpKind; 3] = [OpKind::Insert, OpKind::Update, OpKind::Delete];

    #[test]
    fn test_other_failures_always_propagate() {
        for kind in KINDS {
            for mode in MODES {
                for upsert in [false, true] {
                    assert_eq!(resolve(kind, mode, upsert, Other), Resolution::Propagate);
                }
            }
        }
    }

    #[test]
    fn test_insert_duplicate_key() {
        for mode in MODES {
            assert_eq!(
                resolve(OpKind::Insert, mode, false, DuplicateKey),
                Resolution::Swallow
            );
            assert_eq!(
                resolve(OpKind::Insert, mode, true, DuplicateKey),
                Resolution::Compensate(Compensation::ReplaceByIdentity)
            );
        }
    }

    #[test]
    fn test_update_not_found() {
        assert_eq!(
            resolve(OpKind::Update, Single, false, NotFound),
            Resolution::Propagate
        );
        assert_eq!(
            resolve(OpKind::Update, Bulk, false, NotFound),
            Resolution::Swallow
        );
        for mode in MODES {
            assert_eq!(
                resolve(OpKind::Update, mode, true, NotFound),
                Resolution::Compensate(Compensation::InsertPayload)
            );
        }
    }

    #[test]
    fn test_update_duplicate_key() {
        assert_eq!(
            resolve(OpKind::Update, Single, false, DuplicateKey),
            Resolution::Propagate
        );
        assert_eq!(
            resolve(OpKind::Update, Single, true, DuplicateKey),
            Resolution::Propagate
        );
        assert_eq!(
            resolve(OpKind::Update, Bulk, false, DuplicateKey),
            Resolution::Propagate
        );
        assert_eq!(
            resolve(OpKind::Update, Bulk, true, DuplicateKey),
            Resolution::Swallow
        );
    }

    #[test]
    fn test_delete_not_found_ignores_upsert() {
        for upsert in [false, true] {
            assert_eq!(
                resolve(OpKind::Delete, Single, upsert, NotFound),
                Resolution::Propagate
            );
            assert_eq!(
                resolve(OpKind::Delete, Bulk, upsert, NotFound),
                Resolution::Swallow
            );
        }
    }

    #[test]
    fn test_execution_mode_from_bulk() {
        assert_eq!(ExecutionMode::from_bulk(true), Bulk);
        assert_eq!(ExecutionMode::from_bulk(false), Single);
        assert_eq!(Bulk.to_string(), "bulk");
    }
}
