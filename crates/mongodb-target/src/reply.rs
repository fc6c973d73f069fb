//! Write command replies and error classification.

use bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};
use serde::Deserialize;
use target_store::{is_duplicate_key_code, StoreError};

/// Reply of an `insert`, `update` or `delete` command.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WriteReply {
    /// Documents inserted, matched (including upserts) or deleted.
    #[serde(default)]
    pub n: i64,
    #[serde(default)]
    pub upserted: Vec<UpsertedEntry>,
    #[serde(rename = "writeErrors", default)]
    pub write_errors: Vec<WriteErrorEntry>,
    #[serde(rename = "writeConcernError")]
    pub write_concern_error: Option<WriteConcernErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpsertedEntry {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WriteErrorEntry {
    /// Position of the failed statement within the command.
    pub index: usize,
    pub code: i32,
    #[serde(default)]
    pub errmsg: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WriteConcernErrorEntry {
    pub code: i32,
    #[serde(default)]
    pub errmsg: String,
}

impl WriteReply {
    pub fn parse(reply: Document) -> Result<Self, StoreError> {
        bson::from_document(reply)
            .map_err(|e| StoreError::other(format!("Malformed write command reply: {e}")))
    }

    pub fn matched_nothing(&self) -> bool {
        self.n == 0 && self.upserted.is_empty()
    }
}

impl WriteErrorEntry {
    pub fn into_store_error(self) -> StoreError {
        if is_duplicate_key_code(self.code) {
            StoreError::DuplicateKey {
                code: self.code,
                message: self.errmsg,
            }
        } else {
            StoreError::other(format!("write error {}: {}", self.code, self.errmsg))
        }
    }
}

impl WriteConcernErrorEntry {
    pub fn to_store_error(&self) -> StoreError {
        StoreError::other(format!(
            "write concern error {}: {}",
            self.code, self.errmsg
        ))
    }
}

/// Classify a driver error, keeping duplicate-key failures distinguishable.
pub(crate) fn classify_driver_error(err: mongodb::error::Error) -> StoreError {
    let duplicate = match err.kind.as_ref() {
        ErrorKind::Command(cmd) if is_duplicate_key_code(cmd.code) => {
            Some((cmd.code, cmd.message.clone()))
        }
        ErrorKind::Write(WriteFailure::WriteError(write)) if is_duplicate_key_code(write.code) => {
            Some((write.code, write.message.clone()))
        }
        _ => None,
    };

    match duplicate {
        Some((code, message)) => StoreError::DuplicateKey { code, message },
        None => StoreError::Other(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_parse_successful_insert_reply() {
        let reply = WriteReply::parse(doc! { "n": 5, "ok": 1.0 }).unwrap();
        assert_eq!(reply.n, 5);
        assert!(reply.write_errors.is_empty());
        assert!(reply.write_concern_error.is_none());
    }

    #[test]
    fn test_parse_write_errors() {
        let reply = WriteReply::parse(doc! {
            "n": 3,
            "writeErrors": [
                { "index": 0, "code": 11000, "errmsg": "E11000 duplicate key error" },
                { "index": 1, "code": 11000, "errmsg": "E11000 duplicate key error" },
            ],
            "ok": 1.0,
        })
        .unwrap();

        assert_eq!(reply.write_errors.len(), 2);
        assert_eq!(reply.write_errors[1].index, 1);
        let err = reply.write_errors.into_iter().next().unwrap().into_store_error();
        assert!(matches!(err, StoreError::DuplicateKey { code: 11000, .. }));
    }

    #[test]
    fn test_non_duplicate_write_error_is_other() {
        let entry = WriteErrorEntry {
            index: 0,
            code: 121,
            errmsg: "Document failed validation".to_string(),
        };
        assert!(matches!(entry.into_store_error(), StoreError::Other(_)));
    }

    #[test]
    fn test_update_reply_matched_nothing() {
        let none = WriteReply::parse(doc! { "n": 0, "nModified": 0, "ok": 1.0 }).unwrap();
        assert!(none.matched_nothing());

        let upserted = WriteReply::parse(doc! {
            "n": 1,
            "nModified": 0,
            "upserted": [{ "index": 0, "_id": 6 }],
            "ok": 1.0,
        })
        .unwrap();
        assert!(!upserted.matched_nothing());
        assert_eq!(upserted.upserted[0].index, 0);
    }

    #[test]
    fn test_parse_write_concern_error() {
        let reply = WriteReply::parse(doc! {
            "n": 1,
            "writeConcernError": { "code": 64, "errmsg": "waiting for replication timed out" },
            "ok": 1.0,
        })
        .unwrap();
        let err = reply.write_concern_error.unwrap().to_store_error();
        assert!(err.to_string().contains("replication timed out"));
    }
}
