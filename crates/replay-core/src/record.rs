//! Change records extracted from the source operation log.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Field holding a document's unique key.
pub const IDENTITY_FIELD: &str = "_id";

/// Operation kind of a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Insert,
    Update,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical operation extracted from the source log.
///
/// The constructors fix which of `selector` and `payload` are present for
/// each kind, so a record can never be built in an invalid shape:
///
/// | kind   | selector | payload |
/// |--------|----------|---------|
/// | insert | -        | yes     |
/// | update | yes      | yes     |
/// | delete | yes      | -       |
///
/// Update payloads replace the whole matched document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    kind: OpKind,
    selector: Option<Document>,
    payload: Option<Document>,
}

impl ChangeRecord {
    pub fn insert(payload: Document) -> Self {
        Self {
            kind: OpKind::Insert,
            selector: None,
            payload: Some(payload),
        }
    }

    pub fn update(selector: Document, payload: Document) -> Self {
        Self {
            kind: OpKind::Update,
            selector: Some(selector),
            payload: Some(payload),
        }
    }

    pub fn delete(selector: Document) -> Self {
        Self {
            kind: OpKind::Delete,
            selector: Some(selector),
            payload: None,
        }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn selector(&self) -> Option<&Document> {
        self.selector.as_ref()
    }

    pub fn payload(&self) -> Option<&Document> {
        self.payload.as_ref()
    }

    /// The record's unique key value.
    ///
    /// Taken from the payload for inserts and from the selector for
    /// updates and deletes. `None` when that document has no `_id`.
    pub fn identity(&self) -> Option<&Bson> {
        let source = match self.kind {
            OpKind::Insert => self.payload.as_ref(),
            OpKind::Update | OpKind::Delete => self.selector.as_ref(),
        };
        source.and_then(|doc| doc.get(IDENTITY_FIELD))
    }

    /// Selector addressing this record's identity, if it has one.
    pub fn identity_selector(&self) -> Option<Document> {
        self.identity().map(|id| {
            let mut selector = Document::new();
            selector.insert(IDENTITY_FIELD, id.clone());
            selector
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_insert_identity_comes_from_payload() {
        let record = ChangeRecord::insert(doc! { "_id": 1, "x": 1 });
        assert_eq!(record.kind(), OpKind::Insert);
        assert!(record.selector().is_none());
        assert_eq!(record.identity(), Some(&Bson::Int32(1)));
    }

    #[test]
    fn test_update_identity_comes_from_selector() {
        let record = ChangeRecord::update(doc! { "_id": 7 }, doc! { "_id": 7, "x": 70 });
        assert_eq!(record.identity(), Some(&Bson::Int32(7)));
        assert_eq!(record.identity_selector(), Some(doc! { "_id": 7 }));
    }

    #[test]
    fn test_delete_has_no_payload() {
        let record = ChangeRecord::delete(doc! { "_id": "a" });
        assert!(record.payload().is_none());
        assert_eq!(record.identity(), Some(&Bson::String("a".to_string())));
    }

    #[test]
    fn test_missing_identity() {
        let record = ChangeRecord::update(doc! { "email": "a@b" }, doc! { "email": "a@b" });
        assert!(record.identity().is_none());
        assert!(record.identity_selector().is_none());
    }

    #[test]
    fn test_op_kind_display() {
        assert_eq!(OpKind::Insert.to_string(), "insert");
        assert_eq!(OpKind::Update.to_string(), "update");
        assert_eq!(OpKind::Delete.to_string(), "delete");
    }
}
