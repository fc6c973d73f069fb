//! Call targets and pass-through write options.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A (database, collection) pair identifying the target of one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Store-level settings forwarded verbatim to every store call.
///
/// Keys are top-level fields of the write command (for example
/// `writeConcern` or `bypassDocumentValidation`). The executor never
/// inspects them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions(Document);

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single option, replacing any previous value for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Overlay `other` on top of `self`; keys present in `other` win.
    pub fn merged(&self, other: &WriteOptions) -> WriteOptions {
        let mut merged = self.0.clone();
        for (key, value) in other.0.iter() {
            merged.insert(key.clone(), value.clone());
        }
        WriteOptions(merged)
    }

    /// Copy every option into `command`. Fields already set on `command`
    /// are kept, so the command name stays the first field.
    pub fn apply_to(&self, command: &mut Document) {
        for (key, value) in self.0.iter() {
            if !command.contains_key(key) {
                command.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Document> for WriteOptions {
    fn from(doc: Document) -> Self {
        Self(doc)
    }
}
