//! Write command builders.

use bson::{doc, Document};
use replay_core::{Namespace, WriteOptions};

pub(crate) fn insert_command(
    ns: &Namespace,
    documents: Vec<Document>,
    ordered: bool,
    options: &WriteOptions,
) -> Document {
    let mut command = doc! {
        "insert": ns.collection.as_str(),
        "documents": documents,
        "ordered": ordered,
    };
    options.apply_to(&mut command);
    command
}

pub(crate) fn update_command(
    ns: &Namespace,
    statements: Vec<Document>,
    ordered: bool,
    options: &WriteOptions,
) -> Document {
    let mut command = doc! {
        "update": ns.collection.as_str(),
        "updates": statements,
        "ordered": ordered,
    };
    options.apply_to(&mut command);
    command
}

pub(crate) fn delete_command(
    ns: &Namespace,
    statements: Vec<Document>,
    ordered: bool,
    options: &WriteOptions,
) -> Document {
    let mut command = doc! {
        "delete": ns.collection.as_str(),
        "deletes": statements,
        "ordered": ordered,
    };
    options.apply_to(&mut command);
    command
}

/// Replacement statement; `payload` has no update operators so the server
/// replaces the whole matched document.
pub(crate) fn replace_statement(selector: Document, payload: Document, upsert: bool) -> Document {
    doc! {
        "q": selector,
        "u": payload,
        "upsert": upsert,
        "multi": false,
    }
}

pub(crate) fn delete_statement(selector: Document) -> Document {
    doc! {
        "q": selector,
        "limit": 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("writer_test", "a")
    }

    #[test]
    fn test_insert_command_shape() {
        let opts = WriteOptions::new().with("writeConcern", doc! { "w": 1 });
        let command = insert_command(&ns(), vec![doc! { "_id": 1, "x": 1 }], false, &opts);

        assert_eq!(command.keys().next().map(String::as_str), Some("insert"));
        assert_eq!(command.get_str("insert").unwrap(), "a");
        assert_eq!(command.get_array("documents").unwrap().len(), 1);
        assert!(!command.get_bool("ordered").unwrap());
        assert_eq!(command.get_document("writeConcern").unwrap(), &doc! { "w": 1 });
    }

    #[test]
    fn test_options_cannot_reorder_grouped_commands() {
        let opts = WriteOptions::new().with("ordered", true);
        let command = delete_command(&ns(), vec![delete_statement(doc! { "_id": 1 })], false, &opts);
        assert!(!command.get_bool("ordered").unwrap());
    }

    #[test]
    fn test_replace_statement() {
        let stmt = replace_statement(doc! { "_id": 3 }, doc! { "_id": 3, "x": 5 }, true);
        assert_eq!(
            stmt,
            doc! { "q": { "_id": 3 }, "u": { "_id": 3, "x": 5 }, "upsert": true, "multi": false }
        );
    }

    #[test]
    fn test_update_command_statements() {
        let command = update_command(
            &ns(),
            vec![
                replace_statement(doc! { "_id": 1 }, doc! { "_id": 1 }, false),
                replace_statement(doc! { "_id": 2 }, doc! { "_id": 2 }, false),
            ],
            true,
            &WriteOptions::new(),
        );
        assert_eq!(command.get_array("updates").unwrap().len(), 2);
        assert!(command.get_bool("ordered").unwrap());
    }
}
