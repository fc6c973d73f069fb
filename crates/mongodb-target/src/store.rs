//! `TargetStore` implementation over MongoDB write commands.

use crate::command::{
    delete_command, delete_statement, insert_command, replace_statement, update_command,
};
use crate::reply::{classify_driver_error, WriteReply};
use async_trait::async_trait;
use bson::Document;
use mongodb::Client;
use replay_core::{Namespace, OpKind, WriteOptions};
use target_store::{StoreError, TargetStore, UnorderedOp, UnorderedOutcome, UnorderedRequest};

/// Maximum number of statements the server accepts in one write command.
pub const MAX_WRITE_BATCH_SIZE: usize = 100_000;

/// Maximum BSON size of a command body sent through `run_command`.
pub const MAX_BSON_OBJECT_SIZE: usize = 16 * 1024 * 1024;

/// Room kept for the command name, flags and pass-through options.
const COMMAND_OVERHEAD: usize = 16 * 1024;

/// Array element header of one statement: type byte, decimal index, NUL.
const STATEMENT_OVERHEAD: usize = 8;

/// MongoDB target store.
///
/// Grouped requests are split by operation kind into `ordered: false`
/// write commands. The server reports write errors per statement index but
/// no per-statement match counts for grouped updates and deletes, so a
/// non-matching grouped statement is reported as success.
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn run_command(&self, ns: &Namespace, command: Document) -> Result<WriteReply, StoreError> {
        let reply = self
            .client
            .database(&ns.database)
            .run_command(command)
            .await
            .map_err(classify_driver_error)?;
        WriteReply::parse(reply)
    }

    /// Run a command carrying exactly one statement.
    async fn run_single(&self, ns: &Namespace, command: Document) -> Result<WriteReply, StoreError> {
        let mut reply = self.run_command(ns, command).await?;
        if let Some(write_error) = reply.write_errors.pop() {
            return Err(write_error.into_store_error());
        }
        if let Some(wce) = &reply.write_concern_error {
            return Err(wce.to_store_error());
        }
        Ok(reply)
    }
}

/// Record a grouped command's reply against the queue positions of its
/// statements.
fn apply_reply(reply: WriteReply, positions: &[usize], results: &mut [Result<(), StoreError>]) {
    if let Some(wce) = &reply.write_concern_error {
        for &position in positions {
            results[position] = Err(wce.to_store_error());
        }
    }
    for entry in reply.write_errors {
        match positions.get(entry.index) {
            Some(&position) => results[position] = Err(entry.into_store_error()),
            None => tracing::warn!(
                "Ignoring write error for out-of-range statement index {}",
                entry.index
            ),
        }
    }
}

/// Encoded size of a statement inside a command's statement array.
fn statement_size(statement: &Document) -> usize {
    // A statement that cannot be encoded fails with the command anyway.
    let encoded = bson::to_vec(statement).map_or(0, |bytes| bytes.len());
    encoded + STATEMENT_OVERHEAD
}

/// Split statements into commands holding at most `max_count` statements
/// and at most `max_bytes` of encoded statements. A statement larger than
/// `max_bytes` on its own is sent alone and left for the server to reject.
fn into_chunks<T>(
    items: Vec<T>,
    max_count: usize,
    max_bytes: usize,
    size_of: impl Fn(&T) -> usize,
) -> Vec<Vec<T>> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes = 0usize;

    for item in items {
        let size = size_of(&item);
        let full = current.len() >= max_count || current_bytes.saturating_add(size) > max_bytes;
        if full && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(item);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl TargetStore for MongoStore {
    async fn insert_one(
        &self,
        ns: &Namespace,
        payload: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let command = insert_command(ns, vec![payload.clone()], true, options);
        self.run_single(ns, command).await?;
        Ok(())
    }

    async fn replace_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        payload: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        self.update_one(ns, selector, payload, true, options).await
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        payload: &Document,
        upsert: bool,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let statement = replace_statement(selector.clone(), payload.clone(), upsert);
        let command = update_command(ns, vec![statement], true, options);
        let reply = self.run_single(ns, command).await?;
        if reply.matched_nothing() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let command = delete_command(ns, vec![delete_statement(selector.clone())], true, options);
        let reply = self.run_single(ns, command).await?;
        if reply.n == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn run_unordered(
        &self,
        ns: &Namespace,
        request: UnorderedRequest,
        options: &WriteOptions,
    ) -> Result<UnorderedOutcome, StoreError> {
        let total = request.len();
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();
        for (position, op) in request.into_ops().into_iter().enumerate() {
            match op {
                UnorderedOp::Insert { payload } => inserts.push((position, payload)),
                UnorderedOp::Update {
                    selector,
                    payload,
                    upsert,
                } => updates.push((position, replace_statement(selector, payload, upsert))),
                UnorderedOp::Delete { selector } => {
                    deletes.push((position, delete_statement(selector)))
                }
            }
        }

        let mut results: Vec<Result<(), StoreError>> = (0..total).map(|_| Ok(())).collect();
        let mut reported = false;

        for (kind, statements) in [
            (OpKind::Insert, inserts),
            (OpKind::Update, updates),
            (OpKind::Delete, deletes),
        ] {
            let chunks = into_chunks(
                statements,
                MAX_WRITE_BATCH_SIZE,
                MAX_BSON_OBJECT_SIZE - COMMAND_OVERHEAD,
                |(_, statement)| statement_size(statement),
            );
            for chunk in chunks {
                let (positions, docs): (Vec<usize>, Vec<Document>) = chunk.into_iter().unzip();
                tracing::debug!(
                    "Running unordered {} command on {} with {} statements",
                    kind,
                    ns,
                    docs.len()
                );
                let command = match kind {
                    OpKind::Insert => insert_command(ns, docs, false, options),
                    OpKind::Update => update_command(ns, docs, false, options),
                    OpKind::Delete => delete_command(ns, docs, false, options),
                };

                match self.run_command(ns, command).await {
                    Ok(reply) => {
                        apply_reply(reply, &positions, &mut results);
                        reported = true;
                    }
                    // Nothing has been reported yet, so the whole request failed
                    Err(err) if !reported => return Err(err),
                    Err(err) => {
                        let message = err.to_string();
                        for &position in &positions {
                            results[position] = Err(StoreError::other(&message));
                        }
                    }
                }
            }
        }

        Ok(UnorderedOutcome::new(results))
    }
}
