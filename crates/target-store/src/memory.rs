//! In-process target store.
//!
//! `MemoryStore` keeps collections as plain document vectors and enforces
//! unique indexes the way the server does, so executor behaviour can be
//! exercised without a running database. Selectors are matched by
//! top-level field equality.
//!
//! Fault injection:
//! - [`MemoryStore::fail_identity`] makes every operation touching an
//!   identity fail with [`StoreError::Other`]
//! - [`MemoryStore::fail_next_unordered`] makes the next grouped request
//!   fail before any per-operation result is produced

use crate::error::StoreError;
use crate::request::{UnorderedOp, UnorderedOutcome, UnorderedRequest};
use crate::traits::TargetStore;
use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use replay_core::{Namespace, WriteOptions, IDENTITY_FIELD};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemCollection {
    docs: Vec<Document>,
    /// Unique fields besides `_id`.
    unique_fields: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<Namespace, MemCollection>,
    failing: HashMap<Namespace, Vec<Bson>>,
    abort_next: HashSet<Namespace>,
    single_requests: usize,
    unordered_requests: usize,
    last_options: Option<WriteOptions>,
}

/// In-memory [`TargetStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce uniqueness of `field` in `ns`.
    pub async fn create_unique_index(&self, ns: &Namespace, field: &str) {
        let mut state = self.state.lock().await;
        let coll = state.collections.entry(ns.clone()).or_default();
        if !coll.unique_fields.iter().any(|f| f == field) {
            coll.unique_fields.push(field.to_string());
        }
    }

    /// Every operation on `identity` in `ns` fails with an `Other` error.
    pub async fn fail_identity(&self, ns: &Namespace, identity: impl Into<Bson>) {
        let mut state = self.state.lock().await;
        state
            .failing
            .entry(ns.clone())
            .or_default()
            .push(identity.into());
    }

    /// The next grouped request against `ns` fails before reporting results.
    pub async fn fail_next_unordered(&self, ns: &Namespace) {
        self.state.lock().await.abort_next.insert(ns.clone());
    }

    /// Documents of `ns` sorted by `_id`.
    pub async fn documents(&self, ns: &Namespace) -> Vec<Document> {
        let state = self.state.lock().await;
        let mut docs = state
            .collections
            .get(ns)
            .map(|c| c.docs.clone())
            .unwrap_or_default();
        docs.sort_by(|a, b| match (a.get(IDENTITY_FIELD), b.get(IDENTITY_FIELD)) {
            (Some(x), Some(y)) => compare_values(x, y),
            _ => Ordering::Equal,
        });
        docs
    }

    pub async fn count(&self, ns: &Namespace) -> usize {
        let state = self.state.lock().await;
        state.collections.get(ns).map_or(0, |c| c.docs.len())
    }

    /// Drop every document and index of `ns`.
    pub async fn drop_collection(&self, ns: &Namespace) {
        self.state.lock().await.collections.remove(ns);
    }

    /// Number of single-operation requests served.
    pub async fn single_requests(&self) -> usize {
        self.state.lock().await.single_requests
    }

    /// Number of grouped requests served, including aborted ones.
    pub async fn unordered_requests(&self) -> usize {
        self.state.lock().await.unordered_requests
    }

    /// Options forwarded with the most recent request.
    pub async fn last_options(&self) -> Option<WriteOptions> {
        self.state.lock().await.last_options.clone()
    }
}

impl State {
    fn check_injected(&self, ns: &Namespace, identity: Option<&Bson>) -> Result<(), StoreError> {
        let (Some(identity), Some(failing)) = (identity, self.failing.get(ns)) else {
            return Ok(());
        };
        if failing.iter().any(|f| same_value(f, identity)) {
            tracing::debug!("Injected failure for identity {} in {}", identity, ns);
            return Err(StoreError::other(format!(
                "injected failure for identity {identity} in {ns}"
            )));
        }
        Ok(())
    }

    fn apply(&mut self, ns: &Namespace, op: &UnorderedOp) -> Result<(), StoreError> {
        let identity = match op {
            UnorderedOp::Insert { payload } => payload.get(IDENTITY_FIELD),
            UnorderedOp::Update { selector, .. } | UnorderedOp::Delete { selector } => {
                selector.get(IDENTITY_FIELD)
            }
        };
        self.check_injected(ns, identity)?;

        let coll = self.collections.entry(ns.clone()).or_default();
        match op {
            UnorderedOp::Insert { payload } => coll.insert(ns, payload.clone()),
            UnorderedOp::Update {
                selector,
                payload,
                upsert,
            } => coll.replace(ns, selector, payload, *upsert),
            UnorderedOp::Delete { selector } => coll.delete(selector),
        }
    }

    fn single(
        &mut self,
        ns: &Namespace,
        op: &UnorderedOp,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        self.single_requests += 1;
        self.last_options = Some(options.clone());
        self.apply(ns, op)
    }
}

impl MemCollection {
    fn position(&self, selector: &Document) -> Option<usize> {
        self.docs.iter().position(|doc| matches_selector(doc, selector))
    }

    fn check_unique(
        &self,
        ns: &Namespace,
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), StoreError> {
        let fields = std::iter::once(IDENTITY_FIELD).chain(self.unique_fields.iter().map(String::as_str));
        for field in fields {
            let Some(value) = candidate.get(field) else {
                continue;
            };
            let clash = self
                .docs
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, doc)| doc.get(field).is_some_and(|v| same_value(v, value)));
            if clash {
                return Err(StoreError::duplicate_key(format!(
                    "E11000 duplicate key error collection: {ns} index: {field}_1 dup key: {{ {field}: {value} }}"
                )));
            }
        }
        Ok(())
    }

    fn insert(&mut self, ns: &Namespace, mut payload: Document) -> Result<(), StoreError> {
        if !payload.contains_key(IDENTITY_FIELD) {
            payload.insert(IDENTITY_FIELD, ObjectId::new());
        }
        self.check_unique(ns, &payload, None)?;
        self.docs.push(payload);
        Ok(())
    }

    fn replace(
        &mut self,
        ns: &Namespace,
        selector: &Document,
        payload: &Document,
        upsert: bool,
    ) -> Result<(), StoreError> {
        match self.position(selector) {
            Some(index) => {
                let mut replacement = payload.clone();
                let existing = self.docs[index].get(IDENTITY_FIELD).cloned();
                match (replacement.get(IDENTITY_FIELD), existing.as_ref()) {
                    (Some(new_id), Some(old_id)) if !same_value(new_id, old_id) => {
                        return Err(StoreError::other(
                            "Performing an update on the path '_id' would modify the immutable field '_id'",
                        ));
                    }
                    (None, Some(old_id)) => {
                        replacement.insert(IDENTITY_FIELD, old_id.clone());
                    }
                    _ => {}
                }
                self.check_unique(ns, &replacement, Some(index))?;
                self.docs[index] = replacement;
                Ok(())
            }
            None if upsert => {
                let mut created = payload.clone();
                if let (None, Some(id)) = (created.get(IDENTITY_FIELD), selector.get(IDENTITY_FIELD)) {
                    created.insert(IDENTITY_FIELD, id.clone());
                }
                self.insert(ns, created)
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete(&mut self, selector: &Document) -> Result<(), StoreError> {
        match self.position(selector) {
            Some(index) => {
                self.docs.remove(index);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

fn matches_selector(doc: &Document, selector: &Document) -> bool {
    selector
        .iter()
        .all(|(key, expected)| doc.get(key).is_some_and(|actual| same_value(actual, expected)))
}

/// Numeric values compare by magnitude regardless of width.
fn same_value(a: &Bson, b: &Bson) -> bool {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn insert_one(
        &self,
        ns: &Namespace,
        payload: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let op = UnorderedOp::Insert {
            payload: payload.clone(),
        };
        self.state.lock().await.single(ns, &op, options)
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
        let op = UnorderedOp::Update {
            selector: selector.clone(),
            payload: payload.clone(),
            upsert,
        };
        self.state.lock().await.single(ns, &op, options)
    }

    async fn delete_one(
        &self,
        ns: &Namespace,
        selector: &Document,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        let op = UnorderedOp::Delete {
            selector: selector.clone(),
        };
        self.state.lock().await.single(ns, &op, options)
    }

    async fn run_unordered(
        &self,
        ns: &Namespace,
        request: UnorderedRequest,
        options: &WriteOptions,
    ) -> Result<UnorderedOutcome, StoreError> {
        let mut state = self.state.lock().await;
        state.unordered_requests += 1;
        state.last_options = Some(options.clone());

        if state.abort_next.remove(ns) {
            return Err(StoreError::other(format!(
                "injected grouped request failure for {ns}"
            )));
        }

        let results = request
            .ops()
            .iter()
            .map(|op| state.apply(ns, op))
            .collect();
        Ok(UnorderedOutcome::new(results))
    }
}
