//! Batched write executor for oplog replay.
//!
//! A [`Writer`] applies a [`Batch`](replay_core::Batch) of insert, update or
//! delete records to one namespace, either one request per record
//! ([`ExecutionMode::Single`]) or as one unordered grouped request
//! ([`ExecutionMode::Bulk`]). Every per-record failure goes through the
//! conflict policy in [`policy`], which decides whether it is swallowed,
//! compensated or propagated. That table is what makes replaying the same
//! log segment twice safe.

mod bulk;
mod error;
pub mod policy;
mod single;
mod writer;

pub use error::{ApplyError, RecordFailure, Stage};
pub use policy::{resolve, Compensation, ExecutionMode, Resolution};
pub use writer::Writer;
