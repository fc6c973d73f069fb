//! Core model types for oplog-replay.
//!
//! This crate defines the data handed to the write-application layer:
//!
//! - [`ChangeRecord`] - one logical insert/update/delete intent
//! - [`Batch`] - an ordered, homogeneous group of change records
//! - [`Namespace`] - the (database, collection) target of one call
//! - [`WriteOptions`] - opaque store-level settings forwarded verbatim
//!
//! Nothing here performs I/O.

mod batch;
mod namespace;
mod record;

pub use batch::{Batch, BatchError};
pub use namespace::{Namespace, WriteOptions};
pub use record::{ChangeRecord, OpKind, IDENTITY_FIELD};
