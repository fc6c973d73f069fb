//! Target store abstraction.
//!
//! This crate defines the `TargetStore` trait that the write executor issues
//! its requests through. A store applies single operations against an
//! already-open connection and runs unordered grouped requests, classifying
//! every failure as not-found, duplicate-key or other.
//!
//! Implementations:
//! - `mongodb-target::MongoStore` - MongoDB write commands
//! - [`MemoryStore`] - in-process collections, used by tests

mod error;
pub mod memory;
mod request;
mod traits;

pub use error::{is_duplicate_key_code, FailureKind, StoreError, DUPLICATE_KEY_CODES};
pub use memory::MemoryStore;
pub use request::{UnorderedOp, UnorderedOutcome, UnorderedRequest};
pub use traits::TargetStore;
