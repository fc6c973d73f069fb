//! MongoDB target store for oplog-replay
//!
//! Implements `TargetStore` on top of the server's `insert`, `update` and
//! `delete` write commands, so pass-through write options reach the server
//! unchanged.

mod command;
mod connect;
mod reply;
mod store;

pub use connect::{connect, ConnectOpts};
pub use store::{MongoStore, MAX_WRITE_BATCH_SIZE};
