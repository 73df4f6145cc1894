//! aggkit-store
//!
//! Client surface of the record store: the [`Store`] command trait, policies,
//! asynchronous server tasks, streaming cursors and an in-process
//! multi-node backend.

pub mod client;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod policy;
pub mod task;

pub use crate::client::{BoxFuture, IndexState, Store};
pub use crate::cursor::{Cursor, RecordSet, ResultSet};
pub use crate::error::{ResultCode, StoreError};
pub use crate::memory::{MemoryConfig, MemoryStore, StoreStats};
pub use crate::policy::{Policy, RecordExistsAction, WritePolicy};
pub use crate::task::{Task, TaskReporter, TaskStatus};
