//! aggkit-core
//!
//! Pure domain types shared by the store, the aggregation package and the
//! example harness: the vocabulary of records, statements and aggregation
//! descriptors. Nothing here talks to a store.

pub mod error;
pub mod key;
pub mod query;
pub mod record;
pub mod statement;
pub mod udf;
pub mod value;

pub use crate::error::CoreError;
pub use crate::key::{Key, UserKey};
pub use crate::query::{AggregateExpr, AggregateFunc, AggregateQuery, FieldSpec};
pub use crate::record::{BIN_NAME_MAX_LEN, Bin, Record};
pub use crate::statement::{Filter, Statement};
pub use crate::udf::{IndexType, Language};
pub use crate::value::Value;
