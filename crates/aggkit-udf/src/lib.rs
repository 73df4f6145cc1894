//! aggkit-udf
//!
//! The `aggAPI` aggregation package as the store executes it: a compiler for
//! the Lua expression subset used in descriptors, grouped aggregation with
//! mergeable partial state, and the catalog of functions a registered
//! package may call.

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod expr;
pub mod package;

pub use crate::aggregate::{AggregateState, Aggregation};
pub use crate::catalog::Builtin;
pub use crate::error::UdfError;
pub use crate::expr::{Expr, compile};
pub use crate::package::exported_functions;
