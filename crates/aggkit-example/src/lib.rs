//! aggkit-example
//!
//! Example harness for server-side aggregation: registers the `aggAPI`
//! package, ensures a secondary index, writes sample records, runs a grouped
//! aggregation filtered through the index and drops the index again.

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod populate;
pub mod query;
pub mod register;

pub use crate::config::ExampleConfig;
pub use crate::error::ExampleError;
pub use crate::pipeline::{RunReport, run};
