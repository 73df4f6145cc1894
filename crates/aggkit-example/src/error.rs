use std::path::PathBuf;

use aggkit_core::CoreError;
use aggkit_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExampleError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read udf package at {}", path.display())]
    ReadPackage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("udf registration failed")]
    Registration(#[source] StoreError),

    #[error("index creation failed")]
    Index(#[source] StoreError),

    #[error("truncating the set failed")]
    Truncate(#[source] StoreError),

    #[error("write of {key} failed")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("aggregation query failed")]
    Query(#[source] StoreError),

    #[error("unexpected query result: {0}")]
    UnexpectedResult(String),

    #[error("index teardown failed")]
    Teardown(#[source] StoreError),

    #[error("invalid query descriptor: {0}")]
    Descriptor(#[from] CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExampleError {
    /// The store error behind a failed step, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Registration(e)
            | Self::Index(e)
            | Self::Truncate(e)
            | Self::Query(e)
            | Self::Teardown(e) => Some(e),
            Self::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}
