use std::fmt;
use std::time::Duration;

use aggkit_core::{CoreError, Key};
use aggkit_udf::UdfError;
use thiserror::Error;

/// Numeric status codes, numbered the way the database server reports them.
///
/// Negative codes are raised by the client itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    TaskAbandoned = -3,
    ServerError = 1,
    ParameterError = 4,
    KeyExists = 5,
    Timeout = 9,
    UnsupportedFeature = 16,
    UdfBadResponse = 100,
    IndexAlreadyExists = 200,
    IndexNotFound = 201,
    IndexNotReadable = 204,
    UdfNotFound = 1301,
}

impl ResultCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} ({})", self.code())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("key already exists: {0}")]
    KeyExists(Key),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("unsupported feature: {0}")]
    Unsupported(String),

    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("index not readable (still building): {0}")]
    IndexNotReadable(String),

    #[error("udf package not found: {0}")]
    PackageNotFound(String),

    #[error("udf registration failed for {package}: {reason}")]
    Registration { package: String, reason: String },

    #[error("udf execution failed: {0}")]
    Udf(#[from] UdfError),

    #[error("task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("task {0} was abandoned before completing")]
    TaskAbandoned(String),

    #[error("invalid request: {0}")]
    Core(#[from] CoreError),

    #[error("server error: {0}")]
    Server(String),
}

impl StoreError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Parameter(_) | Self::Core(_) | Self::Registration { .. } => {
                ResultCode::ParameterError
            }
            Self::KeyExists(_) => ResultCode::KeyExists,
            Self::Timeout { .. } => ResultCode::Timeout,
            Self::Unsupported(_) => ResultCode::UnsupportedFeature,
            Self::IndexAlreadyExists(_) => ResultCode::IndexAlreadyExists,
            Self::IndexNotFound(_) => ResultCode::IndexNotFound,
            Self::IndexNotReadable(_) => ResultCode::IndexNotReadable,
            Self::PackageNotFound(_) => ResultCode::UdfNotFound,
            Self::Udf(_) => ResultCode::UdfBadResponse,
            Self::TaskAbandoned(_) => ResultCode::TaskAbandoned,
            Self::TaskFailed { .. } | Self::Server(_) => ResultCode::ServerError,
        }
    }

    pub fn is_index_already_exists(&self) -> bool {
        self.result_code() == ResultCode::IndexAlreadyExists
    }

    pub fn is_index_not_found(&self) -> bool {
        self.result_code() == ResultCode::IndexNotFound
    }
}
