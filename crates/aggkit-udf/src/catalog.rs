use aggkit_core::Value;

use crate::aggregate::Aggregation;
use crate::error::UdfError;

pub const AGG_PACKAGE: &str = "aggAPI";
pub const SELECT_AGG_RECORDS: &str = "select_agg_records";

/// Stream functions the store knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    SelectAggRecords,
}

impl Builtin {
    /// Look up `package.function`. The package may be given with or without
    /// its `.lua` extension.
    pub fn resolve(package: &str, function: &str) -> Option<Builtin> {
        let package = package.strip_suffix(".lua").unwrap_or(package);
        match (package, function) {
            (AGG_PACKAGE, SELECT_AGG_RECORDS) => Some(Builtin::SelectAggRecords),
            _ => None,
        }
    }

    pub fn package(self) -> &'static str {
        match self {
            Builtin::SelectAggRecords => AGG_PACKAGE,
        }
    }

    pub fn function(self) -> &'static str {
        match self {
            Builtin::SelectAggRecords => SELECT_AGG_RECORDS,
        }
    }

    pub fn prepare(self, args: &[Value]) -> Result<Aggregation, UdfError> {
        match self {
            Builtin::SelectAggRecords => Aggregation::from_args(args),
        }
    }
}

/// Resolve or fail with [`UdfError::FunctionNotFound`].
pub fn require(package: &str, function: &str) -> Result<Builtin, UdfError> {
    Builtin::resolve(package, function).ok_or_else(|| UdfError::FunctionNotFound {
        package: package.to_string(),
        function: function.to_string(),
    })
}
