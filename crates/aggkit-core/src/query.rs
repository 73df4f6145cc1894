//! The aggregation descriptor handed to `aggAPI.select_agg_records`.
//!
//! On the wire the descriptor is a plain nested map:
//!
//! ```json
//! {
//!   "fields": {
//!     "group_id": "group_id",
//!     "count(*)": {"func": "count", "expr": "1"}
//!   },
//!   "filter": "rec['test_id'] == 102",
//!   "group_by_fields": ["group_id"]
//! }
//! ```
//!
//! A field is either a projection (alias → bin name) or an aggregate
//! (alias → function and expression).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub func: AggregateFunc,
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// Project the named bin.
    Bin(String),
    Aggregate(AggregateExpr),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub fields: BTreeMap<String, FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by_fields: Vec<String>,
}

impl AggregateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project bin `name` under the same alias.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.insert(name.clone(), FieldSpec::Bin(name));
        self
    }

    pub fn aggregate(
        mut self,
        alias: impl Into<String>,
        func: AggregateFunc,
        expr: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            alias.into(),
            FieldSpec::Aggregate(AggregateExpr {
                func,
                expr: expr.into(),
            }),
        );
        self
    }

    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filter = Some(predicate.into());
        self
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.fields.is_empty() {
            return Err(CoreError::InvalidQuery("no fields requested".into()));
        }
        for (alias, spec) in &self.fields {
            match spec {
                FieldSpec::Bin(bin) if bin.is_empty() => {
                    return Err(CoreError::InvalidQuery(format!(
                        "field {alias} projects an empty bin name"
                    )));
                }
                FieldSpec::Aggregate(agg) if agg.expr.trim().is_empty() => {
                    return Err(CoreError::InvalidQuery(format!(
                        "aggregate {alias} has an empty expression"
                    )));
                }
                _ => {}
            }
        }
        if self.group_by_fields.iter().any(String::is_empty) {
            return Err(CoreError::InvalidQuery("empty group-by field".into()));
        }
        Ok(())
    }

    pub fn to_value(&self) -> Result<Value, CoreError> {
        Ok(Value::from(serde_json::to_value(self)?))
    }

    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let query: AggregateQuery = serde_json::from_value(value.to_json())?;
        query.validate()?;
        Ok(query)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let query: AggregateQuery = serde_json::from_str(json)?;
        query.validate()?;
        Ok(query)
    }
}
