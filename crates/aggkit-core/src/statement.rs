use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A secondary-index predicate. The store answers it from the index on
/// `bin`, never by scanning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Equal { bin: String, value: Value },
    /// Inclusive on both ends.
    Range { bin: String, begin: i64, end: i64 },
}

impl Filter {
    pub fn equal(bin: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Equal {
            bin: bin.into(),
            value: value.into(),
        }
    }

    pub fn range(bin: impl Into<String>, begin: i64, end: i64) -> Self {
        Filter::Range {
            bin: bin.into(),
            begin,
            end,
        }
    }

    pub fn bin_name(&self) -> &str {
        match self {
            Filter::Equal { bin, .. } | Filter::Range { bin, .. } => bin,
        }
    }

    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Filter::Equal { value, .. } => match (value, candidate) {
                (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                    value.as_i64().is_some() && value.as_i64() == candidate.as_i64()
                }
                _ => value == candidate,
            },
            Filter::Range { begin, end, .. } => candidate
                .as_i64()
                .is_some_and(|v| (*begin..=*end).contains(&v)),
        }
    }
}

/// Describes which records a query reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statement {
    pub namespace: String,
    pub set_name: String,
    /// Bins returned by a plain query. Empty means all bins.
    #[serde(default)]
    pub bin_names: Vec<String>,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub filter: Option<Filter>,
}

impl Statement {
    pub fn new(namespace: impl Into<String>, set_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set_name: set_name.into(),
            ..Default::default()
        }
    }

    pub fn set_bin_names<I, S>(&mut self, bin_names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bin_names = bin_names.into_iter().map(Into::into).collect();
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = Some(filter);
    }

    pub fn set_index_name(&mut self, index_name: impl Into<String>) {
        self.index_name = Some(index_name.into());
    }
}
