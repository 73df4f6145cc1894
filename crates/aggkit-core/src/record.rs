use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::key::Key;
use crate::value::Value;

/// Longest bin name the server accepts, in bytes.
pub const BIN_NAME_MAX_LEN: usize = 15;

/// A named value written to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub name: String,
    pub value: Value,
}

impl Bin {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn validate_name(name: &str) -> Result<(), CoreError> {
        if name.is_empty() {
            return Err(CoreError::InvalidBinName("bin name is empty".into()));
        }
        if name.len() > BIN_NAME_MAX_LEN {
            return Err(CoreError::InvalidBinName(format!(
                "{name} is longer than {BIN_NAME_MAX_LEN} bytes"
            )));
        }
        Ok(())
    }
}

/// A stored record as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub bins: BTreeMap<String, Value>,
    /// Incremented on every write.
    pub generation: u32,
}

impl Record {
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }

    /// The record as seen by a UDF: a map of bin name to value.
    pub fn to_value(&self) -> Value {
        Value::Map(self.bins.clone())
    }

    /// Keep only the named bins. An empty selection keeps everything.
    pub fn project(&self, bin_names: &[String]) -> Record {
        if bin_names.is_empty() {
            return self.clone();
        }
        Record {
            key: self.key.clone(),
            bins: self
                .bins
                .iter()
                .filter(|(name, _)| bin_names.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            generation: self.generation,
        }
    }
}
