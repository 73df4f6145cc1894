use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The user-supplied part of a record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserKey {
    Int(i64),
    String(String),
    Blob(Vec<u8>),
}

impl UserKey {
    pub fn to_value(&self) -> Value {
        match self {
            UserKey::Int(i) => Value::Int(*i),
            UserKey::String(s) => Value::String(s.clone()),
            UserKey::Blob(bytes) => {
                Value::List(bytes.iter().map(|b| Value::Int(i64::from(*b))).collect())
            }
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::Int(i) => write!(f, "{i}"),
            UserKey::String(s) => write!(f, "{s}"),
            UserKey::Blob(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for UserKey {
    fn from(i: i64) -> Self {
        UserKey::Int(i)
    }
}

impl From<&str> for UserKey {
    fn from(s: &str) -> Self {
        UserKey::String(s.to_string())
    }
}

impl From<String> for UserKey {
    fn from(s: String) -> Self {
        UserKey::String(s)
    }
}

impl From<Vec<u8>> for UserKey {
    fn from(bytes: Vec<u8>) -> Self {
        UserKey::Blob(bytes)
    }
}

/// Identifies a record: namespace, set and user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub namespace: String,
    pub set_name: String,
    pub user_key: UserKey,
}

impl Key {
    pub fn new(
        namespace: impl Into<String>,
        set_name: impl Into<String>,
        user_key: impl Into<UserKey>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set_name: set_name.into(),
            user_key: user_key.into(),
        }
    }

    /// Whether this key lives in the given namespace and set.
    pub fn in_set(&self, namespace: &str, set_name: &str) -> bool {
        self.namespace == namespace && self.set_name == set_name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set_name, self.user_key)
    }
}
