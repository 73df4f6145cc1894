use std::fmt;

use serde::{Deserialize, Serialize};

/// Language a UDF package is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Lua,
}

impl Language {
    pub fn extension(self) -> &'static str {
        match self {
            Language::Lua => "lua",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Lua => write!(f, "LUA"),
        }
    }
}

/// Value type a secondary index is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    Numeric,
    String,
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Numeric => write!(f, "NUMERIC"),
            IndexType::String => write!(f, "STRING"),
        }
    }
}
