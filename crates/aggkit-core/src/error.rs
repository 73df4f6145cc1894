use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid query descriptor: {0}")]
    InvalidQuery(String),

    #[error("invalid bin name: {0}")]
    InvalidBinName(String),
}
