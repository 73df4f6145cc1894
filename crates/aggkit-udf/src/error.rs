use thiserror::Error;

#[derive(Debug, Error)]
pub enum UdfError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("invalid descriptor: {0}")]
    Descriptor(#[from] aggkit_core::CoreError),

    #[error("function not found: {package}.{function}")]
    FunctionNotFound { package: String, function: String },
}

impl UdfError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }
}
