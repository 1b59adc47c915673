use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("invalid prompt: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("text generator unavailable: {0}")]
    Unavailable(String),

    #[error("text generation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}
