//! Error types for the dto-handlers crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HandlerError>;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown task_type: {0}")]
    UnknownTaskType(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("handler execution failed: {0}")]
    Execution(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}
