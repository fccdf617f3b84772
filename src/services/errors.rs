use thiserror::Error;

use crate::services::ai_output::MalformedOutput;
use crate::store::StorageError;

#[derive(Debug, Error)]
pub(crate) enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    MalformedOutput(#[from] MalformedOutput),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid or expired login code")]
    InvalidLoginCode,
    #[error("Invalid or expired session")]
    Unauthenticated,
}

impl ServiceError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
