use thiserror::Error;

/// Failure of a store operation. Absence is never an error: reads return `Ok(None)`.
#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("invalid blob path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("storage transport failure: {0}")]
    Transport(String),
    #[error("storage credential failure: {0}")]
    Auth(String),
    #[error("storage backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("malformed document at '{path}': {reason}")]
    Malformed { path: String, reason: String },
    #[error("write precondition failed for '{path}'")]
    Conflict { path: String },
}

impl StorageError {
    /// Stable label for logs and metrics.
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "invalid_path",
            Self::Transport(_) => "transport",
            Self::Auth(_) => "auth",
            Self::Backend { .. } => "backend",
            Self::Malformed { .. } => "malformed",
            Self::Conflict { .. } => "conflict",
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub(crate) fn malformed(path: &str, err: impl std::fmt::Display) -> Self {
        Self::Malformed { path: path.to_string(), reason: err.to_string() }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
