use thiserror::Error;

use crate::application::repos::RepoError;
use crate::application::sessions::SessionError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// True when the failure is the caller's fault (ownership, identity,
    /// self-follow) rather than the system's.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Domain(DomainError::Unauthorized { .. }))
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound,
            // Everything else is the persistent store failing under us;
            // surfaced as a generic store failure, details in the error.
            other => AppError::Store(other.to_string()),
        }
    }
}
