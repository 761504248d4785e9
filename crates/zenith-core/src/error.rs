use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("failed to persist tasks: {0:#}")]
    Persist(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the AI subtask advisor. None of these abort the editing flow;
/// callers render them and carry on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdvisorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("AI access key is not configured; set ai.api_key or ZENITH_API_KEY")]
    NotConfigured,

    #[error("AI service rejected the access key")]
    InvalidCredential,

    #[error("AI service unreachable: {0}")]
    NetworkFailure(String),

    #[error("AI service error: {0}")]
    ServiceError(String),
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;
