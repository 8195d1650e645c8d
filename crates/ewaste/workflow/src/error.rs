use crate::identity::IdentityError;
use ewaste_storage::StorageError;
use thiserror::Error;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// User-visible workflow failures.
///
/// None of these are retried by the coordinator. `Storage` carries
/// infrastructure failures that survived the adapter's own retry budget.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's role may not perform this operation at all.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The caller's role is allowed but it lacks the required relationship
    /// to the record (not the owner, not the claim holder).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The record is in the wrong status for the requested transition.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("identity resolution failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for WorkflowError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            StorageError::Conflict(msg) => Self::Conflict(msg),
            StorageError::InvariantViolation(msg) => Self::InvalidState(msg),
            other => Self::Storage(other),
        }
    }
}
