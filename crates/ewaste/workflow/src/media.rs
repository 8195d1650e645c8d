use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media reference rejected: {0}")]
    InvalidReference(String),

    #[error("media i/o failure: {0}")]
    Io(String),
}

/// Stored photo collaborator. Only removal is needed by the workflow.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Remove a previously stored resource. Removing a missing resource is
    /// not an error.
    async fn remove(&self, reference: &str) -> Result<(), MediaError>;
}

/// Media store for deployments that keep no photos.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMediaStore;

#[async_trait]
impl MediaStore for NoMediaStore {
    async fn remove(&self, _reference: &str) -> Result<(), MediaError> {
        Ok(())
    }
}
