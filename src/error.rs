//! Error types for the work queue system.

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkQueueError {
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Source error: {0}")]
    Source(String),
    #[error("Destination error for {destination}: {reason}")]
    Destination { destination: String, reason: String },
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl WorkQueueError {
    pub fn source_failed(message: impl Into<String>) -> Self {
        Self::Source(message.into())
    }

    pub fn destination_failed(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Destination {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

impl From<tokio::task::JoinError> for WorkQueueError {
    fn from(err: tokio::task::JoinError) -> Self {
        WorkQueueError::TaskJoin(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkQueueError>;
