//! # Messaging Error Types
//!
//! Structured error types for queue operations using thiserror
//! instead of `Box<dyn Error>` patterns.

use std::time::Duration;
use thiserror::Error;

/// Queue operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Invalid queue message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Queue is full: {queue_name} holds {capacity} messages")]
    QueueFull { queue_name: String, capacity: usize },

    #[error("Queue is closed: {queue_name}")]
    QueueClosed { queue_name: String },

    #[error("Queue operation timed out: {queue_name}: {operation} after {timeout_ms}ms")]
    Timeout {
        queue_name: String,
        operation: String,
        timeout_ms: u64,
    },

    #[error("Iteration numbers exhausted on queue {queue_name} after {last_iteration}")]
    IterationExhausted {
        queue_name: String,
        last_iteration: u64,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Queue already exists: {queue_name} with capacity {existing_capacity}, requested {requested_capacity}")]
    QueueAlreadyExists {
        queue_name: String,
        existing_capacity: usize,
        requested_capacity: usize,
    },

    #[error("Invalid capacity for queue {queue_name}: {capacity}")]
    InvalidCapacity { queue_name: String, capacity: usize },

    #[error("Invalid queue name: {queue_name}: {reason}")]
    InvalidQueueName { queue_name: String, reason: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create an invalid message error
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(queue_name: impl Into<String>, capacity: usize) -> Self {
        Self::QueueFull {
            queue_name: queue_name.into(),
            capacity,
        }
    }

    /// Create a queue closed error
    pub fn queue_closed(queue_name: impl Into<String>) -> Self {
        Self::QueueClosed {
            queue_name: queue_name.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::Timeout {
            queue_name: queue_name.into(),
            operation: operation.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an error for a producer whose iteration counter cannot advance
    pub fn iteration_exhausted(queue_name: impl Into<String>, last_iteration: u64) -> Self {
        Self::IterationExhausted {
            queue_name: queue_name.into(),
            last_iteration,
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    /// Create an invalid queue name error
    pub fn invalid_queue_name(queue_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQueueName {
            queue_name: queue_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a message deserialization error
    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the queue can no longer accept or deliver messages
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::QueueClosed { .. })
    }

    /// Whether the error came from an expired deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Conversion from serde_json::Error to MessagingError
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            MessagingError::message_deserialization(err.to_string())
        } else {
            MessagingError::message_serialization(err.to_string())
        }
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
