//! # Queue Message Structures
//!
//! Defines the unit of transfer through a work queue: a batch of records
//! tagged with its iteration number and an optional control signal.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{MessagingError, MessagingResult};

/// Control events carried alongside (or instead of) a batch of records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueSignal {
    /// Consumers stop pulling further batches after receiving this
    Termination,
}

impl fmt::Display for QueueSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueSignal::Termination => write!(f, "TERMINATION"),
        }
    }
}

/// Batch of records travelling through a work queue
///
/// Messages are validated at construction and never mutated once enqueued:
/// - `records` may only be empty when a `signal` is present
/// - a termination message carries no records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage<T> {
    /// Monotonic batch sequence number assigned by the producer
    pub iteration: u64,
    /// Records in insertion order
    pub records: Vec<T>,
    /// Optional control event
    pub signal: Option<QueueSignal>,
}

impl<T> QueueMessage<T> {
    /// Create a validated message
    pub fn new(records: Vec<T>, iteration: u64, signal: Option<QueueSignal>) -> MessagingResult<Self> {
        let message = Self {
            iteration,
            records,
            signal,
        };
        message.validate()?;
        Ok(message)
    }

    /// Create a data message carrying a non-empty batch
    pub fn batch(records: Vec<T>, iteration: u64) -> MessagingResult<Self> {
        Self::new(records, iteration, None)
    }

    /// Create the termination sentinel for the given iteration
    pub fn termination(iteration: u64) -> Self {
        Self {
            iteration,
            records: Vec::new(),
            signal: Some(QueueSignal::Termination),
        }
    }

    /// Check the message invariants
    pub fn validate(&self) -> MessagingResult<()> {
        match self.signal {
            None if self.records.is_empty() => Err(MessagingError::invalid_message(format!(
                "iteration {} has no records and no signal",
                self.iteration
            ))),
            Some(QueueSignal::Termination) if !self.records.is_empty() => {
                Err(MessagingError::invalid_message(format!(
                    "termination message for iteration {} carries {} records",
                    self.iteration,
                    self.records.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether this message tells consumers to stop
    pub fn is_termination(&self) -> bool {
        self.signal == Some(QueueSignal::Termination)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split into iteration and records
    pub fn into_parts(self) -> (u64, Vec<T>) {
        (self.iteration, self.records)
    }
}

impl<T> QueueMessage<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Convert to JSON wire form
    pub fn to_json(&self) -> MessagingResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    /// Decode from JSON wire form, enforcing the message invariants
    pub fn from_json(json: serde_json::Value) -> MessagingResult<Self> {
        let message: Self = serde_json::from_value(json)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Decode from a JSON string, enforcing the message invariants
    pub fn from_json_str(json: &str) -> MessagingResult<Self> {
        let message: Self = serde_json::from_str(json)?;
        message.validate()?;
        Ok(message)
    }
}
