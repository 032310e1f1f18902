//! # Queue Registry
//!
//! Named [`BoundedWorkQueue`] handles shared across a process.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::bounded_queue::BoundedWorkQueue;
use super::errors::{MessagingError, MessagingResult};
use super::queue::WorkQueue;
use crate::logging::log_queue_operation;
use crate::monitoring::ChannelMetrics;

/// Longest accepted queue name
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Queue names are 1-64 ASCII alphanumerics, `_` or `-`
pub fn validate_queue_name(name: &str) -> MessagingResult<()> {
    if name.is_empty() {
        return Err(MessagingError::invalid_queue_name(name, "name is empty"));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(MessagingError::invalid_queue_name(
            name,
            format!("name exceeds {MAX_QUEUE_NAME_LEN} characters"),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(MessagingError::invalid_queue_name(
            name,
            format!("invalid character '{c}'"),
        ));
    }
    Ok(())
}

/// Process-wide map of queue name to queue handle
pub struct QueueRegistry<T> {
    queues: DashMap<String, BoundedWorkQueue<T>>,
}

impl<T> Default for QueueRegistry<T> {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }
}

impl<T: Send> QueueRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue, or return the existing one when the capacity matches
    pub fn create_queue(&self, name: &str, capacity: usize) -> MessagingResult<BoundedWorkQueue<T>> {
        validate_queue_name(name)?;

        match self.queues.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                let queue = existing.get();
                if queue.capacity() != capacity {
                    return Err(MessagingError::QueueAlreadyExists {
                        queue_name: name.to_string(),
                        existing_capacity: queue.capacity(),
                        requested_capacity: capacity,
                    });
                }
                debug!(queue = %name, "Queue already registered");
                Ok(queue.clone())
            }
            Entry::Vacant(slot) => {
                let queue = BoundedWorkQueue::with_name(name, capacity).map_err(|_| {
                    MessagingError::InvalidCapacity {
                        queue_name: name.to_string(),
                        capacity,
                    }
                })?;
                slot.insert(queue.clone());
                let details = format!("capacity={capacity}");
                log_queue_operation("create_queue", name, None, "registered", Some(&details));
                Ok(queue)
            }
        }
    }

    /// Look up a queue by name
    pub fn queue(&self, name: &str) -> MessagingResult<BoundedWorkQueue<T>> {
        self.queues
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MessagingError::queue_not_found(name))
    }

    /// Unregister and close a queue. Handles already given out see it closed.
    pub fn remove_queue(&self, name: &str) -> MessagingResult<()> {
        let (_, queue) = self
            .queues
            .remove(name)
            .ok_or_else(|| MessagingError::queue_not_found(name))?;
        queue.close();
        log_queue_operation("remove_queue", name, None, "closed", None);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    /// Registered names, sorted
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Metrics for every registered queue, sorted by name
    pub fn metrics(&self) -> Vec<ChannelMetrics> {
        let mut metrics: Vec<ChannelMetrics> =
            self.queues.iter().map(|entry| entry.value().metrics()).collect();
        metrics.sort_by(|a, b| a.queue_name.cmp(&b.queue_name));
        metrics
    }

    /// Close every registered queue without unregistering it
    pub fn close_all(&self) {
        for entry in self.queues.iter() {
            entry.value().close();
        }
    }
}
