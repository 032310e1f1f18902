//! Queue builders shared by the integration tests

use workqueue_core::{BackoffConfig, BoundedWorkQueue, PollingWorkQueue};

/// Console logging for test runs; honours LOG_LEVEL / RUST_LOG
pub fn init_test_logging() {
    workqueue_core::logging::init_tracing();
}

/// Short retry window so polling tests stay fast
pub fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        min_delay_ms: 0,
        max_delay_ms: 2,
    }
}

pub fn bounded_queue<T: Send>(name: &str, capacity: usize) -> BoundedWorkQueue<T> {
    BoundedWorkQueue::with_name(name, capacity).expect("valid bounded queue")
}

pub fn polling_queue<T: Send>(name: &str, capacity: usize) -> PollingWorkQueue<T> {
    PollingWorkQueue::new(name, capacity, &fast_backoff()).expect("valid polling queue")
}
