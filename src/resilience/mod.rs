//! # Resilience Module
//!
//! Retry timing for operations that wait on contended resources.
//!
//! ## Usage
//!
//! ```rust
//! use workqueue_core::config::BackoffConfig;
//! use workqueue_core::resilience::JitteredBackoff;
//! use std::time::Duration;
//!
//! let backoff = JitteredBackoff::from_config(&BackoffConfig {
//!     min_delay_ms: 5,
//!     max_delay_ms: 20,
//! });
//!
//! let delay = backoff.next_delay();
//! assert!(delay >= Duration::from_millis(5) && delay <= Duration::from_millis(20));
//! ```

pub mod backoff;

pub use backoff::JitteredBackoff;
