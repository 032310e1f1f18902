//! # Jittered Backoff
//!
//! Uniformly randomized retry delays for callers polling a contended queue.

use std::time::{Duration, Instant};

use crate::config::BackoffConfig;

/// Uniform random delay in `[min_delay, max_delay]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitteredBackoff {
    min_delay: Duration,
    max_delay: Duration,
}

impl JitteredBackoff {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        // An inverted window collapses to its lower bound
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.min_delay(), config.max_delay())
    }

    /// Draw the next retry delay
    pub fn next_delay(&self) -> Duration {
        let spread = self.max_delay - self.min_delay;
        if spread.is_zero() {
            return self.min_delay;
        }
        self.min_delay + spread.mul_f64(fastrand::f64())
    }

    /// Sleep for the next retry delay, clipped to the deadline.
    ///
    /// Returns `false` without sleeping when the deadline has already passed.
    pub fn sleep_until(&self, deadline: Option<Instant>) -> bool {
        let delay = self.next_delay();
        let delay = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                delay.min(deadline - now)
            }
            None => delay,
        };
        std::thread::sleep(delay);
        true
    }
}

impl Default for JitteredBackoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
