//! Rate-limit retry around outbound collection calls.
//!
//! Only throttling is retried. The delay before each attempt starts at zero,
//! becomes one second after the first throttle and doubles on each further
//! throttle up to `max_delay`. One success resets it to zero.

use crate::errors::{ExError, ExErrorKind, FetchError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Sleep abstraction so tests can observe backoff without waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Backoff limits for one technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_delay: Duration,
    /// Throttles tolerated per call before giving up; 0 means no limit
    pub max_throttle_retries: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(4),
            max_throttle_retries: 10,
        }
    }
}

/// Stateful limiter shared by every call of one technology run.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            policy,
            delay: Duration::ZERO,
            sleeper,
        }
    }

    /// Current delay applied before the next call.
    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Run `call`, retrying while it reports throttling.
    ///
    /// # Errors
    ///
    /// - the converted error of any non-throttling failure, immediately
    /// - `RetryExhausted` once throttling exceeds `max_throttle_retries`
    pub fn call<T, F>(&mut self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, FetchError>,
    {
        let mut throttles: u32 = 0;
        loop {
            if !self.delay.is_zero() {
                debug!(op, delay_ms = self.delay.as_millis() as u64, "backing off");
                self.sleeper.sleep(self.delay);
            }
            match call() {
                Ok(value) => {
                    self.delay = Duration::ZERO;
                    return Ok(value);
                }
                Err(FetchError::Throttled(message)) => {
                    throttles += 1;
                    if self.policy.max_throttle_retries > 0
                        && throttles > self.policy.max_throttle_retries
                    {
                        return Err(ExError::new(ExErrorKind::RetryExhausted)
                            .with_op(op)
                            .with_message(format!(
                                "still throttled after {} retries: {}",
                                self.policy.max_throttle_retries, message
                            )));
                    }
                    self.delay = self.next_delay();
                    warn!(
                        op,
                        throttles,
                        delay_ms = self.delay.as_millis() as u64,
                        "throttled by provider"
                    );
                }
                Err(other) => return Err(ExError::from(other).with_op(op)),
            }
        }
    }

    fn next_delay(&self) -> Duration {
        if self.delay.is_zero() {
            Duration::from_secs(1).min(self.policy.max_delay)
        } else {
            (self.delay * 2).min(self.policy.max_delay)
        }
    }
}
