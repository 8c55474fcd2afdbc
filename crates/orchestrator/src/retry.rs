//! Retry policy for the client orchestrator (spec §4.4, §7).
//!
//! Only `conflict` is retried — every other failure surfaces to the
//! caller unchanged (spec §7 propagation policy).

use std::time::Duration;

/// Decides whether and how long to wait before retrying a failed attempt.
pub trait RetryPolicy: Send + Sync {
    /// Return `Some(delay)` to retry after `delay`, or `None` to give up.
    /// `attempt` is 1 for the first retry (i.e. after the first failure).
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Bounded exponential backoff: `base * 2^(attempt - 1)`, capped at `max`,
/// giving up after `max_attempts` retries.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
}

impl ExponentialBackoff {
    /// Build a policy with the given base delay, cap, and retry budget.
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        ExponentialBackoff {
            base,
            max,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoff {
            base: Duration::from_millis(10),
            max: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_attempts {
            return None;
        }
        let shift = attempt.saturating_sub(1).min(31);
        let scaled = self.base.checked_mul(1u32 << shift).unwrap_or(self.max);
        Some(scaled.min(self.max))
    }
}

/// Never retries. Useful for tests and for callers that want to implement
/// their own retry loop around the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_the_cap() {
        let policy = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(100), 10);
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(20)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(40)));
        assert_eq!(policy.next_delay(10), Some(Duration::from_millis(100)));
    }

    #[test]
    fn gives_up_past_max_attempts() {
        let policy = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_secs(1), 3);
        assert!(policy.next_delay(3).is_some());
        assert!(policy.next_delay(4).is_none());
    }

    #[test]
    fn no_retry_never_retries() {
        assert_eq!(NoRetry.next_delay(1), None);
    }
}
