//! Retry policy for supplier submissions.

use std::time::Duration;

use uuid::Uuid;

/// Retry and timeout policy applied to connector submissions.
///
/// Transient failures retry with exponential backoff and jitter up to
/// `max_attempts`; exceeding the ceiling fails the item terminally. A
/// submission that outlives `submit_timeout` counts as a transient failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total submission attempts allowed per item.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on the backoff delay.
    pub max_delay: Duration,

    /// Hard timeout on each connector submit call.
    pub submit_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            submit_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy with near-zero delays, for tests.
    pub fn fast() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            submit_timeout: Duration::from_secs(1),
        }
    }

    /// Backoff delay before retrying after the given number of failed
    /// attempts (1-based).
    ///
    /// Exponential with a ±50% jitter; the jitter byte comes from UUID v4
    /// entropy since the stack carries no dedicated rng crate.
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let byte = Uuid::new_v4().as_bytes()[0] as u32;
        let jitter_permille = 500 + (byte * 1000 / 255);
        base * jitter_permille / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ceiling_is_five() {
        assert_eq!(RetryPolicy::default().max_attempts, 5);
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            submit_timeout: Duration::from_secs(1),
        };

        // Jitter spans 0.5x..=1.5x of the exponential base.
        let d1 = policy.backoff_delay(1);
        assert!(d1 >= Duration::from_millis(50) && d1 <= Duration::from_millis(150));

        let d2 = policy.backoff_delay(2);
        assert!(d2 >= Duration::from_millis(100) && d2 <= Duration::from_millis(300));

        // Past the cap the base stays at max_delay.
        let d4 = policy.backoff_delay(4);
        assert!(d4 <= Duration::from_millis(600));
    }

    #[test]
    fn test_large_attempt_counts_do_not_overflow() {
        let policy = RetryPolicy::default();
        let delay = policy.backoff_delay(1000);
        assert!(delay <= policy.max_delay * 3 / 2);
    }
}
