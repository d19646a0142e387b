//! Retry policy configuration

use std::time::Duration;

/// Timing and bound for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt bound, including the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Backoff multiplier; `1.0` keeps the delay fixed.
    pub backoff_multiplier: f64,
    /// Jitter factor in `[0, 1]` applied around the computed delay.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// A policy sleeping the same interval between every attempt.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Single attempt, no sleeping.
    #[must_use]
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// The sleep before retry number `attempt` (1-based).
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_millis() as f64
            * self
                .backoff_multiplier
                .powi(i32::try_from(attempt - 1).unwrap_or(i32::MAX));
        let capped = base.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = fastrand::f64() * jitter_range - jitter_range / 2.0;
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_keeps_the_interval() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(20));
        for attempt in 1..5 {
            assert_eq!(policy.delay_for(attempt), Duration::from_millis(20));
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(6), Duration::from_millis(400));
    }
}
