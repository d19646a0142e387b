//! Transfer speed sampling

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Samples a cumulative byte counter at a configured interval and keeps the
/// most recent rate.
#[derive(Debug)]
pub struct SpeedMonitor {
    interval: Duration,
    last: Mutex<Sample>,
    rate: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    passed: u64,
}

impl SpeedMonitor {
    /// Creates a monitor sampling at `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(Sample {
                at: Instant::now(),
                passed: 0,
            }),
            rate: AtomicU64::new(0),
        }
    }

    /// Feeds the cumulative byte count; recomputes the rate once per
    /// interval.
    pub fn record(&self, passed: u64) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        let elapsed = last.at.elapsed();
        if elapsed < self.interval {
            return;
        }
        let delta = passed.saturating_sub(last.passed);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = (delta as f64 / elapsed.as_secs_f64()) as u64;
        self.rate.store(rate, Ordering::SeqCst);
        *last = Sample {
            at: Instant::now(),
            passed,
        };
    }

    /// Most recently sampled throughput in bytes per second.
    #[must_use]
    pub fn rate(&self) -> u64 {
        self.rate.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_updates_after_interval() {
        let monitor = SpeedMonitor::new(Duration::from_millis(0));
        monitor.record(1000);
        assert!(monitor.rate() > 0);
    }

    #[test]
    fn rate_holds_within_interval() {
        let monitor = SpeedMonitor::new(Duration::from_secs(3600));
        monitor.record(1000);
        assert_eq!(monitor.rate(), 0);
    }
}
