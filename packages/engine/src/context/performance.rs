//! Per-request performance record

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::progress::SpeedMonitor;

/// Timestamps, byte counters and throughput for one context.
///
/// Counters are shared with the progress meters of the live transfer, so
/// they stay accurate even while a body is mid-flight.
#[derive(Debug)]
pub struct Performance {
    started_at: Instant,
    response_at: Option<Instant>,
    completed_at: Option<Instant>,
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    upload_monitor: Option<Arc<SpeedMonitor>>,
    download_monitor: Option<Arc<SpeedMonitor>>,
}

impl Performance {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Instant::now(),
            response_at: None,
            completed_at: None,
            bytes_sent: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            upload_monitor: None,
            download_monitor: None,
        }
    }

    pub(crate) fn mark_response(&mut self) {
        self.response_at = Some(Instant::now());
    }

    pub(crate) fn mark_complete(&mut self) {
        self.completed_at = Some(Instant::now());
    }

    pub(crate) fn bind_upload(&mut self, counter: Arc<AtomicU64>, monitor: Arc<SpeedMonitor>) {
        self.bytes_sent = counter;
        self.upload_monitor = Some(monitor);
    }

    pub(crate) fn bind_download(&mut self, counter: Arc<AtomicU64>, monitor: Arc<SpeedMonitor>) {
        self.bytes_received = counter;
        self.download_monitor = Some(monitor);
    }

    /// Time from send entry until response headers, when they arrived.
    #[must_use]
    pub fn time_to_headers(&self) -> Option<Duration> {
        self.response_at.map(|at| at - self.started_at)
    }

    /// Total wall time of the request, once complete.
    #[must_use]
    pub fn total_time(&self) -> Option<Duration> {
        self.completed_at.map(|at| at - self.started_at)
    }

    /// Request body bytes sent so far.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::SeqCst)
    }

    /// Response body bytes received so far.
    #[must_use]
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::SeqCst)
    }

    /// Sampled upload throughput in bytes per second.
    #[must_use]
    pub fn upload_rate(&self) -> u64 {
        self.upload_monitor.as_ref().map_or(0, |m| m.rate())
    }

    /// Sampled download throughput in bytes per second.
    #[must_use]
    pub fn download_rate(&self) -> u64 {
        self.download_monitor.as_ref().map_or(0, |m| m.rate())
    }
}
