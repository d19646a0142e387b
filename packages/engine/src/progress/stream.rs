//! Counting stream decorators

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::{Direction, ProgressFn, ProgressSnapshot, SpeedMonitor};

/// Side buffer mirroring transferred bytes for inspection.
///
/// Attached only when a monitor opted in and the expected total does not
/// exceed the configured cap; writes past the cap are discarded.
#[derive(Clone, Debug, Default)]
pub struct Mirror {
    buf: Arc<Mutex<Vec<u8>>>,
    cap: usize,
}

impl Mirror {
    /// Creates a mirror bounded by `cap` bytes.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::new())),
            cap,
        }
    }

    fn push(&self, chunk: &[u8]) {
        if let Ok(mut buf) = self.buf.lock() {
            let room = self.cap.saturating_sub(buf.len());
            let take = chunk.len().min(room);
            buf.extend_from_slice(&chunk[..take]);
        }
    }

    /// A copy of the mirrored bytes collected so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().map(|buf| buf.clone()).unwrap_or_default()
    }
}

/// Shared accounting state of one transfer direction.
pub struct Meter {
    total: i64,
    passed: Arc<AtomicU64>,
    direction: Direction,
    callback: Option<ProgressFn>,
    monitor: Option<Arc<SpeedMonitor>>,
    mirror: Option<Mirror>,
}

impl Meter {
    /// Creates a meter for `direction` with a possibly unknown total
    /// (`total < 1`).
    #[must_use]
    pub fn new(direction: Direction, total: i64) -> Self {
        Self {
            total,
            passed: Arc::new(AtomicU64::new(0)),
            direction,
            callback: None,
            monitor: None,
            mirror: None,
        }
    }

    /// Registers the progress callback.
    #[must_use]
    pub fn with_callback(mut self, callback: ProgressFn) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Attaches a throughput monitor.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<SpeedMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Attaches a mirror buffer.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// The shared cumulative byte counter.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.passed)
    }

    /// The snapshot as of the bytes counted so far.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_total: self.total,
            bytes_passed: self.passed.load(Ordering::SeqCst),
        }
    }

    fn record(&self, chunk: &[u8]) {
        let passed = self
            .passed
            .fetch_add(chunk.len() as u64, Ordering::SeqCst)
            + chunk.len() as u64;
        if let Some(mirror) = &self.mirror {
            mirror.push(chunk);
        }
        if let Some(monitor) = &self.monitor {
            monitor.record(passed);
        }
        if let Some(callback) = &self.callback {
            callback(
                self.direction,
                ProgressSnapshot {
                    bytes_total: self.total,
                    bytes_passed: passed,
                },
            );
        }
    }
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("direction", &self.direction)
            .field("total", &self.total)
            .field("passed", &self.passed.load(Ordering::SeqCst))
            .finish()
    }
}

pin_project! {
    /// An `AsyncRead` decorator that counts and reports every read.
    pub struct ProgressReader<R> {
        #[pin]
        inner: R,
        meter: Meter,
    }
}

impl<R> ProgressReader<R> {
    /// Wraps `inner` with the given meter.
    pub fn new(inner: R, meter: Meter) -> Self {
        Self { inner, meter }
    }

    /// The meter attached to this stream.
    pub fn meter(&self) -> &Meter {
        &self.meter
    }
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        match this.inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let filled = &buf.filled()[before..];
                if !filled.is_empty() {
                    this.meter.record(filled);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

pin_project! {
    /// An `AsyncWrite` decorator that counts and reports every write.
    pub struct ProgressWriter<W> {
        #[pin]
        inner: W,
        meter: Meter,
    }
}

impl<W> ProgressWriter<W> {
    /// Wraps `inner` with the given meter.
    pub fn new(inner: W, meter: Meter) -> Self {
        Self { inner, meter }
    }

    /// The meter attached to this stream.
    pub fn meter(&self) -> &Meter {
        &self.meter
    }
}

impl<W: AsyncWrite> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.project();
        match this.inner.poll_write(cx, buf) {
            Poll::Ready(Ok(written)) => {
                if written > 0 {
                    this.meter.record(&buf[..written]);
                }
                Poll::Ready(Ok(written))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}
