//! Shared pieces of the chunked transfer protocol
//!
//! Both body directions move data the same way: issue a single async
//! operation of at most one chunk, then either continue with the next chunk
//! or notify completion exactly once. [`Gate`] is the one-shot notification
//! guard; [`step`] wraps one suspension point with the read/write deadline
//! and the cancellation handle.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cancel::CancelHandle;
use crate::error::{self, Error, Kind, Result};

/// One-shot completion gate.
///
/// Overlapping callbacks may all attempt to complete a transfer; only the
/// first attempt wins. Every exit path of a chunk loop (success, short read,
/// error, cancellation) funnels through a gate so the downstream effect
/// fires exactly once.
#[derive(Debug, Default)]
pub struct Gate {
    fired: AtomicBool,
}

impl Gate {
    /// Creates an unfired gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to fire. Returns true only for the first caller.
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    /// True once some caller has fired the gate.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Runs one transfer step under the read/write deadline, racing the
/// cancellation handle.
pub(crate) async fn step<T, E, F>(
    fut: F,
    deadline: Duration,
    cancel: &CancelHandle,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<crate::error::BoxError>,
{
    if cancel.is_cancelled() {
        return Err(error::cancelled());
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(error::cancelled()),
        outcome = tokio::time::timeout(deadline, fut) => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(error::transport(e)),
            Err(_elapsed) => Err(Error::new(Kind::Timeout)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_fires_exactly_once() {
        let gate = Gate::new();
        let mut observed = 0;
        for _ in 0..5 {
            if gate.fire() {
                observed += 1;
            }
        }
        assert_eq!(observed, 1);
        assert!(gate.has_fired());
    }

    #[tokio::test]
    async fn step_times_out() {
        let cancel = CancelHandle::new();
        let never = std::future::pending::<std::io::Result<()>>();
        let result = step(never, Duration::from_millis(10), &cancel).await;
        assert!(result.expect_err("should time out").is_timeout());
    }

    #[tokio::test]
    async fn step_observes_cancellation() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let ready = std::future::ready(std::io::Result::Ok(1u8));
        let result = step(ready, Duration::from_secs(1), &cancel).await;
        assert!(result.expect_err("should cancel").is_cancelled());
    }
}
