//! Byte-level transfer progress
//!
//! The streaming layer wraps whichever raw stream the transport hands back
//! in a counting decorator; every successful read or write emits a
//! [`ProgressSnapshot`]. A [`SpeedMonitor`] can sample the same counter to
//! derive throughput, and may opt into mirroring the bytes for inspection.

mod monitor;
mod stream;

use std::sync::Arc;

pub use monitor::SpeedMonitor;
pub use stream::{Mirror, ProgressReader, ProgressWriter, Meter};

/// Transfer direction a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Immutable progress pair.
///
/// `bytes_total < 1` means the total is unknown and the percentage is
/// undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_total: i64,
    pub bytes_passed: u64,
}

impl ProgressSnapshot {
    /// Completion ratio in `[0, 1]`; None while the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        if self.bytes_total < 1 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.bytes_passed as f64 / self.bytes_total as f64)
    }
}

/// Callback invoked after every counted read or write.
pub type ProgressFn = Arc<dyn Fn(Direction, ProgressSnapshot) + Send + Sync>;
