//! Bounded retry
//!
//! [`RetryPolicy`] owns timing (fixed or exponential with jitter) and the
//! attempt bound; the coordinator in [`coordinator`] wraps
//! "generate context → send → check success" in the bounded loop used by
//! both sync and async callers.

mod coordinator;
mod policy;

pub use coordinator::{send_with_retry, RetryOutcome};
pub use policy::RetryPolicy;
