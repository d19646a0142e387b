//! The per-attempt state machine
//!
//! States are monotonic integers; transitions happen by compare-and-set so
//! the cancellation path and the normal progression never race each other
//! into an inconsistent order. A failed compare-and-set means a concurrent
//! transition already happened and the caller's attempt is a no-op.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle position of one attempt. Larger is further along.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    NotSent = 0,
    Init = 1,
    SendingHeaders = 2,
    WritingRequestBody = 3,
    WaitingResponseHeaders = 4,
    ReadingResponse = 5,
    ValidatingResponse = 6,
    EndProcessingResponse = 7,
    Complete = 8,
}

impl State {
    fn from_u8(value: u8) -> State {
        match value {
            0 => State::NotSent,
            1 => State::Init,
            2 => State::SendingHeaders,
            3 => State::WritingRequestBody,
            4 => State::WaitingResponseHeaders,
            5 => State::ReadingResponse,
            6 => State::ValidatingResponse,
            7 => State::EndProcessingResponse,
            _ => State::Complete,
        }
    }
}

/// Atomically tracked [`State`].
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    /// Starts at [`State::NotSent`].
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU8::new(State::NotSent as u8))
    }

    /// The current state.
    #[must_use]
    pub fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Attempts the `from → to` transition. Returns false when a concurrent
    /// transition won; the caller must treat that as a no-op.
    pub fn try_advance(&self, from: State, to: State) -> bool {
        debug_assert!(from < to, "transitions are monotonic within an attempt");
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Forces the terminal state regardless of the current one. Used by the
    /// completion path, which is itself guarded by a one-shot gate.
    pub(crate) fn force_complete(&self) {
        self.0.store(State::Complete as u8, Ordering::SeqCst);
    }

    /// The sanctioned monotonicity exception: resubmission resets the
    /// machine to the start for the next attempt.
    pub(crate) fn reset_for_resubmit(&self) {
        self.0.store(State::NotSent as u8, Ordering::SeqCst);
    }
}

impl Default for AtomicState {
    fn default() -> Self {
        Self::new()
    }
}
