//! The per-request context
//!
//! A [`RequestContext`] orchestrates one request's lifecycle: it owns the
//! request, the response once headers arrive, the negotiated content writer
//! and reader, a fault slot, and the atomic state machine that keeps the
//! pipeline ordered. One context has at most one transport operation in
//! flight at any time.

mod performance;
mod pipeline;
mod state;

use std::sync::Arc;

pub use performance::Performance;
pub use state::{AtomicState, State};

use crate::content::reader::ContentReader;
use crate::content::Materialized;
use crate::engine::Shared;
use crate::error::{self, Error, Result};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::progress::{Mirror, ProgressFn};
use crate::transport::{ConnectionInfo, Handle};

/// Orchestrates one request from `NotSent` to `Complete`.
pub struct RequestContext {
    pub(crate) id: u64,
    pub(crate) shared: Arc<Shared>,
    pub(crate) state: AtomicState,
    pub(crate) request: Request,
    pub(crate) response: Option<Response>,
    pub(crate) fault: Option<Error>,
    pub(crate) finished: bool,
    pub(crate) resubmit: bool,
    pub(crate) resubmit_count: u32,
    pub(crate) redirect_chain: Vec<url::Url>,
    pub(crate) writer: Option<crate::content::writer::ContentWriter>,
    pub(crate) handle: Option<Handle>,
    pub(crate) performance: Performance,
    pub(crate) connection: Option<ConnectionInfo>,
    pub(crate) progress: Option<ProgressFn>,
    pub(crate) inspect: bool,
    pub(crate) mirror: Option<Mirror>,
    pub(crate) resume_offset: u64,
}

impl RequestContext {
    pub(crate) fn new(shared: Arc<Shared>, request: Request) -> Self {
        let id = shared.registry.issue_context_id();
        Self {
            id,
            shared,
            state: AtomicState::new(),
            request,
            response: None,
            fault: None,
            finished: false,
            resubmit: false,
            resubmit_count: 0,
            redirect_chain: Vec::new(),
            writer: None,
            handle: None,
            performance: Performance::start(),
            connection: None,
            progress: None,
            inspect: false,
            mirror: None,
            resume_offset: 0,
        }
    }

    /// Registers a progress callback for both transfer directions.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Opts into mirroring the response body for inspection, capped by the
    /// engine's mirror buffer limit.
    #[must_use]
    pub fn with_inspection(mut self) -> Self {
        self.inspect = true;
        self
    }

    /// Drives the request to completion.
    ///
    /// Resolves `Ok` on success and on HTTP-level failure (a status ≥ 400
    /// is not a fault); rejects with the recorded fault unless the engine
    /// is configured to resolve with the failed context instead. Sending a
    /// context twice is a usage fault reported here, immediately.
    pub async fn send_async(&mut self) -> Result<()> {
        if self.finished {
            return Err(error::usage("this context has already completed"));
        }
        if self.state.load() != State::NotSent {
            return Err(error::usage("a send is already in progress on this context"));
        }
        self.run_to_completion().await;
        match (&self.fault, self.shared.config.failure_mode) {
            (Some(fault), crate::config::FailureMode::Reject) => Err(fault.clone()),
            _ => Ok(()),
        }
    }

    /// Requests cancellation. The pipeline observes it at the next
    /// suspension boundary, aborts the transport and completes the context
    /// with a cancellation fault.
    pub fn cancel(&self) {
        self.request.cancel.cancel();
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state.load()
    }

    /// The request this context owns.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response, once headers have been received.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// The recorded fault, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    /// True once the context has completed (any ending).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True when the context was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.request.cancel.is_cancelled()
            || self.fault.as_ref().is_some_and(Error::is_cancelled)
    }

    /// Success classification: content materialized, no fault, and an
    /// acceptable status (below 400, or 416 completing a resumed
    /// download).
    #[must_use]
    pub fn is_success(&self) -> bool {
        if !self.finished || self.fault.is_some() {
            return false;
        }
        let Some(response) = &self.response else {
            return false;
        };
        let materialized = response
            .reader()
            .is_some_and(|reader| reader.materialized().is_some());
        let status = response.status();
        let acceptable = status.as_u16() < 400
            || (status == http::StatusCode::RANGE_NOT_SATISFIABLE && self.resume_offset > 0);
        materialized && acceptable
    }

    /// The materialized result, once a reader has consumed a response.
    #[must_use]
    pub fn result(&self) -> Option<&Materialized> {
        self.response
            .as_ref()
            .and_then(Response::reader)
            .map(ContentReader::materialized)
    }

    /// Deserializes the materialized result into `T`; a shape mismatch is
    /// a usage fault reported here at the call site.
    pub fn result_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.response
            .as_ref()
            .and_then(Response::reader)
            .ok_or_else(|| error::usage("no materialized result is available on this context"))?
            .result_as()
    }

    /// Takes the unconsumed body stream after a raw-stream handoff.
    pub fn take_stream(&mut self) -> Option<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        self.response
            .as_mut()
            .and_then(|response| response.reader.as_mut())
            .and_then(ContentReader::take_stream)
    }

    /// Times, byte counts and throughput for this context.
    #[must_use]
    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    /// Connection diagnostics captured from the transport, when known.
    #[must_use]
    pub fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    /// The inspection mirror, when inspection was enabled and the body fit
    /// under the cap.
    #[must_use]
    pub fn mirror(&self) -> Option<&Mirror> {
        self.mirror.as_ref()
    }

    /// How many times this context was resubmitted (redirect follows and
    /// hook-requested resubmissions).
    #[must_use]
    pub fn resubmit_count(&self) -> u32 {
        self.resubmit_count
    }
}

impl Drop for RequestContext {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !self.finished {
                self.shared.transport.abort(handle);
            }
            self.shared.registry.release(handle);
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("state", &self.state.load())
            .field("url", &self.request.url().as_str())
            .field("finished", &self.finished)
            .field("fault", &self.fault)
            .finish()
    }
}
