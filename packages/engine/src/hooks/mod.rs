//! Lifecycle hook points
//!
//! Each phase exposes an ordered list of registered callbacks with a typed
//! context and a veto/override return value. Registration order is
//! invocation order; the first non-`Continue` action short-circuits the
//! remaining callbacks of that phase.

use std::sync::Arc;

use crate::content::reader::ReaderKind;
use crate::content::writer::ContentWriter;
use crate::error::Error;
use crate::http::request::Request;
use crate::http::response::Response;

/// What a hook wants the pipeline to do next.
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Mark the context cancelled and complete.
    Cancel,
    /// Record this fault and complete as failed.
    Fault(Error),
    /// After completion, reset the context and send again.
    Resubmit,
}

/// Terminal outcome handed to the end-of-request observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Finished,
    Failed,
    Cancelled,
}

/// Context for `before-send` and `request-created`.
pub struct SendCtx<'a> {
    pub request: &'a mut Request,
}

/// Context for `before-wrap`: hooks may supply the writer themselves.
pub struct WrapCtx<'a> {
    pub request: &'a Request,
    /// When a hook fills this in, write-side negotiation is skipped.
    pub writer: &'a mut Option<ContentWriter>,
}

/// Context for `before-negotiate`: hooks may pick the reader kind.
pub struct NegotiateCtx<'a> {
    pub request: &'a Request,
    pub response: &'a Response,
    /// When a hook fills this in, read-side negotiation is skipped.
    pub reader: &'a mut Option<ReaderKind>,
}

/// Context for `validate-response`.
pub struct ValidateCtx<'a> {
    pub request: &'a Request,
    pub response: &'a Response,
}

/// Context for the terminal observers.
pub struct EndCtx<'a> {
    pub request: &'a Request,
    pub response: Option<&'a Response>,
    pub ending: Ending,
    pub fault: Option<&'a Error>,
}

type BeforeSendHook = Arc<dyn for<'a> Fn(&mut SendCtx<'a>) -> HookAction + Send + Sync>;
type RequestCreatedHook = Arc<dyn for<'a> Fn(&SendCtx<'a>) + Send + Sync>;
type BeforeWrapHook = Arc<dyn for<'a> Fn(&mut WrapCtx<'a>) -> HookAction + Send + Sync>;
type BeforeNegotiateHook = Arc<dyn for<'a> Fn(&mut NegotiateCtx<'a>) -> HookAction + Send + Sync>;
type ValidateHook = Arc<dyn for<'a> Fn(&ValidateCtx<'a>) -> HookAction + Send + Sync>;
type TerminalHook = Arc<dyn for<'a> Fn(&EndCtx<'a>) + Send + Sync>;

/// The ordered hook registry carried by an engine.
#[derive(Default)]
pub struct Hooks {
    before_send: Vec<BeforeSendHook>,
    request_created: Vec<RequestCreatedHook>,
    before_wrap: Vec<BeforeWrapHook>,
    before_negotiate: Vec<BeforeNegotiateHook>,
    validate_response: Vec<ValidateHook>,
    on_finished: Vec<TerminalHook>,
    on_failed: Vec<TerminalHook>,
    on_cancelled: Vec<TerminalHook>,
    request_end: Vec<TerminalHook>,
}

impl Hooks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before the transport request is prepared. May cancel or fault
    /// the send, or request a later resubmit.
    pub fn before_send<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&mut SendCtx<'a>) -> HookAction + Send + Sync + 'static,
    {
        self.before_send.push(Arc::new(callback));
    }

    /// Observes the prepared transport request.
    pub fn request_created<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&SendCtx<'a>) + Send + Sync + 'static,
    {
        self.request_created.push(Arc::new(callback));
    }

    /// Runs before the payload is wrapped into a content writer.
    pub fn before_wrap<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&mut WrapCtx<'a>) -> HookAction + Send + Sync + 'static,
    {
        self.before_wrap.push(Arc::new(callback));
    }

    /// Runs before the response reader is negotiated.
    pub fn before_negotiate<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&mut NegotiateCtx<'a>) -> HookAction + Send + Sync + 'static,
    {
        self.before_negotiate.push(Arc::new(callback));
    }

    /// Validates response headers and the materialized content; may veto by
    /// faulting, or request a resubmit.
    pub fn validate_response<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&ValidateCtx<'a>) -> HookAction + Send + Sync + 'static,
    {
        self.validate_response.push(Arc::new(callback));
    }

    /// Observes successful completion.
    pub fn on_finished<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&EndCtx<'a>) + Send + Sync + 'static,
    {
        self.on_finished.push(Arc::new(callback));
    }

    /// Observes failed completion.
    pub fn on_failed<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&EndCtx<'a>) + Send + Sync + 'static,
    {
        self.on_failed.push(Arc::new(callback));
    }

    /// Observes cancelled completion.
    pub fn on_cancelled<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&EndCtx<'a>) + Send + Sync + 'static,
    {
        self.on_cancelled.push(Arc::new(callback));
    }

    /// Observes the end of every request exactly once, after the
    /// finished/failed/cancelled observers.
    pub fn request_end<F>(&mut self, callback: F)
    where
        F: for<'a> Fn(&EndCtx<'a>) + Send + Sync + 'static,
    {
        self.request_end.push(Arc::new(callback));
    }

    pub(crate) fn run_before_send(&self, ctx: &mut SendCtx<'_>) -> HookAction {
        for hook in &self.before_send {
            match hook(ctx) {
                HookAction::Continue => {}
                other => return other,
            }
        }
        HookAction::Continue
    }

    pub(crate) fn run_request_created(&self, ctx: &SendCtx<'_>) {
        for hook in &self.request_created {
            hook(ctx);
        }
    }

    pub(crate) fn run_before_wrap(&self, ctx: &mut WrapCtx<'_>) -> HookAction {
        for hook in &self.before_wrap {
            match hook(ctx) {
                HookAction::Continue => {}
                other => return other,
            }
        }
        HookAction::Continue
    }

    pub(crate) fn run_before_negotiate(&self, ctx: &mut NegotiateCtx<'_>) -> HookAction {
        for hook in &self.before_negotiate {
            match hook(ctx) {
                HookAction::Continue => {}
                other => return other,
            }
        }
        HookAction::Continue
    }

    pub(crate) fn run_validate_response(&self, ctx: &ValidateCtx<'_>) -> HookAction {
        for hook in &self.validate_response {
            match hook(ctx) {
                HookAction::Continue => {}
                other => return other,
            }
        }
        HookAction::Continue
    }

    pub(crate) fn run_terminal(&self, ctx: &EndCtx<'_>) {
        let observers = match ctx.ending {
            Ending::Finished => &self.on_finished,
            Ending::Failed => &self.on_failed,
            Ending::Cancelled => &self.on_cancelled,
        };
        for hook in observers {
            hook(ctx);
        }
        for hook in &self.request_end {
            hook(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn hooks_run_in_registration_order_and_short_circuit() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();

        let first = Arc::clone(&order);
        hooks.before_send(move |_| {
            first.lock().expect("lock").push(1);
            HookAction::Continue
        });
        let second = Arc::clone(&order);
        hooks.before_send(move |_| {
            second.lock().expect("lock").push(2);
            HookAction::Cancel
        });
        let third = Arc::clone(&order);
        hooks.before_send(move |_| {
            third.lock().expect("lock").push(3);
            HookAction::Continue
        });

        let mut request = Request::new(
            http::Method::GET,
            url::Url::parse("http://example.test/").expect("url"),
        );
        let action = hooks.run_before_send(&mut SendCtx {
            request: &mut request,
        });
        assert!(matches!(action, HookAction::Cancel));
        assert_eq!(*order.lock().expect("lock"), vec![1, 2]);
    }

    #[test]
    fn terminal_observers_fire_specific_then_request_end() {
        let ends = Arc::new(AtomicUsize::new(0));
        let finishes = Arc::new(AtomicUsize::new(0));
        let mut hooks = Hooks::new();
        let finish_count = Arc::clone(&finishes);
        hooks.on_finished(move |_| {
            finish_count.fetch_add(1, Ordering::SeqCst);
        });
        let end_count = Arc::clone(&ends);
        hooks.request_end(move |_| {
            end_count.fetch_add(1, Ordering::SeqCst);
        });

        let request = Request::new(
            http::Method::GET,
            url::Url::parse("http://example.test/").expect("url"),
        );
        hooks.run_terminal(&EndCtx {
            request: &request,
            response: None,
            ending: Ending::Finished,
            fault: None,
        });
        assert_eq!(finishes.load(Ordering::SeqCst), 1);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }
}
