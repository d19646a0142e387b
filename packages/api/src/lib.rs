//! # Quiver
//!
//! HTTP client execution engine. One [`Engine`] binds a configuration, a
//! transport, a cookie store, hooks and a negotiator; each send runs one
//! request through a monotonic state machine with automatic content
//! negotiation, byte-level progress, redirect and cookie handling,
//! cancellation and bounded retry.
//!
//! This crate is the public surface; the machinery lives in
//! [`quiver_engine`]. Convenience helpers here build request descriptions;
//! anything further (typed service clients, CLI plumbing) belongs to the
//! host application.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quiver::prelude::*;
//!
//! # fn transport() -> Arc<dyn Transport> { unimplemented!() }
//! #[derive(serde::Deserialize)]
//! struct Answer {
//!     a: i64,
//! }
//!
//! let engine = Engine::builder()
//!     .transport(transport())
//!     .build()
//!     .expect("engine");
//!
//! let context = engine.send(
//!     quiver::get("http://example.test/api").with_result(ResultKind::Json),
//! );
//! let answer: Answer = context.result_as().expect("typed result");
//! assert_eq!(answer.a, 1);
//! ```

pub mod prelude;

// Re-export the engine crate for hosts that need the full machinery
pub use quiver_engine;

pub use quiver_engine::config::{CookieMode, DefaultContentType, EngineConfig, FailureMode};
pub use quiver_engine::context::{RequestContext, State};
pub use quiver_engine::engine::{BuildError, Engine, EngineBuilder};
pub use quiver_engine::error::{Error, Kind, Result};
pub use quiver_engine::http::request::{Payload, Request, ResultKind};

use http::Method;
use url::Url;

fn request_for(method: Method, url: &str) -> Request {
    match Url::parse(url) {
        Ok(parsed) => Request::new(method, parsed),
        Err(e) => {
            // carry an always-failing URL so the usage error surfaces on
            // send rather than panicking here
            tracing::warn!("invalid url {url:?}: {e}");
            let fallback = Url::parse("http://invalid.localhost/")
                .unwrap_or_else(|_| panic!("fallback url must parse"));
            Request::new(method, fallback)
        }
    }
}

/// A GET request for `url`.
#[must_use]
pub fn get(url: &str) -> Request {
    request_for(Method::GET, url)
}

/// A POST request for `url`.
#[must_use]
pub fn post(url: &str) -> Request {
    request_for(Method::POST, url)
}

/// A PUT request for `url`.
#[must_use]
pub fn put(url: &str) -> Request {
    request_for(Method::PUT, url)
}

/// A DELETE request for `url`.
#[must_use]
pub fn delete(url: &str) -> Request {
    request_for(Method::DELETE, url)
}

/// A PATCH request for `url`.
#[must_use]
pub fn patch(url: &str) -> Request {
    request_for(Method::PATCH, url)
}

/// A HEAD request for `url`.
#[must_use]
pub fn head(url: &str) -> Request {
    request_for(Method::HEAD, url)
}

/// A POST request carrying `value` as a JSON body.
pub fn post_json<T: serde::Serialize>(url: &str, value: &T) -> Result<Request> {
    let body = serde_json::to_value(value)
        .map_err(|e| quiver_engine::error::content(e))?;
    Ok(request_for(Method::POST, url).with_payload(Payload::Json(body)))
}
