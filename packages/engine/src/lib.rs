//! # Quiver engine
//!
//! An HTTP client execution engine. Given a request description (method,
//! URI, headers, body, desired result shape) it drives one request through
//! connect → send headers → send body → receive headers → receive body →
//! content materialization → completion, uniformly for synchronous and
//! asynchronous callers, with automatic content negotiation, byte-level
//! progress reporting, redirect and cookie handling, cancellation and
//! bounded retry.
//!
//! The engine does not speak HTTP framing, TLS or DNS; it drives a
//! [`transport::Transport`] collaborator that does. The crate ships
//! [`transport::memory::MemoryTransport`] for tests and in-process fakes.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quiver_engine::prelude::*;
//!
//! # fn transport() -> Arc<dyn Transport> { Arc::new(quiver_engine::transport::memory::MemoryTransport::new()) }
//! let engine = Engine::builder()
//!     .transport(transport())
//!     .build()
//!     .expect("engine");
//!
//! let request = Request::new(Method::GET, Url::parse("http://example.test/api").expect("url"))
//!     .with_result(ResultKind::Json);
//! let context = engine.send(request);
//! assert!(context.is_success());
//! ```

// Core modules
pub mod cancel;
pub mod config;
pub mod content;
pub mod context;
pub mod cookie;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod http;
pub mod io;
pub mod negotiate;
pub mod progress;
pub mod redirect;
pub mod retry;
pub mod transport;

// Prelude with canonical types
pub mod prelude;

pub use crate::engine::{BuildError, Engine, EngineBuilder};
pub use crate::error::{Error, Kind, Result};
