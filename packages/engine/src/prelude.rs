//! Quiver engine prelude
//!
//! The essential types for driving requests through the engine. Only
//! canonical public API types belong here.

// The engine and its configuration
pub use crate::config::{
    ConfigError, CookieMode, DefaultContentType, EngineConfig, FailureMode,
};
pub use crate::engine::{BuildError, Engine, EngineBuilder};

// Request/response vocabulary
pub use crate::http::request::{BodyStream, ChunkFn, Payload, Request, ResultKind};
pub use crate::http::response::{Redirection, Response};
pub use crate::http::{ContentClass, Encoding, MimeFamily, Range};

// The per-request context and its state machine
pub use crate::context::{Performance, RequestContext, State};

// Content materialization
pub use crate::content::form::{FormBindable, FormBuilder};
pub use crate::content::multipart::MultipartBody;
pub use crate::content::reader::{ContentReader, ReaderKind};
pub use crate::content::writer::ContentWriter;
pub use crate::content::{Materialized, XmlDocument};

// Negotiation and hooks
pub use crate::hooks::{Ending, HookAction, Hooks};
pub use crate::negotiate::Negotiator;

// Progress and cancellation
pub use crate::cancel::CancelHandle;
pub use crate::progress::{Direction, Mirror, ProgressFn, ProgressSnapshot, SpeedMonitor};

// Retry
pub use crate::retry::{send_with_retry, RetryOutcome, RetryPolicy};

// Collaborator seams
pub use crate::cookie::{CookieStore, Jar};
pub use crate::redirect::Policy;
pub use crate::transport::{
    ConnectionInfo, Handle, HandleRegistry, Outgoing, Reply, Transport, TransportError,
};

// Error types
pub use crate::error::{Error, Kind, Result};

// HTTP standard types from the http crate
pub use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

// Bytes for payloads and chunk callbacks
pub use bytes::Bytes;

// URL handling
pub use url::Url;
