//! Request description
//!
//! A [`Request`] is everything the caller decides about one exchange:
//! method, URL, headers, payload, the desired result shape and the policy
//! flags the pipeline consults. It is owned by the context for the
//! context's lifetime and is immutable once the send has begun.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tokio::io::AsyncRead;
use url::Url;

use crate::cancel::CancelHandle;
use crate::config::CookieMode;
use crate::content::form::FormBindable;
use crate::content::writer::ContentWriter;

/// Callback invoked with each response body chunk when the caller asked for
/// chunk delivery instead of materialization.
pub type ChunkFn = Arc<dyn Fn(Bytes) + Send + Sync>;

/// A readable request body stream with an optionally known length.
///
/// Unknown length is signalled as `None` and forces buffered transmission.
pub struct BodyStream {
    pub(crate) reader: Box<dyn AsyncRead + Send + Unpin>,
    pub(crate) len: Option<u64>,
}

impl BodyStream {
    /// Wraps a readable stream. Pass the length when it is known so the
    /// transfer can run unbuffered.
    pub fn new(reader: Box<dyn AsyncRead + Send + Unpin>, len: Option<u64>) -> Self {
        Self { reader, len }
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream").field("len", &self.len).finish()
    }
}

/// The payload a caller hands to the engine.
///
/// Negotiation turns this into a concrete [`ContentWriter`]; see the wrap
/// decision order in `negotiate`.
#[derive(Default)]
pub enum Payload {
    #[default]
    None,
    /// Raw bytes.
    Bytes(Bytes),
    /// Text content.
    Text(String),
    /// JSON data.
    Json(serde_json::Value),
    /// Pre-rendered XML text.
    Xml(String),
    /// URL-encoded form pairs.
    Form(Vec<(String, String)>),
    /// Streaming body.
    Stream(BodyStream),
    /// An already negotiated writer, passed through untouched.
    Writer(ContentWriter),
    /// An object that binds itself to form fields and files.
    Bindable(Arc<dyn FormBindable>),
    /// An opaque value resolved through the host-registered builder
    /// registry, keyed by its runtime type.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::None => f.write_str("None"),
            Payload::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Payload::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            Payload::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Payload::Xml(x) => f.debug_tuple("Xml").field(&x.len()).finish(),
            Payload::Form(pairs) => f.debug_tuple("Form").field(&pairs.len()).finish(),
            Payload::Stream(s) => f.debug_tuple("Stream").field(s).finish(),
            Payload::Writer(w) => f.debug_tuple("Writer").field(&w.class()).finish(),
            Payload::Bindable(_) => f.write_str("Bindable"),
            Payload::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// The result shape the caller wants the response materialized into.
#[derive(Clone, Default)]
pub enum ResultKind {
    /// Let read-side negotiation decide from the live headers.
    #[default]
    Auto,
    /// Materialize as text.
    Text,
    /// Materialize as raw bytes.
    Bytes,
    /// Materialize as a JSON document.
    Json,
    /// Materialize as an XML document.
    Xml,
    /// Write the body to a file; `resume` appends to a pre-existing partial
    /// file and sends the matching range request.
    File { path: PathBuf, resume: bool },
    /// Hand the raw body stream back without consuming it.
    Stream,
    /// Deliver body chunks to a callback as they arrive.
    Chunks(ChunkFn),
}

impl std::fmt::Debug for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultKind::Auto => f.write_str("Auto"),
            ResultKind::Text => f.write_str("Text"),
            ResultKind::Bytes => f.write_str("Bytes"),
            ResultKind::Json => f.write_str("Json"),
            ResultKind::Xml => f.write_str("Xml"),
            ResultKind::File { path, resume } => f
                .debug_struct("File")
                .field("path", path)
                .field("resume", resume)
                .finish(),
            ResultKind::Stream => f.write_str("Stream"),
            ResultKind::Chunks(_) => f.write_str("Chunks"),
        }
    }
}

/// One request description.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    pub(crate) payload: Payload,
    pub(crate) result_kind: ResultKind,

    /// Overrides the engine's auto-redirect flag when set.
    pub follow_redirects: Option<bool>,
    /// Overrides the engine's cookie mode when set.
    pub cookie_mode: Option<CookieMode>,
    /// Overrides the engine's auto-decompression flag when set.
    pub decompress: Option<bool>,
    /// Declared 4xx JSON error-body handling for read-side negotiation.
    pub json_error_bodies: bool,
    /// Proxy the transport should route this exchange through.
    pub proxy: Option<Url>,

    pub(crate) cancel: CancelHandle,
}

impl Request {
    /// Creates a request for `method` and `url` with no payload.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            timeout: None,
            payload: Payload::None,
            result_kind: ResultKind::Auto,
            follow_redirects: None,
            cookie_mode: None,
            decompress: None,
            json_error_bodies: false,
            proxy: None,
            cancel: CancelHandle::new(),
        }
    }

    /// The HTTP method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the request headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The per-request response-wait timeout, when set.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The desired result shape.
    #[inline]
    #[must_use]
    pub fn result_kind(&self) -> &ResultKind {
        &self.result_kind
    }

    /// The cancellation handle observed by the pipeline.
    #[inline]
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether this method carries a request body at all.
    #[must_use]
    pub fn allows_body(&self) -> bool {
        !matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    // Setters (builder pattern)

    /// Adds a header.
    #[must_use]
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        if let (Ok(name), Ok(val)) = (key.try_into(), value.try_into()) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Sets the response-wait timeout for this request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the desired result shape.
    #[must_use]
    pub fn with_result(mut self, kind: ResultKind) -> Self {
        self.result_kind = kind;
        self
    }

    /// Overrides redirect following for this request.
    #[must_use]
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    /// Overrides the cookie mode for this request.
    #[must_use]
    pub fn with_cookie_mode(mut self, mode: CookieMode) -> Self {
        self.cookie_mode = Some(mode);
        self
    }

    /// Overrides auto-decompression for this request.
    #[must_use]
    pub fn with_decompress(mut self, decompress: bool) -> Self {
        self.decompress = Some(decompress);
        self
    }

    /// Declares that 4xx responses carry JSON error bodies that should be
    /// materialized as JSON regardless of the desired result shape.
    #[must_use]
    pub fn with_json_error_bodies(mut self) -> Self {
        self.json_error_bodies = true;
        self
    }

    /// Routes this exchange through `proxy`.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Attaches an externally owned cancellation handle.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }
}
