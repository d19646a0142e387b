//! The transport seam
//!
//! The engine does not speak HTTP framing, TLS or DNS; it drives a
//! [`Transport`] collaborator through open → write-stream → response →
//! abort. Diagnostics come through the narrow [`Transport::connection_info`]
//! accessor rather than any reach into transport internals.

pub mod memory;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use url::Url;

/// Opaque identifier of one live transport exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// What the engine asks the transport to open.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Announced body length; `-1` means unknown, which requests buffered
    /// transmission from the transport.
    pub body_length: Option<i64>,
    /// Proxy to route through, when the caller asked for one.
    pub proxy: Option<Url>,
}

/// What the transport returns once response headers arrived.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Where the response was actually served from, when the transport
    /// followed protocol-level indirection itself.
    pub final_url: Option<Url>,
    pub body: Box<dyn AsyncRead + Send + Sync + Unpin>,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("final_url", &self.final_url)
            .finish()
    }
}

/// Connection diagnostics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub local_addr: Option<SocketAddr>,
    pub remote_addr: Option<SocketAddr>,
    pub protocol: Option<String>,
}

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established or broke mid-exchange.
    #[error("connection failed: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The exchange failed at protocol level but still produced a
    /// response; the engine constructs a `Response` from it anyway.
    #[error("protocol error with status {}", .0.status)]
    Status(Box<Reply>),
    /// The exchange was aborted through [`Transport::abort`].
    #[error("exchange aborted")]
    Aborted,
}

/// The external collaborator that actually moves bytes.
pub trait Transport: Send + Sync + 'static {
    /// Prepares a transport-level request. No bytes hit the wire until the
    /// write stream or the response is requested.
    fn open(&self, outgoing: Outgoing) -> Result<Handle, TransportError>;

    /// The stream request body bytes are written into.
    fn write_stream<'a>(
        &'a self,
        handle: Handle,
    ) -> BoxFuture<'a, Result<Box<dyn AsyncWrite + Send + Unpin>, TransportError>>;

    /// Resolves once response status and headers are available.
    fn response<'a>(&'a self, handle: Handle) -> BoxFuture<'a, Result<Reply, TransportError>>;

    /// Aborts the live exchange; safe to call at any point.
    fn abort(&self, handle: Handle);

    /// Diagnostics for the connection carrying `handle`, when known.
    fn connection_info(&self, handle: Handle) -> Option<ConnectionInfo> {
        let _ = handle;
        None
    }
}

/// Process-wide correlation of live transport handles to their owning
/// contexts.
///
/// Transport-level callbacks only know the handle; this map lets them find
/// the context. Entries are removed when the owning context completes or is
/// dropped.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: DashMap<u64, u64>,
    next_context: AtomicU64,
}

impl HandleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh context identifier.
    pub(crate) fn issue_context_id(&self) -> u64 {
        self.next_context.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Associates a live handle with its owning context.
    pub fn bind(&self, handle: Handle, context_id: u64) {
        self.entries.insert(handle.0, context_id);
    }

    /// Looks up the context owning `handle`.
    #[must_use]
    pub fn owner(&self, handle: Handle) -> Option<u64> {
        self.entries.get(&handle.0).map(|entry| *entry)
    }

    /// Drops the association for `handle`.
    pub fn release(&self, handle: Handle) {
        self.entries.remove(&handle.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_binds_and_releases() {
        let registry = HandleRegistry::new();
        let context = registry.issue_context_id();
        registry.bind(Handle(7), context);
        assert_eq!(registry.owner(Handle(7)), Some(context));
        registry.release(Handle(7));
        assert_eq!(registry.owner(Handle(7)), None);
    }
}
