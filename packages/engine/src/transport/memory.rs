//! In-memory transport
//!
//! Serves scripted replies without sockets. The test suite drives the full
//! pipeline against this; hosts can also use it to fake a backend.

use std::collections::VecDeque;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use tokio::io::AsyncWrite;
use url::Url;

use super::{ConnectionInfo, Handle, Outgoing, Reply, Transport, TransportError};

/// One canned response.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub final_url: Option<Url>,
    /// Simulated latency before headers become available.
    pub delay: Option<Duration>,
}

impl ScriptedReply {
    /// A reply with the given status and body and no extra headers.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            final_url: None,
            delay: None,
        }
    }

    /// Adds a response header.
    #[must_use]
    pub fn header(mut self, name: http::header::HeaderName, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Reports a different final URL, as a transport-followed redirect
    /// would.
    #[must_use]
    pub fn served_from(mut self, url: Url) -> Self {
        self.final_url = Some(url);
        self
    }

    /// Delays header availability.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What one exchange recorded.
#[derive(Debug, Clone)]
pub struct RecordedExchange {
    pub outgoing: Outgoing,
    pub body: Vec<u8>,
    pub aborted: bool,
}

#[derive(Debug)]
struct Exchange {
    outgoing: Outgoing,
    written: Arc<Mutex<Vec<u8>>>,
    reply: ScriptedReply,
    aborted: bool,
}

/// A transport that pops scripted replies in order.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    exchanges: DashMap<u64, Exchange>,
    order: Mutex<Vec<u64>>,
    next_handle: AtomicU64,
}

impl MemoryTransport {
    /// Creates a transport with no scripted replies; opening with an empty
    /// script is a connect error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next reply.
    pub fn push_reply(&self, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Everything recorded so far, in exchange order.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedExchange> {
        let order = self.order.lock().map(|o| o.clone()).unwrap_or_default();
        order
            .into_iter()
            .filter_map(|id| {
                self.exchanges.get(&id).map(|exchange| RecordedExchange {
                    outgoing: exchange.outgoing.clone(),
                    body: exchange
                        .written
                        .lock()
                        .map(|written| written.clone())
                        .unwrap_or_default(),
                    aborted: exchange.aborted,
                })
            })
            .collect()
    }
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for SharedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.0.lock() {
            Ok(mut sink) => {
                sink.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            Err(_) => Poll::Ready(Err(std::io::Error::other("writer poisoned"))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl Transport for MemoryTransport {
    fn open(&self, outgoing: Outgoing) -> Result<Handle, TransportError> {
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .ok_or_else(|| {
                TransportError::Connect("no scripted reply for this exchange".into())
            })?;
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.exchanges.insert(
            id,
            Exchange {
                outgoing,
                written: Arc::new(Mutex::new(Vec::new())),
                reply,
                aborted: false,
            },
        );
        if let Ok(mut order) = self.order.lock() {
            order.push(id);
        }
        Ok(Handle(id))
    }

    fn write_stream<'a>(
        &'a self,
        handle: Handle,
    ) -> BoxFuture<'a, Result<Box<dyn AsyncWrite + Send + Unpin>, TransportError>> {
        Box::pin(async move {
            let exchange = self
                .exchanges
                .get(&handle.0)
                .ok_or(TransportError::Aborted)?;
            if exchange.aborted {
                return Err(TransportError::Aborted);
            }
            let sink = Arc::clone(&exchange.written);
            Ok(Box::new(SharedWriter(sink)) as Box<dyn AsyncWrite + Send + Unpin>)
        })
    }

    fn response<'a>(&'a self, handle: Handle) -> BoxFuture<'a, Result<Reply, TransportError>> {
        Box::pin(async move {
            let (reply, aborted) = {
                let exchange = self
                    .exchanges
                    .get(&handle.0)
                    .ok_or(TransportError::Aborted)?;
                (exchange.reply.clone(), exchange.aborted)
            };
            if aborted {
                return Err(TransportError::Aborted);
            }
            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(exchange) = self.exchanges.get(&handle.0) {
                if exchange.aborted {
                    return Err(TransportError::Aborted);
                }
            }
            Ok(Reply {
                status: reply.status,
                headers: reply.headers,
                final_url: reply.final_url,
                body: Box::new(Cursor::new(reply.body.to_vec())),
            })
        })
    }

    fn abort(&self, handle: Handle) {
        if let Some(mut exchange) = self.exchanges.get_mut(&handle.0) {
            exchange.aborted = true;
        }
    }

    fn connection_info(&self, handle: Handle) -> Option<ConnectionInfo> {
        self.exchanges.get(&handle.0).map(|_| ConnectionInfo {
            local_addr: None,
            remote_addr: None,
            protocol: Some("memory".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn outgoing() -> Outgoing {
        Outgoing {
            method: Method::POST,
            url: Url::parse("http://mem.test/echo").expect("url"),
            headers: HeaderMap::new(),
            body_length: Some(4),
            proxy: None,
        }
    }

    #[tokio::test]
    async fn records_written_body_and_serves_reply() {
        let transport = MemoryTransport::new();
        transport.push_reply(ScriptedReply::new(StatusCode::OK, "pong"));

        let handle = transport.open(outgoing()).expect("open");
        let mut writer = transport.write_stream(handle).await.expect("stream");
        writer.write_all(b"ping").await.expect("write");
        writer.shutdown().await.expect("shutdown");

        let mut reply = transport.response(handle).await.expect("reply");
        assert_eq!(reply.status, StatusCode::OK);
        let mut body = Vec::new();
        reply.body.read_to_end(&mut body).await.expect("body");
        assert_eq!(body, b"pong");

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].body, b"ping");
    }

    #[tokio::test]
    async fn abort_poisons_the_exchange() {
        let transport = MemoryTransport::new();
        transport.push_reply(ScriptedReply::new(StatusCode::OK, ""));
        let handle = transport.open(outgoing()).expect("open");
        transport.abort(handle);
        let err = transport.response(handle).await.expect_err("aborted");
        assert!(matches!(err, TransportError::Aborted));
        assert!(transport.recorded()[0].aborted);
    }

    #[test]
    fn exhausted_script_is_a_connect_error() {
        let transport = MemoryTransport::new();
        let err = transport.open(outgoing()).expect_err("no reply queued");
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
