use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;

/// A `Result` alias where the `Err` case is `quiver_engine::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a fault recorded while executing a request.
///
/// One value of this type travels with the context that produced it: faults
/// from the transport and from content processing are stored here and
/// classified once at completion, never thrown across an async boundary.
#[derive(Clone)]
pub struct Error {
    pub(crate) inner: Box<Inner>,
}

pub(crate) struct Inner {
    pub(crate) kind: Kind,
    pub(crate) source: Option<Box<dyn StdError + Send + Sync>>,
    pub(crate) url: Option<url::Url>,
}

impl Clone for Inner {
    fn clone(&self) -> Self {
        Inner {
            kind: self.kind.clone(),
            source: None, // trait objects cannot be cloned, the source is dropped
            url: self.url.clone(),
        }
    }
}

/// Fault taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Operation aborted by the caller or by a deadline. Never retried
    /// automatically; completion is marked cancelled rather than failed.
    Cancelled,
    /// Connection-level failure surfaced by the transport.
    Transport,
    /// No response arrived within the configured window.
    Timeout,
    /// The peer violated the protocol, e.g. a redirect status without a
    /// `Location` header.
    Protocol,
    /// Negotiation or (de)serialization failure while materializing a body.
    Content,
    /// The caller misused the API (double send, result type mismatch).
    /// Reported at the call site, not through the completion pipeline.
    Usage,
    /// An HTTP error status observed while classifying a response.
    Status(StatusCode),
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                url: None,
            }),
        }
    }

    #[must_use = "error builder methods return a new Error and should be used"]
    pub(crate) fn with<E: Into<Box<dyn StdError + Send + Sync>>>(mut self, source: E) -> Error {
        self.inner.source = Some(source.into());
        self
    }

    #[must_use]
    pub(crate) fn with_url(mut self, url: url::Url) -> Self {
        self.inner.url = Some(url);
        self
    }

    /// The taxonomy bucket this fault falls into.
    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// The URL associated with this fault, if any.
    #[must_use]
    pub fn url(&self) -> Option<&url::Url> {
        self.inner.url.as_ref()
    }

    /// Returns true for the distinguished cancellation fault.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.kind, Kind::Cancelled)
    }

    /// Returns true when the fault is a response-wait timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    /// Returns true for caller misuse reported at the call site.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self.inner.kind, Kind::Usage)
    }

    /// The HTTP status carried by a status-classification fault.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self.inner.kind {
            Kind::Status(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("quiver_engine::Error");

        f.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }

        if let Some(ref url) = self.inner.url {
            f.field("url", url);
        }

        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::Cancelled => f.write_str("operation cancelled")?,
            Kind::Transport => f.write_str("transport error")?,
            Kind::Timeout => f.write_str("timed out waiting for the response")?,
            Kind::Protocol => f.write_str("protocol violation")?,
            Kind::Content => f.write_str("error materializing body content")?,
            Kind::Usage => f.write_str("api misuse")?,
            Kind::Status(code) => {
                let prefix = if code.is_client_error() {
                    "HTTP status client error"
                } else {
                    "HTTP status server error"
                };
                write!(f, "{prefix} ({code})")?;
            }
        }
        if let Some(url) = &self.inner.url {
            write!(f, " for url ({url})")?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}
