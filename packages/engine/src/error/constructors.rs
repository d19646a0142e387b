use super::types::{Error, Kind};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Creates an `Error` for a cancelled operation.
pub fn cancelled() -> Error {
    Error::new(Kind::Cancelled)
}

/// Creates an `Error` for a transport-level failure.
pub fn transport<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Transport).with(e.into())
}

/// Creates an `Error` for a response-wait timeout.
pub fn timeout(url: url::Url) -> Error {
    Error::new(Kind::Timeout).with_url(url)
}

/// Creates an `Error` for a protocol violation.
pub fn protocol<E: Into<BoxError>>(e: E, url: url::Url) -> Error {
    Error::new(Kind::Protocol).with(e.into()).with_url(url)
}

/// Creates an `Error` for a content negotiation or materialization failure.
pub fn content<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Content).with(e.into())
}

/// Creates an `Error` for caller misuse, reported at the call site.
pub fn usage(message: &'static str) -> Error {
    Error::new(Kind::Usage).with(message)
}

/// Creates an `Error` recording an HTTP error status.
pub fn status_code(url: url::Url, status: http::StatusCode) -> Error {
    Error::new(Kind::Status(status)).with_url(url)
}
