//! Response snapshot
//!
//! A [`Response`] exists from the moment the transport returns headers. The
//! materialized body lives in the attached content reader, which is replaced
//! wholesale when the context resubmits.

use http::{HeaderMap, StatusCode};
use url::Url;

use super::headers::{self, Range};
use crate::content::reader::ContentReader;

/// A redirect observed on this response.
///
/// Synthesized when a 3xx status carries a `Location` header, or when the
/// transport reports a final URL different from the one requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub status: StatusCode,
    pub location: Url,
}

/// Response headers, status and materialized content for one attempt.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    pub(crate) redirection: Option<Redirection>,
    pub(crate) reader: Option<ContentReader>,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, url: Url) -> Self {
        Self {
            status,
            headers,
            url,
            redirection: None,
            reader: None,
        }
    }

    /// The response status code.
    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The URL this response was served from.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The redirect recorded for this response, if any.
    #[inline]
    #[must_use]
    pub fn redirection(&self) -> Option<&Redirection> {
        self.redirection.as_ref()
    }

    /// The content reader that consumed this response's body.
    #[inline]
    #[must_use]
    pub fn reader(&self) -> Option<&ContentReader> {
        self.reader.as_ref()
    }

    /// Declared body length, when the header is present.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        headers::content_length(&self.headers)
    }

    /// Parsed `Content-Range`, when present and well formed.
    #[must_use]
    pub fn content_range(&self) -> Option<Range> {
        Range::from_headers(&self.headers)
    }
}
