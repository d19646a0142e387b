//! Header classification helpers
//!
//! Everything the engine decides from live headers lives here: content-type
//! classification for both negotiation directions, content-encoding
//! detection and `Content-Range` parsing for resumable downloads.

use http::{header, HeaderMap};

/// Content classification carried by a content writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentClass {
    #[default]
    None,
    Binary,
    Text,
    Json,
    Xml,
    Html,
    FormUrlEncoded,
    Multipart,
}

impl ContentClass {
    /// The MIME type sent for this classification, when one applies.
    /// Multipart carries its boundary and is rendered by the writer itself.
    #[must_use]
    pub fn mime(&self) -> Option<&'static str> {
        match self {
            ContentClass::None => None,
            ContentClass::Binary => Some("application/octet-stream"),
            ContentClass::Text => Some("text/plain; charset=utf-8"),
            ContentClass::Json => Some("application/json"),
            ContentClass::Xml => Some("application/xml"),
            ContentClass::Html => Some("text/html"),
            ContentClass::FormUrlEncoded => Some("application/x-www-form-urlencoded"),
            ContentClass::Multipart => None,
        }
    }
}

/// MIME family observed on a response, for read-side negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeFamily {
    Text,
    Html,
    Json,
    Xml,
    Image,
    Binary,
    Unknown,
}

/// Classifies a `Content-Type` header value into a dispatch family.
#[must_use]
pub fn classify_mime(content_type: &str) -> MimeFamily {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "text/html" | "application/xhtml+xml" => MimeFamily::Html,
        "application/json" | "text/json" => MimeFamily::Json,
        "application/xml" | "text/xml" => MimeFamily::Xml,
        "application/octet-stream" => MimeFamily::Binary,
        _ => {
            if essence.starts_with("image/") {
                MimeFamily::Image
            } else if essence.starts_with("text/") {
                MimeFamily::Text
            } else if essence.ends_with("+json") {
                MimeFamily::Json
            } else if essence.ends_with("+xml") {
                MimeFamily::Xml
            } else if essence.is_empty() {
                MimeFamily::Unknown
            } else {
                MimeFamily::Binary
            }
        }
    }
}

/// Response content codings the engine decodes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

/// Detects a decodable `Content-Encoding`.
///
/// Matches by ordinal case-insensitive substring, so `x-gzip` and
/// `gzip, identity` both count.
#[must_use]
pub fn response_encoding(headers: &HeaderMap) -> Option<Encoding> {
    let value = headers.get(header::CONTENT_ENCODING)?.to_str().ok()?;
    let lowered = value.to_ascii_lowercase();
    if lowered.contains("gzip") {
        Some(Encoding::Gzip)
    } else if lowered.contains("deflate") {
        Some(Encoding::Deflate)
    } else {
        None
    }
}

/// The declared response length, when the header is present and numeric.
#[must_use]
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Reported `Content-Type`, if any.
#[must_use]
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE)?.to_str().ok()
}

/// A parsed `Content-Range` response header.
///
/// Used to validate resumed partial downloads: `bytes 500-999/1234`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub unit: String,
    pub from: u64,
    pub to: u64,
    /// None when the server reported `*`.
    pub total: Option<u64>,
}

impl Range {
    /// Parses a `Content-Range` header value; None when malformed or when
    /// the range itself is unsatisfied (`bytes */1234`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Range> {
        let value = value.trim();
        let (unit, rest) = value.split_once(' ')?;
        let (span, total) = rest.split_once('/')?;
        let (from, to) = span.split_once('-')?;
        let from = from.trim().parse().ok()?;
        let to = to.trim().parse().ok()?;
        if to < from {
            return None;
        }
        let total = match total.trim() {
            "*" => None,
            n => Some(n.parse().ok()?),
        };
        Some(Range {
            unit: unit.to_string(),
            from,
            to,
            total,
        })
    }

    /// Parses the `Content-Range` header from a response header map.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Range> {
        Range::parse(headers.get(header::CONTENT_RANGE)?.to_str().ok()?)
    }
}
