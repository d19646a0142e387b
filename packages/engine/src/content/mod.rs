//! Body content: the things that can be measured and streamed
//!
//! A [`writer::ContentWriter`] renders an outgoing payload; a
//! [`reader::ContentReader`] consumes an incoming body and owns the
//! materialized result. Which concrete variant runs is decided by
//! negotiation, never here.

pub mod form;
pub mod multipart;
pub mod reader;
pub mod writer;

use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// A parsed XML response document.
///
/// The engine validates well-formedness and records the root element; the
/// raw text stays available for host-side codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: String,
    pub text: String,
}

/// The materialized result of one consumed response body.
pub enum Materialized {
    /// Nothing was materialized (no body, or the attempt faulted first).
    None,
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
    Xml(XmlDocument),
    /// The body was written to disk.
    File { path: PathBuf, bytes_written: u64 },
    /// The raw body stream, handed back unconsumed.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// Chunks were delivered to the caller's callback as they arrived.
    Delivered { bytes_passed: u64 },
}

impl Materialized {
    /// True when a concrete result exists.
    #[must_use]
    pub fn is_some(&self) -> bool {
        !matches!(self, Materialized::None)
    }
}

impl std::fmt::Debug for Materialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Materialized::None => f.write_str("None"),
            Materialized::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            Materialized::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Materialized::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Materialized::Xml(x) => f.debug_tuple("Xml").field(&x.root).finish(),
            Materialized::File {
                path,
                bytes_written,
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("bytes_written", bytes_written)
                .finish(),
            Materialized::Stream(_) => f.write_str("Stream"),
            Materialized::Delivered { bytes_passed } => f
                .debug_struct("Delivered")
                .field("bytes_passed", bytes_passed)
                .finish(),
        }
    }
}
