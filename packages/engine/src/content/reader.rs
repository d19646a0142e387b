//! Incoming body readers
//!
//! A reader consumes one response body through the chunked protocol
//! (`begin` → `push`* → `finish`) and owns the materialized result plus any
//! content fault recorded along the way. One instance exists per response
//! and is replaced wholesale on resubmission.

use std::path::PathBuf;
use std::sync::LazyLock;

use bytes::{Bytes, BytesMut};
use regex::Regex;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::{self, Error, Result};
use crate::http::headers::Range;
use crate::http::request::ChunkFn;

use super::{Materialized, XmlDocument};

/// Locates a JSONP wrapper: `callback({...});`. Best effort.
static JSONP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*[A-Za-z_$][A-Za-z0-9_$.]*\s*\((.*)\)\s*;?\s*$")
        .unwrap_or_else(|e| panic!("jsonp pattern must compile: {e}"))
});

/// The concrete materialization a reader performs.
pub enum ReaderKind {
    /// Materialize as text.
    Text,
    /// Materialize as raw bytes.
    Bytes,
    /// Materialize as a JSON document.
    Json,
    /// Materialize as an XML document.
    Xml,
    /// Write the body to disk, appending when a validated resume is in
    /// progress.
    File { path: PathBuf, resume_offset: u64 },
    /// Hand the raw stream back without consuming it.
    Stream,
    /// Deliver each chunk to the caller's callback.
    Chunks(ChunkFn),
    /// Generic fallback: JSON, then XML, then JSONP, then binary.
    Object,
}

impl std::fmt::Debug for ReaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderKind::Text => f.write_str("Text"),
            ReaderKind::Bytes => f.write_str("Bytes"),
            ReaderKind::Json => f.write_str("Json"),
            ReaderKind::Xml => f.write_str("Xml"),
            ReaderKind::File {
                path,
                resume_offset,
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("resume_offset", resume_offset)
                .finish(),
            ReaderKind::Stream => f.write_str("Stream"),
            ReaderKind::Chunks(_) => f.write_str("Chunks"),
            ReaderKind::Object => f.write_str("Object"),
        }
    }
}

/// Consumes one response body and owns the result.
#[derive(Debug)]
pub struct ContentReader {
    kind: ReaderKind,
    buf: BytesMut,
    file: Option<tokio::fs::File>,
    bytes_passed: u64,
    materialized: Materialized,
    error: Option<Error>,
}

impl ContentReader {
    /// Creates a reader for the negotiated kind.
    #[must_use]
    pub fn new(kind: ReaderKind) -> Self {
        Self {
            kind,
            buf: BytesMut::new(),
            file: None,
            bytes_passed: 0,
            materialized: Materialized::None,
            error: None,
        }
    }

    /// The negotiated kind.
    #[must_use]
    pub fn kind(&self) -> &ReaderKind {
        &self.kind
    }

    /// Total body bytes this reader has accepted.
    #[must_use]
    pub fn bytes_passed(&self) -> u64 {
        self.bytes_passed
    }

    /// Prepares for consumption. For file targets this opens the
    /// destination: append mode when the server confirmed the requested
    /// resume range, truncation otherwise.
    pub async fn begin(
        &mut self,
        status: http::StatusCode,
        content_range: Option<&Range>,
    ) -> Result<()> {
        if let ReaderKind::File {
            path,
            resume_offset,
        } = &self.kind
        {
            if status == http::StatusCode::RANGE_NOT_SATISFIABLE {
                // resume already complete, no body will follow
                return Ok(());
            }
            let resuming = *resume_offset > 0
                && status == http::StatusCode::PARTIAL_CONTENT
                && content_range.is_some_and(|range| range.from == *resume_offset);
            let file = if resuming {
                tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(path)
                    .await
                    .map_err(error::content)?
            } else {
                tokio::fs::File::create(path).await.map_err(error::content)?
            };
            self.file = Some(file);
        }
        Ok(())
    }

    /// Accepts one body chunk.
    pub async fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.bytes_passed += chunk.len() as u64;
        match &self.kind {
            ReaderKind::File { .. } => {
                if let Some(file) = self.file.as_mut() {
                    file.write_all(chunk).await.map_err(error::content)?;
                }
            }
            ReaderKind::Chunks(callback) => {
                callback(Bytes::copy_from_slice(chunk));
            }
            ReaderKind::Stream => {}
            _ => self.buf.extend_from_slice(chunk),
        }
        Ok(())
    }

    /// Stores the unconsumed body stream for a raw-stream handoff.
    pub fn set_stream(&mut self, stream: Box<dyn AsyncRead + Send + Unpin>) {
        self.materialized = Materialized::Stream(stream);
    }

    /// Completes consumption and materializes the result. A recorded fault
    /// is kept on the reader and returned.
    pub async fn finish(&mut self) -> Result<()> {
        let outcome = self.materialize().await;
        if let Err(e) = &outcome {
            self.error = Some(e.clone());
        }
        outcome
    }

    async fn materialize(&mut self) -> Result<()> {
        match &self.kind {
            ReaderKind::Text => {
                let body = self.buf.split().freeze();
                self.materialized =
                    Materialized::Text(String::from_utf8_lossy(&body).into_owned());
            }
            ReaderKind::Bytes => {
                self.materialized = Materialized::Bytes(self.buf.split().freeze());
            }
            ReaderKind::Json => {
                let body = self.buf.split().freeze();
                let value = serde_json::from_slice(&body).map_err(error::content)?;
                self.materialized = Materialized::Json(value);
            }
            ReaderKind::Xml => {
                let body = self.buf.split().freeze();
                let text = String::from_utf8_lossy(&body).into_owned();
                self.materialized = Materialized::Xml(parse_xml(&text)?);
            }
            ReaderKind::File { path, .. } => {
                if let Some(mut file) = self.file.take() {
                    file.flush().await.map_err(error::content)?;
                }
                self.materialized = Materialized::File {
                    path: path.clone(),
                    bytes_written: self.bytes_passed,
                };
            }
            ReaderKind::Stream => {
                // the stream was handed over in set_stream
            }
            ReaderKind::Chunks(_) => {
                self.materialized = Materialized::Delivered {
                    bytes_passed: self.bytes_passed,
                };
            }
            ReaderKind::Object => {
                let body = self.buf.split().freeze();
                self.materialized = materialize_object(&body);
            }
        }
        Ok(())
    }

    /// The materialized result.
    #[must_use]
    pub fn materialized(&self) -> &Materialized {
        &self.materialized
    }

    /// The fault recorded while materializing, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// The result as text, when it materialized as text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.materialized {
            Materialized::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The result as raw bytes, when it materialized as bytes.
    #[must_use]
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.materialized {
            Materialized::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The result as a JSON document, when it materialized as JSON.
    #[must_use]
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.materialized {
            Materialized::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The result as an XML document, when it materialized as XML.
    #[must_use]
    pub fn xml(&self) -> Option<&XmlDocument> {
        match &self.materialized {
            Materialized::Xml(doc) => Some(doc),
            _ => None,
        }
    }

    /// Deserializes the materialized result into `T`.
    ///
    /// A shape that cannot carry `T` at all is a usage fault, reported
    /// here at the call site; a JSON document that fails to deserialize
    /// into `T` is a content fault.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.materialized {
            Materialized::Json(value) => {
                serde_json::from_value(value.clone()).map_err(error::content)
            }
            Materialized::Text(text) => serde_json::from_str(text).map_err(error::content),
            Materialized::None => Err(error::usage(
                "no materialized result is available on this context",
            )),
            _ => Err(error::usage(
                "the materialized result does not match the requested type",
            )),
        }
    }

    /// Takes the raw body stream out of a stream handoff. The progress
    /// decorator stays attached, so reads keep counting.
    pub fn take_stream(&mut self) -> Option<Box<dyn AsyncRead + Send + Unpin>> {
        match std::mem::replace(&mut self.materialized, Materialized::None) {
            Materialized::Stream(stream) => Some(stream),
            other => {
                self.materialized = other;
                None
            }
        }
    }
}

/// Validates well-formedness and captures the root element name.
fn parse_xml(text: &str) -> Result<XmlDocument> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(text);
    let mut root = None;
    let mut depth = 0usize;
    loop {
        match reader.read_event().map_err(error::content)? {
            Event::Start(start) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                }
                depth += 1;
            }
            Event::Empty(empty) => {
                if root.is_none() {
                    root = Some(String::from_utf8_lossy(empty.name().as_ref()).into_owned());
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    match root {
        Some(root) if depth == 0 => Ok(XmlDocument {
            root,
            text: text.to_string(),
        }),
        _ => Err(error::content("response body is not a well-formed xml document")),
    }
}

/// The generic fallback: dispatch on the first significant byte, then
/// JSON → XML → JSONP → binary. Parse failures fall back to binary rather
/// than faulting, since the caller asked for "whatever this is".
fn materialize_object(body: &Bytes) -> Materialized {
    let first = body.iter().copied().find(|b| !b.is_ascii_whitespace());
    match first {
        Some(b'{') | Some(b'[') => {
            if let Ok(value) = serde_json::from_slice(body) {
                return Materialized::Json(value);
            }
        }
        Some(b'<') => {
            let text = String::from_utf8_lossy(body);
            if let Ok(doc) = parse_xml(&text) {
                return Materialized::Xml(doc);
            }
        }
        Some(_) => {
            let text = String::from_utf8_lossy(body);
            if let Some(captures) = JSONP.captures(&text) {
                if let Some(inner) = captures.get(1) {
                    if let Ok(value) = serde_json::from_str(inner.as_str()) {
                        return Materialized::Json(value);
                    }
                }
            }
        }
        None => {}
    }
    Materialized::Bytes(body.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn consume(kind: ReaderKind, body: &[u8]) -> ContentReader {
        let mut reader = ContentReader::new(kind);
        reader
            .begin(http::StatusCode::OK, None)
            .await
            .expect("begin");
        for chunk in body.chunks(3) {
            reader.push(chunk).await.expect("push");
        }
        reader.finish().await.expect("finish");
        reader
    }

    #[tokio::test]
    async fn text_reader_materializes_text() {
        let reader = consume(ReaderKind::Text, b"maintenance").await;
        assert_eq!(reader.text(), Some("maintenance"));
        assert_eq!(reader.bytes_passed(), 11);
    }

    #[tokio::test]
    async fn json_reader_materializes_value() {
        let reader = consume(ReaderKind::Json, br#"{"a":1}"#).await;
        assert_eq!(reader.json(), Some(&serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn json_reader_faults_on_garbage() {
        let mut reader = ContentReader::new(ReaderKind::Json);
        reader
            .begin(http::StatusCode::OK, None)
            .await
            .expect("begin");
        reader.push(b"not json").await.expect("push");
        let fault = reader.finish().await.expect_err("should fault");
        assert!(matches!(fault.kind(), crate::error::Kind::Content));
        assert!(reader.error().is_some());
    }

    #[tokio::test]
    async fn object_reader_sniffs_json_xml_jsonp_and_binary() {
        let json = consume(ReaderKind::Object, br#"  {"a":1}"#).await;
        assert!(json.json().is_some());

        let xml = consume(ReaderKind::Object, b"<root><a>1</a></root>").await;
        assert_eq!(xml.xml().map(|d| d.root.as_str()), Some("root"));

        let jsonp = consume(ReaderKind::Object, br#"handle({"a":1});"#).await;
        assert_eq!(jsonp.json(), Some(&serde_json::json!({"a": 1})));

        let binary = consume(ReaderKind::Object, b"\x7f\x02\x03").await;
        assert!(matches!(binary.materialized(), Materialized::Bytes(_)));
    }

    #[tokio::test]
    async fn object_reader_falls_back_to_bytes_on_malformed_json() {
        let reader = consume(ReaderKind::Object, b"{oops").await;
        assert!(matches!(reader.materialized(), Materialized::Bytes(_)));
    }

    #[tokio::test]
    async fn typed_access_mismatch_is_a_usage_fault() {
        let reader = consume(ReaderKind::Object, b"\x01\x02").await;
        let err = reader
            .result_as::<serde_json::Value>()
            .expect_err("bytes cannot satisfy a typed request");
        assert!(err.is_usage());
    }

    #[tokio::test]
    async fn file_reader_truncates_without_resume() {
        let dir = std::env::temp_dir().join("quiver-reader-tests");
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");
        let path = dir.join("plain.bin");
        tokio::fs::write(&path, b"old content").await.expect("seed");

        let mut reader = ContentReader::new(ReaderKind::File {
            path: path.clone(),
            resume_offset: 0,
        });
        reader
            .begin(http::StatusCode::OK, None)
            .await
            .expect("begin");
        reader.push(b"fresh").await.expect("push");
        reader.finish().await.expect("finish");

        let written = tokio::fs::read(&path).await.expect("read back");
        assert_eq!(written, b"fresh");
    }

    #[tokio::test]
    async fn file_reader_appends_on_validated_resume() {
        let dir = std::env::temp_dir().join("quiver-reader-tests");
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");
        let path = dir.join("resumed.bin");
        tokio::fs::write(&path, b"01234").await.expect("seed");

        let range = Range::parse("bytes 5-9/10").expect("range");
        let mut reader = ContentReader::new(ReaderKind::File {
            path: path.clone(),
            resume_offset: 5,
        });
        reader
            .begin(http::StatusCode::PARTIAL_CONTENT, Some(&range))
            .await
            .expect("begin");
        reader.push(b"56789").await.expect("push");
        reader.finish().await.expect("finish");

        let written = tokio::fs::read(&path).await.expect("read back");
        assert_eq!(written, b"0123456789");
        assert!(matches!(
            reader.materialized(),
            Materialized::File { bytes_written: 5, .. }
        ));
    }
}
