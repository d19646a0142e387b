//! Outgoing body writers
//!
//! A writer owns a content classification, a length (`-1` when unknown,
//! which forces buffered transmission) and the ability to stream itself in
//! bounded chunks. Construction renders structured payloads eagerly so the
//! computed length and the written bytes always agree.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cancel::CancelHandle;
use crate::error::{self, Result};
use crate::http::headers::ContentClass;
use crate::http::request::BodyStream;
use crate::io::{step, Gate};

use super::multipart::MultipartBody;

/// A piece of outgoing data that can be measured and streamed.
pub struct ContentWriter {
    class: ContentClass,
    /// Multipart carries its boundary in the header, not in the class.
    content_type: Option<String>,
    body: WriterBody,
}

enum WriterBody {
    Buffered(Bytes),
    Stream(BodyStream),
}

impl ContentWriter {
    fn buffered(class: ContentClass, bytes: Bytes) -> Self {
        Self {
            content_type: class.mime().map(str::to_string),
            class,
            body: WriterBody::Buffered(bytes),
        }
    }

    /// A raw byte-buffer writer.
    #[must_use]
    pub fn bytes(data: Bytes) -> Self {
        Self::buffered(ContentClass::Binary, data)
    }

    /// A plain text writer.
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::buffered(ContentClass::Text, Bytes::from(text.into()))
    }

    /// A JSON writer; the value is rendered once, here.
    pub fn json(value: &serde_json::Value) -> Result<Self> {
        let rendered = serde_json::to_vec(value).map_err(error::content)?;
        Ok(Self::buffered(ContentClass::Json, Bytes::from(rendered)))
    }

    /// An XML writer over pre-rendered markup.
    #[must_use]
    pub fn xml<S: Into<String>>(markup: S) -> Self {
        Self::buffered(ContentClass::Xml, Bytes::from(markup.into()))
    }

    /// A URL-encoded form writer.
    pub fn form(pairs: &[(String, String)]) -> Result<Self> {
        let rendered = serde_urlencoded::to_string(pairs).map_err(error::content)?;
        Ok(Self::buffered(
            ContentClass::FormUrlEncoded,
            Bytes::from(rendered),
        ))
    }

    /// A form writer over text that is already URL-encoded.
    #[must_use]
    pub fn form_urlencoded<S: Into<String>>(rendered: S) -> Self {
        Self::buffered(ContentClass::FormUrlEncoded, Bytes::from(rendered.into()))
    }

    /// A multipart form writer; parts are framed eagerly.
    #[must_use]
    pub fn multipart(body: &MultipartBody) -> Self {
        Self {
            class: ContentClass::Multipart,
            content_type: Some(body.content_type()),
            body: WriterBody::Buffered(body.render()),
        }
    }

    /// A passthrough writer copying from a readable stream.
    #[must_use]
    pub fn stream(stream: BodyStream) -> Self {
        Self {
            class: ContentClass::Binary,
            content_type: ContentClass::Binary.mime().map(str::to_string),
            body: WriterBody::Stream(stream),
        }
    }

    /// The content classification.
    #[must_use]
    pub fn class(&self) -> ContentClass {
        self.class
    }

    /// The `Content-Type` header value to send, when one applies.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The body length; `-1` signals unknown and forces buffered
    /// transmission at the transport level.
    #[must_use]
    pub fn length(&self) -> i64 {
        match &self.body {
            WriterBody::Buffered(bytes) => bytes.len() as i64,
            WriterBody::Stream(stream) => {
                stream.len.map_or(-1, |len| i64::try_from(len).unwrap_or(-1))
            }
        }
    }

    /// Streams the whole body into `dst` in chunks of at most `chunk_size`
    /// bytes, one suspension per chunk.
    ///
    /// Every exit funnels through `gate`; a loser of the gate race returns
    /// the cancellation fault since the transfer was already completed by
    /// the other path.
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &mut self,
        dst: &mut W,
        chunk_size: usize,
        deadline: std::time::Duration,
        cancel: &CancelHandle,
        gate: &Gate,
    ) -> Result<u64> {
        let outcome = self
            .drive(dst, chunk_size.max(1), deadline, cancel)
            .await;
        if !gate.fire() {
            return Err(error::cancelled());
        }
        outcome
    }

    async fn drive<W: AsyncWrite + Unpin>(
        &mut self,
        dst: &mut W,
        chunk_size: usize,
        deadline: std::time::Duration,
        cancel: &CancelHandle,
    ) -> Result<u64> {
        let mut written: u64 = 0;
        match &mut self.body {
            WriterBody::Buffered(bytes) => {
                for chunk in bytes.chunks(chunk_size) {
                    step(dst.write_all(chunk), deadline, cancel).await?;
                    written += chunk.len() as u64;
                }
            }
            WriterBody::Stream(stream) => {
                let mut buf = vec![0u8; chunk_size];
                loop {
                    let n = step(stream.reader.read(&mut buf), deadline, cancel).await?;
                    if n == 0 {
                        break;
                    }
                    step(dst.write_all(&buf[..n]), deadline, cancel).await?;
                    written += n as u64;
                }
            }
        }
        step(dst.flush(), deadline, cancel).await?;
        Ok(written)
    }
}

impl std::fmt::Debug for ContentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentWriter")
            .field("class", &self.class)
            .field("length", &self.length())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn drain(writer: &mut ContentWriter) -> Vec<u8> {
        let mut out = Vec::new();
        let gate = Gate::new();
        writer
            .write_to(
                &mut out,
                3,
                Duration::from_secs(1),
                &CancelHandle::new(),
                &gate,
            )
            .await
            .expect("write");
        assert!(gate.has_fired());
        out
    }

    #[tokio::test]
    async fn length_matches_written_bytes_for_every_buffered_variant() {
        let mut writers = vec![
            ContentWriter::text("hello world"),
            ContentWriter::bytes(Bytes::from_static(b"\x00\x01\x02")),
            ContentWriter::json(&serde_json::json!({"a": 1, "b": [1, 2]})).expect("json"),
            ContentWriter::xml("<root><a>1</a></root>"),
            ContentWriter::form(&[("k".into(), "v v".into()), ("x".into(), "1".into())])
                .expect("form"),
        ];
        let mut multipart = MultipartBody::new();
        multipart.text("a", "b");
        writers.push(ContentWriter::multipart(&multipart));

        for mut writer in writers {
            let expected = writer.length();
            let out = drain(&mut writer).await;
            assert_eq!(out.len() as i64, expected);
        }
    }

    #[tokio::test]
    async fn stream_writer_reports_unknown_length() {
        let body = BodyStream::new(Box::new(&b"streaming body"[..]), None);
        let mut writer = ContentWriter::stream(body);
        assert_eq!(writer.length(), -1);
        let out = drain(&mut writer).await;
        assert_eq!(out, b"streaming body");
    }

    #[tokio::test]
    async fn cancelled_write_loses_the_gate_only_once() {
        let mut writer = ContentWriter::text("payload");
        let gate = Gate::new();
        assert!(gate.fire());
        let mut out = Vec::new();
        let result = writer
            .write_to(
                &mut out,
                4,
                Duration::from_secs(1),
                &CancelHandle::new(),
                &gate,
            )
            .await;
        assert!(result.expect_err("gate already fired").is_cancelled());
    }
}
