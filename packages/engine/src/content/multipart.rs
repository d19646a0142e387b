//! Multipart form bodies
//!
//! Parts are framed eagerly into one buffer so the advertised length and
//! the written bytes always agree.

use bytes::{BufMut, Bytes, BytesMut};

/// A `multipart/form-data` body under assembly.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    parts: Vec<Part>,
}

/// One form part.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub value: PartValue,
}

/// Part payload.
#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    Bytes(Bytes),
}

impl MultipartBody {
    /// Creates an empty body with a fresh random boundary.
    #[must_use]
    pub fn new() -> Self {
        let mut suffix = String::with_capacity(16);
        for _ in 0..16 {
            let digit = fastrand::u8(0..16);
            suffix.push(char::from_digit(u32::from(digit), 16).unwrap_or('0'));
        }
        Self {
            boundary: format!("----quiver-{suffix}"),
            parts: Vec::new(),
        }
    }

    /// The boundary in use.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value for this body.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// True when no parts have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Appends a plain text field.
    pub fn text<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type: None,
            value: PartValue::Text(value.into()),
        });
    }

    /// Appends an attached file.
    pub fn file<N: Into<String>, F: Into<String>>(
        &mut self,
        name: N,
        filename: F,
        content_type: Option<String>,
        data: Bytes,
    ) {
        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename.into()),
            content_type,
            value: PartValue::Bytes(data),
        });
    }

    /// Frames every part into the final wire body.
    #[must_use]
    pub fn render(&self) -> Bytes {
        let mut out = BytesMut::new();
        for part in &self.parts {
            out.put_slice(b"--");
            out.put_slice(self.boundary.as_bytes());
            out.put_slice(b"\r\n");
            match &part.filename {
                Some(filename) => {
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            part.name, filename
                        )
                        .as_bytes(),
                    );
                    let content_type = part
                        .content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream");
                    out.put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                }
                None => {
                    out.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n",
                            part.name
                        )
                        .as_bytes(),
                    );
                    match &part.content_type {
                        Some(content_type) => {
                            out.put_slice(
                                format!("Content-Type: {content_type}\r\n\r\n").as_bytes(),
                            );
                        }
                        None => out.put_slice(b"\r\n"),
                    }
                }
            }
            match &part.value {
                PartValue::Text(text) => out.put_slice(text.as_bytes()),
                PartValue::Bytes(bytes) => out.put_slice(bytes),
            }
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"--");
        out.put_slice(self.boundary.as_bytes());
        out.put_slice(b"--\r\n");
        out.freeze()
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}
