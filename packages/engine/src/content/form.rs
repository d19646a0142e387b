//! Object-to-form binding
//!
//! Types opt into form transmission by implementing [`FormBindable`] and
//! describing themselves to a [`FormBuilder`]. Nested bindables flatten
//! with `parent_key` naming, sequences with `parent[index]`, and recursion
//! is depth-bounded. Individual fields may alias their wire name, attach as
//! files, or embed a serialized JSON/XML sub-value instead of flattening
//! further.

use bytes::Bytes;
use serde::Serialize;

use super::multipart::MultipartBody;

/// Flattening stops past this depth.
const MAX_DEPTH: usize = 8;

/// Capability trait for payloads transmitted as form data.
pub trait FormBindable: Send + Sync {
    /// Describes this value's fields and files to the builder.
    fn bind(&self, form: &mut FormBuilder);
}

/// An attached file discovered while binding.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Collects the flattened fields and files of a bindable object tree.
#[derive(Debug, Default)]
pub struct FormBuilder {
    prefix: String,
    depth: usize,
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl FormBuilder {
    /// Creates an empty builder at the root of the key space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.prefix, name)
        }
    }

    /// Adds a plain field. Use the wire alias directly as `name` when the
    /// field is renamed.
    pub fn field<V: ToString>(&mut self, name: &str, value: V) {
        let key = self.key_for(name);
        self.fields.push((key, value.to_string()));
    }

    /// Adds an attached file.
    pub fn file<F: Into<String>>(
        &mut self,
        name: &str,
        filename: F,
        content_type: Option<String>,
        data: Bytes,
    ) {
        self.files.push(FilePart {
            name: self.key_for(name),
            filename: filename.into(),
            content_type,
            data,
        });
    }

    /// Adds a field carrying `value` serialized as a JSON sub-document
    /// instead of flattened further.
    pub fn json_field<T: Serialize>(&mut self, name: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(rendered) => self.field(name, rendered),
            Err(e) => {
                tracing::warn!(field = name, "dropping unserializable json sub-value: {e}");
            }
        }
    }

    /// Adds a field carrying `value` serialized as an XML sub-document.
    pub fn xml_field<T: Serialize>(&mut self, name: &str, value: &T) {
        match quick_xml::se::to_string(value) {
            Ok(rendered) => self.field(name, rendered),
            Err(e) => {
                tracing::warn!(field = name, "dropping unserializable xml sub-value: {e}");
            }
        }
    }

    /// Flattens a nested bindable under `parent_key` naming.
    pub fn nest(&mut self, name: &str, value: &dyn FormBindable) {
        if self.depth >= MAX_DEPTH {
            tracing::warn!(field = name, "form nesting exceeds depth bound, skipping");
            return;
        }
        let saved = std::mem::replace(&mut self.prefix, String::new());
        self.prefix = if saved.is_empty() {
            name.to_string()
        } else {
            format!("{saved}_{name}")
        };
        self.depth += 1;
        value.bind(self);
        self.depth -= 1;
        self.prefix = saved;
    }

    /// Flattens a sequence under `parent[index]` naming.
    pub fn seq<'a, I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = &'a dyn FormBindable>,
    {
        if self.depth >= MAX_DEPTH {
            tracing::warn!(field = name, "form nesting exceeds depth bound, skipping");
            return;
        }
        let base = self.key_for(name);
        let saved = std::mem::replace(&mut self.prefix, String::new());
        for (index, value) in values.into_iter().enumerate() {
            self.prefix = format!("{base}[{index}]");
            self.depth += 1;
            value.bind(self);
            self.depth -= 1;
        }
        self.prefix = saved;
    }

    /// Adds the values of a sequence of plain fields under `parent[index]`
    /// naming.
    pub fn seq_values<V: ToString, I: IntoIterator<Item = V>>(&mut self, name: &str, values: I) {
        let base = self.key_for(name);
        for (index, value) in values.into_iter().enumerate() {
            self.fields.push((format!("{base}[{index}]"), value.to_string()));
        }
    }

    /// True when at least one file part was bound.
    #[must_use]
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// The flattened plain fields.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Consumes the builder into URL-encoded text. Only valid when no
    /// files were bound.
    pub fn into_urlencoded(self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(&self.fields)
    }

    /// Consumes the builder into a multipart body carrying both fields and
    /// files.
    #[must_use]
    pub fn into_multipart(self) -> MultipartBody {
        let mut body = MultipartBody::new();
        for (name, value) in self.fields {
            body.text(name, value);
        }
        for file in self.files {
            body.file(file.name, file.filename, file.content_type, file.data);
        }
        body
    }
}
