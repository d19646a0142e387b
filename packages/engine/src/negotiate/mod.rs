//! Content negotiation
//!
//! The write side turns a caller payload into a concrete content writer;
//! the read side picks the content reader that will consume the response
//! body, from the desired result shape and the live headers. Hosts may
//! register per-type builders that take precedence over shape dispatch;
//! the registry is keyed by runtime type and resolved once per wrap.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;

use crate::config::DefaultContentType;
use crate::content::form::FormBuilder;
use crate::content::reader::ReaderKind;
use crate::content::writer::ContentWriter;
use crate::error::{self, Result};
use crate::http::headers::{self, MimeFamily};
use crate::http::request::{Payload, ResultKind};

type WrapBuilder =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<ContentWriter> + Send + Sync>;

/// Both negotiation directions plus the host builder registry.
#[derive(Default)]
pub struct Negotiator {
    builders: HashMap<TypeId, WrapBuilder>,
}

impl Negotiator {
    /// Creates a negotiator with no registered builders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a per-type writer builder for payloads handed in as
    /// [`Payload::Custom`]. Replaces a previous builder for the same type.
    pub fn register<T, F>(&mut self, build: F)
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<ContentWriter> + Send + Sync + 'static,
    {
        self.builders.insert(
            TypeId::of::<T>(),
            Arc::new(move |value| match value.downcast_ref::<T>() {
                Some(typed) => build(typed),
                None => Err(error::usage("registered builder saw a foreign payload type")),
            }),
        );
    }

    /// Write side: wraps `payload` into a content writer.
    ///
    /// Decision order: registered per-type builder, writer passthrough,
    /// payload shape, then the content-type hint for the untyped rest.
    /// `Ok(None)` means there is no body to send.
    pub fn wrap(
        &self,
        payload: Payload,
        hint: DefaultContentType,
    ) -> Result<Option<ContentWriter>> {
        let writer = match payload {
            Payload::None => return Ok(None),
            Payload::Custom(value) => {
                let type_id = (*value).type_id();
                let builder = self.builders.get(&type_id).ok_or_else(|| {
                    error::content("no content builder registered for this payload type")
                })?;
                builder(value.as_ref())?
            }
            Payload::Writer(writer) => writer,
            Payload::Text(text) => ContentWriter::text(text),
            Payload::Bytes(bytes) => ContentWriter::bytes(bytes),
            Payload::Stream(stream) => ContentWriter::stream(stream),
            Payload::Xml(markup) => ContentWriter::xml(markup),
            Payload::Json(value) => ContentWriter::json(&value)?,
            Payload::Form(pairs) => {
                // a string map is form data unless the caller's content
                // type says json
                if hint == DefaultContentType::Json {
                    let value = serde_json::Value::Object(
                        pairs
                            .into_iter()
                            .map(|(k, v)| (k, serde_json::Value::String(v)))
                            .collect(),
                    );
                    ContentWriter::json(&value)?
                } else {
                    ContentWriter::form(&pairs)?
                }
            }
            Payload::Bindable(bindable) => {
                let mut builder = FormBuilder::new();
                bindable.bind(&mut builder);
                if builder.has_files() {
                    ContentWriter::multipart(&builder.into_multipart())
                } else {
                    let rendered = builder.into_urlencoded().map_err(error::content)?;
                    ContentWriter::form_urlencoded(rendered)
                }
            }
        };
        Ok(Some(writer))
    }

    /// Read side: picks the reader that will consume the response body.
    ///
    /// Decision order: declared 4xx JSON override, file-save target, the
    /// desired result shape, then dispatch on the observed MIME family
    /// with the generic object reader as the fallback.
    #[must_use]
    pub fn pick(
        &self,
        desired: &ResultKind,
        status: StatusCode,
        response_headers: &http::HeaderMap,
        json_error_bodies: bool,
        resume_offset: u64,
    ) -> ReaderKind {
        let family = headers::content_type(response_headers)
            .map(headers::classify_mime)
            .unwrap_or(MimeFamily::Unknown);

        if json_error_bodies && status.is_client_error() && family == MimeFamily::Json {
            return ReaderKind::Json;
        }

        match desired {
            ResultKind::File { path, .. } => ReaderKind::File {
                path: path.clone(),
                resume_offset,
            },
            ResultKind::Text => ReaderKind::Text,
            ResultKind::Bytes => ReaderKind::Bytes,
            ResultKind::Json => ReaderKind::Json,
            ResultKind::Xml => ReaderKind::Xml,
            ResultKind::Stream => ReaderKind::Stream,
            ResultKind::Chunks(callback) => ReaderKind::Chunks(Arc::clone(callback)),
            ResultKind::Auto => match family {
                MimeFamily::Text | MimeFamily::Html => ReaderKind::Text,
                MimeFamily::Json => ReaderKind::Json,
                MimeFamily::Xml => ReaderKind::Xml,
                MimeFamily::Image | MimeFamily::Binary => ReaderKind::Bytes,
                MimeFamily::Unknown => ReaderKind::Object,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::content::form::{FormBindable, FormBuilder};

    fn wrap(payload: Payload) -> ContentWriter {
        Negotiator::new()
            .wrap(payload, DefaultContentType::Json)
            .expect("wrap")
            .expect("some writer")
    }

    #[test]
    fn shape_dispatch_matches_payload_kinds() {
        use crate::http::headers::ContentClass;

        assert_eq!(wrap(Payload::Text("x".into())).class(), ContentClass::Text);
        assert_eq!(
            wrap(Payload::Bytes(Bytes::from_static(b"x"))).class(),
            ContentClass::Binary
        );
        assert_eq!(
            wrap(Payload::Json(serde_json::json!({"a": 1}))).class(),
            ContentClass::Json
        );
        assert_eq!(
            wrap(Payload::Xml("<a/>".into())).class(),
            ContentClass::Xml
        );
    }

    #[test]
    fn string_map_follows_the_hint() {
        let pairs = vec![("a".to_string(), "1".to_string())];
        let negotiator = Negotiator::new();

        let form = negotiator
            .wrap(Payload::Form(pairs.clone()), DefaultContentType::Form)
            .expect("wrap")
            .expect("writer");
        assert_eq!(form.class(), crate::http::headers::ContentClass::FormUrlEncoded);

        let json = negotiator
            .wrap(Payload::Form(pairs), DefaultContentType::Json)
            .expect("wrap")
            .expect("writer");
        assert_eq!(json.class(), crate::http::headers::ContentClass::Json);
    }

    #[test]
    fn registered_builder_wins() {
        struct Custom {
            data: &'static str,
        }
        let mut negotiator = Negotiator::new();
        negotiator.register::<Custom, _>(|custom| Ok(ContentWriter::text(custom.data)));

        let writer = negotiator
            .wrap(
                Payload::Custom(Arc::new(Custom { data: "built" })),
                DefaultContentType::Json,
            )
            .expect("wrap")
            .expect("writer");
        assert_eq!(writer.length(), 5);
    }

    #[test]
    fn unregistered_custom_payload_is_a_content_fault() {
        struct Unknown;
        let err = Negotiator::new()
            .wrap(Payload::Custom(Arc::new(Unknown)), DefaultContentType::Json)
            .expect_err("no builder registered");
        assert!(matches!(err.kind(), crate::error::Kind::Content));
    }

    #[test]
    fn bindable_with_files_goes_multipart() {
        struct Upload;
        impl FormBindable for Upload {
            fn bind(&self, form: &mut FormBuilder) {
                form.field("k", "v");
                form.file("f", "a.bin", None, Bytes::from_static(b"x"));
            }
        }
        let writer = wrap(Payload::Bindable(Arc::new(Upload)));
        assert_eq!(writer.class(), crate::http::headers::ContentClass::Multipart);
    }

    #[test]
    fn read_side_dispatches_on_desired_then_mime() {
        let negotiator = Negotiator::new();
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            "application/json".parse().expect("value"),
        );

        let auto = negotiator.pick(&ResultKind::Auto, StatusCode::OK, &headers, false, 0);
        assert!(matches!(auto, ReaderKind::Json));

        let text = negotiator.pick(&ResultKind::Text, StatusCode::OK, &headers, false, 0);
        assert!(matches!(text, ReaderKind::Text));

        let empty = http::HeaderMap::new();
        let object = negotiator.pick(&ResultKind::Auto, StatusCode::OK, &empty, false, 0);
        assert!(matches!(object, ReaderKind::Object));
    }

    #[test]
    fn declared_error_override_beats_desired_shape() {
        let negotiator = Negotiator::new();
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            "application/json".parse().expect("value"),
        );
        let picked = negotiator.pick(
            &ResultKind::Bytes,
            StatusCode::UNPROCESSABLE_ENTITY,
            &headers,
            true,
            0,
        );
        assert!(matches!(picked, ReaderKind::Json));
    }

    #[test]
    fn save_target_forces_the_file_reader() {
        let negotiator = Negotiator::new();
        let picked = negotiator.pick(
            &ResultKind::File {
                path: "/tmp/out.bin".into(),
                resume: true,
            },
            StatusCode::PARTIAL_CONTENT,
            &http::HeaderMap::new(),
            false,
            42,
        );
        assert!(matches!(
            picked,
            ReaderKind::File { resume_offset: 42, .. }
        ));
    }
}
