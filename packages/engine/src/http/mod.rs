//! HTTP-facing types: request/response descriptions and header helpers.

pub mod decompress;
pub mod headers;
pub mod request;
pub mod response;

pub use headers::{ContentClass, Encoding, MimeFamily, Range};
pub use request::{BodyStream, ChunkFn, Payload, Request, ResultKind};
pub use response::{Redirection, Response};
