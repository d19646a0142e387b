//! Response body decompression
//!
//! Gzip and deflate payloads are decoded from the buffered wire bytes before
//! the content reader materializes them. Other codings pass through
//! untouched; negotiation never selects this path for them.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use super::headers::Encoding;

/// Decodes one buffered response body.
///
/// Servers disagree on whether `deflate` means raw deflate or a zlib
/// wrapper; the zlib form is tried first and the raw form is the fallback.
pub fn decode(data: &[u8], encoding: Encoding) -> std::io::Result<Vec<u8>> {
    match encoding {
        Encoding::Gzip => {
            let mut out = Vec::with_capacity(data.len().saturating_mul(3));
            GzDecoder::new(data).read_to_end(&mut out)?;
            Ok(out)
        }
        Encoding::Deflate => {
            let mut out = Vec::with_capacity(data.len().saturating_mul(3));
            match ZlibDecoder::new(data).read_to_end(&mut out) {
                Ok(_) => Ok(out),
                Err(_) => {
                    out.clear();
                    DeflateDecoder::new(data).read_to_end(&mut out)?;
                    Ok(out)
                }
            }
        }
    }
}
