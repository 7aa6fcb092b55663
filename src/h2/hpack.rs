//! Header compression state for one connection.
//!
//! Thin ownership layer over the `hpack` crate: one encoder table for
//! responses and one decoder table for requests, both private to the
//! connection task. Decode failures are fatal to the whole connection
//! (COMPRESSION_ERROR), so they get their own error type instead of being
//! folded into frame decoding.

use crate::h2::types::Headers;
use bytes::Bytes;

/// The header block could not be decoded; RFC 7541 gives no way to
/// resynchronize the dynamic table afterwards.
#[derive(thiserror::Error, Debug)]
#[error("header block decode failed: {0:?}")]
pub struct CompressionError(hpack::decoder::DecoderError);

pub struct HeaderEncoder {
    inner: hpack::Encoder<'static>,
}

impl HeaderEncoder {
    pub fn encode(&mut self, headers: &Headers) -> Bytes {
        self.inner
            .encode(
                headers
                    .iter()
                    .map(|(key, value)| (key.as_bytes(), value.as_bytes())),
            )
            .into()
    }
}

impl Default for HeaderEncoder {
    fn default() -> Self {
        Self {
            inner: hpack::Encoder::new(),
        }
    }
}

pub struct HeaderDecoder {
    inner: hpack::Decoder<'static>,
}

impl HeaderDecoder {
    pub fn decode(&mut self, fragment: &[u8]) -> Result<Headers, CompressionError> {
        let mut headers = Headers::new();
        self.inner
            .decode_with_cb(fragment, |key, value| {
                headers.push((
                    String::from_utf8_lossy(&key).to_string(),
                    String::from_utf8_lossy(&value).to_string(),
                ));
            })
            .map_err(CompressionError)?;
        Ok(headers)
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self {
            inner: hpack::Decoder::new(),
        }
    }
}
