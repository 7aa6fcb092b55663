//! Shared fixtures: raw frame builders and an output re-parser.

use trellis::h2::frame::{Frame, Parse};

pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub const SERVER_SETTINGS: [u8; 9] = [0, 0, 0, 4, 0, 0, 0, 0, 0];
pub const SETTINGS_ACK: [u8; 9] = [0, 0, 0, 4, 1, 0, 0, 0, 0];

/// Builds one frame from raw parts, with the real 9-octet header.
pub fn raw_frame(ty: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        (payload.len() >> 16) as u8,
        (payload.len() >> 8) as u8,
        payload.len() as u8,
        ty,
        flags,
    ];
    frame.extend_from_slice(&stream_id.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub fn headers_frame(stream_id: u32, flags: u8, fragment: &[u8]) -> Vec<u8> {
    raw_frame(0x1, flags, stream_id, fragment)
}

pub fn data_frame(stream_id: u32, flags: u8, data: &[u8]) -> Vec<u8> {
    raw_frame(0x0, flags, stream_id, data)
}

pub fn goaway_frame(last_stream_id: u32, error: u32) -> Vec<u8> {
    let mut payload = last_stream_id.to_be_bytes().to_vec();
    payload.extend_from_slice(&error.to_be_bytes());
    raw_frame(0x7, 0, 0, &payload)
}

/// HPACK-encodes a request header list the way a client would.
pub fn encode_headers(headers: &[(&str, &str)]) -> Vec<u8> {
    hpack::Encoder::new().encode(
        headers
            .iter()
            .map(|(key, value)| (key.as_bytes(), value.as_bytes())),
    )
}

/// A well-formed GET request header list for `path` on the default test
/// authority.
pub fn get_request_fragment(path: &str) -> Vec<u8> {
    encode_headers(&[
        (":method", "GET"),
        (":scheme", "https"),
        (":authority", "example.com"),
        (":path", path),
    ])
}

/// Re-parses a server output buffer into frames; panics on leftovers.
pub fn parse_all(mut bytes: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    loop {
        match Frame::parse(bytes).expect("server emitted an invalid frame") {
            Parse::Frame { frame, consumed } => {
                frames.push(frame);
                bytes = &bytes[consumed..];
            }
            Parse::Incomplete { .. } => {
                assert!(bytes.is_empty(), "trailing partial frame in output");
                return frames;
            }
        }
    }
}
