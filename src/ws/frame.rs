//! RFC 6455 frame parsing and serialization.
//!
//! The parser accepts masked client frames and unmasks them in place; the
//! writer produces server frames, which are never masked.

use bytes::{BufMut, Bytes, BytesMut};

/// Payload limit for control frames (RFC 6455 section 5.5).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Defines the interpretation of the "Payload data". If an unknown opcode
/// is received, the receiving endpoint MUST _Fail the WebSocket
/// Connection_.
/// - x0 denotes a continuation frame
/// - x1 denotes a text frame
/// - x2 denotes a binary frame
/// - x3-7 are reserved for further non-control frames
/// - x8 denotes a connection close
/// - x9 denotes a ping
/// - xA denotes a pong
/// - xB-F are reserved for further control frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// get corresponding u8 value
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xa,
        }
    }

    /// check is close/ping/pong frame
    #[must_use]
    pub fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

pub(crate) fn parse_opcode(val: u8) -> Result<OpCode, u8> {
    match val & 0xf {
        0x0 => Ok(OpCode::Continue),
        0x1 => Ok(OpCode::Text),
        0x2 => Ok(OpCode::Binary),
        0x8 => Ok(OpCode::Close),
        0x9 => Ok(OpCode::Ping),
        0xa => Ok(OpCode::Pong),
        other => Err(other),
    }
}

/// errors while decoding a frame from bytes; every one of them fails the
/// connection with close code 1002 except oversized payloads (1009)
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid opcode {0}")]
    InvalidOpcode(u8),
    #[error("invalid leading bits {0:b}")]
    InvalidLeadingBits(u8),
    #[error("fragmented control frame")]
    FragmentedControlFrame,
    #[error("control frame is too big {0}")]
    ControlFrameTooBig(usize),
    #[error("invalid close frame payload len, expect 0, >= 2")]
    InvalidCloseFramePayload,
    #[error("payload too large, max payload size {0}")]
    PayloadTooLarge(usize),
}

impl ProtocolError {
    /// Close code announced to the peer for this violation (RFC 6455
    /// section 7.4.1).
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::PayloadTooLarge(_) => 1009,
            _ => 1002,
        }
    }
}

/// A complete frame, unmasked. Data frames keep their fin bit so the
/// connection can reassemble fragmented messages; control frames are always
/// final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text { fin: bool, data: Bytes },
    Binary { fin: bool, data: Bytes },
    Continuation { fin: bool, data: Bytes },
    Ping { data: Bytes },
    Pong { data: Bytes },
    Close { code: Option<u16>, reason: Bytes },
}

impl WsFrame {
    /// Attempts to decode one frame from the front of `buf`. `Ok(None)`
    /// means more bytes are needed; on success the frame and the number of
    /// octets it occupied are returned.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, ProtocolError> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let fin = buf[0] & 0x80 != 0;
        if buf[0] & 0x70 != 0 {
            // no extension was negotiated, so all rsv bits must be clear
            return Err(ProtocolError::InvalidLeadingBits(buf[0] >> 4));
        }
        let opcode = parse_opcode(buf[0]).map_err(ProtocolError::InvalidOpcode)?;
        let masked = buf[1] & 0x80 != 0;
        let len7 = buf[1] & 0x7f;

        let (len_occupied, payload_len) = match len7 {
            0..=125 => (0, len7 as usize),
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (2, u16::from_be_bytes([buf[2], buf[3]]) as usize)
            }
            _ => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                // unwrap: the length of the slice is always 8
                (8, u64::from_be_bytes(buf[2..10].try_into().unwrap()) as usize)
            }
        };

        if opcode.is_control() {
            if !fin {
                return Err(ProtocolError::FragmentedControlFrame);
            }
            if payload_len > MAX_CONTROL_PAYLOAD {
                return Err(ProtocolError::ControlFrameTooBig(payload_len));
            }
        }

        let mask_offset = 2 + len_occupied;
        let payload_offset = mask_offset + if masked { 4 } else { 0 };
        let total = payload_offset + payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = BytesMut::from(&buf[payload_offset..total]);
        if masked {
            // unwrap: the length of the slice is always 4
            let key: [u8; 4] = buf[mask_offset..mask_offset + 4].try_into().unwrap();
            apply_mask(&mut payload, key);
        }
        let data = payload.freeze();

        let frame = match opcode {
            OpCode::Continue => Self::Continuation { fin, data },
            OpCode::Text => Self::Text { fin, data },
            OpCode::Binary => Self::Binary { fin, data },
            OpCode::Ping => Self::Ping { data },
            OpCode::Pong => Self::Pong { data },
            OpCode::Close => {
                if data.is_empty() {
                    Self::Close {
                        code: None,
                        reason: Bytes::new(),
                    }
                } else if data.len() == 1 {
                    return Err(ProtocolError::InvalidCloseFramePayload);
                } else {
                    Self::Close {
                        code: Some(u16::from_be_bytes([data[0], data[1]])),
                        reason: data.slice(2..),
                    }
                }
            }
        };
        Ok(Some((frame, total)))
    }

    /// Serializes the frame unmasked, as a server endpoint writes it.
    pub fn write_into(&self, buf: &mut BytesMut) {
        let (fin, opcode, payload) = match self {
            Self::Text { fin, data } => (*fin, OpCode::Text, data.clone()),
            Self::Binary { fin, data } => (*fin, OpCode::Binary, data.clone()),
            Self::Continuation { fin, data } => (*fin, OpCode::Continue, data.clone()),
            Self::Ping { data } => (true, OpCode::Ping, data.clone()),
            Self::Pong { data } => (true, OpCode::Pong, data.clone()),
            Self::Close { code, reason } => {
                let mut payload = BytesMut::with_capacity(2 + reason.len());
                if let Some(code) = code {
                    payload.put_u16(*code);
                    payload.extend_from_slice(reason);
                }
                (true, OpCode::Close, payload.freeze())
            }
        };

        buf.put_u8(if fin { 0x80 } else { 0 } | opcode.as_u8());
        match payload.len() {
            len @ 0..=125 => buf.put_u8(len as u8),
            len @ 126..=65535 => {
                buf.put_u8(126);
                buf.put_u16(len as u16);
            }
            len => {
                buf.put_u8(127);
                buf.put_u64(len as u64);
            }
        }
        buf.extend_from_slice(&payload);
    }
}

/// XORs the payload with the 4-octet masking key (RFC 6455 section 5.3).
pub(crate) fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
