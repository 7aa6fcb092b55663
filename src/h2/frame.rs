use crate::h2::{flags::*, types::*};
use bytes::{BufMut, Bytes, BytesMut};
use num_traits::{FromPrimitive, ToPrimitive};

/// Length of the fixed frame header preceding every payload.
pub const FRAME_HEADER_LEN: usize = 9;

/// The 9-octet header common to all frames: 24-bit big-endian length, type,
/// flags, and a 31-bit stream identifier with the high bit reserved.
///
/// https://httpwg.org/specs/rfc7540.html#FrameHeader
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub length: usize,
    pub ty: u8,
    pub flags: u8,
    pub stream_id: StreamId,
}

impl FrameHeader {
    /// Reads a header from the first 9 octets of `buf`. Returns `None` when
    /// fewer bytes are buffered.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_LEN {
            return None;
        }
        let length = ((buf[0] as usize) << 16) | ((buf[1] as usize) << 8) | buf[2] as usize;
        // unwrap: the length of the slice is always 4
        let stream_id =
            u32::from_be_bytes(buf[5..9].try_into().unwrap()) & U31_MAX.get();
        Some(Self {
            length,
            ty: buf[3],
            flags: buf[4],
            stream_id,
        })
    }

    fn write_into(&self, buf: &mut BytesMut) {
        buf.put_uint(self.length as u64, 3);
        buf.put_u8(self.ty);
        buf.put_u8(self.flags);
        buf.put_u32(self.stream_id & U31_MAX.get());
    }
}

/// Stream dependency information carried by HEADERS frames with the PRIORITY
/// flag. Parsed so the fragment offset is correct, then ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub dependency: StreamId,
    pub exclusive: bool,
    pub weight: u8,
}

/// A single decoded frame. Padding has already been stripped and priority
/// fields extracted; `flags` only carries the bits that survive decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data {
        stream_id: StreamId,
        flags: DataFlags,
        data: Bytes,
    },
    Headers {
        stream_id: StreamId,
        flags: HeadersFlags,
        priority: Option<Priority>,
        fragment: Bytes,
    },
    Priority {
        stream_id: StreamId,
        priority: Priority,
    },
    ResetStream {
        stream_id: StreamId,
        error: ErrorType,
    },
    Settings {
        flags: SettingsFlags,
        params: Vec<(SettingsParameter, u32)>,
    },
    Ping {
        flags: PingFlags,
        data: [u8; 8],
    },
    GoAway {
        last_stream_id: StreamId,
        error: ErrorType,
        debug: Bytes,
    },
    WindowUpdate {
        stream_id: StreamId,
        increment: std::num::NonZeroU32,
    },
    Continuation {
        stream_id: StreamId,
        flags: ContinuationFlags,
        fragment: Bytes,
    },
    /// Frame types this implementation does not know. Kept whole so the
    /// connection can discard them without tearing anything down.
    Unknown {
        ty: u8,
        flags: u8,
        stream_id: StreamId,
        payload: Bytes,
    },
}

/// Outcome of a parse attempt against a partially buffered byte stream.
#[derive(Debug)]
pub enum Parse {
    /// A complete frame; `consumed` octets should be advanced past.
    Frame { frame: Frame, consumed: usize },
    /// Not enough bytes buffered yet; at least `needed` are required in
    /// total before another attempt can make progress.
    Incomplete { needed: usize },
}

impl Frame {
    /// Attempts to decode one frame from the front of `buf`. The caller owns
    /// buffering; any split of the byte stream into reads decodes to the
    /// same frame sequence.
    pub fn parse(buf: &[u8]) -> Result<Parse, FrameDecodeError> {
        let header = match FrameHeader::parse(buf) {
            Some(header) => header,
            None => return Ok(Parse::Incomplete {
                needed: FRAME_HEADER_LEN,
            }),
        };
        let total = FRAME_HEADER_LEN + header.length;
        if buf.len() < total {
            return Ok(Parse::Incomplete { needed: total });
        }
        let payload = &buf[FRAME_HEADER_LEN..total];
        let frame = Self::decode(&header, payload)?;
        Ok(Parse::Frame {
            frame,
            consumed: total,
        })
    }

    fn decode(header: &FrameHeader, payload: &[u8]) -> Result<Self, FrameDecodeError> {
        let ty = match FrameType::from_u8(header.ty) {
            Some(ty) => ty,
            None => {
                return Ok(Self::Unknown {
                    ty: header.ty,
                    flags: header.flags,
                    stream_id: header.stream_id,
                    payload: Bytes::copy_from_slice(payload),
                })
            }
        };
        match ty {
            FrameType::Data => {
                if header.stream_id == 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, 0));
                }
                let flags = DataFlags::from_bits_truncate(header.flags);
                let data = strip_padding(payload, flags.contains(DataFlags::PADDED))?;
                Ok(Self::Data {
                    stream_id: header.stream_id,
                    flags: flags & DataFlags::END_STREAM,
                    data: Bytes::copy_from_slice(data),
                })
            }
            FrameType::Headers => {
                if header.stream_id == 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, 0));
                }
                let flags = HeadersFlags::from_bits_truncate(header.flags);
                let mut rest = strip_padding(payload, flags.contains(HeadersFlags::PADDED))?;
                let priority = if flags.contains(HeadersFlags::PRIORITY) {
                    if rest.len() < 5 {
                        return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                    }
                    let priority = decode_priority(&rest[..5]);
                    rest = &rest[5..];
                    Some(priority)
                } else {
                    None
                };
                Ok(Self::Headers {
                    stream_id: header.stream_id,
                    flags: flags & (HeadersFlags::END_STREAM | HeadersFlags::END_HEADERS),
                    priority,
                    fragment: Bytes::copy_from_slice(rest),
                })
            }
            FrameType::Priority => {
                if header.stream_id == 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, 0));
                }
                if payload.len() != 5 {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                Ok(Self::Priority {
                    stream_id: header.stream_id,
                    priority: decode_priority(payload),
                })
            }
            FrameType::ResetStream => {
                if header.stream_id == 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, 0));
                }
                if payload.len() != 4 {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                // unwrap: the length of the slice is always 4
                let code = u32::from_be_bytes(payload.try_into().unwrap());
                Ok(Self::ResetStream {
                    stream_id: header.stream_id,
                    error: ErrorType::from_u32(code)
                        .ok_or(FrameDecodeError::UnknownErrorType(code))?,
                })
            }
            FrameType::Settings => {
                if header.stream_id != 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, header.stream_id));
                }
                let flags = SettingsFlags::from_bits_truncate(header.flags);
                if flags.contains(SettingsFlags::ACK) && !payload.is_empty() {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                if payload.len() % 6 != 0 {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                let mut params = Vec::with_capacity(payload.len() / 6);
                for chunk in payload.chunks_exact(6) {
                    // spec says to ignore unknown settings
                    if let Some(param) = SettingsParameter::from_u16(u16::from_be_bytes(
                        // unwrap: the length of the slice is always 2
                        chunk[0..2].try_into().unwrap(),
                    )) {
                        params.push((
                            param,
                            // unwrap: the length of the slice is always 4
                            u32::from_be_bytes(chunk[2..6].try_into().unwrap()),
                        ));
                    }
                }
                Ok(Self::Settings { flags, params })
            }
            FrameType::Ping => {
                if header.stream_id != 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, header.stream_id));
                }
                if payload.len() != 8 {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                let mut data = [0u8; 8];
                data.copy_from_slice(payload);
                Ok(Self::Ping {
                    flags: PingFlags::from_bits_truncate(header.flags),
                    data,
                })
            }
            FrameType::GoAway => {
                if header.stream_id != 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, header.stream_id));
                }
                if payload.len() < 8 {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                // unwrap: the length of the slice is always 4
                let last_stream_id =
                    u32::from_be_bytes(payload[0..4].try_into().unwrap()) & U31_MAX.get();
                // unwrap: the length of the slice is always 4
                let code = u32::from_be_bytes(payload[4..8].try_into().unwrap());
                Ok(Self::GoAway {
                    last_stream_id,
                    error: ErrorType::from_u32(code)
                        .ok_or(FrameDecodeError::UnknownErrorType(code))?,
                    debug: Bytes::copy_from_slice(&payload[8..]),
                })
            }
            FrameType::WindowUpdate => {
                if payload.len() != 4 {
                    return Err(FrameDecodeError::PayloadSize(ty, payload.len()));
                }
                // unwrap: the length of the slice is always 4
                let increment =
                    u32::from_be_bytes(payload.try_into().unwrap()) & U31_MAX.get();
                Ok(Self::WindowUpdate {
                    stream_id: header.stream_id,
                    increment: std::num::NonZeroU32::new(increment)
                        .ok_or(FrameDecodeError::ZeroWindowIncrement)?,
                })
            }
            FrameType::Continuation => {
                if header.stream_id == 0 {
                    return Err(FrameDecodeError::UnexpectedStreamId(ty, 0));
                }
                Ok(Self::Continuation {
                    stream_id: header.stream_id,
                    flags: ContinuationFlags::from_bits_truncate(header.flags),
                    fragment: Bytes::copy_from_slice(payload),
                })
            }
            FrameType::PushPromise => {
                // clients never push; surface it as opaque so the connection
                // can drop it like any other unexpected extension frame
                Ok(Self::Unknown {
                    ty: header.ty,
                    flags: header.flags,
                    stream_id: header.stream_id,
                    payload: Bytes::copy_from_slice(payload),
                })
            }
        }
    }

    /// Serializes the frame, appending the 9-octet header and payload.
    pub fn write_into(&self, buf: &mut BytesMut) {
        match self {
            Self::Data {
                stream_id,
                flags,
                data,
            } => {
                FrameHeader {
                    length: data.len(),
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::Data.to_u8().unwrap(),
                    flags: flags.bits(),
                    stream_id: *stream_id,
                }
                .write_into(buf);
                buf.extend_from_slice(data);
            }
            Self::Headers {
                stream_id,
                flags,
                priority,
                fragment,
            } => {
                let mut flags = *flags;
                if priority.is_some() {
                    flags |= HeadersFlags::PRIORITY;
                }
                FrameHeader {
                    length: fragment.len() + if priority.is_some() { 5 } else { 0 },
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::Headers.to_u8().unwrap(),
                    flags: flags.bits(),
                    stream_id: *stream_id,
                }
                .write_into(buf);
                if let Some(priority) = priority {
                    encode_priority(priority, buf);
                }
                buf.extend_from_slice(fragment);
            }
            Self::Priority {
                stream_id,
                priority,
            } => {
                FrameHeader {
                    length: 5,
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::Priority.to_u8().unwrap(),
                    flags: 0,
                    stream_id: *stream_id,
                }
                .write_into(buf);
                encode_priority(priority, buf);
            }
            Self::ResetStream { stream_id, error } => {
                FrameHeader {
                    length: 4,
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::ResetStream.to_u8().unwrap(),
                    flags: 0,
                    stream_id: *stream_id,
                }
                .write_into(buf);
                // unwrap: ErrorType is repr(u32)
                buf.put_u32(error.to_u32().unwrap());
            }
            Self::Settings { flags, params } => {
                FrameHeader {
                    length: params.len() * 6,
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::Settings.to_u8().unwrap(),
                    flags: flags.bits(),
                    stream_id: 0,
                }
                .write_into(buf);
                for (param, value) in params {
                    // unwrap: SettingsParameter is repr(u16)
                    buf.put_u16(param.to_u16().unwrap());
                    buf.put_u32(*value);
                }
            }
            Self::Ping { flags, data } => {
                FrameHeader {
                    length: 8,
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::Ping.to_u8().unwrap(),
                    flags: flags.bits(),
                    stream_id: 0,
                }
                .write_into(buf);
                buf.extend_from_slice(data);
            }
            Self::GoAway {
                last_stream_id,
                error,
                debug,
            } => {
                FrameHeader {
                    length: 8 + debug.len(),
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::GoAway.to_u8().unwrap(),
                    flags: 0,
                    stream_id: 0,
                }
                .write_into(buf);
                buf.put_u32(last_stream_id & U31_MAX.get());
                // unwrap: ErrorType is repr(u32)
                buf.put_u32(error.to_u32().unwrap());
                buf.extend_from_slice(debug);
            }
            Self::WindowUpdate {
                stream_id,
                increment,
            } => {
                FrameHeader {
                    length: 4,
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::WindowUpdate.to_u8().unwrap(),
                    flags: 0,
                    stream_id: *stream_id,
                }
                .write_into(buf);
                buf.put_u32(increment.get() & U31_MAX.get());
            }
            Self::Continuation {
                stream_id,
                flags,
                fragment,
            } => {
                FrameHeader {
                    length: fragment.len(),
                    // unwrap: FrameType is repr(u8)
                    ty: FrameType::Continuation.to_u8().unwrap(),
                    flags: flags.bits(),
                    stream_id: *stream_id,
                }
                .write_into(buf);
                buf.extend_from_slice(fragment);
            }
            Self::Unknown {
                ty,
                flags,
                stream_id,
                payload,
            } => {
                FrameHeader {
                    length: payload.len(),
                    ty: *ty,
                    flags: *flags,
                    stream_id: *stream_id,
                }
                .write_into(buf);
                buf.extend_from_slice(payload);
            }
        }
    }

}

fn strip_padding(payload: &[u8], padded: bool) -> Result<&[u8], FrameDecodeError> {
    if !padded {
        return Ok(payload);
    }
    let pad_len = *payload.first().ok_or(FrameDecodeError::InvalidPadding)? as usize;
    if pad_len >= payload.len() {
        return Err(FrameDecodeError::InvalidPadding);
    }
    Ok(&payload[1..payload.len() - pad_len])
}

fn decode_priority(bytes: &[u8]) -> Priority {
    // unwrap: the length of the slice is always 4
    let dependency = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
    Priority {
        dependency: dependency & U31_MAX.get(),
        exclusive: dependency >> 31 != 0,
        weight: bytes[4],
    }
}

fn encode_priority(priority: &Priority, buf: &mut BytesMut) {
    let mut dependency = priority.dependency & U31_MAX.get();
    if priority.exclusive {
        dependency |= 1 << 31;
    }
    buf.put_u32(dependency);
    buf.put_u8(priority.weight);
}
