use crate::{
    h2::{
        coordinator::{StreamCoordinator, StreamIdError},
        flags::*,
        frame::{Frame, FrameHeader, Parse},
        hpack::{CompressionError, HeaderDecoder, HeaderEncoder},
        stream::StreamState,
        types::*,
    },
    request::{Request, RequestError},
    response::{Response, ResponseBody},
};
use bytes::{Buf, Bytes, BytesMut};
use enum_map::EnumMap;
use log::{debug, error, trace, warn};

/// Largest frame payload this server advertises (and therefore accepts),
/// the RFC 7540 initial value.
pub const MAX_FRAME_SIZE: usize = 16_384;

/// Cap on an accumulated header block across HEADERS + CONTINUATION frames.
const MAX_HEADER_BLOCK_SIZE: usize = 256 * 1024;

/// What the state machine hands to the embedding server loop.
#[derive(Debug)]
pub enum Event {
    /// A stream finished sending its request; the application should produce
    /// a response for `stream_id`.
    Request {
        stream_id: NonZeroStreamId,
        request: Request,
    },
    /// The client announced it is going away. The connection has already
    /// queued its own GOAWAY and will close.
    GoawayReceived { error: ErrorType },
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("invalid client connection preface")]
    BadPreface,
    #[error(transparent)]
    Frame(#[from] FrameDecodeError),
    #[error(transparent)]
    StreamId(#[from] StreamIdError),
    #[error(transparent)]
    Compression(#[from] CompressionError),
    #[error("malformed request on stream {0}: {1}")]
    MalformedRequest(StreamId, RequestError),
    #[error("{0:?} frame on half-closed stream {1}")]
    StreamClosed(FrameType, StreamId),
    #[error("frame of {0} octets exceeds the {1} octet limit")]
    FrameTooLarge(usize, usize),
    #[error("header block of {0} octets exceeds the {1} octet limit")]
    HeaderBlockTooLarge(usize, usize),
    #[error("{0}")]
    Protocol(String),
}

impl ConnectionError {
    /// GOAWAY error code for this failure; `None` means the transport is
    /// simply closed without a goodbye (bad preface).
    #[must_use]
    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            Self::BadPreface => None,
            Self::Frame(err) => Some(err.error_type()),
            Self::Compression(_) => Some(ErrorType::CompressionError),
            Self::StreamClosed(..) => Some(ErrorType::StreamClosed),
            Self::FrameTooLarge(..) => Some(ErrorType::FrameSizeError),
            Self::HeaderBlockTooLarge(..) => Some(ErrorType::EnhanceYourCalm),
            Self::StreamId(_) | Self::MalformedRequest(..) | Self::Protocol(_) => {
                Some(ErrorType::ProtocolError)
            }
        }
    }
}

/// Header block being assembled while CONTINUATION frames are outstanding.
/// Until it completes, no other frame may arrive on the connection.
#[derive(Debug)]
struct PendingHeaders {
    stream_id: StreamId,
    end_stream: bool,
    fragment: BytesMut,
}

/// Server half of one HTTP/2 connection.
///
/// Pure state machine: bytes in through [`recv`](Self::recv), frames out
/// through [`take_output`](Self::take_output). The embedding loop owns the
/// transport and performs all I/O, so nothing here can block or suspend.
pub struct Connection {
    preface_received: bool,
    read_buf: BytesMut,
    write_buf: BytesMut,
    client_settings: EnumMap<SettingsParameter, u32>,
    settings_in_flight: bool,
    encoder: HeaderEncoder,
    decoder: HeaderDecoder,
    streams: StreamCoordinator,
    pending_headers: Option<PendingHeaders>,
    goaway_sent: bool,
    closing: bool,
}

impl Connection {
    /// Sets up the connection and queues the server's initial (empty)
    /// SETTINGS frame, which may be written before the preface arrives.
    #[must_use]
    pub fn new() -> Self {
        let mut write_buf = BytesMut::with_capacity(1024);
        Frame::Settings {
            flags: SettingsFlags::empty(),
            params: Vec::new(),
        }
        .write_into(&mut write_buf);
        Self {
            preface_received: false,
            read_buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            write_buf,
            client_settings: default_settings(),
            settings_in_flight: true,
            encoder: HeaderEncoder::default(),
            decoder: HeaderDecoder::default(),
            streams: StreamCoordinator::default(),
            pending_headers: None,
            goaway_sent: false,
            closing: false,
        }
    }

    /// Feeds transport bytes to the state machine. Frames may arrive split
    /// or coalesced arbitrarily; the result is the same either way.
    ///
    /// On `Err` the connection has already queued its goodbye frame (when
    /// one is owed) and the caller should flush the output and close.
    pub fn recv(&mut self, data: &[u8]) -> Result<Vec<Event>, ConnectionError> {
        self.read_buf.extend_from_slice(data);
        let mut events = Vec::new();

        if self.closing {
            return Ok(events);
        }

        if !self.preface_received {
            if self.read_buf.len() < PREFACE.len() {
                return Ok(events);
            }
            if &self.read_buf[..PREFACE.len()] != PREFACE {
                // a non-HTTP/2 client gets no GOAWAY, just a closed transport
                self.closing = true;
                return Err(ConnectionError::BadPreface);
            }
            self.read_buf.advance(PREFACE.len());
            self.preface_received = true;
            trace!("client preface received");
        }

        loop {
            if let Some(header) = FrameHeader::parse(&self.read_buf) {
                if header.length > MAX_FRAME_SIZE {
                    let err = ConnectionError::FrameTooLarge(header.length, MAX_FRAME_SIZE);
                    self.goodbye(err.error_type());
                    return Err(err);
                }
            }
            match Frame::parse(&self.read_buf) {
                Ok(Parse::Incomplete { .. }) => break,
                Ok(Parse::Frame { frame, consumed }) => {
                    self.read_buf.advance(consumed);
                    if let Err(err) = self.handle_frame(frame, &mut events) {
                        self.goodbye(err.error_type());
                        return Err(err);
                    }
                    if self.closing {
                        break;
                    }
                }
                Err(err) => {
                    let err = ConnectionError::from(err);
                    self.goodbye(err.error_type());
                    return Err(err);
                }
            }
        }
        Ok(events)
    }

    fn handle_frame(
        &mut self,
        frame: Frame,
        events: &mut Vec<Event>,
    ) -> Result<(), ConnectionError> {
        // HEADERS and its CONTINUATIONs are one logical frame; anything else
        // in between is a connection error
        if self.pending_headers.is_some()
            && !matches!(frame, Frame::Continuation { .. })
        {
            return Err(ConnectionError::Protocol(
                "expected CONTINUATION for open header block".to_owned(),
            ));
        }

        match frame {
            Frame::Settings { flags, params } => {
                if flags.contains(SettingsFlags::ACK) {
                    trace!("client acknowledged settings");
                    self.settings_in_flight = false;
                } else {
                    for (param, value) in params {
                        trace!("client setting {:?} = {}", param, value);
                        self.client_settings[param] = value;
                    }
                    Frame::Settings {
                        flags: SettingsFlags::ACK,
                        params: Vec::new(),
                    }
                    .write_into(&mut self.write_buf);
                }
            }
            Frame::Ping { flags, data } => {
                if !flags.contains(PingFlags::ACK) {
                    Frame::Ping {
                        flags: PingFlags::ACK,
                        data,
                    }
                    .write_into(&mut self.write_buf);
                }
            }
            Frame::Headers {
                stream_id,
                flags,
                priority: _,
                fragment,
            } => {
                self.streams.create(stream_id)?;
                let end_stream = flags.contains(HeadersFlags::END_STREAM);
                if flags.contains(HeadersFlags::END_HEADERS) {
                    self.header_block_done(stream_id, flags, &fragment, end_stream, events)?;
                } else {
                    self.pending_headers = Some(PendingHeaders {
                        stream_id,
                        end_stream,
                        fragment: BytesMut::from(&fragment[..]),
                    });
                }
            }
            Frame::Continuation {
                stream_id,
                flags,
                fragment,
            } => {
                let pending = match self.pending_headers.as_mut() {
                    Some(pending) if pending.stream_id == stream_id => pending,
                    Some(pending) => {
                        return Err(ConnectionError::Protocol(format!(
                            "CONTINUATION for stream {} while stream {} has an open header block",
                            stream_id, pending.stream_id
                        )))
                    }
                    None => {
                        return Err(ConnectionError::Protocol(format!(
                            "CONTINUATION for stream {stream_id} without an open header block"
                        )))
                    }
                };
                if pending.fragment.len() + fragment.len() > MAX_HEADER_BLOCK_SIZE {
                    return Err(ConnectionError::HeaderBlockTooLarge(
                        pending.fragment.len() + fragment.len(),
                        MAX_HEADER_BLOCK_SIZE,
                    ));
                }
                pending.fragment.extend_from_slice(&fragment);
                if flags.contains(ContinuationFlags::END_HEADERS) {
                    // unwrap: pending_headers was just matched above
                    let pending = self.pending_headers.take().unwrap();
                    let mut headers_flags = HeadersFlags::END_HEADERS;
                    if pending.end_stream {
                        headers_flags |= HeadersFlags::END_STREAM;
                    }
                    self.header_block_done(
                        pending.stream_id,
                        headers_flags,
                        &pending.fragment,
                        pending.end_stream,
                        events,
                    )?;
                }
            }
            Frame::Data {
                stream_id,
                flags,
                data,
            } => {
                if stream_id % 2 == 0 {
                    debug!("discarding DATA on server-side stream {stream_id}");
                    return Ok(());
                }
                let stream = match self.streams.get_mut(stream_id) {
                    Some(stream) => stream,
                    None => {
                        debug!("discarding DATA on unknown stream {stream_id}");
                        return Ok(());
                    }
                };
                if matches!(
                    stream.state(),
                    StreamState::HalfClosedRemote | StreamState::Closed
                ) {
                    return Err(ConnectionError::StreamClosed(FrameType::Data, stream_id));
                }
                stream.append_body(&data);
                stream.transition_state(true, FrameType::Data, flags.into());
                if flags.contains(DataFlags::END_STREAM) {
                    self.complete_request(stream_id, events)?;
                }
            }
            Frame::Priority {
                stream_id,
                priority,
            } => {
                trace!(
                    "ignoring priority of stream {} (dependency {}, weight {})",
                    stream_id,
                    priority.dependency,
                    priority.weight
                );
            }
            Frame::ResetStream { stream_id, error } => {
                warn!("client reset stream {}: {:?}", stream_id, error);
                if let Some(stream) = self.streams.get_mut(stream_id) {
                    stream.transition_state(true, FrameType::ResetStream, Flags::None);
                }
                self.streams.remove(stream_id);
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                trace!(
                    "ignoring window update of {} for stream {}",
                    increment,
                    stream_id
                );
            }
            Frame::GoAway { error, debug, .. } => {
                error!("client go away: {:?}", error);
                if !debug.is_empty() {
                    debug!("client go away debug: {}", String::from_utf8_lossy(&debug));
                }
                Frame::GoAway {
                    last_stream_id: self.streams.last_stream_id(),
                    error: ErrorType::NoError,
                    debug: Bytes::new(),
                }
                .write_into(&mut self.write_buf);
                self.goaway_sent = true;
                self.closing = true;
                events.push(Event::GoawayReceived { error });
            }
            Frame::Unknown { ty, .. } => {
                trace!("discarding unknown frame type {ty:#x}");
            }
        }
        Ok(())
    }

    fn header_block_done(
        &mut self,
        stream_id: StreamId,
        flags: HeadersFlags,
        fragment: &[u8],
        end_stream: bool,
        events: &mut Vec<Event>,
    ) -> Result<(), ConnectionError> {
        let headers = self.decoder.decode(fragment)?;
        // unwrap: the coordinator rejected stream 0 before any block started
        let stream = self.streams.get_mut(stream_id).unwrap();
        stream.set_request_headers(headers);
        stream.transition_state(true, FrameType::Headers, flags.into());
        if end_stream {
            self.complete_request(stream_id, events)?;
        }
        Ok(())
    }

    fn complete_request(
        &mut self,
        stream_id: StreamId,
        events: &mut Vec<Event>,
    ) -> Result<(), ConnectionError> {
        // unwrap: callers hold a live stream for this ID
        let stream = self.streams.get_mut(stream_id).unwrap();
        let id = stream.id;
        if let Some((headers, body)) = stream.take_request_parts() {
            let request = Request::from_header_list(headers, body)
                .map_err(|err| ConnectionError::MalformedRequest(stream_id, err))?;
            events.push(Event::Request {
                stream_id: id,
                request,
            });
        }
        Ok(())
    }

    /// Encodes and queues a response for `stream_id` following the body
    /// shape: lone HEADERS for empty bodies, HEADERS + one DATA for full
    /// bodies, one DATA per chunk plus an empty terminal DATA for chunked
    /// bodies. DATA frames never exceed the client's SETTINGS_MAX_FRAME_SIZE.
    pub fn send_response(
        &mut self,
        stream_id: NonZeroStreamId,
        response: &Response,
    ) -> Result<(), ConnectionError> {
        let mut list = Headers::with_capacity(response.headers.len() + 2);
        list.push((":status".to_owned(), response.status.to_string()));
        list.extend(response.headers.iter().cloned());
        if response.header("cache-control").is_none() {
            list.push((
                "cache-control".to_owned(),
                "max-age=0, private, must-revalidate".to_owned(),
            ));
        }
        let fragment = self.encoder.encode(&list);
        let max_frame_size = self.client_settings[SettingsParameter::MaxFrameSize] as usize;

        if self.streams.get_mut(stream_id.get()).is_none() {
            return Err(ConnectionError::Protocol(format!(
                "response for unknown stream {stream_id}"
            )));
        }

        let end_stream = matches!(response.body, ResponseBody::Empty);
        self.write_headers(stream_id.get(), fragment, end_stream, max_frame_size);

        match &response.body {
            ResponseBody::Empty => {}
            ResponseBody::Full(body) => {
                self.write_data(stream_id.get(), body.clone(), max_frame_size);
            }
            ResponseBody::Chunked(chunks) => {
                for chunk in chunks {
                    for part in split_chunks(chunk, max_frame_size) {
                        Frame::Data {
                            stream_id: stream_id.get(),
                            flags: DataFlags::empty(),
                            data: part,
                        }
                        .write_into(&mut self.write_buf);
                    }
                }
                Frame::Data {
                    stream_id: stream_id.get(),
                    flags: DataFlags::END_STREAM,
                    data: Bytes::new(),
                }
                .write_into(&mut self.write_buf);
            }
        }

        // unwrap: presence was checked before the headers were written
        let stream = self.streams.get_mut(stream_id.get()).unwrap();
        let mut flags = HeadersFlags::END_HEADERS;
        if end_stream {
            flags |= HeadersFlags::END_STREAM;
        }
        stream.transition_state(false, FrameType::Headers, flags.into());
        if !end_stream {
            stream.transition_state(false, FrameType::Data, Flags::Data(DataFlags::END_STREAM));
        }
        if stream.state() == StreamState::Closed {
            self.streams.remove(stream_id.get());
        }
        Ok(())
    }

    fn write_headers(
        &mut self,
        stream_id: StreamId,
        fragment: Bytes,
        end_stream: bool,
        max_frame_size: usize,
    ) {
        let mut flags = if end_stream {
            HeadersFlags::END_STREAM
        } else {
            HeadersFlags::empty()
        };
        if fragment.len() <= max_frame_size {
            flags |= HeadersFlags::END_HEADERS;
            Frame::Headers {
                stream_id,
                flags,
                priority: None,
                fragment,
            }
            .write_into(&mut self.write_buf);
            return;
        }
        let mut parts = split_chunks(&fragment, max_frame_size).into_iter().peekable();
        // unwrap: the fragment is longer than max_frame_size, so non-empty
        let first = parts.next().unwrap();
        Frame::Headers {
            stream_id,
            flags,
            priority: None,
            fragment: first,
        }
        .write_into(&mut self.write_buf);
        while let Some(part) = parts.next() {
            let flags = if parts.peek().is_none() {
                ContinuationFlags::END_HEADERS
            } else {
                ContinuationFlags::empty()
            };
            Frame::Continuation {
                stream_id,
                flags,
                fragment: part,
            }
            .write_into(&mut self.write_buf);
        }
    }

    fn write_data(&mut self, stream_id: StreamId, body: Bytes, max_frame_size: usize) {
        let mut parts = split_chunks(&body, max_frame_size).into_iter().peekable();
        while let Some(part) = parts.next() {
            let flags = if parts.peek().is_none() {
                DataFlags::END_STREAM
            } else {
                DataFlags::empty()
            };
            Frame::Data {
                stream_id,
                flags,
                data: part,
            }
            .write_into(&mut self.write_buf);
        }
    }

    /// Queues a GOAWAY (at most once per connection) and stops the frame
    /// loop. `None` closes without a goodbye.
    fn goodbye(&mut self, error: Option<ErrorType>) {
        if let Some(error) = error {
            if !self.goaway_sent {
                Frame::GoAway {
                    last_stream_id: self.streams.last_stream_id(),
                    error,
                    debug: Bytes::new(),
                }
                .write_into(&mut self.write_buf);
                self.goaway_sent = true;
            }
        }
        self.closing = true;
    }

    /// Drains everything queued for the transport since the last call.
    pub fn take_output(&mut self) -> Bytes {
        self.write_buf.split().freeze()
    }

    /// True once the connection has said (or refused to say) goodbye; the
    /// transport should be flushed and closed.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// True while our SETTINGS frame awaits the client's acknowledgement.
    #[must_use]
    pub fn settings_in_flight(&self) -> bool {
        self.settings_in_flight
    }

    #[must_use]
    pub fn last_stream_id(&self) -> StreamId {
        self.streams.last_stream_id()
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `data` into frame-sized `Bytes` views; a single empty chunk when
/// `data` is empty so every body produces at least one DATA frame.
fn split_chunks(data: &Bytes, max_frame_size: usize) -> Vec<Bytes> {
    if data.is_empty() {
        return vec![Bytes::new()];
    }
    let mut chunks = Vec::with_capacity(data.len() / max_frame_size + 1);
    let mut rest = data.clone();
    while rest.len() > max_frame_size {
        chunks.push(rest.split_to(max_frame_size));
    }
    chunks.push(rest);
    chunks
}
