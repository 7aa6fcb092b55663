use crate::h2::{flags::*, types::*};
use bytes::BytesMut;
use log::trace;

/// https://httpwg.org/specs/rfc7540.html#StreamStates
///
/// The reserved states are unreachable on a server that never pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamState {
    Idle,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// One client-initiated stream: lifecycle state plus the request being
/// assembled from HEADERS and DATA frames.
#[derive(Debug)]
pub struct Stream {
    pub id: NonZeroStreamId,
    state: StreamState,
    request_headers: Option<Headers>,
    body: BytesMut,
}

impl Stream {
    #[must_use]
    pub fn new(id: NonZeroStreamId) -> Self {
        Self {
            id,
            state: StreamState::Idle,
            request_headers: None,
            body: BytesMut::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// https://httpwg.org/specs/rfc7540.html#StreamStates
    pub fn transition_state(&mut self, recv: bool, ty: FrameType, flags: Flags) {
        let send = !recv;
        let original_state = self.state;

        if matches!(ty, FrameType::ResetStream) {
            self.state = StreamState::Closed;
        } else {
            let h = match flags {
                Flags::Headers(flags) => flags.contains(HeadersFlags::END_HEADERS),
                Flags::Continuation(flags) => flags.contains(ContinuationFlags::END_HEADERS),
                _ => false,
            };
            let es = match flags {
                Flags::Data(flags) => flags.contains(DataFlags::END_STREAM),
                Flags::Headers(flags) => flags.contains(HeadersFlags::END_STREAM),
                _ => false,
            };

            if self.state == StreamState::Idle && h {
                self.state = StreamState::Open;
            }

            if self.state == StreamState::Open && send && es {
                self.state = StreamState::HalfClosedLocal;
            }

            if self.state == StreamState::Open && recv && es {
                self.state = StreamState::HalfClosedRemote;
            }

            if self.state == StreamState::HalfClosedRemote && send && es {
                self.state = StreamState::Closed;
            }

            if self.state == StreamState::HalfClosedLocal && recv && es {
                self.state = StreamState::Closed;
            }
        }

        if self.state != original_state {
            trace!(
                "stream {} {:?} -> {:?}",
                self.id,
                original_state,
                self.state
            );
        }
    }

    /// Records the decoded request header list.
    pub fn set_request_headers(&mut self, headers: Headers) {
        self.request_headers = Some(headers);
    }

    /// Appends a DATA payload to the request body.
    pub fn append_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Consumes the buffered request parts once the client half is done.
    /// Returns `None` when no HEADERS were recorded for this stream.
    pub fn take_request_parts(&mut self) -> Option<(Headers, bytes::Bytes)> {
        let headers = self.request_headers.take()?;
        Some((headers, std::mem::take(&mut self.body).freeze()))
    }
}
