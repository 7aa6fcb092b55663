use crate::ws::{
    frame::{ProtocolError, WsFrame},
    handler::{CloseEvent, Initiator, Negotiation, Outcome, WsHandler, WsOptions},
};
use bytes::{Buf, Bytes, BytesMut};
use derivative::Derivative;
use log::{debug, trace};

/// Errors that terminate a WebSocket connection. Each maps to the close
/// code announced to the peer, when announcing is still possible.
#[derive(thiserror::Error, Debug)]
pub enum WsError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("continuation frame without a message in progress")]
    StrayContinuation,
    #[error("new data frame while a fragmented message is in progress")]
    InterleavedDataFrame,
    #[error("invalid utf-8 in text message")]
    InvalidUtf8,
    #[error("transport closed")]
    TransportClosed,
    #[error("application error: {0}")]
    Application(anyhow::Error),
}

impl WsError {
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Protocol(err) => err.close_code(),
            Self::StrayContinuation | Self::InterleavedDataFrame => 1002,
            Self::InvalidUtf8 => 1007,
            Self::TransportClosed => 1006,
            Self::Application(_) => 1011,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WsState {
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentKind {
    Text,
    Binary,
}

/// An in-flight fragmented message. Exists exactly while the last data
/// frame had fin unset; continuation payloads accumulate here until the
/// final one arrives.
#[derive(Debug)]
struct Fragment {
    kind: FragmentKind,
    data: BytesMut,
}

/// Close code to answer a remote close with (RFC 6455 section 7.4.1):
/// reserved or unassignable codes are answered with a protocol error,
/// anything an endpoint may legitimately send is acknowledged normally.
#[must_use]
pub fn reply_code(code: u16) -> u16 {
    match code {
        0..=999 | 1004..=1006 | 1012..=2999 => 1002,
        _ => 1000,
    }
}

/// Server half of one WebSocket connection, from successful upgrade to the
/// close frame.
///
/// Same sans-io shape as the HTTP/2 connection: the embedding loop feeds
/// bytes in and writes the queued output out, so the machine itself never
/// touches the transport. All close paths funnel through [`send_close`],
/// which the `state` guards; a connection emits at most one close frame.
///
/// [`send_close`]: Self::send_close
#[derive(Derivative)]
#[derivative(Debug)]
pub struct WsConnection<H: WsHandler> {
    state: WsState,
    fragment: Option<Fragment>,
    #[derivative(Debug = "ignore")]
    handler: H,
    options: WsOptions,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl<H: WsHandler> WsConnection<H> {
    /// Asks the handler whether to take the connection. On refusal the
    /// handler is returned so the caller can finish the HTTP side with a
    /// rejection.
    pub fn negotiate(mut handler: H) -> Result<Self, H> {
        let options = match handler.negotiate() {
            Negotiation::Accept(options) => options,
            Negotiation::Refuse => return Err(handler),
        };
        let mut connection = Self {
            state: WsState::Open,
            fragment: None,
            handler,
            options,
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(1024),
        };
        let outcome = connection.handler.handle_connection();
        // an Err here has already queued the 1011 close; surface the frame,
        // not the error, since no peer traffic was mishandled
        connection.apply_outcome(outcome).ok();
        Ok(connection)
    }

    /// Feeds transport bytes to the state machine, dispatching handler
    /// callbacks per complete frame. On `Err` the close frame (when one can
    /// still be sent) is already queued; flush the output and close.
    pub fn recv(&mut self, data: &[u8]) -> Result<(), WsError> {
        self.read_buf.extend_from_slice(data);
        while self.state == WsState::Open {
            match WsFrame::parse(&self.read_buf) {
                Ok(None) => break,
                Ok(Some((frame, consumed))) => {
                    self.read_buf.advance(consumed);
                    self.handle_frame(frame)?;
                }
                Err(err) => return self.fail(err.into()),
            }
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: WsFrame) -> Result<(), WsError> {
        trace!("frame: {:?}", frame);
        match frame {
            WsFrame::Text { fin, data } => {
                self.check_frame_size(data.len())?;
                self.handle_data(FragmentKind::Text, fin, data)
            }
            WsFrame::Binary { fin, data } => {
                self.check_frame_size(data.len())?;
                self.handle_data(FragmentKind::Binary, fin, data)
            }
            WsFrame::Continuation { fin, data } => {
                self.check_frame_size(data.len())?;
                let fragment = match self.fragment.as_mut() {
                    Some(fragment) => fragment,
                    None => return self.fail(WsError::StrayContinuation),
                };
                fragment.data.extend_from_slice(&data);
                let total = fragment.data.len();
                self.check_frame_size(total)?;
                if fin {
                    // unwrap: matched Some above
                    let fragment = self.fragment.take().unwrap();
                    self.dispatch_message(fragment.kind, fragment.data.freeze())
                } else {
                    Ok(())
                }
            }
            WsFrame::Ping { data } => {
                WsFrame::Pong { data: data.clone() }.write_into(&mut self.write_buf);
                let outcome = self.handler.handle_ping(&data);
                self.apply_outcome(outcome)
            }
            WsFrame::Pong { data } => {
                let outcome = self.handler.handle_pong(&data);
                self.apply_outcome(outcome)
            }
            WsFrame::Close { code, reason } => {
                if !reason.is_empty() {
                    debug!("close reason: {}", String::from_utf8_lossy(&reason));
                }
                let received = code.unwrap_or(1005);
                self.handler.handle_close(CloseEvent {
                    initiator: Initiator::Remote,
                    code: received,
                });
                self.send_close(reply_code(received));
                Ok(())
            }
        }
    }

    /// A data frame while no fragmented message is in progress, or the
    /// frame synthesized from a completed fragment sequence.
    fn handle_data(&mut self, kind: FragmentKind, fin: bool, data: Bytes) -> Result<(), WsError> {
        if self.fragment.is_some() {
            return self.fail(WsError::InterleavedDataFrame);
        }
        if fin {
            self.dispatch_message(kind, data)
        } else {
            self.fragment = Some(Fragment {
                kind,
                data: BytesMut::from(&data[..]),
            });
            Ok(())
        }
    }

    fn dispatch_message(&mut self, kind: FragmentKind, data: Bytes) -> Result<(), WsError> {
        let outcome = match kind {
            FragmentKind::Text => match std::str::from_utf8(&data) {
                Ok(text) => self.handler.handle_text(text),
                Err(_) => return self.fail(WsError::InvalidUtf8),
            },
            FragmentKind::Binary => self.handler.handle_binary(&data),
        };
        self.apply_outcome(outcome)
    }

    fn check_frame_size(&mut self, len: usize) -> Result<(), WsError> {
        match self.options.max_frame_size {
            Some(max) if len > max => self.fail(ProtocolError::PayloadTooLarge(max).into()),
            _ => Ok(()),
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) -> Result<(), WsError> {
        match outcome {
            Outcome::Continue => Ok(()),
            Outcome::Close => {
                self.send_close(1000);
                Ok(())
            }
            Outcome::Error(err) => self.fail(WsError::Application(err)),
        }
    }

    /// Error epilogue: let the handler observe the failure, announce the
    /// matching close code, and hand the error back up.
    fn fail(&mut self, err: WsError) -> Result<(), WsError> {
        self.handler.handle_error(&err);
        self.send_close(err.close_code());
        Err(err)
    }

    /// The transport went away without a close handshake. The 1006 close is
    /// queued on the off chance the write side still drains, but the peer
    /// has usually vanished.
    pub fn transport_closed(&mut self) {
        if self.state == WsState::Open {
            self.handler.handle_error(&WsError::TransportClosed);
            self.send_close(1006);
        }
    }

    /// Graceful local shutdown, e.g. the server is draining connections.
    pub fn shutdown(&mut self) {
        if self.state == WsState::Open {
            self.handler.handle_close(CloseEvent {
                initiator: Initiator::Local,
                code: 1001,
            });
            self.send_close(1001);
        }
    }

    /// The idle timer configured at negotiation fired.
    pub fn timeout(&mut self) {
        if self.state == WsState::Open {
            self.handler.handle_timeout();
            self.send_close(1002);
        }
    }

    /// Delivers an out-of-band message to the handler.
    pub fn info(&mut self, message: H::Message) -> Result<(), WsError> {
        let outcome = self.handler.handle_info(message);
        self.apply_outcome(outcome)
    }

    fn send_close(&mut self, code: u16) {
        if self.state != WsState::Open {
            return;
        }
        WsFrame::Close {
            code: Some(code),
            reason: Bytes::new(),
        }
        .write_into(&mut self.write_buf);
        self.state = WsState::Closing;
    }

    /// Drains everything queued for the transport since the last call.
    pub fn take_output(&mut self) -> Bytes {
        self.write_buf.split().freeze()
    }

    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.state == WsState::Closing
    }

    #[must_use]
    pub fn options(&self) -> WsOptions {
        self.options
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}
