use crate::ws::WsError;
use std::time::Duration;

/// What a handler callback wants done with the connection afterwards.
#[derive(Debug)]
pub enum Outcome {
    /// Keep the connection open.
    Continue,
    /// Close gracefully with a normal (1000) close frame.
    Close,
    /// Something went wrong in the application; close with 1011.
    Error(anyhow::Error),
}

/// Options a handler picks at negotiation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsOptions {
    /// Idle timer: with no frame from the peer for this long, the handler's
    /// `handle_timeout` runs and the connection closes with 1002.
    pub timeout: Option<Duration>,
    /// Reject data frames whose payload exceeds this many bytes (1009).
    pub max_frame_size: Option<usize>,
}

#[derive(Debug)]
pub enum Negotiation {
    Accept(WsOptions),
    Refuse,
}

/// Who initiated a close, delivered to `handle_close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Remote,
    Local,
}

/// A close observed by the handler. For a remote close without a code the
/// reported code is 1005 ("no status received").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseEvent {
    pub initiator: Initiator,
    pub code: u16,
}

/// The application side of a WebSocket connection. State lives in the
/// handler itself; the runtime calls back with `&mut self` so each callback
/// sees whatever the previous one left behind.
///
/// Every callback has a do-nothing default, so a handler only implements
/// the frames it cares about.
pub trait WsHandler: Send + 'static {
    /// Out-of-band messages injected into the connection via
    /// `handle_info`, e.g. from other tasks.
    type Message: Send;

    /// Decides whether to take the connection at all, and with which
    /// options. Runs once, before any frame is processed.
    fn negotiate(&mut self) -> Negotiation {
        Negotiation::Accept(WsOptions::default())
    }

    /// The connection is established and frames may flow.
    fn handle_connection(&mut self) -> Outcome {
        Outcome::Continue
    }

    fn handle_text(&mut self, text: &str) -> Outcome {
        let _ = text;
        Outcome::Continue
    }

    fn handle_binary(&mut self, data: &[u8]) -> Outcome {
        let _ = data;
        Outcome::Continue
    }

    /// A ping arrived; the pong reply has already been queued.
    fn handle_ping(&mut self, data: &[u8]) -> Outcome {
        let _ = data;
        Outcome::Continue
    }

    fn handle_pong(&mut self, data: &[u8]) -> Outcome {
        let _ = data;
        Outcome::Continue
    }

    /// The connection is closing, either on the peer's close frame or a
    /// local shutdown. Informational; the close reply is already queued.
    fn handle_close(&mut self, close: CloseEvent) {
        let _ = close;
    }

    /// The connection failed; a best-effort close frame may follow.
    fn handle_error(&mut self, error: &WsError) {
        let _ = error;
    }

    /// The idle timer configured at negotiation fired.
    fn handle_timeout(&mut self) {}

    /// An out-of-band message arrived for this connection.
    fn handle_info(&mut self, message: Self::Message) -> Outcome {
        let _ = message;
        Outcome::Continue
    }
}
