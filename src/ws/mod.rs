//! WebSocket server core: RFC 6455 frame codec and the connection state
//! machine that dispatches into an application handler.

pub mod connection;
pub mod frame;
pub mod handler;

pub use connection::{reply_code, WsConnection, WsError};
pub use handler::{CloseEvent, Initiator, Negotiation, Outcome, WsHandler, WsOptions};
