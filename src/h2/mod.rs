//! HTTP/2 server core: frame codec, HPACK state, per-stream lifecycle, and
//! the connection state machine tying them together.

pub mod connection;
pub mod coordinator;
pub mod flags;
pub mod frame;
pub mod hpack;
pub mod stream;
pub mod types;

pub use connection::{Connection, ConnectionError, Event};
