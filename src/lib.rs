#![warn(future_incompatible, nonstandard_style, rust_2018_idioms, unused)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::similar_names,
    clippy::cast_possible_truncation
)]

pub mod h2;
pub mod request;
pub mod response;
pub mod server;
pub mod socket;
pub mod ws;

pub use bytes::Bytes;
pub use h2::{Connection, ConnectionError, Event};
pub use request::{Method, Request};
pub use response::{Response, ResponseBody};
pub use server::{drive_connection, drive_websocket, Server, Service};
pub use socket::Socket;
pub use ws::{WsConnection, WsError, WsHandler};
