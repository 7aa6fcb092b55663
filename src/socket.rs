use log::trace;
use std::io;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::server::TlsStream;

/// The byte transport a connection runs over. The protocol cores never see
/// this type; the server loop reads bytes out of it and writes queued
/// frames into it.
pub enum Socket {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Socket {
    /// Reads whatever is available. Returns the number of bytes read and
    /// whether the peer has closed its half of the connection.
    pub async fn read_some(&mut self, buf: &mut [u8]) -> io::Result<(usize, bool)> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };
        Ok((n, n == 0))
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(bytes).await,
            Self::Tls(stream) => stream.write_all(bytes).await,
        }
    }

    /// Flushes and shuts the transport down. Failures are ignored; the peer
    /// may already be gone.
    pub async fn close(&mut self) {
        trace!("closing transport");
        let result = match self {
            Self::Plain(stream) => stream.shutdown().await,
            Self::Tls(stream) => stream.shutdown().await,
        };
        result.ok();
    }
}
