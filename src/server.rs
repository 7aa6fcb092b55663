use crate::{
    h2::{
        connection::{Connection, Event},
        types::NonZeroStreamId,
    },
    request::Request,
    response::Response,
    socket::Socket,
    ws::{WsConnection, WsHandler},
};
use anyhow::Context;
use log::{debug, info, trace, warn};
use std::{fs::File, io::BufReader, path::Path, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_rustls::{rustls, TlsAcceptor};

/// The application model: one call per complete request. Callbacks for
/// distinct streams run on separate tasks; their responses are serialized
/// back through the connection task's writer.
pub trait Service: Send + Sync + 'static {
    fn handle_request(&self, request: Request) -> Response;
}

pub struct Server<S> {
    service: Arc<S>,
    acceptor: Option<TlsAcceptor>,
}

impl<S: Service> Server<S> {
    /// A server speaking cleartext HTTP/2 with prior knowledge. Mostly
    /// useful behind a TLS-terminating proxy or in local testing.
    #[must_use]
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
            acceptor: None,
        }
    }

    /// A server terminating TLS itself, advertising `h2` via ALPN.
    pub fn with_tls(service: S, cert: &Path, key: &Path) -> anyhow::Result<Self> {
        let config = load_tls_config(cert, key)?;
        Ok(Self {
            service: Arc::new(service),
            acceptor: Some(TlsAcceptor::from(Arc::new(config))),
        })
    }

    /// Accept loop: one spawned task per transport connection.
    pub async fn serve(&self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        info!("listening on {}", addr);
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("accepted connection from {}", peer);
            let service = self.service.clone();
            let acceptor = self.acceptor.clone();
            tokio::spawn(async move {
                let socket = match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls) => Socket::Tls(Box::new(tls)),
                        Err(err) => {
                            warn!("tls handshake with {} failed: {}", peer, err);
                            return;
                        }
                    },
                    None => Socket::Plain(stream),
                };
                if let Err(err) = drive_connection(socket, service).await {
                    debug!("connection from {} ended: {:#}", peer, err);
                }
            });
        }
    }
}

fn load_tls_config(cert: &Path, key: &Path) -> anyhow::Result<rustls::ServerConfig> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(
        File::open(cert).with_context(|| format!("open {}", cert.display()))?,
    ))?
    .into_iter()
    .map(rustls::Certificate)
    .collect();
    let key = rustls_pemfile::pkcs8_private_keys(&mut BufReader::new(
        File::open(key).with_context(|| format!("open {}", key.display()))?,
    ))?
    .into_iter()
    .next()
    .context("no PKCS#8 private key found")?;
    let mut config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, rustls::PrivateKey(key))?;
    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

/// Owns one HTTP/2 connection: reads feed the state machine, application
/// work runs on per-stream tasks, and everything written to the transport
/// funnels through this task so response frames are serialized.
pub async fn drive_connection<S: Service>(
    mut socket: Socket,
    service: Arc<S>,
) -> anyhow::Result<()> {
    let mut connection = Connection::new();
    let (response_tx, mut response_rx) = mpsc::channel::<(NonZeroStreamId, Response)>(32);
    let mut buf = vec![0u8; 16 * 1024];

    loop {
        let output = connection.take_output();
        if !output.is_empty() {
            socket.write_all(&output).await?;
        }
        if connection.is_closing() {
            socket.close().await;
            return Ok(());
        }

        tokio::select! {
            read = socket.read_some(&mut buf) => {
                let (n, closed) = read?;
                if closed {
                    trace!("transport closed by peer");
                    socket.close().await;
                    return Ok(());
                }
                match connection.recv(&buf[..n]) {
                    Ok(events) => {
                        for event in events {
                            match event {
                                Event::Request { stream_id, request } => {
                                    let service = service.clone();
                                    let response_tx = response_tx.clone();
                                    tokio::spawn(async move {
                                        let response = service.handle_request(request);
                                        // the connection may be gone by now;
                                        // the response is simply dropped
                                        response_tx.send((stream_id, response)).await.ok();
                                    });
                                }
                                Event::GoawayReceived { error } => {
                                    trace!("peer goaway with {:?}", error);
                                }
                            }
                        }
                    }
                    Err(err) => {
                        // best-effort goodbye before dropping the transport
                        let output = connection.take_output();
                        if !output.is_empty() {
                            socket.write_all(&output).await.ok();
                        }
                        socket.close().await;
                        return Err(err.into());
                    }
                }
            }
            Some((stream_id, response)) = response_rx.recv() => {
                // the stream may have been reset while the application ran
                if let Err(err) = connection.send_response(stream_id, &response) {
                    warn!("dropping response for stream {}: {}", stream_id, err);
                }
            }
        }
    }
}

/// Drives an already-upgraded WebSocket transport. `info_rx` carries
/// out-of-band messages for the handler's `handle_info`; drop the sender if
/// the connection never receives any.
pub async fn drive_websocket<H: WsHandler>(
    mut socket: Socket,
    handler: H,
    mut info_rx: mpsc::Receiver<H::Message>,
) -> anyhow::Result<()> {
    let mut connection = match WsConnection::negotiate(handler) {
        Ok(connection) => connection,
        Err(_refused) => {
            debug!("websocket connection refused at negotiation");
            socket.close().await;
            return Ok(());
        }
    };
    // an unset idle timer still needs a sleep to select on; a year of idle
    // time is as good as forever
    let idle = connection
        .options()
        .timeout
        .unwrap_or(Duration::from_secs(365 * 24 * 60 * 60));
    let mut buf = vec![0u8; 8 * 1024];
    let mut info_open = true;

    loop {
        let output = connection.take_output();
        if !output.is_empty() {
            socket.write_all(&output).await.ok();
        }
        if connection.is_closing() {
            socket.close().await;
            return Ok(());
        }

        tokio::select! {
            read = tokio::time::timeout(idle, socket.read_some(&mut buf)) => match read {
                Err(_elapsed) => connection.timeout(),
                Ok(read) => {
                    let (n, closed) = read?;
                    if closed {
                        connection.transport_closed();
                        continue;
                    }
                    if let Err(err) = connection.recv(&buf[..n]) {
                        let output = connection.take_output();
                        if !output.is_empty() {
                            socket.write_all(&output).await.ok();
                        }
                        socket.close().await;
                        return Err(err.into());
                    }
                }
            },
            message = info_rx.recv(), if info_open => {
                match message {
                    Some(message) => {
                        if let Err(err) = connection.info(message) {
                            let output = connection.take_output();
                            if !output.is_empty() {
                                socket.write_all(&output).await.ok();
                            }
                            socket.close().await;
                            return Err(err.into());
                        }
                    }
                    None => info_open = false,
                }
            }
        }
    }
}
