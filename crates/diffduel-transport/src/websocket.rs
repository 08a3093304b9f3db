//! WebSocket implementation using `tokio-tungstenite`.
//!
//! Events are JSON, so frames go out as text (browser clients get strings);
//! binary frames are accepted on the way in for non-browser clients.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Listens for incoming WebSocket connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds the transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// The local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(
        &mut self,
    ) -> Result<WebSocketConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection { id, ws })
    }
}

/// A freshly accepted connection, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl WebSocketConnection {
    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Splits the connection into independent send and receive halves.
    pub fn into_split(self) -> (ConnectionId, ConnectionSender, ConnectionReceiver) {
        let (sink, stream) = self.ws.split();
        (
            self.id,
            ConnectionSender { sink },
            ConnectionReceiver { stream },
        )
    }
}

/// The writing half of a connection, owned by a writer task.
pub struct ConnectionSender {
    sink: SplitSink<WsStream, Message>,
}

impl ConnectionSender {
    /// Sends one encoded event as a text frame.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8(data.to_vec()).map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))
        })?;
        self.sink.send(Message::Text(text.into())).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

/// The reading half of a connection, owned by the per-connection reader loop.
pub struct ConnectionReceiver {
    stream: SplitStream<WsStream>,
}

impl ConnectionReceiver {
    /// Receives the next data frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    /// Ping/pong frames are handled below this level and skipped.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}
